use crate::invariants::{debug_assert_monotonic, debug_assert_published_read};
use crate::sequencer::Sequencer;
use crate::{DependentSequenceGroup, RingBuffer, Sequence};
use std::fmt;
use std::sync::Arc;

/// Outcome of one [`EventPoller::poll`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// At least one event was handed to the handler.
    Processing,
    /// The cursor is ahead of the poller, but its dependencies are not.
    Gating,
    /// Nothing has been published past the poller's position.
    Idle,
}

/// Pull-style consumer: the caller decides when to look for events.
///
/// Never blocks and never spawns a thread. Each `poll` drains what is
/// available right now; the poller's [`sequence`](Self::sequence) then points
/// at the last event the handler accepted.
pub struct EventPoller<T, S: Sequencer> {
    ring: Arc<RingBuffer<T, S>>,
    sequence: Arc<Sequence>,
    dependencies: DependentSequenceGroup,
}

impl<T, S: Sequencer> EventPoller<T, S> {
    pub(crate) fn new(ring: Arc<RingBuffer<T, S>>, dependencies: &[Arc<Sequence>]) -> Self {
        let dependencies =
            DependentSequenceGroup::new(Arc::clone(ring.sequencer().cursor()), dependencies);
        Self {
            ring,
            sequence: Arc::new(Sequence::default()),
            dependencies,
        }
    }

    /// Hands every available event to `handler` in sequence order.
    ///
    /// The handler receives `(event, sequence, end_of_batch)` and returns
    /// `Ok(false)` to stop early; remaining events are delivered by the next
    /// `poll`. If it returns an error, polling stops before that event, which
    /// is offered again on the next call, and the error is returned.
    pub fn poll<E>(
        &mut self,
        mut handler: impl FnMut(&T, i64, bool) -> Result<bool, E>,
    ) -> Result<PollState, E> {
        let current = self.sequence.value();
        let mut next = current + 1;
        let available = self
            .ring
            .sequencer()
            .highest_published_sequence(next, self.dependencies.value());

        if next > available {
            return Ok(if self.ring.cursor() >= next {
                PollState::Gating
            } else {
                PollState::Idle
            });
        }

        let mut processed = current;
        let mut outcome = Ok(PollState::Processing);
        while next <= available {
            debug_assert_published_read!(next, available);
            // SAFETY: `next` is published and not yet released by this poller.
            let event = unsafe { self.ring.get(next) };
            match handler(event, next, next == available) {
                Ok(keep_going) => {
                    processed = next;
                    next += 1;
                    if !keep_going {
                        break;
                    }
                }
                Err(err) => {
                    outcome = Err(err);
                    break;
                }
            }
        }

        debug_assert_monotonic!("poller sequence", current, processed);
        self.sequence.set_value(processed);
        outcome
    }

    /// The poller's progress sequence.
    ///
    /// Register it with
    /// [`RingBuffer::add_gating_sequences`] so producers do not overwrite
    /// events the poller has not seen, and pass it as a dependency to
    /// downstream stages.
    pub fn sequence(&self) -> &Arc<Sequence> {
        &self.sequence
    }
}

impl<T, S: Sequencer> fmt::Debug for EventPoller<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventPoller")
            .field("sequence", &self.sequence.value())
            .field("dependencies", &self.dependencies.dependency_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wait::BusySpinWaitStrategy;
    use crate::Config;
    use std::convert::Infallible;

    type TestRing = RingBuffer<i64, crate::SingleProducerSequencer<BusySpinWaitStrategy>>;

    fn ring() -> Arc<TestRing> {
        Arc::new(
            RingBuffer::create_single_producer(|| 0, Config::new(8), BusySpinWaitStrategy)
                .unwrap(),
        )
    }

    fn publish(ring: &TestRing, values: &[i64]) {
        for &value in values {
            let seq = unsafe { ring.next() };
            unsafe { *ring.get_mut(seq) = value };
            unsafe { ring.publish(seq) };
        }
    }

    #[test]
    fn test_idle_then_processing() {
        let ring = ring();
        let mut poller = ring.new_poller(&[]);

        let never = |_: &i64, _: i64, _: bool| -> Result<bool, Infallible> {
            unreachable!("no events published")
        };
        assert_eq!(poller.poll(never), Ok(PollState::Idle));

        publish(&ring, &[10, 20, 30]);
        let mut seen = Vec::new();
        let state = poller.poll(|event, seq, end| {
            seen.push((*event, seq, end));
            Ok::<_, Infallible>(true)
        });
        assert_eq!(state, Ok(PollState::Processing));
        assert_eq!(seen, vec![(10, 0, false), (20, 1, false), (30, 2, true)]);
        assert_eq!(poller.sequence().value(), 2);
        assert_eq!(poller.poll(never), Ok(PollState::Idle));
    }

    #[test]
    fn test_stop_early_keeps_position() {
        let ring = ring();
        let mut poller = ring.new_poller(&[]);
        publish(&ring, &[1, 2, 3, 4]);

        let mut seen = Vec::new();
        poller
            .poll(|event, _, _| {
                seen.push(*event);
                Ok::<_, Infallible>(seen.len() < 2)
            })
            .unwrap();
        assert_eq!(seen, vec![1, 2]);
        assert_eq!(poller.sequence().value(), 1);

        poller
            .poll(|event, _, _| {
                seen.push(*event);
                Ok::<_, Infallible>(true)
            })
            .unwrap();
        assert_eq!(seen, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_handler_error_redelivers_failed_event() {
        let ring = ring();
        let mut poller = ring.new_poller(&[]);
        publish(&ring, &[5, 6, 7]);

        let result = poller.poll(|event, _, _| if *event == 6 { Err("bad event") } else { Ok(true) });
        assert_eq!(result, Err("bad event"));
        assert_eq!(poller.sequence().value(), 0);

        let mut seen = Vec::new();
        poller
            .poll(|event, _, _| {
                seen.push(*event);
                Ok::<_, &str>(true)
            })
            .unwrap();
        assert_eq!(seen, vec![6, 7]);
    }

    #[test]
    fn test_gating_on_upstream_dependency() {
        let ring = ring();
        let upstream = Arc::new(Sequence::default());
        let mut poller = ring.new_poller(&[Arc::clone(&upstream)]);
        publish(&ring, &[1, 2]);

        let count = |_: &i64, _: i64, _: bool| Ok::<_, Infallible>(true);
        assert_eq!(poller.poll(count), Ok(PollState::Gating));

        upstream.set_value(0);
        assert_eq!(poller.poll(count), Ok(PollState::Processing));
        assert_eq!(poller.sequence().value(), 0);
        assert_eq!(poller.poll(count), Ok(PollState::Gating));
    }
}
