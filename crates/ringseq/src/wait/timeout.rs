use super::{
    BlockingGate, CancellationToken, SequenceWaitResult, SequenceWaiter, SequenceWaiterOwner,
    WaitStrategy,
};
use crate::{Cancelled, DependentSequenceGroup};
use std::hint;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// [`BlockingWaitStrategy`](super::BlockingWaitStrategy) that gives up after
/// `timeout`, returning [`SequenceWaitResult::Timeout`].
#[derive(Debug, Clone)]
pub struct TimeoutBlockingWaitStrategy {
    gate: Arc<BlockingGate>,
    timeout: Duration,
}

impl TimeoutBlockingWaitStrategy {
    /// Creates the strategy with the given timeout.
    pub fn new(timeout: Duration) -> Self {
        Self {
            gate: Arc::new(BlockingGate::new()),
            timeout,
        }
    }

    /// The configured timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl WaitStrategy for TimeoutBlockingWaitStrategy {
    type Waiter = TimeoutBlockingSequenceWaiter;

    #[inline]
    fn is_blocking(&self) -> bool {
        true
    }

    fn new_sequence_waiter(
        &self,
        _owner: SequenceWaiterOwner,
        dependent_sequences: DependentSequenceGroup,
    ) -> Self::Waiter {
        TimeoutBlockingSequenceWaiter {
            gate: Arc::clone(&self.gate),
            dependent_sequences,
            timeout: self.timeout,
        }
    }

    fn signal_all_when_blocking(&self) {
        self.gate.signal_all();
    }
}

/// Waiter for [`TimeoutBlockingWaitStrategy`].
#[derive(Debug)]
pub struct TimeoutBlockingSequenceWaiter {
    gate: Arc<BlockingGate>,
    dependent_sequences: DependentSequenceGroup,
    timeout: Duration,
}

impl SequenceWaiter for TimeoutBlockingSequenceWaiter {
    fn dependent_sequences(&self) -> &DependentSequenceGroup {
        &self.dependent_sequences
    }

    fn wait_for(
        &self,
        sequence: i64,
        token: &CancellationToken,
    ) -> Result<SequenceWaitResult, Cancelled> {
        let deps = &self.dependent_sequences;
        if deps.cursor_value() < sequence {
            let deadline = Instant::now() + self.timeout;
            let reached =
                self.gate
                    .wait_while_until(|| deps.cursor_value() < sequence, token, deadline)?;
            if !reached {
                return Ok(SequenceWaitResult::Timeout);
            }
        }

        deps.aggressive_spin_wait_for(sequence, token)
            .map(SequenceWaitResult::Available)
    }

    fn cancel(&self) {
        self.gate.signal_all();
    }
}

/// [`YieldingWaitStrategy`](super::YieldingWaitStrategy) that gives up after
/// `timeout`.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutYieldingWaitStrategy {
    spin_tries: u32,
    timeout: Duration,
}

impl TimeoutYieldingWaitStrategy {
    /// Creates the strategy with the default spin budget.
    pub fn new(timeout: Duration) -> Self {
        Self {
            spin_tries: super::YieldingWaitStrategy::DEFAULT_SPIN_TRIES,
            timeout,
        }
    }

    /// Creates the strategy with a custom spin budget.
    pub fn with_spin_tries(timeout: Duration, spin_tries: u32) -> Self {
        Self {
            spin_tries,
            timeout,
        }
    }
}

impl WaitStrategy for TimeoutYieldingWaitStrategy {
    type Waiter = TimeoutYieldingSequenceWaiter;

    #[inline]
    fn is_blocking(&self) -> bool {
        false
    }

    fn new_sequence_waiter(
        &self,
        _owner: SequenceWaiterOwner,
        dependent_sequences: DependentSequenceGroup,
    ) -> Self::Waiter {
        TimeoutYieldingSequenceWaiter {
            dependent_sequences,
            spin_tries: self.spin_tries,
            timeout: self.timeout,
        }
    }

    #[inline]
    fn signal_all_when_blocking(&self) {}
}

/// Waiter for [`TimeoutYieldingWaitStrategy`].
#[derive(Debug)]
pub struct TimeoutYieldingSequenceWaiter {
    dependent_sequences: DependentSequenceGroup,
    spin_tries: u32,
    timeout: Duration,
}

impl SequenceWaiter for TimeoutYieldingSequenceWaiter {
    fn dependent_sequences(&self) -> &DependentSequenceGroup {
        &self.dependent_sequences
    }

    fn wait_for(
        &self,
        sequence: i64,
        token: &CancellationToken,
    ) -> Result<SequenceWaitResult, Cancelled> {
        let started = Instant::now();
        let mut counter = self.spin_tries;
        loop {
            let available = self.dependent_sequences.value();
            if available >= sequence {
                return Ok(SequenceWaitResult::Available(available));
            }
            token.check()?;
            if counter == 0 {
                // Clock reads only in the yield phase; spinning stays cheap.
                if started.elapsed() >= self.timeout {
                    return Ok(SequenceWaitResult::Timeout);
                }
                thread::yield_now();
            } else {
                counter -= 1;
                hint::spin_loop();
            }
        }
    }

    fn cancel(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Sequence;

    fn group(cursor: &Arc<Sequence>) -> DependentSequenceGroup {
        DependentSequenceGroup::new(Arc::clone(cursor), &[])
    }

    #[test]
    fn test_timeout_blocking_times_out() {
        let cursor = Arc::new(Sequence::default());
        let strategy = TimeoutBlockingWaitStrategy::new(Duration::from_millis(10));
        let waiter = strategy.new_sequence_waiter(SequenceWaiterOwner::unknown(), group(&cursor));

        let started = Instant::now();
        let token = CancellationToken::new();
        assert_eq!(waiter.wait_for(0, &token), Ok(SequenceWaitResult::Timeout));
        assert!(started.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn test_timeout_blocking_available_before_deadline() {
        let cursor = Arc::new(Sequence::default());
        let strategy = TimeoutBlockingWaitStrategy::new(Duration::from_secs(5));
        let waiter = strategy.new_sequence_waiter(SequenceWaiterOwner::unknown(), group(&cursor));

        let publisher = {
            let strategy = strategy.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                cursor.set_value(2);
                strategy.signal_all_when_blocking();
            })
        };

        let token = CancellationToken::new();
        assert_eq!(waiter.wait_for(1, &token), Ok(SequenceWaitResult::Available(2)));
        publisher.join().unwrap();
    }

    #[test]
    fn test_timeout_yielding_times_out() {
        let cursor = Arc::new(Sequence::default());
        let strategy = TimeoutYieldingWaitStrategy::with_spin_tries(Duration::from_millis(5), 8);
        let waiter = strategy.new_sequence_waiter(SequenceWaiterOwner::unknown(), group(&cursor));

        let token = CancellationToken::new();
        assert_eq!(waiter.wait_for(0, &token), Ok(SequenceWaitResult::Timeout));

        cursor.set_value(0);
        assert_eq!(waiter.wait_for(0, &token), Ok(SequenceWaitResult::Available(0)));
    }
}
