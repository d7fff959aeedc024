use super::{
    batch_limit, DefaultExceptionHandler, EventHandler, EventProcessor, ExceptionHandler,
    ProcessorControl, ProcessorHandle, RunMode,
};
use crate::invariants::{debug_assert_monotonic, debug_assert_published_read};
use crate::sequencer::Sequencer;
use crate::wait::SequenceWaitResult;
use crate::{Cancelled, RingBuffer, RingError, Sequence, SequenceBarrier};
use std::fmt;
use std::sync::Arc;

/// Delivers events one by one to an [`EventHandler`].
///
/// Each wake-up processes every available event (capped by
/// [`EventHandler::max_batch_size`]) and releases them with a single write of
/// the processor sequence, so downstream stages and the producer see one
/// update per batch rather than per event.
///
/// # Example
///
/// ```
/// use ringseq_rs::{
///     BatchEventProcessor, BlockingWaitStrategy, Config, EventHandler, EventProcessor, RingBuffer,
/// };
/// use std::sync::Arc;
///
/// struct Count(usize);
///
/// impl EventHandler<u64> for Count {
///     fn on_event(&mut self, _event: &u64, _seq: i64, _end: bool) -> anyhow::Result<()> {
///         self.0 += 1;
///         Ok(())
///     }
/// }
///
/// let ring = Arc::new(
///     RingBuffer::create_single_producer(|| 0u64, Config::new(64), BlockingWaitStrategy::new())
///         .unwrap(),
/// );
/// let processor = BatchEventProcessor::new(Arc::clone(&ring), ring.new_barrier(&[]), Count(0));
/// ring.add_gating_sequences(&[Arc::clone(processor.sequence())]);
///
/// let running = processor.start("counter").unwrap();
/// let mut publisher = ring.publisher().unwrap();
/// for i in 0..10 {
///     publisher.publish_event(|slot, _| *slot = i);
/// }
/// while running.handle().sequence().value() < 9 {
///     std::thread::yield_now();
/// }
/// running.halt();
/// let processor = running.join().unwrap();
/// assert_eq!(processor.handler().0, 10);
/// ```
pub struct BatchEventProcessor<T, S: Sequencer, H, X = DefaultExceptionHandler> {
    ring: Arc<RingBuffer<T, S>>,
    barrier: Arc<SequenceBarrier<S>>,
    handler: H,
    exception_handler: X,
    control: Arc<ProcessorControl>,
    batch_limit: i64,
}

impl<T, S, H> BatchEventProcessor<T, S, H>
where
    S: Sequencer,
    H: EventHandler<T>,
{
    /// Creates a processor reading `ring` through `barrier`.
    pub fn new(ring: Arc<RingBuffer<T, S>>, barrier: SequenceBarrier<S>, mut handler: H) -> Self {
        let sequence = Arc::new(Sequence::default());
        handler.set_sequence_callback(Arc::clone(&sequence));
        let barrier = Arc::new(barrier);
        let control = Arc::new(ProcessorControl::new(sequence, Arc::clone(&barrier)));

        Self {
            ring,
            barrier,
            batch_limit: batch_limit(handler.max_batch_size()),
            handler,
            exception_handler: DefaultExceptionHandler,
            control,
        }
    }
}

impl<T, S, H, X> BatchEventProcessor<T, S, H, X>
where
    S: Sequencer,
    H: EventHandler<T>,
    X: ExceptionHandler<T>,
{
    /// Replaces the exception handler.
    pub fn with_exception_handler<Y: ExceptionHandler<T>>(
        self,
        exception_handler: Y,
    ) -> BatchEventProcessor<T, S, H, Y> {
        BatchEventProcessor {
            ring: self.ring,
            barrier: self.barrier,
            handler: self.handler,
            exception_handler,
            control: self.control,
            batch_limit: self.batch_limit,
        }
    }

    /// The event handler.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Mutable access to the event handler while the processor is not running.
    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    fn notify_start(&mut self) -> Result<(), RingError> {
        let result = match self.handler.on_start() {
            Ok(()) => Ok(()),
            Err(err) => self
                .exception_handler
                .handle_on_start_exception(err)
                .map_err(RingError::Handler),
        };
        self.control.notify_started();
        result
    }

    fn notify_shutdown(&mut self) -> Result<(), RingError> {
        match self.handler.on_shutdown() {
            Ok(()) => Ok(()),
            Err(err) => self
                .exception_handler
                .handle_on_shutdown_exception(err)
                .map_err(RingError::Handler),
        }
    }

    fn notify_timeout(&mut self, sequence: i64) -> Result<(), RingError> {
        match self.handler.on_timeout(sequence) {
            Ok(()) => Ok(()),
            Err(err) => self
                .exception_handler
                .handle_on_timeout_exception(err, sequence)
                .map_err(RingError::Handler),
        }
    }

    fn process_events(&mut self) -> Result<(), RingError> {
        let sequence = Arc::clone(self.control.sequence());
        let mut next = sequence.value() + 1;

        loop {
            let available = match self.barrier.wait_for_published_sequence(next) {
                Ok(SequenceWaitResult::Available(available)) => available,
                Ok(SequenceWaitResult::Timeout) => {
                    self.notify_timeout(sequence.value())?;
                    continue;
                }
                Err(Cancelled) => {
                    if !self.control.is_running_state() {
                        return Ok(());
                    }
                    continue;
                }
            };
            if available < next {
                continue;
            }

            let end = if available - next >= self.batch_limit {
                next + self.batch_limit - 1
            } else {
                available
            };
            self.handler
                .on_batch_start(end - next + 1, available - next + 1);

            let mut failed = false;
            while next <= end {
                debug_assert_published_read!(next, available);
                // SAFETY: `next` is published and this processor has not
                // released it, so the gating sequences keep producers off it.
                let event = unsafe { self.ring.get(next) };
                if let Err(err) = self.handler.on_event(event, next, next == end) {
                    if let Err(fatal) = self
                        .exception_handler
                        .handle_event_exception(err, next, event)
                    {
                        sequence.set_value(next - 1);
                        return Err(RingError::Handler(fatal));
                    }
                    sequence.set_value(next);
                    next += 1;
                    failed = true;
                    break;
                }
                next += 1;
            }

            if !failed {
                debug_assert_monotonic!("processor sequence", sequence.value(), end);
                sequence.set_value(end);
            }
        }
    }
}

impl<T, S, H, X> EventProcessor for BatchEventProcessor<T, S, H, X>
where
    T: Send + Sync + 'static,
    S: Sequencer,
    H: EventHandler<T> + 'static,
    X: ExceptionHandler<T> + 'static,
{
    fn run(&mut self) -> Result<(), RingError> {
        let mode = self.control.begin()?;
        if mode == RunMode::Run {
            self.barrier.reset_processing();
        }

        let mut result = self.notify_start();
        if result.is_ok() && mode == RunMode::Run && self.control.is_running_state() {
            result = self.process_events();
        }

        let shutdown = self.notify_shutdown();
        self.control.finish();
        result.and(shutdown)
    }

    fn handle(&self) -> ProcessorHandle {
        self.control.handle()
    }

    fn sequence(&self) -> &Arc<Sequence> {
        self.control.sequence()
    }
}

impl<T, S: Sequencer, H, X> fmt::Debug for BatchEventProcessor<T, S, H, X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchEventProcessor")
            .field("control", &self.control)
            .field("barrier", &self.barrier)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wait::BusySpinWaitStrategy;
    use crate::{Config, FatalExceptionHandler, SingleProducerSequencer};
    use anyhow::bail;
    use std::time::Duration;

    type Ring = RingBuffer<i64, SingleProducerSequencer<BusySpinWaitStrategy>>;

    fn ring(size: usize) -> Arc<Ring> {
        Arc::new(
            RingBuffer::create_single_producer(|| 0, Config::new(size), BusySpinWaitStrategy)
                .unwrap(),
        )
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<(i64, i64, bool)>,
        batch_starts: Vec<(i64, i64)>,
        fail_on: Option<i64>,
        max_batch: Option<usize>,
        started: bool,
        shut_down: bool,
    }

    impl EventHandler<i64> for Recorder {
        fn on_event(&mut self, event: &i64, sequence: i64, end_of_batch: bool) -> anyhow::Result<()> {
            if Some(*event) == self.fail_on {
                bail!("poisoned event {event}");
            }
            self.events.push((*event, sequence, end_of_batch));
            Ok(())
        }

        fn on_batch_start(&mut self, batch_size: i64, queue_depth: i64) {
            self.batch_starts.push((batch_size, queue_depth));
        }

        fn on_start(&mut self) -> anyhow::Result<()> {
            self.started = true;
            Ok(())
        }

        fn on_shutdown(&mut self) -> anyhow::Result<()> {
            self.shut_down = true;
            Ok(())
        }

        fn max_batch_size(&self) -> Option<usize> {
            self.max_batch
        }
    }

    fn publish(ring: &Ring, values: impl IntoIterator<Item = i64>) {
        for value in values {
            let seq = unsafe { ring.next() };
            unsafe { *ring.get_mut(seq) = value };
            unsafe { ring.publish(seq) };
        }
    }

    fn drain<X: ExceptionHandler<i64> + 'static>(
        processor: BatchEventProcessor<i64, SingleProducerSequencer<BusySpinWaitStrategy>, Recorder, X>,
        until: i64,
    ) -> (
        BatchEventProcessor<i64, SingleProducerSequencer<BusySpinWaitStrategy>, Recorder, X>,
        Result<(), RingError>,
    ) {
        let running = processor.start("test-processor").unwrap();
        let handle = running.handle().clone();
        while handle.sequence().value() < until && !running.is_finished() {
            std::thread::sleep(Duration::from_millis(1));
        }
        if !running.is_finished() {
            running.halt();
        }
        let (processor, result) = running.join.join().unwrap();
        (processor, result)
    }

    #[test]
    fn test_end_of_batch_and_max_batch_size() {
        let ring = ring(16);
        let recorder = Recorder {
            max_batch: Some(3),
            ..Recorder::default()
        };
        let processor = BatchEventProcessor::new(Arc::clone(&ring), ring.new_barrier(&[]), recorder);
        ring.add_gating_sequences(&[Arc::clone(processor.sequence())]);
        publish(&ring, 0..8);

        let (processor, result) = drain(processor, 7);
        result.unwrap();

        let handler = processor.handler();
        assert!(handler.started && handler.shut_down);
        assert_eq!(handler.events.len(), 8);
        assert_eq!(
            handler.events.iter().map(|e| e.1).collect::<Vec<_>>(),
            (0..8).collect::<Vec<_>>()
        );
        assert_eq!(
            handler
                .events
                .iter()
                .filter(|e| e.2)
                .map(|e| e.1)
                .collect::<Vec<_>>(),
            vec![2, 5, 7]
        );
        assert_eq!(handler.batch_starts, vec![(3, 8), (3, 5), (2, 2)]);
    }

    #[test]
    fn test_default_handler_fails_forward() {
        let ring = ring(16);
        let recorder = Recorder {
            fail_on: Some(2),
            ..Recorder::default()
        };
        let processor = BatchEventProcessor::new(Arc::clone(&ring), ring.new_barrier(&[]), recorder);
        ring.add_gating_sequences(&[Arc::clone(processor.sequence())]);
        publish(&ring, 0..5);

        let (processor, result) = drain(processor, 4);
        result.unwrap();
        assert_eq!(
            processor.handler().events.iter().map(|e| e.0).collect::<Vec<_>>(),
            vec![0, 1, 3, 4]
        );
        assert_eq!(processor.sequence().value(), 4);
    }

    #[test]
    fn test_fatal_handler_stops_before_failed_event() {
        let ring = ring(16);
        let recorder = Recorder {
            fail_on: Some(2),
            ..Recorder::default()
        };
        let processor = BatchEventProcessor::new(Arc::clone(&ring), ring.new_barrier(&[]), recorder)
            .with_exception_handler(FatalExceptionHandler);
        ring.add_gating_sequences(&[Arc::clone(processor.sequence())]);
        publish(&ring, 0..5);

        let (processor, result) = drain(processor, 4);
        assert!(matches!(result, Err(RingError::Handler(_))));
        assert_eq!(processor.sequence().value(), 1);
        assert!(processor.handler().shut_down);
        assert!(!processor.handle().is_running());
    }

    #[test]
    fn test_run_twice_is_rejected() {
        let ring = ring(8);
        let processor =
            BatchEventProcessor::new(Arc::clone(&ring), ring.new_barrier(&[]), Recorder::default());
        let control = Arc::clone(&processor.control);
        let running = processor.start("first").unwrap();
        assert!(running.handle().wait_until_started(Duration::from_secs(5)));

        // A second run on the same control block must be refused.
        assert!(matches!(control.begin(), Err(RingError::AlreadyRunning)));

        running.halt();
        running.join().unwrap();
    }
}
