use super::{
    batch_limit, BatchEventHandler, DefaultExceptionHandler, EventProcessor, ExceptionHandler,
    ProcessorControl, ProcessorHandle, RunMode,
};
use crate::invariants::debug_assert_monotonic;
use crate::sequencer::Sequencer;
use crate::wait::SequenceWaitResult;
use crate::{Cancelled, RingBuffer, RingError, Sequence, SequenceBarrier};
use std::fmt;
use std::sync::Arc;

/// Delivers contiguous runs of events to a [`BatchEventHandler`].
///
/// Same loop as [`BatchEventProcessor`](super::BatchEventProcessor), but the
/// handler sees an [`EventBatch`](crate::EventBatch) slice instead of one call
/// per event. Runs that cross the end of the physical array are split in two.
/// A failed run that the exception handler lets through is skipped as a whole.
pub struct EventBatchProcessor<T, S: Sequencer, H, X = DefaultExceptionHandler> {
    ring: Arc<RingBuffer<T, S>>,
    barrier: Arc<SequenceBarrier<S>>,
    handler: H,
    exception_handler: X,
    control: Arc<ProcessorControl>,
    batch_limit: i64,
}

impl<T, S, H> EventBatchProcessor<T, S, H>
where
    S: Sequencer,
    H: BatchEventHandler<T>,
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

impl<T, S, H, X> EventBatchProcessor<T, S, H, X>
where
    S: Sequencer,
    H: BatchEventHandler<T>,
    X: ExceptionHandler<T>,
{
    /// Replaces the exception handler.
    pub fn with_exception_handler<Y: ExceptionHandler<T>>(
        self,
        exception_handler: Y,
    ) -> EventBatchProcessor<T, S, H, Y> {
        EventBatchProcessor {
            ring: self.ring,
            barrier: self.barrier,
            handler: self.handler,
            exception_handler,
            control: self.control,
            batch_limit: self.batch_limit,
        }
    }

    /// The batch handler.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Mutable access to the batch handler while the processor is not running.
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

    fn process_events(&mut self) -> Result<(), RingError> {
        let sequence = Arc::clone(self.control.sequence());
        let mut next = sequence.value() + 1;

        loop {
            let available = match self.barrier.wait_for_published_sequence(next) {
                Ok(SequenceWaitResult::Available(available)) => available,
                Ok(SequenceWaitResult::Timeout) => {
                    let last = sequence.value();
                    if let Err(err) = self.handler.on_timeout(last) {
                        self.exception_handler
                            .handle_on_timeout_exception(err, last)
                            .map_err(RingError::Handler)?;
                    }
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

            while next <= end {
                // SAFETY: next..=end is published and unreleased by this
                // processor, so producers cannot reach these slots.
                let batch = unsafe { self.ring.batch(next, end) };
                let first = next;
                let last = batch.last_sequence();
                if let Err(err) = self.handler.on_batch(batch, first) {
                    // SAFETY: same range as above, still unreleased.
                    let batch = unsafe { self.ring.batch(first, last) };
                    if let Err(fatal) = self.exception_handler.handle_batch_exception(err, batch)
                    {
                        sequence.set_value(first - 1);
                        return Err(RingError::Handler(fatal));
                    }
                }
                next = last + 1;
            }

            debug_assert_monotonic!("processor sequence", sequence.value(), end);
            sequence.set_value(end);
        }
    }
}

impl<T, S, H, X> EventProcessor for EventBatchProcessor<T, S, H, X>
where
    T: Send + Sync + 'static,
    S: Sequencer,
    H: BatchEventHandler<T> + 'static,
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

impl<T, S: Sequencer, H, X> fmt::Debug for EventBatchProcessor<T, S, H, X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBatchProcessor")
            .field("control", &self.control)
            .field("barrier", &self.barrier)
            .finish_non_exhaustive()
    }
}
