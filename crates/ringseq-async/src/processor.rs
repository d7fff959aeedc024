//! Event processor that runs as a tokio task.

use crate::barrier::AsyncBarrierExt;
use crate::wait::AsyncSequenceWaiter;
use async_trait::async_trait;
use ringseq_rs::{
    Cancelled, DefaultExceptionHandler, ExceptionHandler, ProcessorControl, ProcessorHandle,
    RingBuffer, RingError, RunMode, Sequence, SequenceBarrier, SequenceWaitResult, Sequencer,
    WaitStrategy,
};
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Per-event consumer callback whose hooks may await.
///
/// Mirrors [`EventHandler`](ringseq_rs::EventHandler): only
/// [`on_event`](Self::on_event) is required.
#[async_trait]
pub trait AsyncBatchEventHandler<T: Sync>: Send {
    /// Handles one event. `end_of_batch` is true only for the last event of
    /// the run delivered in one go.
    async fn on_event(&mut self, event: &T, sequence: i64, end_of_batch: bool)
        -> anyhow::Result<()>;

    /// Called before each run with its size and the current queue depth.
    async fn on_batch_start(&mut self, _batch_size: i64, _queue_depth: i64) {}

    /// Called on the processor task before the first event.
    async fn on_start(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called on the processor task just before it stops.
    async fn on_shutdown(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called when a timeout wait strategy gave up.
    async fn on_timeout(&mut self, _sequence: i64) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Async flavour of [`BatchEventProcessor`](ringseq_rs::BatchEventProcessor).
///
/// Suspends on the barrier instead of parking a thread, so many processors can
/// share a small runtime. Halting works the same way: the
/// [`ProcessorHandle`] cancels the barrier, which wakes the suspended task.
pub struct AsyncBatchEventProcessor<T, S: Sequencer, H, X = DefaultExceptionHandler> {
    ring: Arc<RingBuffer<T, S>>,
    barrier: Arc<SequenceBarrier<S>>,
    handler: H,
    exception_handler: X,
    control: Arc<ProcessorControl>,
}

impl<T, S, H> AsyncBatchEventProcessor<T, S, H>
where
    T: Sync,
    S: Sequencer,
    H: AsyncBatchEventHandler<T>,
{
    /// Creates a processor reading `ring` through `barrier`.
    pub fn new(ring: Arc<RingBuffer<T, S>>, barrier: SequenceBarrier<S>, handler: H) -> Self {
        let barrier = Arc::new(barrier);
        let control = Arc::new(ProcessorControl::new(
            Arc::new(Sequence::default()),
            Arc::clone(&barrier),
        ));
        Self {
            ring,
            barrier,
            handler,
            exception_handler: DefaultExceptionHandler,
            control,
        }
    }
}

impl<T, S, H, X> AsyncBatchEventProcessor<T, S, H, X>
where
    T: Send + Sync + 'static,
    S: Sequencer,
    <S::Wait as WaitStrategy>::Waiter: AsyncSequenceWaiter,
    H: AsyncBatchEventHandler<T> + 'static,
    X: ExceptionHandler<T> + 'static,
{
    /// Replaces the exception handler.
    pub fn with_exception_handler<Y: ExceptionHandler<T>>(
        self,
        exception_handler: Y,
    ) -> AsyncBatchEventProcessor<T, S, H, Y> {
        AsyncBatchEventProcessor {
            ring: self.ring,
            barrier: self.barrier,
            handler: self.handler,
            exception_handler,
            control: self.control,
        }
    }

    /// The event handler.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Remote control for this processor.
    pub fn handle(&self) -> ProcessorHandle {
        self.control.handle()
    }

    /// The processor's progress sequence.
    pub fn sequence(&self) -> &Arc<Sequence> {
        self.control.sequence()
    }

    /// Runs the loop on the current task until halted.
    ///
    /// Same contract as [`EventProcessor::run`](ringseq_rs::EventProcessor::run).
    pub async fn run(&mut self) -> Result<(), RingError> {
        let mode = self.control.begin()?;
        if mode == RunMode::Run {
            self.barrier.reset_processing();
        }

        let mut result = match self.handler.on_start().await {
            Ok(()) => Ok(()),
            Err(err) => self
                .exception_handler
                .handle_on_start_exception(err)
                .map_err(RingError::Handler),
        };
        self.control.notify_started();

        if result.is_ok() && mode == RunMode::Run && self.control.is_running_state() {
            result = self.process_events().await;
        }

        let shutdown = match self.handler.on_shutdown().await {
            Ok(()) => Ok(()),
            Err(err) => self
                .exception_handler
                .handle_on_shutdown_exception(err)
                .map_err(RingError::Handler),
        };
        self.control.finish();
        result.and(shutdown)
    }

    /// Spawns [`run`](Self::run) on the current tokio runtime. The task
    /// yields the processor back together with the run result.
    pub fn spawn(mut self) -> JoinHandle<(Self, Result<(), RingError>)> {
        tokio::spawn(async move {
            let result = self.run().await;
            (self, result)
        })
    }

    async fn process_events(&mut self) -> Result<(), RingError> {
        let sequence = Arc::clone(self.control.sequence());
        let mut next = sequence.value() + 1;

        loop {
            let available = match self.barrier.wait_for_published_async(next).await {
                Ok(SequenceWaitResult::Available(available)) => available,
                Ok(SequenceWaitResult::Timeout) => {
                    let last = sequence.value();
                    debug!(sequence = last, "async processor wait timed out");
                    if let Err(err) = self.handler.on_timeout(last).await {
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
                tokio::task::yield_now().await;
                continue;
            }

            self.handler
                .on_batch_start(available - next + 1, available - next + 1)
                .await;

            let mut failed = false;
            while next <= available {
                // SAFETY: `next` is published and this processor has not
                // released it, so the gating sequences keep producers off it.
                let event = unsafe { self.ring.get(next) };
                if let Err(err) = self.handler.on_event(event, next, next == available).await {
                    if let Err(fatal) = self
                        .exception_handler
                        .handle_event_exception(err, next, event)
                    {
                        warn!(sequence = next, "handler failure stopped async processor");
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
                sequence.set_value(available);
            }
        }
    }
}

impl<T, S: Sequencer, H, X> fmt::Debug for AsyncBatchEventProcessor<T, S, H, X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncBatchEventProcessor")
            .field("control", &self.control)
            .field("barrier", &self.barrier)
            .finish_non_exhaustive()
    }
}
