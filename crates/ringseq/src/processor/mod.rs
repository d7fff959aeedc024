//! Event processors: the consumer loops that drive user handlers.
//!
//! A processor owns a [`SequenceBarrier`](crate::SequenceBarrier), a handler
//! and an [`ExceptionHandler`], and tracks its progress in a [`Sequence`].
//! Downstream barriers depend on that sequence; the terminal stages' sequences
//! gate the producer. A processor's sequence, or that of a stage behind it,
//! must be registered with
//! [`RingBuffer::add_gating_sequences`](crate::RingBuffer::add_gating_sequences)
//! before events are published.
//!
//! Processors run on a thread of the caller's choosing via
//! [`EventProcessor::run`], or on a dedicated named thread via
//! [`EventProcessor::start`].

mod batch_event;
mod event_batch;
mod exception;
mod handler;
mod lifecycle;

pub use batch_event::BatchEventProcessor;
pub use event_batch::EventBatchProcessor;
pub use exception::{
    DefaultExceptionHandler, ExceptionHandler, FatalExceptionHandler, IgnoreExceptionHandler,
};
pub use handler::{BatchEventHandler, EventHandler};
pub use lifecycle::{ProcessorControl, ProcessorHandle, RunMode};

pub(crate) use handler::batch_limit;

use crate::{RingError, Sequence};
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// A consumer loop that can run on its own thread.
pub trait EventProcessor: Send + Sized + 'static {
    /// Runs the loop on the calling thread until halted.
    ///
    /// Fails with [`RingError::AlreadyRunning`] if the processor is already
    /// running, or [`RingError::Handler`] if the exception handler stopped
    /// it. After returning the processor is idle and may be run again; it
    /// resumes after the last event it released.
    fn run(&mut self) -> Result<(), RingError>;

    /// Remote control for this processor.
    fn handle(&self) -> ProcessorHandle;

    /// The processor's progress sequence.
    fn sequence(&self) -> &Arc<Sequence>;

    /// Moves the processor onto a new OS thread named `name` and runs it.
    fn start(self, name: &str) -> Result<ProcessorThread<Self>, RingError> {
        let handle = self.handle();
        let join = thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || {
                let mut processor = self;
                let result = processor.run();
                (processor, result)
            })?;
        Ok(ProcessorThread { handle, join })
    }
}

/// A processor running on its own thread.
pub struct ProcessorThread<P> {
    handle: ProcessorHandle,
    join: JoinHandle<(P, Result<(), RingError>)>,
}

impl<P> ProcessorThread<P> {
    /// Remote control for the processor.
    pub fn handle(&self) -> &ProcessorHandle {
        &self.handle
    }

    /// Shorthand for `handle().halt()`.
    pub fn halt(&self) {
        self.handle.halt();
    }

    /// `true` once the thread has exited.
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Waits for the thread and hands the processor back so it can be
    /// restarted.
    pub fn join(self) -> Result<P, RingError> {
        let (processor, result) = self
            .join
            .join()
            .map_err(|_| RingError::ProcessorPanicked)?;
        result.map(|()| processor)
    }
}

impl<P> fmt::Debug for ProcessorThread<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorThread")
            .field("handle", &self.handle)
            .field("thread", &self.join.thread().name())
            .finish()
    }
}
