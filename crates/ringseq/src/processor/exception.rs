use crate::EventBatch;
use tracing::error;

/// Decides what a processor does when its handler fails.
///
/// Returning `Ok(())` keeps the processor alive; returning an error stops it
/// and `run` surfaces the error as [`RingError::Handler`](crate::RingError).
/// A skipped event is released with the rest of its batch; an event that
/// stopped the processor stays unreleased and is delivered again on restart.
pub trait ExceptionHandler<T>: Send {
    /// A per-event handler call failed.
    fn handle_event_exception(
        &mut self,
        error: anyhow::Error,
        sequence: i64,
        event: &T,
    ) -> anyhow::Result<()>;

    /// A batch handler call failed.
    fn handle_batch_exception(
        &mut self,
        error: anyhow::Error,
        batch: EventBatch<'_, T>,
    ) -> anyhow::Result<()>;

    /// `on_timeout` failed.
    fn handle_on_timeout_exception(&mut self, error: anyhow::Error, sequence: i64)
        -> anyhow::Result<()>;

    /// `on_start` failed.
    fn handle_on_start_exception(&mut self, error: anyhow::Error) -> anyhow::Result<()>;

    /// `on_shutdown` failed.
    fn handle_on_shutdown_exception(&mut self, error: anyhow::Error) -> anyhow::Result<()>;
}

/// Logs and skips failed events; lifecycle failures stop the processor.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultExceptionHandler;

impl<T> ExceptionHandler<T> for DefaultExceptionHandler {
    fn handle_event_exception(
        &mut self,
        error: anyhow::Error,
        sequence: i64,
        _event: &T,
    ) -> anyhow::Result<()> {
        error!(sequence, error = %error, "event handler failed, skipping event");
        Ok(())
    }

    fn handle_batch_exception(
        &mut self,
        error: anyhow::Error,
        batch: EventBatch<'_, T>,
    ) -> anyhow::Result<()> {
        error!(
            sequence = batch.first_sequence(),
            len = batch.len(),
            error = %error,
            "batch handler failed, skipping batch"
        );
        Ok(())
    }

    fn handle_on_timeout_exception(
        &mut self,
        error: anyhow::Error,
        sequence: i64,
    ) -> anyhow::Result<()> {
        error!(sequence, error = %error, "timeout handler failed");
        Ok(())
    }

    fn handle_on_start_exception(&mut self, error: anyhow::Error) -> anyhow::Result<()> {
        error!(error = %error, "start hook failed");
        Err(error)
    }

    fn handle_on_shutdown_exception(&mut self, error: anyhow::Error) -> anyhow::Result<()> {
        error!(error = %error, "shutdown hook failed");
        Err(error)
    }
}

/// Stops the processor on any failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct FatalExceptionHandler;

impl<T> ExceptionHandler<T> for FatalExceptionHandler {
    fn handle_event_exception(
        &mut self,
        error: anyhow::Error,
        sequence: i64,
        _event: &T,
    ) -> anyhow::Result<()> {
        error!(sequence, error = %error, "event handler failed, stopping processor");
        Err(error.context(format!("event at sequence {sequence}")))
    }

    fn handle_batch_exception(
        &mut self,
        error: anyhow::Error,
        batch: EventBatch<'_, T>,
    ) -> anyhow::Result<()> {
        let sequence = batch.first_sequence();
        error!(sequence, error = %error, "batch handler failed, stopping processor");
        Err(error.context(format!("batch starting at sequence {sequence}")))
    }

    fn handle_on_timeout_exception(
        &mut self,
        error: anyhow::Error,
        sequence: i64,
    ) -> anyhow::Result<()> {
        error!(sequence, error = %error, "timeout handler failed, stopping processor");
        Err(error)
    }

    fn handle_on_start_exception(&mut self, error: anyhow::Error) -> anyhow::Result<()> {
        error!(error = %error, "start hook failed");
        Err(error)
    }

    fn handle_on_shutdown_exception(&mut self, error: anyhow::Error) -> anyhow::Result<()> {
        error!(error = %error, "shutdown hook failed");
        Err(error)
    }
}

/// Logs every failure and keeps going, lifecycle hooks included.
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreExceptionHandler;

impl<T> ExceptionHandler<T> for IgnoreExceptionHandler {
    fn handle_event_exception(
        &mut self,
        error: anyhow::Error,
        sequence: i64,
        _event: &T,
    ) -> anyhow::Result<()> {
        error!(sequence, error = %error, "ignoring event handler failure");
        Ok(())
    }

    fn handle_batch_exception(
        &mut self,
        error: anyhow::Error,
        batch: EventBatch<'_, T>,
    ) -> anyhow::Result<()> {
        error!(
            sequence = batch.first_sequence(),
            error = %error,
            "ignoring batch handler failure"
        );
        Ok(())
    }

    fn handle_on_timeout_exception(
        &mut self,
        error: anyhow::Error,
        sequence: i64,
    ) -> anyhow::Result<()> {
        error!(sequence, error = %error, "ignoring timeout handler failure");
        Ok(())
    }

    fn handle_on_start_exception(&mut self, error: anyhow::Error) -> anyhow::Result<()> {
        error!(error = %error, "ignoring start hook failure");
        Ok(())
    }

    fn handle_on_shutdown_exception(&mut self, error: anyhow::Error) -> anyhow::Result<()> {
        error!(error = %error, "ignoring shutdown hook failure");
        Ok(())
    }
}
