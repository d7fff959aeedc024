use crate::{EventBatch, Sequence};
use std::sync::Arc;

/// Per-event consumer callback driven by a
/// [`BatchEventProcessor`](super::BatchEventProcessor).
///
/// Only [`on_event`](Self::on_event) is required. The optional hooks have
/// no-op defaults, so a processor knows at compile time what it calls.
///
/// # Example
///
/// ```
/// use ringseq_rs::EventHandler;
///
/// struct Sum(u64);
///
/// impl EventHandler<u64> for Sum {
///     fn on_event(&mut self, event: &u64, _sequence: i64, _end_of_batch: bool) -> anyhow::Result<()> {
///         self.0 += event;
///         Ok(())
///     }
/// }
/// ```
pub trait EventHandler<T>: Send {
    /// Handles one event. `end_of_batch` is true only for the last event of
    /// the run delivered in one go.
    fn on_event(&mut self, event: &T, sequence: i64, end_of_batch: bool) -> anyhow::Result<()>;

    /// Called before each run with its size and the number of events
    /// available at that moment (at least `batch_size`).
    fn on_batch_start(&mut self, _batch_size: i64, _queue_depth: i64) {}

    /// Called on the processor thread before the first event.
    fn on_start(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called on the processor thread just before it stops.
    fn on_shutdown(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called when a timeout wait strategy gave up. `sequence` is the last
    /// processed sequence.
    fn on_timeout(&mut self, _sequence: i64) -> anyhow::Result<()> {
        Ok(())
    }

    /// Upper bound on the events delivered per run. `None` means everything
    /// available.
    fn max_batch_size(&self) -> Option<usize> {
        None
    }

    /// Receives the processor's own progress sequence at construction.
    ///
    /// A handler that finishes work asynchronously can set it itself to
    /// release slots before the batch ends.
    fn set_sequence_callback(&mut self, _sequence: Arc<Sequence>) {}
}

/// Batch consumer callback driven by an
/// [`EventBatchProcessor`](super::EventBatchProcessor).
///
/// Receives contiguous runs of events as an [`EventBatch`]. A run never wraps
/// the physical ring, so one wake-up can produce two calls.
pub trait BatchEventHandler<T>: Send {
    /// Handles a run of events starting at `sequence`.
    fn on_batch(&mut self, batch: EventBatch<'_, T>, sequence: i64) -> anyhow::Result<()>;

    /// See [`EventHandler::on_start`].
    fn on_start(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// See [`EventHandler::on_shutdown`].
    fn on_shutdown(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// See [`EventHandler::on_timeout`].
    fn on_timeout(&mut self, _sequence: i64) -> anyhow::Result<()> {
        Ok(())
    }

    /// See [`EventHandler::max_batch_size`].
    fn max_batch_size(&self) -> Option<usize> {
        None
    }

    /// See [`EventHandler::set_sequence_callback`].
    fn set_sequence_callback(&mut self, _sequence: Arc<Sequence>) {}
}

/// Converts an optional handler cap to an inclusive sequence span.
#[inline]
pub(crate) fn batch_limit(max_batch_size: Option<usize>) -> i64 {
    max_batch_size.map_or(i64::MAX, |max| max.clamp(1, i64::MAX as usize) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_limit() {
        assert_eq!(batch_limit(None), i64::MAX);
        assert_eq!(batch_limit(Some(0)), 1);
        assert_eq!(batch_limit(Some(16)), 16);
    }
}
