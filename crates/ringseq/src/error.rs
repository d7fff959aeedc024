//! Error types for ring buffer construction and processor lifecycle.
//!
//! Capacity shortfalls and timeouts are deliberately absent: they are results
//! (`Option` from `try_next`, [`SequenceWaitResult::Timeout`]) rather than
//! errors.
//!
//! [`SequenceWaitResult::Timeout`]: crate::SequenceWaitResult::Timeout

use thiserror::Error;

/// Errors surfaced by the ring buffer, sequencers and event processors.
#[derive(Debug, Error)]
pub enum RingError {
    /// Buffer size was zero or not a power of two.
    #[error("buffer size must be a positive power of two, got {0}")]
    InvalidBufferSize(usize),

    /// A claim asked for zero slots or more slots than the ring holds.
    #[error("cannot claim {requested} slots from a ring of {buffer_size}")]
    InvalidClaimSize {
        /// Number of slots requested.
        requested: usize,
        /// Size of the ring buffer.
        buffer_size: usize,
    },

    /// A single-producer ring already has a live publisher.
    #[error("single-producer ring buffer already has a live publisher")]
    PublisherInUse,

    /// `run` was called on a processor that is already running.
    #[error("event processor is already running")]
    AlreadyRunning,

    /// The exception handler chose to stop the processor.
    #[error("event handler failed: {0}")]
    Handler(anyhow::Error),

    /// The processor thread could not be spawned.
    #[error("failed to spawn processor thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// The processor thread panicked.
    #[error("event processor thread panicked")]
    ProcessorPanicked,
}

impl RingError {
    /// Returns `true` for misconfiguration detected at construction time.
    #[inline]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::InvalidBufferSize(_))
    }

    /// Returns `true` for API misuse (programming errors).
    #[inline]
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            Self::InvalidClaimSize { .. } | Self::PublisherInUse | Self::AlreadyRunning
        )
    }
}

/// Signal that a wait was cancelled (barrier alerted or processor halted).
///
/// Zero-sized: raising it repeatedly costs nothing and never allocates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Error)]
#[error("sequence wait cancelled")]
pub struct Cancelled;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(RingError::InvalidBufferSize(3).is_configuration());
        assert!(RingError::AlreadyRunning.is_usage());
        assert!(RingError::PublisherInUse.is_usage());
        assert!(!RingError::ProcessorPanicked.is_usage());
    }

    #[test]
    fn test_error_messages() {
        let err = RingError::InvalidClaimSize {
            requested: 5,
            buffer_size: 4,
        };
        assert_eq!(err.to_string(), "cannot claim 5 slots from a ring of 4");
        assert_eq!(Cancelled.to_string(), "sequence wait cancelled");
        assert_eq!(std::mem::size_of::<Cancelled>(), 0);
    }
}
