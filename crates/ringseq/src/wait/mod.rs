//! Wait strategies: how a consumer waits for a sequence to become available.
//!
//! A [`WaitStrategy`] is a factory of per-consumer [`SequenceWaiter`]s. The
//! sequencer holds the strategy and calls
//! [`signal_all_when_blocking`](WaitStrategy::signal_all_when_blocking) after a
//! publish, but only when [`is_blocking`](WaitStrategy::is_blocking) says a
//! waiter may be parked; spinning strategies skip the call entirely.
//!
//! | Strategy | Latency | CPU |
//! |---|---|---|
//! | [`BusySpinWaitStrategy`] | lowest | one core per consumer |
//! | [`YieldingWaitStrategy`] | low | high, yields after N spins |
//! | [`SleepingWaitStrategy`] | moderate | low |
//! | [`BlockingWaitStrategy`] | highest | minimal while idle |
//! | [`HybridWaitStrategy`] | per consumer tag | per consumer tag |
//!
//! Timeout variants return [`SequenceWaitResult::Timeout`] instead of waiting
//! forever, which the processors forward to `on_timeout`.

mod blocking;
mod busy_spin;
mod hybrid;
mod sleeping;
mod timeout;
mod yielding;

pub use blocking::{BlockingGate, BlockingSequenceWaiter, BlockingWaitStrategy};
pub use busy_spin::{BusySpinSequenceWaiter, BusySpinWaitStrategy};
pub use hybrid::{HybridSequenceWaiter, HybridWaitStrategy};
pub use sleeping::{SleepingSequenceWaiter, SleepingWaitStrategy};
pub use timeout::{
    TimeoutBlockingSequenceWaiter, TimeoutBlockingWaitStrategy, TimeoutYieldingSequenceWaiter,
    TimeoutYieldingWaitStrategy,
};
pub use yielding::{YieldingSequenceWaiter, YieldingWaitStrategy};

use crate::{Cancelled, DependentSequenceGroup};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Outcome of a sequence wait that was not cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceWaitResult {
    /// Highest available sequence; may exceed the requested one.
    Available(i64),
    /// The strategy's timeout elapsed first.
    Timeout,
}

impl SequenceWaitResult {
    /// Returns `true` for [`SequenceWaitResult::Timeout`].
    #[inline]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// The available sequence, or `None` on timeout.
    #[inline]
    pub fn available(&self) -> Option<i64> {
        match *self {
            Self::Available(sequence) => Some(sequence),
            Self::Timeout => None,
        }
    }
}

/// Cooperative cancellation flag checked on every wait-loop iteration.
///
/// Clones share the flag. A barrier owns one token and hands references to its
/// waiter; `reset` re-arms it when a halted processor restarts.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates an un-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    #[inline]
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Returns `true` once cancellation was requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// `Err(Cancelled)` if cancellation was requested.
    #[inline]
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }

    /// Clears a previous cancellation.
    #[inline]
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::Release);
    }
}

/// Identifies the consumer a waiter is created for.
///
/// Strategies that treat consumers differently (see [`HybridWaitStrategy`])
/// key off the tag; everything else ignores it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequenceWaiterOwner {
    tag: Option<&'static str>,
}

impl SequenceWaiterOwner {
    /// An owner without a tag.
    pub const fn unknown() -> Self {
        Self { tag: None }
    }

    /// An owner labelled with `tag`.
    pub const fn tagged(tag: &'static str) -> Self {
        Self { tag: Some(tag) }
    }

    /// The owner's tag, if any.
    #[inline]
    pub fn tag(&self) -> Option<&'static str> {
        self.tag
    }
}

/// Factory of per-consumer waiters, plus the publisher-side wake-up hook.
pub trait WaitStrategy: Send + Sync + 'static {
    /// Waiter type handed to each sequence barrier.
    type Waiter: SequenceWaiter;

    /// `true` if waiters may park and therefore need
    /// [`signal_all_when_blocking`](Self::signal_all_when_blocking) on publish.
    fn is_blocking(&self) -> bool;

    /// Creates a waiter for one consumer over `dependent_sequences`.
    fn new_sequence_waiter(
        &self,
        owner: SequenceWaiterOwner,
        dependent_sequences: DependentSequenceGroup,
    ) -> Self::Waiter;

    /// Wakes every parked waiter. Called by the sequencer after publishing.
    fn signal_all_when_blocking(&self);
}

/// Per-consumer wait loop produced by a [`WaitStrategy`].
pub trait SequenceWaiter: Send + Sync + 'static {
    /// The dependencies this waiter watches.
    fn dependent_sequences(&self) -> &DependentSequenceGroup;

    /// Waits until the dependencies reach `sequence`, the token is cancelled,
    /// or (timeout strategies only) the timeout elapses.
    ///
    /// Implementations re-check the dependency after every wake-up; a signal
    /// alone never proves availability.
    fn wait_for(
        &self,
        sequence: i64,
        token: &CancellationToken,
    ) -> Result<SequenceWaitResult, Cancelled>;

    /// Breaks a parked thread out of [`wait_for`](Self::wait_for) so that it
    /// observes its cancelled token. A no-op for spinning waiters.
    fn cancel(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_cancel_and_reset() {
        let token = CancellationToken::new();
        let shared = token.clone();

        assert!(token.check().is_ok());
        shared.cancel();
        assert!(token.is_cancelled());
        assert_eq!(token.check(), Err(Cancelled));

        token.reset();
        assert!(!shared.is_cancelled());
    }

    #[test]
    fn test_wait_result_accessors() {
        assert_eq!(SequenceWaitResult::Available(7).available(), Some(7));
        assert!(SequenceWaitResult::Timeout.is_timeout());
        assert_eq!(SequenceWaitResult::Timeout.available(), None);
    }

    #[test]
    fn test_owner_tag() {
        assert_eq!(SequenceWaiterOwner::unknown().tag(), None);
        assert_eq!(SequenceWaiterOwner::tagged("md").tag(), Some("md"));
    }
}
