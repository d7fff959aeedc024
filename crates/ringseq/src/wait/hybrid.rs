use super::{CancellationToken, SequenceWaitResult, SequenceWaiter, SequenceWaiterOwner, WaitStrategy};
use crate::{Cancelled, DependentSequenceGroup};
use std::sync::Arc;

/// Picks a spin policy per consumer from the owner's tag.
///
/// Consumers whose [`SequenceWaiterOwner`] carries one of the configured
/// tags busy-spin; every other consumer uses the [`Backoff`](crate::Backoff)
/// spin. One ring can then mix latency-critical and throughput stages.
///
/// ```
/// use ringseq_rs::{HybridWaitStrategy, SequenceWaiterOwner};
///
/// let strategy = HybridWaitStrategy::new().with_aggressive_tag("market-data");
/// assert!(strategy.is_aggressive(&SequenceWaiterOwner::tagged("market-data")));
/// assert!(!strategy.is_aggressive(&SequenceWaiterOwner::unknown()));
/// ```
#[derive(Debug, Clone, Default)]
pub struct HybridWaitStrategy {
    aggressive_tags: Arc<[&'static str]>,
}

impl HybridWaitStrategy {
    /// Creates a strategy where every consumer uses the standard spin.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `tag` to the set of owners that busy-spin.
    pub fn with_aggressive_tag(self, tag: &'static str) -> Self {
        let tags: Vec<&'static str> = self
            .aggressive_tags
            .iter()
            .copied()
            .chain(std::iter::once(tag))
            .collect();
        Self {
            aggressive_tags: tags.into(),
        }
    }

    /// `true` if waiters created for `owner` busy-spin.
    pub fn is_aggressive(&self, owner: &SequenceWaiterOwner) -> bool {
        owner
            .tag()
            .is_some_and(|tag| self.aggressive_tags.contains(&tag))
    }
}

impl WaitStrategy for HybridWaitStrategy {
    type Waiter = HybridSequenceWaiter;

    #[inline]
    fn is_blocking(&self) -> bool {
        false
    }

    fn new_sequence_waiter(
        &self,
        owner: SequenceWaiterOwner,
        dependent_sequences: DependentSequenceGroup,
    ) -> Self::Waiter {
        if self.is_aggressive(&owner) {
            HybridSequenceWaiter::Aggressive(dependent_sequences)
        } else {
            HybridSequenceWaiter::Standard(dependent_sequences)
        }
    }

    #[inline]
    fn signal_all_when_blocking(&self) {}
}

/// Waiter for [`HybridWaitStrategy`]; the variant is fixed at creation.
#[derive(Debug)]
pub enum HybridSequenceWaiter {
    /// Busy-spin with PAUSE hints.
    Aggressive(DependentSequenceGroup),
    /// Spin then yield via [`Backoff`](crate::Backoff).
    Standard(DependentSequenceGroup),
}

impl SequenceWaiter for HybridSequenceWaiter {
    fn dependent_sequences(&self) -> &DependentSequenceGroup {
        match self {
            Self::Aggressive(deps) | Self::Standard(deps) => deps,
        }
    }

    #[inline]
    fn wait_for(
        &self,
        sequence: i64,
        token: &CancellationToken,
    ) -> Result<SequenceWaitResult, Cancelled> {
        let available = match self {
            Self::Aggressive(deps) => deps.aggressive_spin_wait_for(sequence, token)?,
            Self::Standard(deps) => deps.spin_wait_for(sequence, token)?,
        };
        Ok(SequenceWaitResult::Available(available))
    }

    fn cancel(&self) {}
}
