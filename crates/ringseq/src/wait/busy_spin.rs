use super::{CancellationToken, SequenceWaitResult, SequenceWaiter, SequenceWaiterOwner, WaitStrategy};
use crate::{Cancelled, DependentSequenceGroup};

/// Tight loop re-reading the dependencies. Lowest latency; burns a core.
#[derive(Debug, Clone, Copy, Default)]
pub struct BusySpinWaitStrategy;

impl BusySpinWaitStrategy {
    /// Creates the strategy.
    pub fn new() -> Self {
        Self
    }
}

impl WaitStrategy for BusySpinWaitStrategy {
    type Waiter = BusySpinSequenceWaiter;

    #[inline]
    fn is_blocking(&self) -> bool {
        false
    }

    fn new_sequence_waiter(
        &self,
        _owner: SequenceWaiterOwner,
        dependent_sequences: DependentSequenceGroup,
    ) -> Self::Waiter {
        BusySpinSequenceWaiter {
            dependent_sequences,
        }
    }

    #[inline]
    fn signal_all_when_blocking(&self) {}
}

/// Waiter for [`BusySpinWaitStrategy`].
#[derive(Debug)]
pub struct BusySpinSequenceWaiter {
    dependent_sequences: DependentSequenceGroup,
}

impl SequenceWaiter for BusySpinSequenceWaiter {
    fn dependent_sequences(&self) -> &DependentSequenceGroup {
        &self.dependent_sequences
    }

    #[inline]
    fn wait_for(
        &self,
        sequence: i64,
        token: &CancellationToken,
    ) -> Result<SequenceWaitResult, Cancelled> {
        self.dependent_sequences
            .aggressive_spin_wait_for(sequence, token)
            .map(SequenceWaitResult::Available)
    }

    fn cancel(&self) {}
}
