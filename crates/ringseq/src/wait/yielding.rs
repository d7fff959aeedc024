use super::{CancellationToken, SequenceWaitResult, SequenceWaiter, SequenceWaiterOwner, WaitStrategy};
use crate::{Cancelled, DependentSequenceGroup};
use std::hint;
use std::thread;

/// Spins for `spin_tries` iterations, then yields the OS thread on every
/// further iteration.
#[derive(Debug, Clone, Copy)]
pub struct YieldingWaitStrategy {
    spin_tries: u32,
}

impl YieldingWaitStrategy {
    /// Default number of busy iterations before yielding.
    pub const DEFAULT_SPIN_TRIES: u32 = 100;

    /// Creates the strategy with [`DEFAULT_SPIN_TRIES`](Self::DEFAULT_SPIN_TRIES).
    pub fn new() -> Self {
        Self::with_spin_tries(Self::DEFAULT_SPIN_TRIES)
    }

    /// Creates the strategy with a custom spin budget.
    pub fn with_spin_tries(spin_tries: u32) -> Self {
        Self { spin_tries }
    }
}

impl Default for YieldingWaitStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitStrategy for YieldingWaitStrategy {
    type Waiter = YieldingSequenceWaiter;

    #[inline]
    fn is_blocking(&self) -> bool {
        false
    }

    fn new_sequence_waiter(
        &self,
        _owner: SequenceWaiterOwner,
        dependent_sequences: DependentSequenceGroup,
    ) -> Self::Waiter {
        YieldingSequenceWaiter {
            dependent_sequences,
            spin_tries: self.spin_tries,
        }
    }

    #[inline]
    fn signal_all_when_blocking(&self) {}
}

/// Waiter for [`YieldingWaitStrategy`].
#[derive(Debug)]
pub struct YieldingSequenceWaiter {
    dependent_sequences: DependentSequenceGroup,
    spin_tries: u32,
}

impl SequenceWaiter for YieldingSequenceWaiter {
    fn dependent_sequences(&self) -> &DependentSequenceGroup {
        &self.dependent_sequences
    }

    fn wait_for(
        &self,
        sequence: i64,
        token: &CancellationToken,
    ) -> Result<SequenceWaitResult, Cancelled> {
        let mut counter = self.spin_tries;
        loop {
            let available = self.dependent_sequences.value();
            if available >= sequence {
                return Ok(SequenceWaitResult::Available(available));
            }
            token.check()?;
            if counter == 0 {
                thread::yield_now();
            } else {
                counter -= 1;
                hint::spin_loop();
            }
        }
    }

    fn cancel(&self) {}
}
