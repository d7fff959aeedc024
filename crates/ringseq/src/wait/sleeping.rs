use super::{CancellationToken, SequenceWaitResult, SequenceWaiter, SequenceWaiterOwner, WaitStrategy};
use crate::{Cancelled, DependentSequenceGroup};
use std::hint;
use std::thread;
use std::time::Duration;

/// Three-phase wait: spin, then yield, then sleep.
///
/// With `retries = R` the first `R / 2` iterations spin, the next `R / 2`
/// yield, and every iteration after that sleeps for `sleep`. A good fit for
/// background consumers where latency matters less than CPU.
#[derive(Debug, Clone, Copy)]
pub struct SleepingWaitStrategy {
    retries: u32,
    sleep: Duration,
}

impl SleepingWaitStrategy {
    /// Default retry budget.
    pub const DEFAULT_RETRIES: u32 = 200;
    /// Default sleep once retries are exhausted.
    ///
    /// `thread::sleep(Duration::ZERO)` returns immediately on most platforms,
    /// so the scheduler hint needs a non-zero duration.
    pub const DEFAULT_SLEEP: Duration = Duration::from_nanos(100);

    /// Creates the strategy with default retries and sleep.
    pub fn new() -> Self {
        Self::with_retries(Self::DEFAULT_RETRIES, Self::DEFAULT_SLEEP)
    }

    /// Creates the strategy with custom retries and sleep duration.
    pub fn with_retries(retries: u32, sleep: Duration) -> Self {
        Self { retries, sleep }
    }
}

impl Default for SleepingWaitStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitStrategy for SleepingWaitStrategy {
    type Waiter = SleepingSequenceWaiter;

    #[inline]
    fn is_blocking(&self) -> bool {
        false
    }

    fn new_sequence_waiter(
        &self,
        _owner: SequenceWaiterOwner,
        dependent_sequences: DependentSequenceGroup,
    ) -> Self::Waiter {
        SleepingSequenceWaiter {
            dependent_sequences,
            retries: self.retries,
            sleep: self.sleep,
        }
    }

    #[inline]
    fn signal_all_when_blocking(&self) {}
}

/// Waiter for [`SleepingWaitStrategy`].
#[derive(Debug)]
pub struct SleepingSequenceWaiter {
    dependent_sequences: DependentSequenceGroup,
    retries: u32,
    sleep: Duration,
}

impl SleepingSequenceWaiter {
    #[inline]
    fn apply_wait_method(&self, counter: u32) -> u32 {
        if counter > self.retries / 2 {
            hint::spin_loop();
            counter - 1
        } else if counter > 0 {
            thread::yield_now();
            counter - 1
        } else {
            thread::sleep(self.sleep);
            counter
        }
    }
}

impl SequenceWaiter for SleepingSequenceWaiter {
    fn dependent_sequences(&self) -> &DependentSequenceGroup {
        &self.dependent_sequences
    }

    fn wait_for(
        &self,
        sequence: i64,
        token: &CancellationToken,
    ) -> Result<SequenceWaitResult, Cancelled> {
        let mut counter = self.retries;
        loop {
            let available = self.dependent_sequences.value();
            if available >= sequence {
                return Ok(SequenceWaitResult::Available(available));
            }
            token.check()?;
            counter = self.apply_wait_method(counter);
        }
    }

    fn cancel(&self) {}
}
