use super::{CancellationToken, SequenceWaitResult, SequenceWaiter, SequenceWaiterOwner, WaitStrategy};
use crate::{Cancelled, DependentSequenceGroup};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Instant;

/// Mutex + condition variable pair that blocking waiters park on.
///
/// The predicate is always evaluated with the lock held, and signallers take
/// the same lock before notifying, so a publish that lands between the check
/// and the park cannot be lost.
#[derive(Debug, Default)]
pub struct BlockingGate {
    lock: Mutex<()>,
    condvar: Condvar,
}

impl BlockingGate {
    /// Creates an unsignalled gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parks while `blocked()` holds, re-checking after every wake-up.
    pub fn wait_while(
        &self,
        mut blocked: impl FnMut() -> bool,
        token: &CancellationToken,
    ) -> Result<(), Cancelled> {
        let mut guard = self.lock.lock();
        while blocked() {
            token.check()?;
            self.condvar.wait(&mut guard);
        }
        Ok(())
    }

    /// Like [`wait_while`](Self::wait_while) but gives up at `deadline`.
    ///
    /// Returns `Ok(false)` if the deadline passed while still blocked.
    pub fn wait_while_until(
        &self,
        mut blocked: impl FnMut() -> bool,
        token: &CancellationToken,
        deadline: Instant,
    ) -> Result<bool, Cancelled> {
        let mut guard = self.lock.lock();
        while blocked() {
            token.check()?;
            if self.condvar.wait_until(&mut guard, deadline).timed_out() {
                return Ok(!blocked());
            }
        }
        Ok(true)
    }

    /// Wakes every parked thread.
    pub fn signal_all(&self) {
        let _guard = self.lock.lock();
        self.condvar.notify_all();
    }
}

/// Parks consumers on a condition variable until the producer signals.
///
/// Once the cursor has reached the target, the waiter confirms the (possibly
/// slower) upstream processors with a short busy spin instead of parking again:
/// those only advance after the cursor, usually within a few hundred
/// nanoseconds.
#[derive(Debug, Clone, Default)]
pub struct BlockingWaitStrategy {
    gate: Arc<BlockingGate>,
}

impl BlockingWaitStrategy {
    /// Creates the strategy.
    pub fn new() -> Self {
        Self::default()
    }
}

impl WaitStrategy for BlockingWaitStrategy {
    type Waiter = BlockingSequenceWaiter;

    #[inline]
    fn is_blocking(&self) -> bool {
        true
    }

    fn new_sequence_waiter(
        &self,
        _owner: SequenceWaiterOwner,
        dependent_sequences: DependentSequenceGroup,
    ) -> Self::Waiter {
        BlockingSequenceWaiter {
            gate: Arc::clone(&self.gate),
            dependent_sequences,
        }
    }

    fn signal_all_when_blocking(&self) {
        self.gate.signal_all();
    }
}

/// Waiter for [`BlockingWaitStrategy`].
#[derive(Debug)]
pub struct BlockingSequenceWaiter {
    gate: Arc<BlockingGate>,
    dependent_sequences: DependentSequenceGroup,
}

impl SequenceWaiter for BlockingSequenceWaiter {
    fn dependent_sequences(&self) -> &DependentSequenceGroup {
        &self.dependent_sequences
    }

    fn wait_for(
        &self,
        sequence: i64,
        token: &CancellationToken,
    ) -> Result<SequenceWaitResult, Cancelled> {
        let deps = &self.dependent_sequences;
        if deps.cursor_value() < sequence {
            self.gate
                .wait_while(|| deps.cursor_value() < sequence, token)?;
        }

        deps.aggressive_spin_wait_for(sequence, token)
            .map(SequenceWaitResult::Available)
    }

    fn cancel(&self) {
        self.gate.signal_all();
    }
}
