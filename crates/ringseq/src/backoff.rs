use std::hint;
use std::thread;

/// Adaptive backoff used wherever a thread spins on another thread's sequence.
///
/// Progressively increases the wait: exponential PAUSE spins, then yielding
/// the OS thread. Producers waiting for the slowest consumer during
/// wrap-around, and the spin-based sequence waiters, both drive one of these.
///
/// The thresholds are tuning knobs, not part of the sequencing contract.
#[derive(Debug)]
pub struct Backoff {
    step: u32,
}

impl Backoff {
    /// 2^6 = 64 PAUSE hints before the first yield.
    pub const SPIN_LIMIT: u32 = 6;
    /// Step after which `is_completed` reports exhaustion.
    pub const YIELD_LIMIT: u32 = 10;

    /// A backoff at its lightest step.
    #[inline]
    pub fn new() -> Self {
        Self { step: 0 }
    }

    /// Light spin with PAUSE hints, doubling each call up to `SPIN_LIMIT`.
    #[inline]
    pub fn spin(&mut self) {
        let spins = 1 << self.step.min(Self::SPIN_LIMIT);
        for _ in 0..spins {
            hint::spin_loop();
        }
        if self.step <= Self::SPIN_LIMIT {
            self.step += 1;
        }
    }

    /// Heavier backoff: spin while below `SPIN_LIMIT`, then yield the thread.
    ///
    /// Unlike `spin`, this keeps making progress after `YIELD_LIMIT`: every
    /// further call yields, so it is safe to call in an unbounded wait loop.
    #[inline]
    pub fn snooze(&mut self) {
        if self.step <= Self::SPIN_LIMIT {
            self.spin();
        } else {
            thread::yield_now();
            if self.step <= Self::YIELD_LIMIT {
                self.step += 1;
            }
        }
    }

    /// `true` once spinning is over and every further `snooze` yields.
    #[inline]
    pub fn is_completed(&self) -> bool {
        self.step > Self::YIELD_LIMIT
    }

    /// Back to the lightest step, e.g. after the awaited sequence moved.
    #[inline]
    pub fn reset(&mut self) {
        self.step = 0;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snooze_completes_then_resets() {
        let mut backoff = Backoff::new();
        backoff.spin();
        assert_eq!(backoff.step, 1);

        while !backoff.is_completed() {
            backoff.snooze();
        }
        assert_eq!(backoff.step, Backoff::YIELD_LIMIT + 1);

        // Further snoozes stay completed and keep yielding.
        backoff.snooze();
        assert!(backoff.is_completed());

        backoff.reset();
        assert_eq!(backoff.step, 0);
    }

    #[test]
    fn test_spin_saturates_at_limit() {
        let mut backoff = Backoff::new();
        for _ in 0..20 {
            backoff.spin();
        }
        assert_eq!(backoff.step, Backoff::SPIN_LIMIT + 1);
        assert!(!backoff.is_completed());
    }
}
