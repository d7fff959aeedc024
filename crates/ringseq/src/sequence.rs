use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Value of a sequence that has not produced or consumed anything yet.
pub const INITIAL_CURSOR_VALUE: i64 = -1;

/// A padded, atomically updated 64-bit progress counter.
///
/// Every producer cursor and every consumer position is a `Sequence`. The
/// owner writes it; any number of other components read it (sequencer gating,
/// downstream barriers).
///
/// The counter lives in a [`CachePadded`] cell: 128-byte alignment on x86-64
/// and aarch64, so the value never shares a cache line (or the adjacent line
/// pulled in by the spatial prefetcher) with another hot field.
#[derive(Debug)]
pub struct Sequence {
    value: CachePadded<AtomicI64>,
}

impl Sequence {
    /// Creates a sequence holding `initial_value`.
    pub const fn new(initial_value: i64) -> Self {
        Self {
            value: CachePadded::new(AtomicI64::new(initial_value)),
        }
    }

    /// Acquire read of the current value.
    #[inline]
    pub fn value(&self) -> i64 {
        self.value.load(Ordering::Acquire)
    }

    /// Ordered (release) write.
    ///
    /// Every write made before this call is visible to a thread that observes
    /// the new value through [`value`](Self::value). This is what makes event
    /// data visible before the sequence that publishes it.
    #[inline]
    pub fn set_value(&self, value: i64) {
        self.value.store(value, Ordering::Release);
    }

    /// Full-barrier write (StoreLoad), used before a producer re-reads the
    /// gating sequences.
    #[inline]
    pub fn set_value_volatile(&self, value: i64) {
        self.value.store(value, Ordering::SeqCst);
    }

    /// Atomically sets the value to `next` if it currently equals `expected`.
    #[inline]
    pub fn compare_and_set(&self, expected: i64, next: i64) -> bool {
        self.value
            .compare_exchange(expected, next, Ordering::SeqCst, Ordering::Acquire)
            .is_ok()
    }

    /// Atomically increments the value, returning the new value.
    #[inline]
    pub fn increment_and_get(&self) -> i64 {
        self.add_and_get(1)
    }

    /// Atomically adds `delta`, returning the new value.
    #[inline]
    pub fn add_and_get(&self, delta: i64) -> i64 {
        self.value.fetch_add(delta, Ordering::SeqCst) + delta
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new(INITIAL_CURSOR_VALUE)
    }
}

/// Minimum value across `sequences`, or `default` when the slice is empty.
///
/// A producer passes its own position as `default`, so a ring with no gating
/// sequences never blocks.
#[inline]
pub fn minimum_sequence(sequences: &[Arc<Sequence>], default: i64) -> i64 {
    sequences
        .iter()
        .map(|s| s.value())
        .fold(default, i64::min)
}
