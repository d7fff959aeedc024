//! Debug assertion macros for sequencing invariants.
//!
//! Active only in debug builds (`#[cfg(debug_assertions)]`), so release builds
//! pay nothing.
//!
//! Used by the sequencers, the event processors and the poller.

// =============================================================================
// Gating: a claim never laps the slowest consumer
// =============================================================================

/// Assert that a claim does not overwrite a slot a consumer has not released.
///
/// **Invariant**: `claimed - buffer_size ≤ min(gating sequences)`
///
/// Used in: `next_n()` of both sequencers after the wrap wait completes
macro_rules! debug_assert_no_overwrite {
    ($claimed:expr, $buffer_size:expr, $min_gating:expr) => {
        debug_assert!(
            $claimed - $buffer_size <= $min_gating,
            "claim of sequence {} would overwrite unconsumed slot (buffer size {}, slowest consumer at {})",
            $claimed,
            $buffer_size,
            $min_gating
        )
    };
}

// =============================================================================
// Monotonic progress
// =============================================================================

/// Assert that a progress sequence only moves forward.
///
/// **Invariant**: `new_value ≥ old_value`
///
/// Used in: processors after each batch, `EventPoller::poll()`
macro_rules! debug_assert_monotonic {
    ($name:literal, $old:expr, $new:expr) => {
        debug_assert!(
            $new >= $old,
            "{} decreased from {} to {}",
            $name,
            $old,
            $new
        )
    };
}

// =============================================================================
// Ranges
// =============================================================================

/// Assert that `lo..=hi` is a non-empty inclusive range.
///
/// Used in: `publish_range()`, `RingBuffer::batch()`
macro_rules! debug_assert_valid_range {
    ($lo:expr, $hi:expr) => {
        debug_assert!(
            $lo <= $hi,
            "invalid sequence range: {} > {}",
            $lo,
            $hi
        )
    };
}

/// Assert that a consumer only reads published sequences.
///
/// **Invariant**: `sequence ≤ available`
///
/// Used in: processors and the poller before handing an event out
macro_rules! debug_assert_published_read {
    ($sequence:expr, $available:expr) => {
        debug_assert!(
            $sequence <= $available,
            "reading sequence {} beyond published sequence {}",
            $sequence,
            $available
        )
    };
}

// =============================================================================
// Re-exports for crate-internal use
// =============================================================================

pub(crate) use debug_assert_monotonic;
pub(crate) use debug_assert_no_overwrite;
pub(crate) use debug_assert_published_read;
pub(crate) use debug_assert_valid_range;
