use super::{claim_delta, GatingSequences, Sequencer};
use crate::invariants::{debug_assert_no_overwrite, debug_assert_valid_range};
use crate::sequence::{Sequence, INITIAL_CURSOR_VALUE};
use crate::wait::WaitStrategy;
use crate::{Backoff, Config, RingError};
use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::trace;

// =============================================================================
// MEMORY ORDERING
// =============================================================================
//
// `next_value` and `cached_value` belong to the one producer thread; they are
// atomics only so the sequencer can be shared (`Sync`). Relaxed is enough.
//
// The cursor is the published position. `publish` stores it with Release, so
// a consumer that reads the cursor with Acquire sees the event writes.
//
// Before re-reading the gating sequences on the slow path the producer writes
// the cursor with SeqCst (StoreLoad): consumers parked on the cursor see every
// earlier publication while the producer waits for them.
//
// =============================================================================

/// Sequencer for exactly one producer thread.
///
/// Callers must not claim from two threads at once. The ring buffer enforces
/// this for its safe [`Publisher`](crate::Publisher) API; the `unsafe` raw
/// `next`/`publish` methods leave it to the caller.
///
/// Claims must be published in order before the next claim: when the producer
/// has to wait for consumers it moves the cursor to the last claimed sequence.
#[derive(Debug)]
pub struct SingleProducerSequencer<W> {
    cursor: Arc<Sequence>,
    /// Last claimed sequence (producer-local)
    next_value: CachePadded<AtomicI64>,
    /// Producer's cached view of the gating minimum
    cached_value: CachePadded<AtomicI64>,
    gating: GatingSequences,
    buffer_size: usize,
    buffer_size_i64: i64,
    wait_strategy: W,
}

impl<W: WaitStrategy> SingleProducerSequencer<W> {
    /// Creates a sequencer over a ring of `config.buffer_size` slots.
    pub fn new(config: Config, wait_strategy: W) -> Result<Self, RingError> {
        config.validate()?;
        Ok(Self {
            cursor: Arc::new(Sequence::default()),
            next_value: CachePadded::new(AtomicI64::new(INITIAL_CURSOR_VALUE)),
            cached_value: CachePadded::new(AtomicI64::new(INITIAL_CURSOR_VALUE)),
            gating: GatingSequences::default(),
            buffer_size: config.buffer_size,
            buffer_size_i64: config.buffer_size as i64,
            wait_strategy,
        })
    }

    fn claim_by(&self, delta: i64) -> i64 {
        let next_value = self.next_value.load(Ordering::Relaxed);
        let next_sequence = next_value + delta;
        let wrap_point = next_sequence - self.buffer_size_i64;
        let cached_gating = self.cached_value.load(Ordering::Relaxed);

        if wrap_point > cached_gating || cached_gating > next_value {
            self.cursor.set_value_volatile(next_value);

            let mut min_sequence = self.gating.minimum(next_value);
            if wrap_point > min_sequence {
                trace!(
                    sequence = next_sequence,
                    slowest = min_sequence,
                    "producer waiting for consumers"
                );
                let mut backoff = Backoff::new();
                while wrap_point > min_sequence {
                    backoff.snooze();
                    min_sequence = self.gating.minimum(next_value);
                }
            }

            self.cached_value.store(min_sequence, Ordering::Relaxed);
            debug_assert_no_overwrite!(next_sequence, self.buffer_size_i64, min_sequence);
        }

        self.next_value.store(next_sequence, Ordering::Relaxed);
        next_sequence
    }

    fn has_capacity(&self, delta: i64, store_cursor: bool) -> bool {
        let next_value = self.next_value.load(Ordering::Relaxed);
        let wrap_point = next_value + delta - self.buffer_size_i64;
        let cached_gating = self.cached_value.load(Ordering::Relaxed);

        if wrap_point > cached_gating || cached_gating > next_value {
            if store_cursor {
                self.cursor.set_value_volatile(next_value);
            }

            let min_sequence = self.gating.minimum(next_value);
            self.cached_value.store(min_sequence, Ordering::Relaxed);

            if wrap_point > min_sequence {
                return false;
            }
        }
        true
    }
}

impl<W: WaitStrategy> Sequencer for SingleProducerSequencer<W> {
    type Wait = W;
    const IS_MULTI_PRODUCER: bool = false;

    #[inline]
    fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    #[inline]
    fn cursor(&self) -> &Arc<Sequence> {
        &self.cursor
    }

    #[inline]
    fn wait_strategy(&self) -> &W {
        &self.wait_strategy
    }

    #[inline]
    unsafe fn next(&self) -> i64 {
        self.claim_by(1)
    }

    unsafe fn next_n(&self, n: usize) -> Result<i64, RingError> {
        let delta = claim_delta(n, self.buffer_size)?;
        Ok(self.claim_by(delta))
    }

    #[inline]
    unsafe fn try_next(&self) -> Option<i64> {
        self.try_next_n(1)
    }

    unsafe fn try_next_n(&self, n: usize) -> Option<i64> {
        let delta = claim_delta(n, self.buffer_size).ok()?;
        if !self.has_capacity(delta, true) {
            return None;
        }

        let next_sequence = self.next_value.load(Ordering::Relaxed) + delta;
        self.next_value.store(next_sequence, Ordering::Relaxed);
        Some(next_sequence)
    }

    fn has_available_capacity(&self, required: usize) -> bool {
        claim_delta(required, self.buffer_size).is_ok_and(|delta| self.has_capacity(delta, false))
    }

    fn remaining_capacity(&self) -> i64 {
        let next_value = self.next_value.load(Ordering::Relaxed);
        let consumed = self.gating.minimum(next_value);
        self.buffer_size_i64 - (next_value - consumed)
    }

    unsafe fn claim(&self, sequence: i64) {
        self.next_value.store(sequence, Ordering::Relaxed);
    }

    #[inline]
    unsafe fn publish(&self, sequence: i64) {
        self.cursor.set_value(sequence);
        if self.wait_strategy.is_blocking() {
            self.wait_strategy.signal_all_when_blocking();
        }
    }

    #[inline]
    unsafe fn publish_range(&self, lo: i64, hi: i64) {
        debug_assert_valid_range!(lo, hi);
        self.publish(hi);
    }

    fn is_available(&self, sequence: i64) -> bool {
        let current = self.cursor.value();
        sequence <= current && sequence > current - self.buffer_size_i64
    }

    #[inline]
    fn highest_published_sequence(&self, _lower: i64, available: i64) -> i64 {
        available
    }

    fn add_gating_sequences(&self, sequences: &[Arc<Sequence>]) {
        self.gating.add(&self.cursor, sequences);
    }

    fn remove_gating_sequence(&self, sequence: &Arc<Sequence>) -> bool {
        self.gating.remove(sequence)
    }

    fn minimum_sequence(&self) -> i64 {
        self.gating.minimum(self.cursor.value())
    }
}
