use super::{claim_delta, GatingSequences, Sequencer};
use crate::invariants::{debug_assert_no_overwrite, debug_assert_valid_range};
use crate::sequence::Sequence;
use crate::wait::WaitStrategy;
use crate::{Backoff, Config, RingError};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use tracing::trace;

// =============================================================================
// AVAILABILITY BUFFER
// =============================================================================
//
// Producers claim with a fetch-add on the cursor, so the cursor runs ahead of
// publication. Each slot of the availability buffer holds the lap
// (`sequence >> index_shift`) of the last publish into that slot; it starts at
// -1, which no lap ever matches.
//
// A slot is published for `sequence` iff `available[sequence & mask]` equals
// `sequence >> index_shift`. The Release store in `set_available` pairs with
// the Acquire load in `is_available`, so a consumer that sees the lap also
// sees the event written before it.
//
// =============================================================================

/// Sequencer safe for any number of concurrent producer threads.
#[derive(Debug)]
pub struct MultiProducerSequencer<W> {
    /// Highest claimed sequence
    cursor: Arc<Sequence>,
    /// Shared cache of the gating minimum
    gating_cache: Sequence,
    available: Box<[AtomicI32]>,
    gating: GatingSequences,
    buffer_size: usize,
    buffer_size_i64: i64,
    index_mask: i64,
    index_shift: u32,
    wait_strategy: W,
}

impl<W: WaitStrategy> MultiProducerSequencer<W> {
    /// Creates a sequencer over a ring of `config.buffer_size` slots.
    pub fn new(config: Config, wait_strategy: W) -> Result<Self, RingError> {
        config.validate()?;
        let available = (0..config.buffer_size).map(|_| AtomicI32::new(-1)).collect();

        Ok(Self {
            cursor: Arc::new(Sequence::default()),
            gating_cache: Sequence::default(),
            available,
            gating: GatingSequences::default(),
            buffer_size: config.buffer_size,
            buffer_size_i64: config.buffer_size as i64,
            index_mask: config.mask() as i64,
            index_shift: config.index_shift(),
            wait_strategy,
        })
    }

    #[inline]
    fn slot(&self, sequence: i64) -> &AtomicI32 {
        &self.available[(sequence & self.index_mask) as usize]
    }

    #[inline]
    fn lap(&self, sequence: i64) -> i32 {
        (sequence >> self.index_shift) as i32
    }

    #[inline]
    fn set_available(&self, sequence: i64) {
        self.slot(sequence).store(self.lap(sequence), Ordering::Release);
    }

    #[inline]
    fn signal(&self) {
        if self.wait_strategy.is_blocking() {
            self.wait_strategy.signal_all_when_blocking();
        }
    }

    fn claim_by(&self, delta: i64) -> i64 {
        let next_sequence = self.cursor.add_and_get(delta);
        let current = next_sequence - delta;
        let wrap_point = next_sequence - self.buffer_size_i64;
        let cached_gating = self.gating_cache.value();

        if wrap_point > cached_gating || cached_gating > current {
            let mut gating_sequence = self.gating.minimum(current);
            if wrap_point > gating_sequence {
                trace!(
                    sequence = next_sequence,
                    slowest = gating_sequence,
                    "producer waiting for consumers"
                );
                let mut backoff = Backoff::new();
                while wrap_point > gating_sequence {
                    backoff.snooze();
                    gating_sequence = self.gating.minimum(current);
                }
            }

            self.gating_cache.set_value(gating_sequence);
            debug_assert_no_overwrite!(next_sequence, self.buffer_size_i64, gating_sequence);
        }

        next_sequence
    }

    fn has_capacity(&self, delta: i64, cursor_value: i64) -> bool {
        let wrap_point = cursor_value + delta - self.buffer_size_i64;
        let cached_gating = self.gating_cache.value();

        if wrap_point > cached_gating || cached_gating > cursor_value {
            let min_sequence = self.gating.minimum(cursor_value);
            self.gating_cache.set_value(min_sequence);

            if wrap_point > min_sequence {
                return false;
            }
        }
        true
    }
}

impl<W: WaitStrategy> Sequencer for MultiProducerSequencer<W> {
    type Wait = W;
    const IS_MULTI_PRODUCER: bool = true;

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
        loop {
            let current = self.cursor.value();
            let next = current + delta;
            if !self.has_capacity(delta, current) {
                return None;
            }
            if self.cursor.compare_and_set(current, next) {
                return Some(next);
            }
        }
    }

    fn has_available_capacity(&self, required: usize) -> bool {
        claim_delta(required, self.buffer_size)
            .is_ok_and(|delta| self.has_capacity(delta, self.cursor.value()))
    }

    fn remaining_capacity(&self) -> i64 {
        let produced = self.cursor.value();
        let consumed = self.gating.minimum(produced);
        self.buffer_size_i64 - (produced - consumed)
    }

    unsafe fn claim(&self, sequence: i64) {
        self.cursor.set_value(sequence);
    }

    #[inline]
    unsafe fn publish(&self, sequence: i64) {
        self.set_available(sequence);
        self.signal();
    }

    unsafe fn publish_range(&self, lo: i64, hi: i64) {
        debug_assert_valid_range!(lo, hi);
        for sequence in lo..=hi {
            self.set_available(sequence);
        }
        self.signal();
    }

    #[inline]
    fn is_available(&self, sequence: i64) -> bool {
        self.slot(sequence).load(Ordering::Acquire) == self.lap(sequence)
    }

    fn highest_published_sequence(&self, lower: i64, available: i64) -> i64 {
        (lower..=available)
            .find(|&sequence| !self.is_available(sequence))
            .map_or(available, |gap| gap - 1)
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
