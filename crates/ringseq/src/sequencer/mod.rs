//! Sequencers: claim slots for producers and track what has been published.
//!
//! Both implementations share the same gating discipline: a producer may claim
//! sequence `s` only once every gating sequence has reached `s - buffer_size`.
//! They differ in how publication is recorded:
//!
//! - [`SingleProducerSequencer`]: the cursor *is* the published position.
//! - [`MultiProducerSequencer`]: the cursor is the highest *claimed* position;
//!   an availability buffer records which lap last published each slot, and
//!   consumers find the contiguous prefix with
//!   [`highest_published_sequence`](Sequencer::highest_published_sequence).

mod multi;
mod single;

pub use multi::MultiProducerSequencer;
pub use single::SingleProducerSequencer;

use crate::sequence::{minimum_sequence, Sequence};
use crate::wait::WaitStrategy;
use crate::RingError;
use arc_swap::ArcSwap;
use std::sync::Arc;
use tracing::debug;

/// Coordinates claiming and publishing of ring buffer slots.
///
/// Implementations are shared between producers and consumers behind an
/// `Arc`; every method takes `&self`.
pub trait Sequencer: Send + Sync + 'static {
    /// Strategy consumers use to wait for publication.
    type Wait: WaitStrategy;

    /// `true` when publication order can differ from claim order, so barriers
    /// must scan the availability buffer before trusting the cursor.
    const IS_MULTI_PRODUCER: bool;

    /// Number of slots in the ring.
    fn buffer_size(&self) -> usize;

    /// The cursor sequence (published position for single producer, claimed
    /// position for multi producer).
    fn cursor(&self) -> &Arc<Sequence>;

    /// The configured wait strategy.
    fn wait_strategy(&self) -> &Self::Wait;

    /// Claims the next slot, waiting for consumers if the ring is full.
    ///
    /// # Safety
    ///
    /// The claim and publish methods below hand out and release exclusive
    /// write access to ring slots without tracking who holds it. The caller
    /// must keep the protocol the safe [`Publisher`](crate::Publisher) keeps:
    ///
    /// - a single-producer sequencer is claimed from by one thread at a time,
    ///   and never while a `Publisher` of its ring is alive;
    /// - every claimed sequence is published exactly once, by its claimer,
    ///   after the last write to its slot;
    /// - on a single-producer sequencer a claim is published before the next
    ///   claim starts.
    unsafe fn next(&self) -> i64;

    /// Claims the next `n` slots and returns the highest claimed sequence.
    ///
    /// Waits for consumers if the ring is full. Fails if `n` is zero or larger
    /// than the ring.
    ///
    /// # Safety
    ///
    /// See [`next`](Self::next).
    unsafe fn next_n(&self, n: usize) -> Result<i64, RingError>;

    /// Claims the next slot, or `None` if the ring is full.
    ///
    /// # Safety
    ///
    /// See [`next`](Self::next).
    unsafe fn try_next(&self) -> Option<i64>;

    /// Claims the next `n` slots, or `None` if there is not enough capacity
    /// (or `n` is not a valid claim size).
    ///
    /// # Safety
    ///
    /// See [`next`](Self::next).
    unsafe fn try_next_n(&self, n: usize) -> Option<i64>;

    /// `true` if `required` slots could be claimed without waiting.
    fn has_available_capacity(&self, required: usize) -> bool;

    /// Slots that can currently be claimed without waiting.
    fn remaining_capacity(&self) -> i64;

    /// Repositions the claim cursor at `sequence`. Not for normal operation.
    ///
    /// # Safety
    ///
    /// No producer may hold a claim and no consumer may be reading the ring.
    unsafe fn claim(&self, sequence: i64);

    /// Makes `sequence` visible to consumers.
    ///
    /// # Safety
    ///
    /// `sequence` was claimed by the caller and not yet published, and no
    /// reference into its slot outlives this call.
    unsafe fn publish(&self, sequence: i64);

    /// Makes `lo..=hi` visible to consumers.
    ///
    /// # Safety
    ///
    /// As for [`publish`](Self::publish), for every sequence in the range.
    unsafe fn publish_range(&self, lo: i64, hi: i64);

    /// `true` if `sequence` has been published and not yet overwritten.
    fn is_available(&self, sequence: i64) -> bool;

    /// Highest sequence in `lower..=available` such that every sequence from
    /// `lower` up to it is published; `lower - 1` if `lower` itself is not.
    fn highest_published_sequence(&self, lower: i64, available: i64) -> i64;

    /// Registers consumer sequences the producer must not overtake.
    ///
    /// Each added sequence is first moved to the current cursor so a late
    /// consumer does not hold back the producer with a stale position.
    fn add_gating_sequences(&self, sequences: &[Arc<Sequence>]);

    /// Unregisters a gating sequence. Returns `false` if it was not present.
    fn remove_gating_sequence(&self, sequence: &Arc<Sequence>) -> bool;

    /// Minimum of the gating sequences and the cursor.
    fn minimum_sequence(&self) -> i64;
}

/// The set of consumer sequences that gate a sequencer.
///
/// Copy-on-write: producers read a snapshot without locking, wiring and
/// teardown swap in a new list.
#[derive(Debug, Default)]
pub(crate) struct GatingSequences {
    sequences: ArcSwap<Vec<Arc<Sequence>>>,
}

impl GatingSequences {
    pub(crate) fn add(&self, cursor: &Sequence, added: &[Arc<Sequence>]) {
        let cursor_value = cursor.value();
        for sequence in added {
            sequence.set_value(cursor_value);
        }
        self.sequences.rcu(|current| {
            let mut sequences = current.to_vec();
            sequences.extend(added.iter().cloned());
            sequences
        });
        debug!(
            added = added.len(),
            total = self.sequences.load().len(),
            cursor = cursor_value,
            "gating sequences added"
        );
    }

    pub(crate) fn remove(&self, sequence: &Arc<Sequence>) -> bool {
        let mut removed = false;
        self.sequences.rcu(|current| {
            let mut sequences = current.to_vec();
            sequences.retain(|s| !Arc::ptr_eq(s, sequence));
            removed = sequences.len() != current.len();
            sequences
        });
        debug!(removed, total = self.sequences.load().len(), "gating sequence removed");
        removed
    }

    #[inline]
    pub(crate) fn minimum(&self, default: i64) -> i64 {
        minimum_sequence(&self.sequences.load(), default)
    }
}

/// Converts a claim size to a sequence delta, rejecting zero and oversize.
#[inline]
pub(crate) fn claim_delta(n: usize, buffer_size: usize) -> Result<i64, RingError> {
    match i64::try_from(n) {
        Ok(delta) if n >= 1 && n <= buffer_size => Ok(delta),
        _ => Err(RingError::InvalidClaimSize {
            requested: n,
            buffer_size,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_delta_bounds() {
        assert_eq!(claim_delta(1, 8).unwrap(), 1);
        assert_eq!(claim_delta(8, 8).unwrap(), 8);
        assert!(matches!(
            claim_delta(0, 8),
            Err(RingError::InvalidClaimSize { requested: 0, .. })
        ));
        assert!(matches!(
            claim_delta(9, 8),
            Err(RingError::InvalidClaimSize {
                requested: 9,
                buffer_size: 8
            })
        ));
    }

    #[test]
    fn test_gating_add_moves_to_cursor_and_remove() {
        let gating = GatingSequences::default();
        let cursor = Sequence::new(41);
        let a = Arc::new(Sequence::default());
        let b = Arc::new(Sequence::new(100));

        gating.add(&cursor, &[Arc::clone(&a), Arc::clone(&b)]);
        assert_eq!(a.value(), 41);
        assert_eq!(b.value(), 41);
        assert_eq!(gating.minimum(i64::MAX), 41);

        a.set_value(7);
        assert_eq!(gating.minimum(i64::MAX), 7);

        assert!(gating.remove(&a));
        assert!(!gating.remove(&a));
        assert_eq!(gating.minimum(i64::MAX), 41);
        assert!(gating.remove(&b));
        assert_eq!(gating.minimum(99), 99);
    }

    #[test]
    fn test_concurrent_add_keeps_every_sequence() {
        let gating = Arc::new(GatingSequences::default());
        let cursor = Arc::new(Sequence::new(5));

        let writers: Vec<_> = (0..4)
            .map(|_| {
                let gating = Arc::clone(&gating);
                let cursor = Arc::clone(&cursor);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        gating.add(&cursor, &[Arc::new(Sequence::default())]);
                        assert_eq!(gating.minimum(i64::MAX), 5);
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        assert_eq!(gating.sequences.load().len(), 200);
        assert_eq!(gating.minimum(i64::MAX), 5);
    }
}
