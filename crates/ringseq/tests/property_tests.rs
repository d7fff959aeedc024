//! Property-based tests for the sequencing invariants.
//!
//! Coverage:
//! - Batch views never cross the physical end of the ring
//! - Multi-producer availability scanning stops at the first gap
//! - Single-producer capacity accounting matches a reference model
//! - Poller delivers `end_of_batch` once, on the last event only

use proptest::prelude::*;
use ringseq_rs::{BusySpinWaitStrategy, Config, RingBuffer, Sequence, Sequencer};
use std::sync::Arc;

// =============================================================================
// Batch views
// "a run handed out at once never wraps the physical array"
// =============================================================================

proptest! {
    #[test]
    fn prop_batch_cut_at_physical_wrap(
        ring_bits in 1u8..7,
        lo in 0i64..10_000,
        len_seed in 0usize..1_000,
    ) {
        let ring = RingBuffer::create_single_producer(
            || 0u32,
            Config::with_ring_bits(ring_bits),
            BusySpinWaitStrategy,
        )
        .unwrap();
        let size = ring.buffer_size();
        let len = len_seed % size + 1;
        let hi = lo + len as i64 - 1;

        // SAFETY: no producer is active; every slot holds its factory value.
        let batch = unsafe { ring.batch(lo, hi) };
        let until_wrap = size - (lo as usize & (size - 1));

        prop_assert_eq!(batch.first_sequence(), lo);
        prop_assert_eq!(batch.len(), len.min(until_wrap));
        prop_assert!(batch.last_sequence() <= hi);
        let sequences: Vec<i64> = batch.iter_with_sequence().map(|(s, _)| s).collect();
        prop_assert_eq!(sequences, (lo..=batch.last_sequence()).collect::<Vec<_>>());
    }
}

// =============================================================================
// Availability scanning
// "highest published = one before the first unpublished claimed sequence"
// =============================================================================

proptest! {
    #[test]
    fn prop_highest_published_stops_at_first_gap(published in prop::collection::vec(any::<bool>(), 1..16)) {
        let ring = RingBuffer::create_multi_producer(|| 0u8, Config::new(16), BusySpinWaitStrategy)
            .unwrap();
        let hi = unsafe { ring.next_n(published.len()) }.unwrap();
        prop_assert_eq!(hi, published.len() as i64 - 1);

        for (sequence, &is_published) in published.iter().enumerate() {
            if is_published {
                unsafe { ring.publish(sequence as i64) };
            }
        }

        let first_gap = published.iter().position(|p| !p).unwrap_or(published.len()) as i64;
        prop_assert_eq!(ring.sequencer().highest_published_sequence(0, hi), first_gap - 1);
        for (sequence, &is_published) in published.iter().enumerate() {
            prop_assert_eq!(ring.is_published(sequence as i64), is_published);
        }
    }

    #[test]
    fn prop_availability_tracks_laps(laps in 1i64..5, offset in 0i64..8) {
        let ring = RingBuffer::create_multi_producer(|| 0u8, Config::new(8), BusySpinWaitStrategy)
            .unwrap();
        let consumer = Arc::new(Sequence::default());
        ring.add_gating_sequences(&[Arc::clone(&consumer)]);

        let target = laps * 8 + offset;
        for _ in 0..=target {
            let sequence = unsafe { ring.next() };
            unsafe { ring.publish(sequence) };
            consumer.set_value(sequence);
        }

        prop_assert!(ring.is_published(target));
        // The same slot one lap earlier no longer reads as published.
        prop_assert!(!ring.is_published(target - 8));
        prop_assert!(!ring.is_published(target + 8));
    }
}

// =============================================================================
// Capacity accounting
// "claimed - released never exceeds the buffer size"
// =============================================================================

#[derive(Debug, Clone)]
enum Op {
    Claim(usize),
    Release(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1usize..=8).prop_map(Op::Claim),
        (1usize..=8).prop_map(Op::Release),
    ]
}

proptest! {
    #[test]
    fn prop_single_producer_capacity_matches_model(ops in prop::collection::vec(op_strategy(), 1..64)) {
        const SIZE: i64 = 8;
        let ring = RingBuffer::create_single_producer(|| 0u8, Config::new(SIZE as usize), BusySpinWaitStrategy)
            .unwrap();
        let consumer = Arc::new(Sequence::default());
        ring.add_gating_sequences(&[Arc::clone(&consumer)]);

        let mut claimed = -1i64;
        let mut released = -1i64;

        for op in ops {
            match op {
                Op::Claim(n) => {
                    let fits = claimed + n as i64 - released <= SIZE;
                    prop_assert_eq!(ring.has_available_capacity(n), fits);
                    match unsafe { ring.try_next_n(n) } {
                        Some(hi) => {
                            prop_assert!(fits);
                            prop_assert_eq!(hi, claimed + n as i64);
                            unsafe { ring.publish_range(claimed + 1, hi) };
                            claimed = hi;
                        }
                        None => prop_assert!(!fits),
                    }
                }
                Op::Release(n) => {
                    released = (released + n as i64).min(claimed);
                    consumer.set_value(released);
                }
            }
            prop_assert!(claimed - released <= SIZE);
            prop_assert_eq!(ring.remaining_capacity(), SIZE - (claimed - released));
            prop_assert_eq!(ring.cursor(), claimed);
        }
    }
}

// =============================================================================
// Poller batch semantics
// =============================================================================

proptest! {
    #[test]
    fn prop_poller_end_of_batch_only_on_last(count in 1usize..=32) {
        let ring = Arc::new(
            RingBuffer::create_single_producer(|| 0usize, Config::new(32), BusySpinWaitStrategy)
                .unwrap(),
        );
        let mut poller = ring.new_poller(&[]);
        ring.add_gating_sequences(&[Arc::clone(poller.sequence())]);

        let mut publisher = ring.publisher().unwrap();
        publisher.publish_events(count, |slot, seq| *slot = seq as usize).unwrap();

        let mut flags = Vec::new();
        poller
            .poll(|event: &usize, seq, end| {
                assert_eq!(*event, seq as usize);
                flags.push(end);
                Ok::<_, std::convert::Infallible>(true)
            })
            .unwrap();

        prop_assert_eq!(flags.len(), count);
        prop_assert_eq!(flags.iter().filter(|&&end| end).count(), 1);
        prop_assert!(*flags.last().unwrap());
        prop_assert_eq!(poller.sequence().value(), count as i64 - 1);
    }
}
