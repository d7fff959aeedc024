//! Loom-based concurrency tests for the sequencing protocol.
//!
//! Run with: `cargo test --features loom --test loom_tests --release`
//!
//! Loom exhaustively explores thread interleavings. The models below replay
//! the publication protocol of the sequencers with loom atomics on a tiny ring
//! so the state space stays small:
//!
//! - single producer: write slot, Release-store the cursor
//! - multi producer: fetch-add claim, write slot, Release-store the lap into
//!   the availability buffer; consumers scan for the first gap
//! - gating: a producer never reuses a slot before the consumer released it

#![cfg(feature = "loom")]

use loom::cell::UnsafeCell;
use loom::sync::atomic::{AtomicI32, AtomicI64, Ordering};
use loom::sync::Arc;
use loom::thread;

const SIZE: usize = 2;
const MASK: i64 = SIZE as i64 - 1;
const SHIFT: u32 = 1;

/// Minimal ring modelled on the single- and multi-producer sequencers.
struct LoomRing {
    /// Published cursor (SP) or claim counter (MP)
    cursor: AtomicI64,
    /// Consumer progress, gates producers
    consumer: AtomicI64,
    /// Lap of the last publish into each slot (MP only)
    available: [AtomicI32; SIZE],
    slots: [UnsafeCell<u64>; SIZE],
}

// SAFETY: slot access follows the claim/publish protocol exercised below.
unsafe impl Send for LoomRing {}
unsafe impl Sync for LoomRing {}

impl LoomRing {
    fn new() -> Self {
        Self {
            cursor: AtomicI64::new(-1),
            consumer: AtomicI64::new(-1),
            available: [AtomicI32::new(-1), AtomicI32::new(-1)],
            slots: [UnsafeCell::new(0), UnsafeCell::new(0)],
        }
    }

    fn index(sequence: i64) -> usize {
        (sequence & MASK) as usize
    }

    fn lap(sequence: i64) -> i32 {
        (sequence >> SHIFT) as i32
    }

    fn write(&self, sequence: i64, value: u64) {
        self.slots[Self::index(sequence)].with_mut(|slot| unsafe { *slot = value });
    }

    fn read(&self, sequence: i64) -> u64 {
        self.slots[Self::index(sequence)].with(|slot| unsafe { *slot })
    }

    /// Spins until the slot for `sequence` has been released by the consumer.
    fn wait_for_wrap(&self, sequence: i64) {
        while sequence - SIZE as i64 > self.consumer.load(Ordering::Acquire) {
            thread::yield_now();
        }
    }

    // --- single producer ---------------------------------------------------

    fn sp_publish(&self, sequence: i64, value: u64) {
        self.wait_for_wrap(sequence);
        self.write(sequence, value);
        self.cursor.store(sequence, Ordering::Release);
    }

    // --- multi producer ----------------------------------------------------

    fn mp_claim(&self) -> i64 {
        let sequence = self.cursor.fetch_add(1, Ordering::AcqRel) + 1;
        self.wait_for_wrap(sequence);
        sequence
    }

    fn mp_publish(&self, sequence: i64) {
        self.available[Self::index(sequence)].store(Self::lap(sequence), Ordering::Release);
    }

    fn mp_is_available(&self, sequence: i64) -> bool {
        self.available[Self::index(sequence)].load(Ordering::Acquire) == Self::lap(sequence)
    }

    fn mp_highest_published(&self, lower: i64, available: i64) -> i64 {
        (lower..=available)
            .find(|&sequence| !self.mp_is_available(sequence))
            .map_or(available, |gap| gap - 1)
    }
}

/// The consumer reads exactly what the single producer wrote before publishing.
#[test]
fn loom_single_producer_publication_visible() {
    loom::model(|| {
        let ring = Arc::new(LoomRing::new());

        let producer = {
            let ring = Arc::clone(&ring);
            thread::spawn(move || {
                ring.sp_publish(0, 10);
                ring.sp_publish(1, 11);
            })
        };

        let mut next = 0;
        while next < 2 {
            let cursor = ring.cursor.load(Ordering::Acquire);
            while next <= cursor {
                assert_eq!(ring.read(next), 10 + next as u64);
                next += 1;
            }
            if next < 2 {
                thread::yield_now();
            }
        }
        ring.consumer.store(1, Ordering::Release);

        producer.join().unwrap();
    });
}

/// Two producers claim concurrently and publish in either order; the consumer
/// only reads a contiguous published prefix and sees both values.
#[test]
fn loom_multi_producer_out_of_order_publish() {
    loom::model(|| {
        let ring = Arc::new(LoomRing::new());

        let producers: Vec<_> = (0..2)
            .map(|_| {
                let ring = Arc::clone(&ring);
                thread::spawn(move || {
                    let sequence = ring.mp_claim();
                    ring.write(sequence, 100 + sequence as u64);
                    ring.mp_publish(sequence);
                })
            })
            .collect();

        let mut next = 0;
        while next < 2 {
            let claimed = ring.cursor.load(Ordering::Acquire);
            if claimed >= next {
                let available = ring.mp_highest_published(next, claimed);
                while next <= available {
                    assert_eq!(ring.read(next), 100 + next as u64);
                    next += 1;
                }
            }
            if next < 2 {
                thread::yield_now();
            }
        }

        for producer in producers {
            producer.join().unwrap();
        }
        assert_eq!(ring.mp_highest_published(0, 1), 1);
    });
}

/// A third event wraps onto slot 0 only after the consumer released it.
#[test]
fn loom_gating_prevents_overwrite() {
    loom::model(|| {
        let ring = Arc::new(LoomRing::new());

        let producer = {
            let ring = Arc::clone(&ring);
            thread::spawn(move || {
                for sequence in 0..3 {
                    ring.sp_publish(sequence, sequence as u64);
                }
            })
        };

        let mut next = 0;
        while next < 3 {
            let cursor = ring.cursor.load(Ordering::Acquire);
            while next <= cursor {
                // Would differ if the producer had lapped this slot.
                assert_eq!(ring.read(next), next as u64);
                ring.consumer.store(next, Ordering::Release);
                next += 1;
            }
            if next < 3 {
                thread::yield_now();
            }
        }

        producer.join().unwrap();
    });
}
