use crate::sequencer::Sequencer;
use crate::{RingBuffer, RingError};
use std::fmt;
use std::ops::{Deref, DerefMut, RangeInclusive};
use std::sync::Arc;

/// Safe producer handle for a [`RingBuffer`].
///
/// Obtained from [`RingBuffer::publisher`]. Claims borrow the publisher
/// mutably, so one handle has at most one open claim: a claim is always
/// published before the next one starts, which is what the single-producer
/// sequencer requires.
///
/// # Example
///
/// ```
/// use ringseq_rs::{Config, RingBuffer, YieldingWaitStrategy};
/// use std::sync::Arc;
///
/// let ring = Arc::new(
///     RingBuffer::create_multi_producer(|| 0i64, Config::new(16), YieldingWaitStrategy::new())
///         .unwrap(),
/// );
/// let mut publisher = ring.publisher().unwrap();
///
/// // Guard: published when dropped.
/// {
///     let mut claim = publisher.claim();
///     *claim = 7;
/// }
///
/// // Closure form over a batch of slots.
/// let hi = publisher.publish_events(3, |slot, seq| *slot = seq * 2).unwrap();
/// assert_eq!(hi, 3);
/// assert!(ring.is_published(3));
/// ```
pub struct Publisher<T, S: Sequencer> {
    ring: Arc<RingBuffer<T, S>>,
}

impl<T, S: Sequencer> Publisher<T, S> {
    pub(crate) fn new(ring: Arc<RingBuffer<T, S>>) -> Self {
        Self { ring }
    }

    /// The ring this publisher writes to.
    pub fn ring(&self) -> &Arc<RingBuffer<T, S>> {
        &self.ring
    }

    /// Claims the next slot, waiting for consumers if the ring is full.
    pub fn claim(&mut self) -> EventClaim<'_, T, S> {
        // SAFETY: claims go through `&mut self`, so this handle holds at most
        // one open claim, and the guard publishes it exactly once on drop. A
        // single-producer ring hands out one publisher at a time.
        let sequence = unsafe { self.ring.next() };
        EventClaim {
            ring: &self.ring,
            sequence,
        }
    }

    /// Claims the next slot, or `None` if the ring is full.
    pub fn try_claim(&mut self) -> Option<EventClaim<'_, T, S>> {
        // SAFETY: as in `claim`.
        let sequence = unsafe { self.ring.try_next() }?;
        Some(EventClaim {
            ring: &self.ring,
            sequence,
        })
    }

    /// Claims the next `n` slots, waiting for consumers if needed.
    pub fn claim_batch(&mut self, n: usize) -> Result<BatchClaim<'_, T, S>, RingError> {
        // SAFETY: as in `claim`.
        let hi = unsafe { self.ring.next_n(n) }?;
        Ok(BatchClaim::new(&self.ring, hi, n))
    }

    /// Claims the next `n` slots, or `None` if there is not enough room.
    pub fn try_claim_batch(&mut self, n: usize) -> Option<BatchClaim<'_, T, S>> {
        // SAFETY: as in `claim`.
        let hi = unsafe { self.ring.try_next_n(n) }?;
        Some(BatchClaim::new(&self.ring, hi, n))
    }

    /// Claims a slot, lets `write` fill it, then publishes it.
    pub fn publish_event(&mut self, write: impl FnOnce(&mut T, i64)) -> i64 {
        let mut claim = self.claim();
        let sequence = claim.sequence();
        write(&mut *claim, sequence);
        sequence
    }

    /// Like [`publish_event`](Self::publish_event) but returns `None` instead
    /// of waiting when the ring is full. `write` is not called in that case.
    pub fn try_publish_event(&mut self, write: impl FnOnce(&mut T, i64)) -> Option<i64> {
        let mut claim = self.try_claim()?;
        let sequence = claim.sequence();
        write(&mut *claim, sequence);
        Some(sequence)
    }

    /// Claims `n` slots, fills each with `write`, and publishes them together.
    /// Returns the highest published sequence.
    pub fn publish_events(
        &mut self,
        n: usize,
        mut write: impl FnMut(&mut T, i64),
    ) -> Result<i64, RingError> {
        let mut batch = self.claim_batch(n)?;
        for (sequence, slot) in batch.iter_mut() {
            write(slot, sequence);
        }
        Ok(batch.hi)
    }
}

impl<T, S: Sequencer> Drop for Publisher<T, S> {
    fn drop(&mut self) {
        self.ring.release_publisher();
    }
}

impl<T, S: Sequencer> fmt::Debug for Publisher<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publisher")
            .field("cursor", &self.ring.cursor())
            .finish()
    }
}

/// A claimed slot. Derefs to the event; publishes the sequence on drop.
pub struct EventClaim<'a, T, S: Sequencer> {
    ring: &'a RingBuffer<T, S>,
    sequence: i64,
}

impl<T, S: Sequencer> EventClaim<'_, T, S> {
    /// The claimed sequence.
    #[inline]
    pub fn sequence(&self) -> i64 {
        self.sequence
    }

    /// Publishes now instead of at end of scope.
    #[inline]
    pub fn publish(self) {}
}

impl<T, S: Sequencer> Deref for EventClaim<'_, T, S> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: the sequence is claimed by this guard and unpublished.
        unsafe { self.ring.get(self.sequence) }
    }
}

impl<T, S: Sequencer> DerefMut for EventClaim<'_, T, S> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: as above; `&mut self` keeps the reference unique.
        unsafe { self.ring.get_mut(self.sequence) }
    }
}

impl<T, S: Sequencer> Drop for EventClaim<'_, T, S> {
    fn drop(&mut self) {
        // SAFETY: this guard owns the claim; the borrow of `self` that backed
        // any slot reference has ended.
        unsafe { self.ring.publish(self.sequence) };
    }
}

/// A claimed run of slots `lo..=hi`, published together on drop.
pub struct BatchClaim<'a, T, S: Sequencer> {
    ring: &'a RingBuffer<T, S>,
    lo: i64,
    hi: i64,
}

impl<'a, T, S: Sequencer> BatchClaim<'a, T, S> {
    fn new(ring: &'a RingBuffer<T, S>, hi: i64, n: usize) -> Self {
        Self {
            ring,
            lo: hi - n as i64 + 1,
            hi,
        }
    }

    /// Claimed sequences.
    #[inline]
    pub fn sequences(&self) -> RangeInclusive<i64> {
        self.lo..=self.hi
    }

    /// Number of claimed slots.
    #[inline]
    pub fn len(&self) -> usize {
        (self.hi - self.lo + 1) as usize
    }

    /// Always false: a claim covers at least one slot.
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Mutable access to the slot at `index` within the claim.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        if index >= self.len() {
            return None;
        }
        // SAFETY: the sequence is inside this claim; `&mut self` keeps it unique.
        Some(unsafe { self.ring.get_mut(self.lo + index as i64) })
    }

    /// Iterates `(sequence, slot)` over the claim in order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (i64, &mut T)> + '_ {
        let ring = self.ring;
        // SAFETY: each sequence is claimed by this guard and yielded once, so
        // the mutable references never alias.
        self.sequences()
            .map(move |sequence| (sequence, unsafe { ring.get_mut(sequence) }))
    }

    /// Publishes now instead of at end of scope.
    #[inline]
    pub fn publish(self) {}
}

impl<T, S: Sequencer> Drop for BatchClaim<'_, T, S> {
    fn drop(&mut self) {
        // SAFETY: as for `EventClaim`, for the whole run.
        unsafe { self.ring.publish_range(self.lo, self.hi) };
    }
}
