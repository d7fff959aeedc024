use crate::barrier::SequenceBarrier;
use crate::batch::EventBatch;
use crate::claim::Publisher;
use crate::invariants::debug_assert_valid_range;
use crate::poller::EventPoller;
use crate::sequencer::{MultiProducerSequencer, Sequencer, SingleProducerSequencer};
use crate::wait::{SequenceWaiterOwner, WaitStrategy};
use crate::{Config, RingError, Sequence};
use std::cell::UnsafeCell;
use std::fmt;
use std::mem::{self, MaybeUninit};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Bytes of padding kept before and after the slots.
const PADDING_BYTES: usize = 128;

// =============================================================================
// SLOT ACCESS PROTOCOL
// =============================================================================
//
// Slots are pre-filled by the factory and reused forever; a publish never
// allocates. A slot is written only by the producer that claimed its sequence
// (claims are unique) and read only after the sequencer made that sequence
// visible, which in turn happens only after every gating consumer released the
// previous lap of the slot. The sequences are the only synchronization: there
// is no per-slot lock.
//
// Storage is one boxed slice: `padding` uninitialized slots, `buffer_size`
// live slots, `padding` uninitialized slots. The padding keeps the first and
// last live slots off the cache lines of neighbouring allocations.
//
// =============================================================================

/// Pre-allocated ring of events coordinated by a [`Sequencer`].
///
/// # Example
///
/// ```
/// use ringseq_rs::{BusySpinWaitStrategy, Config, RingBuffer};
/// use std::sync::Arc;
///
/// let ring = Arc::new(
///     RingBuffer::create_single_producer(|| 0u64, Config::new(8), BusySpinWaitStrategy).unwrap(),
/// );
///
/// let mut poller = ring.new_poller(&[]);
/// ring.add_gating_sequences(&[Arc::clone(poller.sequence())]);
///
/// let mut publisher = ring.publisher().unwrap();
/// let sequence = publisher.publish_event(|slot, seq| *slot = seq as u64 + 10);
///
/// let mut seen = Vec::new();
/// poller
///     .poll(|event: &u64, _seq, _end| {
///         seen.push(*event);
///         Ok::<_, std::convert::Infallible>(true)
///     })
///     .unwrap();
/// assert_eq!(sequence, 0);
/// assert_eq!(seen, vec![10]);
/// ```
pub struct RingBuffer<T, S: Sequencer> {
    sequencer: Arc<S>,
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
    index_mask: i64,
    padding: usize,
    buffer_size: usize,
    /// Single-producer rings hand out at most one live `Publisher`
    publisher_taken: AtomicBool,
}

// SAFETY: slots are accessed under the sequencing protocol above: each slot
// has at most one writer (the claiming producer) and readers only after
// publication. Readers on several threads share `&T`, writers move `T` data
// across threads.
unsafe impl<T: Send, S: Sequencer> Send for RingBuffer<T, S> {}
unsafe impl<T: Send + Sync, S: Sequencer> Sync for RingBuffer<T, S> {}

impl<T, W: WaitStrategy> RingBuffer<T, SingleProducerSequencer<W>> {
    /// Creates a ring for exactly one producer thread.
    pub fn create_single_producer(
        factory: impl FnMut() -> T,
        config: Config,
        wait_strategy: W,
    ) -> Result<Self, RingError> {
        Ok(Self::new(
            factory,
            SingleProducerSequencer::new(config, wait_strategy)?,
        ))
    }
}

impl<T, W: WaitStrategy> RingBuffer<T, MultiProducerSequencer<W>> {
    /// Creates a ring that any number of producer threads may publish to.
    pub fn create_multi_producer(
        factory: impl FnMut() -> T,
        config: Config,
        wait_strategy: W,
    ) -> Result<Self, RingError> {
        Ok(Self::new(
            factory,
            MultiProducerSequencer::new(config, wait_strategy)?,
        ))
    }
}

impl<T, S: Sequencer> RingBuffer<T, S> {
    /// Creates a ring over `sequencer`, filling every slot from `factory`.
    pub fn new(mut factory: impl FnMut() -> T, sequencer: S) -> Self {
        let buffer_size = sequencer.buffer_size();
        let padding = padding_slots::<T>();
        let live = padding..padding + buffer_size;

        let slots = (0..buffer_size + 2 * padding)
            .map(|i| {
                UnsafeCell::new(if live.contains(&i) {
                    MaybeUninit::new(factory())
                } else {
                    MaybeUninit::uninit()
                })
            })
            .collect();

        Self {
            sequencer: Arc::new(sequencer),
            slots,
            index_mask: (buffer_size - 1) as i64,
            padding,
            buffer_size,
            publisher_taken: AtomicBool::new(false),
        }
    }

    // ---------------------------------------------------------------------
    // SLOT ACCESS
    // ---------------------------------------------------------------------

    #[inline]
    fn slot_index(&self, sequence: i64) -> usize {
        self.padding + (sequence & self.index_mask) as usize
    }

    #[inline]
    fn slot_ptr(&self, sequence: i64) -> *mut T {
        let index = self.slot_index(sequence);
        // SAFETY: index is in padding..padding + buffer_size, always in bounds.
        // MaybeUninit<T> has the layout of T.
        unsafe { self.slots.get_unchecked(index).get().cast::<T>() }
    }

    /// The event stored for `sequence`.
    ///
    /// # Safety
    ///
    /// `sequence` must be published and not yet released by this consumer,
    /// so that no producer writes to the slot while the reference lives.
    #[inline]
    pub unsafe fn get(&self, sequence: i64) -> &T {
        &*self.slot_ptr(sequence)
    }

    /// Mutable access to the event stored for `sequence`.
    ///
    /// # Safety
    ///
    /// The caller must have claimed `sequence` and not yet published it; no
    /// other reference to the slot may exist.
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn get_mut(&self, sequence: i64) -> &mut T {
        &mut *self.slot_ptr(sequence)
    }

    /// Contiguous view over `lo..=hi`, cut short where the run would wrap
    /// around the end of the physical array.
    ///
    /// # Safety
    ///
    /// Same as [`get`](Self::get) for every sequence in the range.
    pub unsafe fn batch(&self, lo: i64, hi: i64) -> EventBatch<'_, T> {
        debug_assert_valid_range!(lo, hi);
        let start = self.slot_index(lo);
        let until_wrap = self.padding + self.buffer_size - start;
        let len = ((hi - lo + 1) as usize).min(until_wrap);
        EventBatch::new(&self.slots[start..start + len], lo)
    }

    // ---------------------------------------------------------------------
    // SEQUENCER DELEGATION
    // ---------------------------------------------------------------------

    /// Number of slots.
    #[inline]
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Current cursor value.
    #[inline]
    pub fn cursor(&self) -> i64 {
        self.sequencer.cursor().value()
    }

    /// The sequencer coordinating this ring.
    #[inline]
    pub fn sequencer(&self) -> &Arc<S> {
        &self.sequencer
    }

    /// Raw claim of the next slot. See [`Sequencer::next`].
    ///
    /// [`Publisher`] is the safe way to produce; the raw methods exist for
    /// callers that manage the claim protocol themselves.
    ///
    /// ```compile_fail
    /// use ringseq_rs::{BusySpinWaitStrategy, Config, RingBuffer};
    ///
    /// let ring =
    ///     RingBuffer::create_multi_producer(|| 0u64, Config::new(8), BusySpinWaitStrategy).unwrap();
    /// let sequence = ring.next();
    /// ring.publish(sequence);
    /// ```
    ///
    /// # Safety
    ///
    /// Same contract as [`Sequencer::next`].
    #[inline]
    pub unsafe fn next(&self) -> i64 {
        self.sequencer.next()
    }

    /// See [`Sequencer::next_n`].
    ///
    /// # Safety
    ///
    /// Same contract as [`Sequencer::next`].
    #[inline]
    pub unsafe fn next_n(&self, n: usize) -> Result<i64, RingError> {
        self.sequencer.next_n(n)
    }

    /// See [`Sequencer::try_next`].
    ///
    /// # Safety
    ///
    /// Same contract as [`Sequencer::next`].
    #[inline]
    pub unsafe fn try_next(&self) -> Option<i64> {
        self.sequencer.try_next()
    }

    /// See [`Sequencer::try_next_n`].
    ///
    /// # Safety
    ///
    /// Same contract as [`Sequencer::next`].
    #[inline]
    pub unsafe fn try_next_n(&self, n: usize) -> Option<i64> {
        self.sequencer.try_next_n(n)
    }

    /// See [`Sequencer::publish`].
    ///
    /// # Safety
    ///
    /// Same contract as [`Sequencer::publish`].
    #[inline]
    pub unsafe fn publish(&self, sequence: i64) {
        self.sequencer.publish(sequence);
    }

    /// See [`Sequencer::publish_range`].
    ///
    /// # Safety
    ///
    /// Same contract as [`Sequencer::publish_range`].
    #[inline]
    pub unsafe fn publish_range(&self, lo: i64, hi: i64) {
        self.sequencer.publish_range(lo, hi);
    }

    /// `true` if `required` slots can be claimed without waiting.
    pub fn has_available_capacity(&self, required: usize) -> bool {
        self.sequencer.has_available_capacity(required)
    }

    /// Slots that can currently be claimed without waiting.
    pub fn remaining_capacity(&self) -> i64 {
        self.sequencer.remaining_capacity()
    }

    /// `true` if the event for `sequence` is published and still in the ring.
    pub fn is_published(&self, sequence: i64) -> bool {
        self.sequencer.is_available(sequence)
    }

    /// Minimum of the gating sequences and the cursor.
    pub fn minimum_gating_sequence(&self) -> i64 {
        self.sequencer.minimum_sequence()
    }

    /// Moves the cursor to `sequence` as if it had been published.
    ///
    /// For initialization and replay.
    ///
    /// # Safety
    ///
    /// No producer may hold a claim and no consumer may be reading the ring.
    pub unsafe fn reset_to(&self, sequence: i64) {
        self.sequencer.claim(sequence);
        self.sequencer.publish(sequence);
    }

    // ---------------------------------------------------------------------
    // WIRING
    // ---------------------------------------------------------------------

    /// See [`Sequencer::add_gating_sequences`].
    pub fn add_gating_sequences(&self, sequences: &[Arc<Sequence>]) {
        self.sequencer.add_gating_sequences(sequences);
    }

    /// See [`Sequencer::remove_gating_sequence`].
    pub fn remove_gating_sequence(&self, sequence: &Arc<Sequence>) -> bool {
        self.sequencer.remove_gating_sequence(sequence)
    }

    /// Barrier over `dependencies`; an empty slice makes a first-stage
    /// barrier that follows the cursor.
    pub fn new_barrier(&self, dependencies: &[Arc<Sequence>]) -> SequenceBarrier<S> {
        self.new_barrier_with_owner(SequenceWaiterOwner::unknown(), dependencies)
    }

    /// Like [`new_barrier`](Self::new_barrier), tagging the waiter with
    /// `owner` for strategies that treat consumers differently.
    pub fn new_barrier_with_owner(
        &self,
        owner: SequenceWaiterOwner,
        dependencies: &[Arc<Sequence>],
    ) -> SequenceBarrier<S> {
        SequenceBarrier::new(Arc::clone(&self.sequencer), owner, dependencies)
    }

    /// Non-blocking poller over `dependencies` (or the cursor if empty).
    ///
    /// The poller's own sequence is not registered for gating; pass
    /// [`EventPoller::sequence`] to
    /// [`add_gating_sequences`](Self::add_gating_sequences) to do so.
    pub fn new_poller(self: &Arc<Self>, dependencies: &[Arc<Sequence>]) -> EventPoller<T, S> {
        EventPoller::new(Arc::clone(self), dependencies)
    }

    /// Returns a publishing handle.
    ///
    /// A single-producer ring allows one live publisher at a time and returns
    /// [`RingError::PublisherInUse`] otherwise; a multi-producer ring hands out
    /// any number.
    pub fn publisher(self: &Arc<Self>) -> Result<Publisher<T, S>, RingError> {
        if !S::IS_MULTI_PRODUCER && self.publisher_taken.swap(true, Ordering::AcqRel) {
            return Err(RingError::PublisherInUse);
        }
        Ok(Publisher::new(Arc::clone(self)))
    }

    pub(crate) fn release_publisher(&self) {
        if !S::IS_MULTI_PRODUCER {
            self.publisher_taken.store(false, Ordering::Release);
        }
    }
}

impl<T, S: Sequencer> Drop for RingBuffer<T, S> {
    fn drop(&mut self) {
        if !mem::needs_drop::<T>() {
            return;
        }
        let live = self.padding..self.padding + self.buffer_size;
        for slot in &mut self.slots[live] {
            // SAFETY: live slots were initialized in `new` and are never
            // moved out.
            unsafe { slot.get_mut().assume_init_drop() };
        }
    }
}

impl<T, S: Sequencer> fmt::Debug for RingBuffer<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("buffer_size", &self.buffer_size)
            .field("cursor", &self.cursor())
            .field("multi_producer", &S::IS_MULTI_PRODUCER)
            .finish_non_exhaustive()
    }
}

/// Slots of padding needed to cover [`PADDING_BYTES`].
const fn padding_slots<T>() -> usize {
    let size = mem::size_of::<T>();
    if size == 0 {
        0
    } else {
        PADDING_BYTES.div_ceil(size)
    }
}
