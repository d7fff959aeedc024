use std::cell::UnsafeCell;
use std::fmt;
use std::marker::PhantomData;
use std::mem::MaybeUninit;

/// Borrowed view over a contiguous run of published ring buffer slots.
///
/// Never copies: it points straight into the ring's storage and lives only as
/// long as the processing of that run. A run never wraps the physical array,
/// so one batch may be shorter than what was available.
pub struct EventBatch<'a, T> {
    slots: &'a [UnsafeCell<MaybeUninit<T>>],
    first_sequence: i64,
    _marker: PhantomData<&'a T>,
}

impl<'a, T> EventBatch<'a, T> {
    /// # Safety
    ///
    /// Every slot in `slots` must be initialized and published, and no
    /// producer may write to them while the batch is alive.
    pub(crate) unsafe fn new(slots: &'a [UnsafeCell<MaybeUninit<T>>], first_sequence: i64) -> Self {
        Self {
            slots,
            first_sequence,
            _marker: PhantomData,
        }
    }

    /// Number of events in the batch.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if the batch holds no events.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Sequence of the first event.
    #[inline]
    pub fn first_sequence(&self) -> i64 {
        self.first_sequence
    }

    /// Sequence of the last event (`first_sequence - 1` when empty).
    #[inline]
    pub fn last_sequence(&self) -> i64 {
        self.first_sequence + self.slots.len() as i64 - 1
    }

    /// The event at `index` within the batch.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&'a T> {
        // SAFETY: slots are initialized and frozen for 'a (see `new`).
        self.slots
            .get(index)
            .map(|slot| unsafe { (*slot.get()).assume_init_ref() })
    }

    /// Iterates the events in sequence order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &'a T> + 'a {
        // SAFETY: as in `get`.
        self.slots
            .iter()
            .map(|slot| unsafe { (*slot.get()).assume_init_ref() })
    }

    /// Iterates `(sequence, event)` pairs.
    pub fn iter_with_sequence(&self) -> impl ExactSizeIterator<Item = (i64, &'a T)> + 'a {
        let first = self.first_sequence;
        self.iter()
            .enumerate()
            .map(move |(offset, event)| (first + offset as i64, event))
    }
}

impl<T: fmt::Debug> fmt::Debug for EventBatch<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBatch")
            .field("first_sequence", &self.first_sequence)
            .field("events", &self.iter().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_view() {
        let storage: Vec<UnsafeCell<MaybeUninit<u32>>> = (0..4)
            .map(|i| UnsafeCell::new(MaybeUninit::new(i * 10)))
            .collect();
        let batch = unsafe { EventBatch::new(&storage[1..4], 17) };

        assert_eq!(batch.len(), 3);
        assert!(!batch.is_empty());
        assert_eq!(batch.first_sequence(), 17);
        assert_eq!(batch.last_sequence(), 19);
        assert_eq!(batch.get(0), Some(&10));
        assert_eq!(batch.get(3), None);
        assert_eq!(batch.iter().copied().collect::<Vec<_>>(), vec![10, 20, 30]);
        assert_eq!(
            batch.iter_with_sequence().map(|(s, _)| s).collect::<Vec<_>>(),
            vec![17, 18, 19]
        );
    }

    #[test]
    fn test_empty_batch() {
        let storage: Vec<UnsafeCell<MaybeUninit<u32>>> = Vec::new();
        let batch = unsafe { EventBatch::new(&storage[..], 5) };
        assert!(batch.is_empty());
        assert_eq!(batch.last_sequence(), 4);
    }
}
