use crate::sequencer::Sequencer;
use crate::wait::{
    CancellationToken, SequenceWaitResult, SequenceWaiter, SequenceWaiterOwner, WaitStrategy,
};
use crate::{Cancelled, DependentSequenceGroup, Sequence};
use std::fmt;
use std::sync::Arc;

type WaiterOf<S> = <<S as Sequencer>::Wait as WaitStrategy>::Waiter;

/// Coordinates one consumer stage with the cursor and its upstream stages.
///
/// Holds the sequencer, a waiter from the sequencer's wait strategy, the
/// dependency group and a cancellation token. Processors wait on it for the
/// next sequence; halting a processor cancels it.
pub struct SequenceBarrier<S: Sequencer> {
    sequencer: Arc<S>,
    waiter: WaiterOf<S>,
    dependent_sequences: DependentSequenceGroup,
    token: CancellationToken,
    /// Dependencies only ever report published sequences, so the
    /// availability scan can be skipped.
    is_dependent_sequence_published: bool,
}

impl<S: Sequencer> SequenceBarrier<S> {
    /// Creates a barrier over `dependencies`, or over the cursor if empty.
    pub fn new(
        sequencer: Arc<S>,
        owner: SequenceWaiterOwner,
        dependencies: &[Arc<Sequence>],
    ) -> Self {
        let dependent_sequences =
            DependentSequenceGroup::new(Arc::clone(sequencer.cursor()), dependencies);
        let waiter = sequencer
            .wait_strategy()
            .new_sequence_waiter(owner, dependent_sequences.clone());
        let is_dependent_sequence_published =
            !S::IS_MULTI_PRODUCER || !dependent_sequences.depends_on_cursor();

        Self {
            sequencer,
            waiter,
            dependent_sequences,
            token: CancellationToken::new(),
            is_dependent_sequence_published,
        }
    }

    /// Waits until the dependencies reach `sequence`.
    ///
    /// The result may exceed `sequence`. For a multi-producer ring whose only
    /// dependency is the cursor it may include claimed but unpublished slots;
    /// use [`wait_for_published_sequence`](Self::wait_for_published_sequence)
    /// before reading events.
    #[inline]
    pub fn wait_for(&self, sequence: i64) -> Result<SequenceWaitResult, Cancelled> {
        self.token.check()?;

        let available = self.dependent_sequences.value();
        if available >= sequence {
            return Ok(SequenceWaitResult::Available(available));
        }

        self.waiter.wait_for(sequence, &self.token)
    }

    /// Like [`wait_for`](Self::wait_for), then clamps the result to the
    /// highest contiguously published sequence.
    ///
    /// The clamped value can be lower than `sequence` when a producer has
    /// claimed but not yet published it; callers retry in that case.
    #[inline]
    pub fn wait_for_published_sequence(
        &self,
        sequence: i64,
    ) -> Result<SequenceWaitResult, Cancelled> {
        match self.wait_for(sequence)? {
            SequenceWaitResult::Available(available) => Ok(SequenceWaitResult::Available(
                self.highest_published_sequence(sequence, available),
            )),
            SequenceWaitResult::Timeout => Ok(SequenceWaitResult::Timeout),
        }
    }

    /// Clamps an `available` value returned by a wait to the highest
    /// contiguously published sequence at or after `sequence`.
    ///
    /// A no-op unless the barrier waits directly on a multi-producer cursor.
    #[inline]
    pub fn highest_published_sequence(&self, sequence: i64, available: i64) -> i64 {
        if self.is_dependent_sequence_published {
            available
        } else {
            self.sequencer
                .highest_published_sequence(sequence, available)
        }
    }

    /// The waiter created for this barrier by the sequencer's wait strategy.
    pub fn waiter(&self) -> &<S::Wait as WaitStrategy>::Waiter {
        &self.waiter
    }

    /// The barrier's cancellation token.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Cancels in-progress and future waits until
    /// [`reset_processing`](Self::reset_processing).
    pub fn cancel_processing(&self) {
        self.token.cancel();
        self.waiter.cancel();
    }

    /// Re-arms the barrier after a cancellation.
    pub fn reset_processing(&self) {
        self.token.reset();
    }

    /// `true` while the barrier is cancelled.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Current cursor value of the ring buffer.
    #[inline]
    pub fn cursor_value(&self) -> i64 {
        self.dependent_sequences.cursor_value()
    }

    /// The dependency group this barrier waits on.
    pub fn dependent_sequences(&self) -> &DependentSequenceGroup {
        &self.dependent_sequences
    }

    /// The sequencer the barrier is bound to.
    pub fn sequencer(&self) -> &Arc<S> {
        &self.sequencer
    }
}

impl<S: Sequencer> fmt::Debug for SequenceBarrier<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceBarrier")
            .field("cursor", &self.cursor_value())
            .field("dependencies", &self.dependent_sequences.dependency_count())
            .field("cancelled", &self.is_cancelled())
            .field(
                "is_dependent_sequence_published",
                &self.is_dependent_sequence_published,
            )
            .finish_non_exhaustive()
    }
}

/// Type-erased cancellation hook so processor handles need not carry the
/// sequencer type.
pub(crate) trait ProcessingAlert: Send + Sync {
    fn cancel_processing(&self);
}

impl<S: Sequencer> ProcessingAlert for SequenceBarrier<S> {
    fn cancel_processing(&self) {
        SequenceBarrier::cancel_processing(self);
    }
}
