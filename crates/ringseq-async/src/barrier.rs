use crate::wait::AsyncSequenceWaiter;
use async_trait::async_trait;
use ringseq_rs::{Cancelled, SequenceBarrier, SequenceWaitResult, Sequencer, WaitStrategy};

/// Async counterparts of [`SequenceBarrier::wait_for`] and
/// [`SequenceBarrier::wait_for_published_sequence`], available when the ring
/// uses an async wait strategy.
#[async_trait]
pub trait AsyncBarrierExt {
    /// Suspends until the barrier's dependencies reach `sequence`.
    async fn wait_for_async(&self, sequence: i64) -> Result<SequenceWaitResult, Cancelled>;

    /// Like [`wait_for_async`](Self::wait_for_async), clamped to the highest
    /// contiguously published sequence.
    async fn wait_for_published_async(
        &self,
        sequence: i64,
    ) -> Result<SequenceWaitResult, Cancelled>;
}

#[async_trait]
impl<S> AsyncBarrierExt for SequenceBarrier<S>
where
    S: Sequencer,
    <S::Wait as WaitStrategy>::Waiter: AsyncSequenceWaiter,
{
    async fn wait_for_async(&self, sequence: i64) -> Result<SequenceWaitResult, Cancelled> {
        self.token().check()?;

        let available = self.dependent_sequences().value();
        if available >= sequence {
            return Ok(SequenceWaitResult::Available(available));
        }

        self.waiter().wait_for_async(sequence, self.token()).await
    }

    async fn wait_for_published_async(
        &self,
        sequence: i64,
    ) -> Result<SequenceWaitResult, Cancelled> {
        match self.wait_for_async(sequence).await? {
            SequenceWaitResult::Available(available) => Ok(SequenceWaitResult::Available(
                self.highest_published_sequence(sequence, available),
            )),
            SequenceWaitResult::Timeout => Ok(SequenceWaitResult::Timeout),
        }
    }
}
