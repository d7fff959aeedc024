use crate::sequence::{minimum_sequence, Sequence};
use crate::wait::CancellationToken;
use crate::{Backoff, Cancelled};
use std::hint;
use std::sync::Arc;

/// The set of upstream sequences a consumer must not overtake.
///
/// A first-stage consumer depends only on the ring buffer cursor; later stages
/// depend on the sequences of the processors in front of them. The set is fixed
/// at construction; only the sequence values move.
///
/// Cloning is cheap (shared slices) so the barrier and its waiter can each hold
/// a copy.
#[derive(Debug, Clone)]
pub struct DependentSequenceGroup {
    cursor: Arc<Sequence>,
    dependencies: Arc<[Arc<Sequence>]>,
}

impl DependentSequenceGroup {
    /// Builds a group over `dependencies`; an empty slice means "the cursor".
    pub fn new(cursor: Arc<Sequence>, dependencies: &[Arc<Sequence>]) -> Self {
        Self {
            cursor,
            dependencies: dependencies.iter().cloned().collect(),
        }
    }

    /// `true` when the only dependency is the ring buffer cursor.
    #[inline]
    pub fn depends_on_cursor(&self) -> bool {
        self.dependencies.is_empty()
    }

    /// Number of explicit upstream dependencies (0 for a cursor-only group).
    #[inline]
    pub fn dependency_count(&self) -> usize {
        self.dependencies.len()
    }

    /// Current value of the ring buffer cursor.
    #[inline]
    pub fn cursor_value(&self) -> i64 {
        self.cursor.value()
    }

    /// The cursor sequence itself.
    #[inline]
    pub fn cursor(&self) -> &Arc<Sequence> {
        &self.cursor
    }

    /// Minimum across all dependencies.
    #[inline]
    pub fn value(&self) -> i64 {
        match &*self.dependencies {
            [] => self.cursor.value(),
            [single] => single.value(),
            many => minimum_sequence(many, i64::MAX),
        }
    }

    /// Spins with [`Backoff`] until `value() >= sequence`.
    pub fn spin_wait_for(
        &self,
        sequence: i64,
        token: &CancellationToken,
    ) -> Result<i64, Cancelled> {
        let mut backoff = Backoff::new();
        loop {
            let available = self.value();
            if available >= sequence {
                return Ok(available);
            }
            token.check()?;
            backoff.snooze();
        }
    }

    /// Busy-spins with PAUSE hints until `value() >= sequence`.
    pub fn aggressive_spin_wait_for(
        &self,
        sequence: i64,
        token: &CancellationToken,
    ) -> Result<i64, Cancelled> {
        loop {
            let available = self.value();
            if available >= sequence {
                return Ok(available);
            }
            token.check()?;
            hint::spin_loop();
        }
    }
}
