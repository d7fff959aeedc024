//! Async wait strategies.
//!
//! Waiters park a task on a [`tokio::sync::Notify`] instead of an OS thread.
//! The same waiter also implements the synchronous [`SequenceWaiter`] so a
//! ring built with an async strategy can mix thread-based and task-based
//! consumers: a publish wakes both the condition variable and the notify.

use async_trait::async_trait;
use ringseq_rs::wait::{BlockingGate, CancellationToken};
use ringseq_rs::{
    Cancelled, DependentSequenceGroup, SequenceWaitResult, SequenceWaiter, SequenceWaiterOwner,
    WaitStrategy,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;

/// A [`SequenceWaiter`] that can also wait without blocking a thread.
#[async_trait]
pub trait AsyncSequenceWaiter: SequenceWaiter {
    /// Suspends the calling task until the dependencies reach `sequence`, the
    /// token is cancelled, or the strategy's timeout elapses.
    async fn wait_for_async(
        &self,
        sequence: i64,
        token: &CancellationToken,
    ) -> Result<SequenceWaitResult, Cancelled>;
}

#[derive(Debug, Default)]
struct Signal {
    gate: BlockingGate,
    notify: Notify,
}

impl Signal {
    fn wake_all(&self) {
        self.gate.signal_all();
        self.notify.notify_waiters();
    }
}

/// Wakes suspended tasks (and parked threads) on every publish.
#[derive(Debug, Clone, Default)]
pub struct AsyncWaitStrategy {
    signal: Arc<Signal>,
}

impl AsyncWaitStrategy {
    /// Creates the strategy.
    pub fn new() -> Self {
        Self::default()
    }
}

impl WaitStrategy for AsyncWaitStrategy {
    type Waiter = AsyncWaiter;

    #[inline]
    fn is_blocking(&self) -> bool {
        true
    }

    fn new_sequence_waiter(
        &self,
        _owner: SequenceWaiterOwner,
        dependent_sequences: DependentSequenceGroup,
    ) -> Self::Waiter {
        AsyncWaiter {
            signal: Arc::clone(&self.signal),
            dependent_sequences,
            timeout: None,
        }
    }

    fn signal_all_when_blocking(&self) {
        self.signal.wake_all();
    }
}

/// [`AsyncWaitStrategy`] that gives up after `timeout`.
///
/// The timeout is driven by the tokio timer, so wake-up latency after the
/// deadline is best effort.
#[derive(Debug, Clone)]
pub struct TimeoutAsyncWaitStrategy {
    signal: Arc<Signal>,
    timeout: Duration,
}

impl TimeoutAsyncWaitStrategy {
    /// Creates the strategy with the given timeout.
    pub fn new(timeout: Duration) -> Self {
        Self {
            signal: Arc::default(),
            timeout,
        }
    }

    /// The configured timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl WaitStrategy for TimeoutAsyncWaitStrategy {
    type Waiter = AsyncWaiter;

    #[inline]
    fn is_blocking(&self) -> bool {
        true
    }

    fn new_sequence_waiter(
        &self,
        _owner: SequenceWaiterOwner,
        dependent_sequences: DependentSequenceGroup,
    ) -> Self::Waiter {
        AsyncWaiter {
            signal: Arc::clone(&self.signal),
            dependent_sequences,
            timeout: Some(self.timeout),
        }
    }

    fn signal_all_when_blocking(&self) {
        self.signal.wake_all();
    }
}

/// Waiter for [`AsyncWaitStrategy`] and [`TimeoutAsyncWaitStrategy`].
#[derive(Debug)]
pub struct AsyncWaiter {
    signal: Arc<Signal>,
    dependent_sequences: DependentSequenceGroup,
    timeout: Option<Duration>,
}

impl AsyncWaiter {
    async fn wait_for_cursor(&self, sequence: i64, token: &CancellationToken) -> Result<(), Cancelled> {
        loop {
            // Register interest before checking, so a publish between the
            // check and the await still wakes this task.
            let notified = self.signal.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            token.check()?;
            if self.dependent_sequences.cursor_value() >= sequence {
                return Ok(());
            }
            notified.await;
        }
    }

    async fn wait_for_dependents(
        &self,
        sequence: i64,
        token: &CancellationToken,
    ) -> Result<i64, Cancelled> {
        loop {
            token.check()?;
            let available = self.dependent_sequences.value();
            if available >= sequence {
                return Ok(available);
            }
            tokio::task::yield_now().await;
        }
    }
}

impl SequenceWaiter for AsyncWaiter {
    fn dependent_sequences(&self) -> &DependentSequenceGroup {
        &self.dependent_sequences
    }

    fn wait_for(
        &self,
        sequence: i64,
        token: &CancellationToken,
    ) -> Result<SequenceWaitResult, Cancelled> {
        let deps = &self.dependent_sequences;
        if deps.cursor_value() < sequence {
            match self.timeout {
                None => self.signal.gate.wait_while(|| deps.cursor_value() < sequence, token)?,
                Some(timeout) => {
                    let deadline = Instant::now() + timeout;
                    let reached = self.signal.gate.wait_while_until(
                        || deps.cursor_value() < sequence,
                        token,
                        deadline,
                    )?;
                    if !reached {
                        return Ok(SequenceWaitResult::Timeout);
                    }
                }
            }
        }

        deps.aggressive_spin_wait_for(sequence, token)
            .map(SequenceWaitResult::Available)
    }

    fn cancel(&self) {
        self.signal.wake_all();
    }
}

#[async_trait]
impl AsyncSequenceWaiter for AsyncWaiter {
    async fn wait_for_async(
        &self,
        sequence: i64,
        token: &CancellationToken,
    ) -> Result<SequenceWaitResult, Cancelled> {
        match self.timeout {
            None => self.wait_for_cursor(sequence, token).await?,
            Some(timeout) => {
                match tokio::time::timeout(timeout, self.wait_for_cursor(sequence, token)).await {
                    Ok(result) => result?,
                    Err(_elapsed) => return Ok(SequenceWaitResult::Timeout),
                }
            }
        }

        self.wait_for_dependents(sequence, token)
            .await
            .map(SequenceWaitResult::Available)
    }
}
