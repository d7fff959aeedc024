use crate::barrier::ProcessingAlert;
use crate::sequencer::Sequencer;
use crate::{RingError, Sequence, SequenceBarrier};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

const IDLE: u8 = 0;
const HALTED: u8 = 1;
const RUNNING: u8 = 2;

/// How a `run` call should proceed, decided by [`ProcessorControl::begin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Idle → Running: process events until halted.
    Run,
    /// Halted before it ever ran: call the start and shutdown hooks, then
    /// return without processing.
    EarlyExit,
}

/// Run-state machine shared by a processor and its [`ProcessorHandle`]s.
///
/// States move Idle → Running → Halted → Idle. `run` may only start from
/// Idle; `halt` moves to Halted and cancels the barrier so a parked wait
/// returns. Custom processors (such as the async one) drive it with
/// [`begin`](Self::begin), [`notify_started`](Self::notify_started) and
/// [`finish`](Self::finish).
pub struct ProcessorControl {
    state: AtomicU8,
    started: Mutex<bool>,
    started_cond: Condvar,
    sequence: Arc<Sequence>,
    alert: Arc<dyn ProcessingAlert>,
}

impl ProcessorControl {
    /// Creates the control block for a processor tracking `sequence` and
    /// waiting on `barrier`.
    pub fn new<S: Sequencer>(sequence: Arc<Sequence>, barrier: Arc<SequenceBarrier<S>>) -> Self {
        Self {
            state: AtomicU8::new(IDLE),
            started: Mutex::new(false),
            started_cond: Condvar::new(),
            sequence,
            alert: barrier,
        }
    }

    /// Enters a run.
    ///
    /// Fails with [`RingError::AlreadyRunning`] if another `run` is active.
    pub fn begin(&self) -> Result<RunMode, RingError> {
        match self
            .state
            .compare_exchange(IDLE, RUNNING, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                debug!(sequence = self.sequence.value(), "processor running");
                Ok(RunMode::Run)
            }
            Err(RUNNING) => Err(RingError::AlreadyRunning),
            Err(_) => {
                debug!("processor halted before start, exiting early");
                Ok(RunMode::EarlyExit)
            }
        }
    }

    /// Signals [`ProcessorHandle::wait_until_started`] waiters.
    pub fn notify_started(&self) {
        let mut started = self.started.lock();
        *started = true;
        self.started_cond.notify_all();
    }

    /// `true` while the state is Running (not yet halted).
    #[inline]
    pub fn is_running_state(&self) -> bool {
        self.state.load(Ordering::Acquire) == RUNNING
    }

    /// Leaves the run and returns to Idle so the processor can run again.
    pub fn finish(&self) {
        *self.started.lock() = false;
        self.state.store(IDLE, Ordering::Release);
        debug!(sequence = self.sequence.value(), "processor stopped");
    }

    /// Creates a handle for controlling the processor from other threads.
    pub fn handle(self: &Arc<Self>) -> ProcessorHandle {
        ProcessorHandle {
            control: Arc::clone(self),
        }
    }

    /// The processor's progress sequence.
    pub fn sequence(&self) -> &Arc<Sequence> {
        &self.sequence
    }

    fn halt(&self) {
        self.state.store(HALTED, Ordering::Release);
        self.alert.cancel_processing();
        debug!(sequence = self.sequence.value(), "processor halt requested");
    }
}

impl fmt::Debug for ProcessorControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state.load(Ordering::Acquire) {
            IDLE => "idle",
            HALTED => "halted",
            _ => "running",
        };
        f.debug_struct("ProcessorControl")
            .field("state", &state)
            .field("sequence", &self.sequence.value())
            .finish_non_exhaustive()
    }
}

/// Cloneable remote control for a running processor.
#[derive(Debug, Clone)]
pub struct ProcessorHandle {
    control: Arc<ProcessorControl>,
}

impl ProcessorHandle {
    /// Asks the processor to stop after its current batch.
    ///
    /// Idempotent. A processor halted before it starts exits immediately
    /// when run.
    pub fn halt(&self) {
        self.control.halt();
    }

    /// `true` unless the processor is idle; a halted processor still counts
    /// as running until its loop has exited.
    pub fn is_running(&self) -> bool {
        self.control.state.load(Ordering::Acquire) != IDLE
    }

    /// Blocks until the processor has called its start hook, or `timeout`
    /// elapses. Returns `true` if it started.
    pub fn wait_until_started(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut started = self.control.started.lock();
        while !*started {
            if self
                .control
                .started_cond
                .wait_until(&mut started, deadline)
                .timed_out()
            {
                return *started;
            }
        }
        true
    }

    /// The processor's progress sequence.
    pub fn sequence(&self) -> &Arc<Sequence> {
        &self.control.sequence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wait::BusySpinWaitStrategy;
    use crate::{Config, RingBuffer};
    use std::thread;

    fn control() -> Arc<ProcessorControl> {
        let ring =
            RingBuffer::create_single_producer(|| 0u8, Config::new(4), BusySpinWaitStrategy)
                .unwrap();
        let barrier = Arc::new(ring.new_barrier(&[]));
        Arc::new(ProcessorControl::new(Arc::new(Sequence::default()), barrier))
    }

    #[test]
    fn test_state_transitions() {
        let control = control();
        let handle = control.handle();
        assert!(!handle.is_running());

        assert_eq!(control.begin().unwrap(), RunMode::Run);
        assert!(handle.is_running());
        assert!(control.is_running_state());
        assert!(matches!(control.begin(), Err(RingError::AlreadyRunning)));

        handle.halt();
        assert!(handle.is_running());
        assert!(!control.is_running_state());

        control.finish();
        assert!(!handle.is_running());
        assert_eq!(control.begin().unwrap(), RunMode::Run);
    }

    #[test]
    fn test_halt_before_run_exits_early() {
        let control = control();
        control.handle().halt();
        assert_eq!(control.begin().unwrap(), RunMode::EarlyExit);
        control.finish();
        assert_eq!(control.begin().unwrap(), RunMode::Run);
    }

    #[test]
    fn test_wait_until_started() {
        let control = control();
        let handle = control.handle();
        assert!(!handle.wait_until_started(Duration::from_millis(5)));

        let starter = {
            let control = Arc::clone(&control);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                control.notify_started();
            })
        };
        assert!(handle.wait_until_started(Duration::from_secs(5)));
        starter.join().unwrap();

        control.finish();
        assert!(!handle.wait_until_started(Duration::from_millis(1)));
    }
}
