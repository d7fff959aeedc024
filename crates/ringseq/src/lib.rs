//! ringseq - Sequence-Coordinated Inter-Thread Messaging
//!
//! A pre-allocated ring of reusable event slots shared by producers and
//! consumers. Coordination happens entirely through monotonically increasing
//! 64-bit sequence numbers: producers claim sequences from a [`Sequencer`],
//! fill the slots in place and publish; consumers wait on a
//! [`SequenceBarrier`] and release slots by advancing their own [`Sequence`].
//! Consumers can be chained into pipelines and diamonds by making one
//! barrier depend on other consumers' sequences.
//!
//! # Key Features
//!
//! - Single-producer and multi-producer sequencers (claim + publish protocol)
//! - Backpressure through gating sequences: no slot is overwritten before
//!   every gating consumer has released it
//! - Pluggable wait strategies (busy-spin, yielding, sleeping, blocking,
//!   timeout variants, per-consumer hybrid)
//! - Batch-oriented processors with lifecycle hooks and exception handlers
//! - Pull-style [`EventPoller`] for consumers that own their thread loop
//! - 128-byte padded cursors and slot storage against false sharing
//!
//! # Example
//!
//! ```
//! use ringseq_rs::{
//!     BatchEventProcessor, Config, EventHandler, EventProcessor, RingBuffer, YieldingWaitStrategy,
//! };
//! use std::sync::Arc;
//!
//! struct Sum(u64);
//!
//! impl EventHandler<u64> for Sum {
//!     fn on_event(&mut self, event: &u64, _sequence: i64, _end_of_batch: bool) -> anyhow::Result<()> {
//!         self.0 += event;
//!         Ok(())
//!     }
//! }
//!
//! let ring = Arc::new(
//!     RingBuffer::create_multi_producer(|| 0u64, Config::new(1024), YieldingWaitStrategy::new())
//!         .unwrap(),
//! );
//!
//! // Wire the consumer before publishing so it gates the producers.
//! let processor = BatchEventProcessor::new(Arc::clone(&ring), ring.new_barrier(&[]), Sum(0));
//! ring.add_gating_sequences(&[Arc::clone(processor.sequence())]);
//! let running = processor.start("sum").unwrap();
//!
//! let mut publisher = ring.publisher().unwrap();
//! for i in 1..=100 {
//!     publisher.publish_event(|slot, _seq| *slot = i);
//! }
//!
//! while running.handle().sequence().value() < 99 {
//!     std::thread::yield_now();
//! }
//! running.halt();
//! assert_eq!(running.join().unwrap().handler().0, 5050);
//! ```

mod backoff;
mod barrier;
mod batch;
mod claim;
mod config;
mod dependent;
mod error;
mod invariants;
mod poller;
mod processor;
mod ring_buffer;
mod sequence;
mod sequencer;
pub mod wait;

pub use backoff::Backoff;
pub use barrier::SequenceBarrier;
pub use batch::EventBatch;
pub use claim::{BatchClaim, EventClaim, Publisher};
pub use config::{Config, HIGH_THROUGHPUT_CONFIG, LOW_LATENCY_CONFIG};
pub use dependent::DependentSequenceGroup;
pub use error::{Cancelled, RingError};
pub use poller::{EventPoller, PollState};
pub use processor::{
    BatchEventHandler, BatchEventProcessor, DefaultExceptionHandler, EventBatchProcessor,
    EventHandler, EventProcessor, ExceptionHandler, FatalExceptionHandler, IgnoreExceptionHandler,
    ProcessorControl, ProcessorHandle, ProcessorThread, RunMode,
};
pub use ring_buffer::RingBuffer;
pub use sequence::{minimum_sequence, Sequence, INITIAL_CURSOR_VALUE};
pub use sequencer::{MultiProducerSequencer, Sequencer, SingleProducerSequencer};
pub use wait::{
    BlockingWaitStrategy, BusySpinWaitStrategy, CancellationToken, HybridWaitStrategy,
    SequenceWaitResult, SequenceWaiter, SequenceWaiterOwner, SleepingWaitStrategy,
    TimeoutBlockingWaitStrategy, TimeoutYieldingWaitStrategy, WaitStrategy, YieldingWaitStrategy,
};
