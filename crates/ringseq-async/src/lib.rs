//! Async Wait Strategies for ringseq-rs
//!
//! Lets consumers of a ringseq ring buffer suspend as tokio tasks instead of
//! occupying a thread each.
//!
//! # Features
//!
//! - **Async wait strategies**: [`AsyncWaitStrategy`] and
//!   [`TimeoutAsyncWaitStrategy`] wake suspended tasks through
//!   `tokio::sync::Notify` on every publish
//! - **Mixed consumers**: the same strategy still serves thread-based
//!   processors, which park on a condition variable
//! - **Barrier extension**: [`AsyncBarrierExt::wait_for_published_async`] on
//!   the core `SequenceBarrier`
//! - **Async processor**: [`AsyncBatchEventProcessor`] drives an
//!   [`AsyncBatchEventHandler`] with the same lifecycle and exception
//!   handling as the threaded processors
//!
//! # Example
//!
//! ```
//! use ringseq_async::{AsyncBatchEventHandler, AsyncBatchEventProcessor, AsyncWaitStrategy};
//! use ringseq_rs::{Config, RingBuffer};
//! use std::sync::Arc;
//!
//! struct Sum(u64);
//!
//! #[async_trait::async_trait]
//! impl AsyncBatchEventHandler<u64> for Sum {
//!     async fn on_event(&mut self, event: &u64, _seq: i64, _end: bool) -> anyhow::Result<()> {
//!         self.0 += event;
//!         Ok(())
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let ring = Arc::new(
//!     RingBuffer::create_multi_producer(|| 0u64, Config::new(64), AsyncWaitStrategy::new())
//!         .unwrap(),
//! );
//! let processor = AsyncBatchEventProcessor::new(Arc::clone(&ring), ring.new_barrier(&[]), Sum(0));
//! ring.add_gating_sequences(&[Arc::clone(processor.sequence())]);
//! let handle = processor.handle();
//! let task = processor.spawn();
//!
//! let mut publisher = ring.publisher().unwrap();
//! for i in 1..=10 {
//!     publisher.publish_event(|slot, _| *slot = i);
//! }
//! while handle.sequence().value() < 9 {
//!     tokio::task::yield_now().await;
//! }
//! handle.halt();
//! let (processor, result) = task.await.unwrap();
//! result.unwrap();
//! assert_eq!(processor.handler().0, 55);
//! # }
//! ```

mod barrier;
mod processor;
mod wait;

pub use barrier::AsyncBarrierExt;
pub use processor::{AsyncBatchEventHandler, AsyncBatchEventProcessor};
pub use wait::{AsyncSequenceWaiter, AsyncWaitStrategy, AsyncWaiter, TimeoutAsyncWaitStrategy};
