//! Demonstration of ringseq-async: a diamond of async consumers.
//!
//! Run with: `cargo run -p ringseq-async --bin demo`
//!
//! ```text
//!              ┌─> journal ──┐
//! producers ──>┤             ├──> apply
//!              └─> replicate ┘
//! ```

use async_trait::async_trait;
use ringseq_async::{AsyncBatchEventHandler, AsyncBatchEventProcessor, AsyncWaitStrategy};
use ringseq_rs::{Config, RingBuffer};
use std::sync::Arc;
use std::time::{Duration, Instant};

const PRODUCERS: u64 = 4;
const EVENTS_PER_PRODUCER: u64 = 50_000;

#[derive(Debug, Default, Clone, Copy)]
struct Order {
    producer: u64,
    amount: u64,
}

#[derive(Default)]
struct Journal {
    bytes: u64,
}

#[async_trait]
impl AsyncBatchEventHandler<Order> for Journal {
    async fn on_event(&mut self, _order: &Order, _seq: i64, end_of_batch: bool) -> anyhow::Result<()> {
        self.bytes += std::mem::size_of::<Order>() as u64;
        if end_of_batch {
            // Stand-in for an fsync per batch.
            tokio::task::yield_now().await;
        }
        Ok(())
    }
}

#[derive(Default)]
struct Replicate {
    batches: u64,
}

#[async_trait]
impl AsyncBatchEventHandler<Order> for Replicate {
    async fn on_event(&mut self, _order: &Order, _seq: i64, _end: bool) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_batch_start(&mut self, _batch_size: i64, _queue_depth: i64) {
        self.batches += 1;
    }
}

#[derive(Default)]
struct Apply {
    per_producer: [u64; PRODUCERS as usize],
}

#[async_trait]
impl AsyncBatchEventHandler<Order> for Apply {
    async fn on_event(&mut self, order: &Order, _seq: i64, _end: bool) -> anyhow::Result<()> {
        self.per_producer[order.producer as usize] += order.amount;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== ringseq-async Demo ===\n");

    let ring = Arc::new(RingBuffer::create_multi_producer(
        Order::default,
        Config::new(1024),
        AsyncWaitStrategy::new(),
    )?);

    let journal = AsyncBatchEventProcessor::new(Arc::clone(&ring), ring.new_barrier(&[]), Journal::default());
    let replicate =
        AsyncBatchEventProcessor::new(Arc::clone(&ring), ring.new_barrier(&[]), Replicate::default());
    let apply = AsyncBatchEventProcessor::new(
        Arc::clone(&ring),
        ring.new_barrier(&[Arc::clone(journal.sequence()), Arc::clone(replicate.sequence())]),
        Apply::default(),
    );
    ring.add_gating_sequences(&[Arc::clone(apply.sequence())]);

    let handles = [journal.handle(), replicate.handle(), apply.handle()];
    let journal = journal.spawn();
    let replicate = replicate.spawn();
    let apply = apply.spawn();

    let start = Instant::now();
    let producers: Vec<_> = (0..PRODUCERS)
        .map(|producer| {
            let ring = Arc::clone(&ring);
            std::thread::spawn(move || -> Result<(), ringseq_rs::RingError> {
                let mut publisher = ring.publisher()?;
                for amount in 1..=EVENTS_PER_PRODUCER {
                    publisher.publish_event(|order, _| *order = Order { producer, amount });
                }
                Ok(())
            })
        })
        .collect();
    for producer in producers {
        producer.join().map_err(|_| "producer panicked")??;
    }

    let last = (PRODUCERS * EVENTS_PER_PRODUCER) as i64 - 1;
    while handles[2].sequence().value() < last {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    let elapsed = start.elapsed();

    for handle in &handles {
        handle.halt();
    }
    let (journal, r1) = journal.await?;
    let (replicate, r2) = replicate.await?;
    let (apply, r3) = apply.await?;
    r1?;
    r2?;
    r3?;

    let expected = EVENTS_PER_PRODUCER * (EVENTS_PER_PRODUCER + 1) / 2;
    println!("  events:      {}", last + 1);
    println!("  elapsed:     {elapsed:?}");
    println!("  journaled:   {} bytes", journal.handler().bytes);
    println!("  replicated:  {} batches", replicate.handler().batches);
    for (producer, total) in apply.handler().per_producer.iter().enumerate() {
        println!("  producer {producer}: {total} (expected {expected})");
        assert_eq!(*total, expected);
    }

    println!("\n=== Demo completed successfully! ===");
    Ok(())
}
