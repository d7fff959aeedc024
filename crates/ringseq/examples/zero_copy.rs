use ringseq_rs::{
    BatchEventHandler, Config, EventBatch, EventBatchProcessor, EventProcessor, RingBuffer,
    YieldingWaitStrategy,
};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

struct Checksum {
    events: u64,
    sum: u64,
    calls: u64,
}

impl BatchEventHandler<[u64; 8]> for Checksum {
    fn on_batch(&mut self, batch: EventBatch<'_, [u64; 8]>, _sequence: i64) -> anyhow::Result<()> {
        for event in batch.iter() {
            self.sum = self.sum.wrapping_add(event.iter().sum::<u64>());
        }
        self.events += batch.len() as u64;
        self.calls += 1;
        Ok(())
    }
}

fn main() {
    // RUST_LOG=ringseq_rs=debug shows processor lifecycle events.
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(fmt::layer().with_thread_names(true))
        .init();

    println!("ringseq Zero-Copy Example");
    println!("=========================\n");

    let config = Config::with_ring_bits(16); // 64K slots
    let ring = Arc::new(
        RingBuffer::create_multi_producer(|| [0u64; 8], config, YieldingWaitStrategy::new())
            .expect("valid configuration"),
    );

    const N_PRODUCERS: usize = 4;
    const BATCHES: usize = 10_000;
    const BATCH_SIZE: usize = 100;
    let total = (N_PRODUCERS * BATCHES * BATCH_SIZE) as u64;

    println!("Configuration:");
    println!("  Ring capacity: {} slots", ring.buffer_size());
    println!("  Producers: {}", N_PRODUCERS);
    println!("  Batches per producer: {}", BATCHES);
    println!("  Batch size: {}", BATCH_SIZE);
    println!("  Total items: {}\n", total);

    let consumer = EventBatchProcessor::new(
        Arc::clone(&ring),
        ring.new_barrier(&[]),
        Checksum {
            events: 0,
            sum: 0,
            calls: 0,
        },
    );
    ring.add_gating_sequences(&[Arc::clone(consumer.sequence())]);
    let consumer = consumer.start("checksum").expect("spawn consumer");

    let start = Instant::now();

    // Slots are pre-allocated; producers write the arrays in place.
    let handles: Vec<_> = (0..N_PRODUCERS)
        .map(|_| {
            let ring = Arc::clone(&ring);
            thread::spawn(move || {
                let mut publisher = ring.publisher().expect("multi-producer publisher");
                for _ in 0..BATCHES {
                    let mut claim = publisher.claim_batch(BATCH_SIZE).expect("batch fits ring");
                    for (sequence, slot) in claim.iter_mut() {
                        slot.fill(sequence as u64);
                    }
                    claim.publish();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("producer panicked");
    }
    while consumer.handle().sequence().value() < total as i64 - 1 {
        thread::yield_now();
    }
    let elapsed = start.elapsed();
    consumer.halt();
    let consumer = consumer.join().expect("consumer stopped cleanly");
    let stats = consumer.handler();

    let expected = (0..total).fold(0u64, |acc, s| acc.wrapping_add(s * 8));
    println!("Results:");
    println!("  Events consumed: {}", stats.events);
    println!("  Handler calls: {}", stats.calls);
    println!("  Avg batch: {:.1}", stats.events as f64 / stats.calls as f64);
    println!("  Checksum ok: {}", stats.sum == expected);
    println!("  Time: {:?}", elapsed);
    println!(
        "  Throughput: {:.2} M events/sec",
        total as f64 / elapsed.as_secs_f64() / 1_000_000.0
    );
}
