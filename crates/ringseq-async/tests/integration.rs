//! Integration tests for ringseq-async.

use async_trait::async_trait;
use ringseq_async::{
    AsyncBarrierExt, AsyncBatchEventHandler, AsyncBatchEventProcessor, AsyncWaitStrategy,
    TimeoutAsyncWaitStrategy,
};
use ringseq_rs::{
    BatchEventProcessor, Cancelled, Config, EventHandler, EventProcessor, RingBuffer,
    SequenceWaitResult,
};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct Collect {
    seen: Vec<u64>,
    timeouts: usize,
    timeouts_before_first_event: usize,
}

#[async_trait]
impl AsyncBatchEventHandler<u64> for Collect {
    async fn on_event(&mut self, event: &u64, _sequence: i64, _end: bool) -> anyhow::Result<()> {
        if self.seen.is_empty() {
            self.timeouts_before_first_event = self.timeouts;
        }
        self.seen.push(*event);
        Ok(())
    }

    async fn on_timeout(&mut self, _sequence: i64) -> anyhow::Result<()> {
        self.timeouts += 1;
        Ok(())
    }
}

async fn wait_for_sequence(sequence: &ringseq_rs::Sequence, target: i64) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while sequence.value() < target {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("processor did not catch up");
}

#[tokio::test]
async fn test_barrier_wakes_on_publish() {
    let ring = Arc::new(
        RingBuffer::create_multi_producer(|| 0u64, Config::new(16), AsyncWaitStrategy::new())
            .unwrap(),
    );
    let barrier = Arc::new(ring.new_barrier(&[]));

    let waiter = {
        let barrier = Arc::clone(&barrier);
        tokio::spawn(async move { barrier.wait_for_published_async(0).await })
    };

    tokio::time::sleep(Duration::from_millis(10)).await;
    let mut publisher = ring.publisher().unwrap();
    publisher.publish_event(|slot, _| *slot = 7);

    assert_eq!(waiter.await.unwrap(), Ok(SequenceWaitResult::Available(0)));
}

#[tokio::test]
async fn test_cancel_processing_wakes_suspended_task() {
    let ring = Arc::new(
        RingBuffer::create_single_producer(|| 0u64, Config::new(16), AsyncWaitStrategy::new())
            .unwrap(),
    );
    let barrier = Arc::new(ring.new_barrier(&[]));

    let waiter = {
        let barrier = Arc::clone(&barrier);
        tokio::spawn(async move { barrier.wait_for_async(0).await })
    };

    tokio::time::sleep(Duration::from_millis(10)).await;
    barrier.cancel_processing();

    assert_eq!(waiter.await.unwrap(), Err(Cancelled));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_async_processor_receives_all_events_in_order() {
    let ring = Arc::new(
        RingBuffer::create_multi_producer(|| 0u64, Config::new(64), AsyncWaitStrategy::new())
            .unwrap(),
    );
    let processor =
        AsyncBatchEventProcessor::new(Arc::clone(&ring), ring.new_barrier(&[]), Collect::default());
    ring.add_gating_sequences(&[Arc::clone(processor.sequence())]);
    let handle = processor.handle();
    let task = processor.spawn();
    assert!(tokio::task::spawn_blocking({
        let handle = handle.clone();
        move || handle.wait_until_started(Duration::from_secs(5))
    })
    .await
    .unwrap());

    // More events than slots: the producer is gated by the async consumer.
    let producer = {
        let ring = Arc::clone(&ring);
        std::thread::spawn(move || {
            let mut publisher = ring.publisher().unwrap();
            for i in 0..500u64 {
                publisher.publish_event(|slot, _| *slot = i);
            }
        })
    };
    producer.join().unwrap();

    wait_for_sequence(handle.sequence(), 499).await;
    handle.halt();
    let (processor, result) = task.await.unwrap();
    result.unwrap();

    assert_eq!(processor.handler().seen, (0..500).collect::<Vec<_>>());
    assert!(!handle.is_running());
}

#[tokio::test]
async fn test_timeout_delivered_before_events() {
    let ring = Arc::new(
        RingBuffer::create_single_producer(
            || 0u64,
            Config::new(16),
            TimeoutAsyncWaitStrategy::new(Duration::from_millis(5)),
        )
        .unwrap(),
    );
    let processor =
        AsyncBatchEventProcessor::new(Arc::clone(&ring), ring.new_barrier(&[]), Collect::default());
    ring.add_gating_sequences(&[Arc::clone(processor.sequence())]);
    let handle = processor.handle();
    let task = processor.spawn();

    tokio::time::sleep(Duration::from_millis(40)).await;
    let mut publisher = ring.publisher().unwrap();
    for i in 0..3 {
        publisher.publish_event(|slot, _| *slot = i);
    }

    wait_for_sequence(handle.sequence(), 2).await;
    handle.halt();
    let (processor, result) = task.await.unwrap();
    result.unwrap();

    let handler = processor.handler();
    assert!(handler.timeouts_before_first_event >= 1);
    assert_eq!(handler.seen, vec![0, 1, 2]);
}

#[tokio::test]
async fn test_async_processor_restarts_where_it_stopped() {
    let ring = Arc::new(
        RingBuffer::create_single_producer(|| 0u64, Config::new(32), AsyncWaitStrategy::new())
            .unwrap(),
    );
    let processor =
        AsyncBatchEventProcessor::new(Arc::clone(&ring), ring.new_barrier(&[]), Collect::default());
    ring.add_gating_sequences(&[Arc::clone(processor.sequence())]);
    let mut publisher = ring.publisher().unwrap();

    for i in 0..10 {
        publisher.publish_event(|slot, _| *slot = i);
    }
    let handle = processor.handle();
    let task = processor.spawn();
    wait_for_sequence(handle.sequence(), 9).await;
    handle.halt();
    let (processor, result) = task.await.unwrap();
    result.unwrap();

    for i in 10..20 {
        publisher.publish_event(|slot, _| *slot = i);
    }
    let task = processor.spawn();
    wait_for_sequence(handle.sequence(), 19).await;
    handle.halt();
    let (processor, result) = task.await.unwrap();
    result.unwrap();

    assert_eq!(processor.handler().seen, (0..20).collect::<Vec<_>>());
}

struct Count(usize);

impl EventHandler<u64> for Count {
    fn on_event(&mut self, _event: &u64, _sequence: i64, _end: bool) -> anyhow::Result<()> {
        self.0 += 1;
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_async_strategy_serves_thread_consumers() {
    let ring = Arc::new(
        RingBuffer::create_single_producer(|| 0u64, Config::new(16), AsyncWaitStrategy::new())
            .unwrap(),
    );
    let processor = BatchEventProcessor::new(Arc::clone(&ring), ring.new_barrier(&[]), Count(0));
    ring.add_gating_sequences(&[Arc::clone(processor.sequence())]);
    let running = processor.start("thread-consumer").unwrap();

    let mut publisher = ring.publisher().unwrap();
    for i in 0..40 {
        publisher.publish_event(|slot, _| *slot = i);
    }

    wait_for_sequence(running.handle().sequence(), 39).await;
    running.halt();
    let processor = tokio::task::spawn_blocking(move || running.join())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(processor.handler().0, 40);
}
