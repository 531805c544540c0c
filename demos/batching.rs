//! Synchronous batching example.
//!
//! Drives a batcher by hand: messages for three topics arrive, full batches
//! go out immediately, and the host polls `fire_due_timers` to release
//! batches that have been open for `max_delay`.
//!
//! Run with `RUST_LOG=topic_throttle=debug` to see evictions and flushes.

use std::sync::Arc;
use std::time::Duration;
use topic_throttle::{Batcher, BatcherConfig, FlowNode, FnSink, Message, SystemClock};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let sink = FnSink::new(|m: Message| match serde_json::to_string(&m) {
        Ok(json) => println!("  -> {}", json),
        Err(err) => eprintln!("  !! unserialisable output: {}", err),
    });

    let config = BatcherConfig::new()
        .with_max_topics(2)
        .with_max_messages_per_topic(3)
        .with_max_delay(Duration::from_millis(200));
    let mut batcher = Batcher::new(config, Arc::new(SystemClock::new()), sink).with_name("demo");

    println!("=== Batching Example ===\n");
    println!("maxTopics=2, maxMessagesPerTopic=3, maxDelay=200ms\n");

    println!("Three messages for 'orders' (batch fills up):");
    for i in 1..=3 {
        batcher.handle(Message::new("orders", i));
    }

    println!("\nOne message each for 'users' and 'audit' ('users' is evicted):");
    batcher.handle(Message::new("users", "alice"));
    batcher.handle(Message::new("audit", "login"));

    println!("\nWaiting for the idle timeout:");
    while let Some(deadline) = batcher.next_deadline() {
        std::thread::sleep(deadline.saturating_duration_since(std::time::Instant::now()));
        batcher.fire_due_timers();
    }

    println!("\nUnscoped messages, then a flush-all command:");
    batcher.handle(Message::unscoped(1));
    batcher.handle(Message::unscoped(2));
    batcher.handle(Message::flush(None));

    batcher.close();

    let snapshot = batcher.metrics().snapshot();
    println!("\n=== Example Complete ===");
    println!(
        "received={} emitted={} flushed={} evicted={}",
        snapshot.messages_received,
        snapshot.messages_emitted,
        snapshot.topics_flushed,
        snapshot.topics_evicted
    );
}
