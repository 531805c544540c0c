//! Tokio runtime example.
//!
//! A debouncer and a trickle rate limiter, each driven by a `NodeRuntime`,
//! with output read from a channel. Both are shut down gracefully at the end,
//! which flushes whatever they still hold.

use std::sync::Arc;
use std::time::Duration;
use topic_throttle::{
    ChannelSink, Debouncer, DebouncerConfig, Message, NodeRuntime, RateLimitConfig, RateLimiter,
    TokioClock,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let (sink, mut output) = ChannelSink::new();
    let printer = tokio::spawn(async move {
        while let Some(message) = output.recv().await {
            println!("  -> {}", serde_json::to_string(&message).unwrap_or_default());
        }
    });

    println!("=== Runtime Example ===\n");

    println!("Debouncer (interval=100ms): five quick updates to 'temperature':");
    let debouncer = NodeRuntime::start(Debouncer::new(
        DebouncerConfig::new()
            .with_max_topics(8)
            .with_interval(Duration::from_millis(100)),
        Arc::new(TokioClock::new()),
        sink.clone(),
    ));
    for reading in [20.5, 20.7, 21.0, 21.2, 21.1] {
        debouncer.deliver(Message::new("temperature", reading));
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    tokio::time::sleep(Duration::from_millis(150)).await;

    println!("\nRate limiter (interval=250ms, backlog=3, drop overflow):");
    let limiter = NodeRuntime::start(RateLimiter::new(
        RateLimitConfig::new()
            .with_max_topics(8)
            .with_max_messages_per_topic(3)
            .with_interval(Duration::from_millis(250))
            .with_drop_overflow_messages(true),
        Arc::new(TokioClock::new()),
        sink,
    ));
    for i in 1..=6 {
        limiter.deliver(Message::new("alerts", i));
    }
    tokio::time::sleep(Duration::from_millis(600)).await;

    println!("\nShutting down (remaining backlog is flushed):");
    debouncer.shutdown().await?;
    limiter.shutdown().await?;
    println!(
        "dropped by rate limiter: {}",
        limiter.metrics().messages_dropped()
    );

    drop(debouncer);
    drop(limiter);
    printer.await?;

    println!("\n=== Example Complete ===");
    Ok(())
}
