//! Integration tests for the tokio driver and graceful shutdown.

#![cfg(feature = "async")]

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use topic_throttle::{
    Batcher, BatcherConfig, ChannelSink, Debouncer, DebouncerConfig, FlowNode, Message,
    NodeRuntime, RateLimitConfig, RateLimiter, ShutdownError, TokioClock,
};

fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<Message>) -> Vec<Message> {
    let mut out = Vec::new();
    while let Ok(message) = rx.try_recv() {
        out.push(message);
    }
    out
}

#[tokio::test(start_paused = true)]
async fn test_debounce_scenario_under_runtime() {
    let (sink, mut rx) = ChannelSink::new();
    let node = Debouncer::new(
        DebouncerConfig::new().with_interval(Duration::from_millis(50)),
        Arc::new(TokioClock::new()),
        sink,
    );
    let runtime = NodeRuntime::start(node);

    runtime.deliver(Message::new("x", 1));
    tokio::time::sleep(Duration::from_millis(10)).await;
    runtime.deliver(Message::new("x", 2));

    tokio::time::sleep(Duration::from_millis(45)).await;
    assert!(drain(&mut rx).is_empty());

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(drain(&mut rx), vec![Message::new("x", 2)]);

    runtime.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_rate_limiter_trickles_under_runtime() {
    let (sink, mut rx) = ChannelSink::new();
    let node = RateLimiter::new(
        RateLimitConfig::new()
            .with_max_messages_per_topic(10)
            .with_interval(Duration::from_millis(100)),
        Arc::new(TokioClock::new()),
        sink,
    );
    let runtime = NodeRuntime::start(node);

    for i in 1..=3 {
        runtime.deliver(Message::new("k", i));
    }
    assert_eq!(drain(&mut rx).len(), 1);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(drain(&mut rx), vec![Message::new("k", 2)]);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(drain(&mut rx), vec![Message::new("k", 3)]);

    // Empty tick retires the topic.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(runtime.with_node(|n| n.live_topics()), 0);

    runtime.shutdown().await.unwrap();
    assert_eq!(runtime.metrics().messages_emitted(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_drains_synchronously() {
    let (sink, mut rx) = ChannelSink::new();
    let node = Batcher::new(
        BatcherConfig::new()
            .with_max_topics(10)
            .with_max_messages_per_topic(100)
            .with_max_delay(Duration::from_secs(3600)),
        Arc::new(TokioClock::new()),
        sink,
    )
    .with_name("shutdown-test");
    let runtime = NodeRuntime::start(node);

    runtime.deliver(Message::new("a", 1));
    runtime.deliver(Message::new("b", 2));
    runtime.deliver(Message::new("a", 3));

    runtime.shutdown().await.unwrap();

    // Everything is out as soon as shutdown returns, without further polling.
    let out = drain(&mut rx);
    assert_eq!(
        out,
        vec![
            Message::new("a", json!([1, 3])),
            Message::new("b", json!([2]))
        ]
    );
    assert!(!runtime.is_running());
    assert_eq!(runtime.with_node(|n| n.next_deadline()), None);
}

#[tokio::test(start_paused = true)]
async fn test_second_shutdown_fails() {
    let (sink, _rx) = ChannelSink::new();
    let node = Debouncer::new(DebouncerConfig::new(), Arc::new(TokioClock::new()), sink);
    let runtime = NodeRuntime::start(node);

    assert!(runtime.shutdown().await.is_ok());
    let err = runtime.shutdown().await.unwrap_err();
    assert_eq!(err, ShutdownError::AlreadyShutdown);
    assert_eq!(err.to_string(), "runtime was already shut down");
    assert!(!runtime.deliver(Message::new("a", 1)));
}

#[tokio::test(start_paused = true)]
async fn test_dropped_receiver_does_not_stop_node() {
    let (sink, rx) = ChannelSink::new();
    let node = RateLimiter::new(
        RateLimitConfig::new().with_max_topics(2),
        Arc::new(TokioClock::new()),
        sink,
    );
    let runtime = NodeRuntime::start(node);
    drop(rx);

    assert!(runtime.deliver(Message::new("a", 1)));
    assert!(runtime.deliver(Message::new("b", 1)));
    tokio::time::sleep(Duration::from_millis(10)).await;
    runtime.shutdown().await.unwrap();
    assert_eq!(runtime.metrics().messages_emitted(), 2);
}
