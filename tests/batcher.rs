//! Integration tests for the batching policy.

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use topic_throttle::infrastructure::mocks::{CollectingSink, MockClock};
use topic_throttle::{Batcher, BatcherConfig, FlowNode, Input, Message, NodeSettings};

fn batcher(config: BatcherConfig) -> (Batcher<CollectingSink>, CollectingSink, MockClock) {
    let clock = MockClock::new(Instant::now());
    let sink = CollectingSink::new();
    let node = Batcher::new(config, Arc::new(clock.clone()), sink.clone());
    (node, sink, clock)
}

#[test]
fn test_batches_preserve_arrival_order() {
    let config = BatcherConfig::new()
        .with_max_topics(3)
        .with_max_messages_per_topic(7)
        .without_max_delay();
    let (mut node, sink, _) = batcher(config);

    // Interleave three topics; each topic's output must list its own payloads
    // in exactly the order they arrived.
    for i in 0..70u64 {
        let topic = ["a", "b", "c"][(i % 3) as usize];
        node.handle(Message::new(topic, i + 1));
    }
    node.close();

    for topic in ["a", "b", "c"] {
        let received: Vec<u64> = sink
            .messages()
            .into_iter()
            .filter(|m| m.topic.as_deref() == Some(topic))
            .flat_map(|m| match m.payload {
                Some(Value::Array(items)) => items,
                other => panic!("expected array payload, got {:?}", other),
            })
            .filter_map(|v| v.as_u64())
            .collect();
        let mut sorted = received.clone();
        sorted.sort_unstable();
        assert_eq!(received, sorted, "topic {} out of order", topic);
    }

    let total: usize = sink
        .messages()
        .iter()
        .filter_map(|m| m.payload.as_ref().and_then(Value::as_array))
        .map(Vec::len)
        .sum();
    assert_eq!(total, 70);
}

#[test]
fn test_eviction_scenario() {
    let config = BatcherConfig::new()
        .with_max_topics(1)
        .with_max_messages_per_topic(2)
        .with_max_delay(Duration::from_millis(1000));
    let (mut node, sink, clock) = batcher(config);

    node.handle(Message::new("a", 1));
    node.handle(Message::new("b", 2));
    assert_eq!(sink.messages(), vec![Message::new("a", json!([1]))]);

    // a's timer is gone with its entry; only b's timer can fire.
    clock.advance(Duration::from_millis(1000));
    assert_eq!(node.fire_due_timers(), 1);
    assert_eq!(
        sink.messages(),
        vec![
            Message::new("a", json!([1])),
            Message::new("b", json!([2]))
        ]
    );
    assert_eq!(node.metrics().stale_timers(), 0);
}

#[test]
fn test_unscoped_batch_has_no_topic() {
    let config = BatcherConfig::new()
        .with_max_messages_per_topic(2)
        .without_max_delay();
    let (mut node, sink, _) = batcher(config);

    node.handle(Message::unscoped("x"));
    node.handle(Message::unscoped("y"));

    let out = sink.messages();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].topic, None);
    assert_eq!(out[0].payload, Some(json!(["x", "y"])));
    assert_eq!(
        serde_json::to_value(&out[0]).unwrap(),
        json!({"payload": ["x", "y"]})
    );
}

#[test]
fn test_explicit_input_keeps_falsy_payloads() {
    let config = BatcherConfig::new()
        .with_max_messages_per_topic(3)
        .without_max_delay();
    let (mut node, sink, _) = batcher(config);

    node.handle_input(Input::data("z", Message::new("z", 0)));
    node.handle_input(Input::data("z", Message::new("z", false)));
    node.handle_input(Input::data("z", Message::new("z", "")));

    assert_eq!(sink.messages(), vec![Message::new("z", json!([0, false, ""]))]);
    assert_eq!(node.metrics().ambiguous_commands(), 0);
}

#[test]
fn test_from_host_settings() {
    let settings: NodeSettings = serde_json::from_value(json!({
        "name": "chunks",
        "maxTopics": "2",
        "maxMessagesPerTopic": "3",
        "maxDelay": "-5"
    }))
    .unwrap();
    let clock = MockClock::new(Instant::now());
    let sink = CollectingSink::new();
    let mut node = Batcher::from_settings(&settings, Arc::new(clock), sink.clone());

    assert_eq!(node.config().max_delay(), Some(Duration::ZERO));

    node.handle(Message::new("a", 1));
    assert_eq!(node.fire_due_timers(), 1);
    assert_eq!(sink.messages(), vec![Message::new("a", json!([1]))]);
}

#[test]
fn test_metrics_track_lifecycle() {
    let config = BatcherConfig::new()
        .with_max_topics(2)
        .with_max_messages_per_topic(2)
        .without_max_delay();
    let (mut node, _, _) = batcher(config);

    node.handle(Message::new("a", 1));
    node.handle(Message::new("b", 1));
    node.handle(Message::new("c", 1));
    node.handle(Message::new("c", 2));
    node.handle(Message::flush(None));

    let snapshot = node.metrics().snapshot();
    assert_eq!(snapshot.messages_received, 4);
    assert_eq!(snapshot.topics_evicted, 1);
    assert_eq!(snapshot.topics_flushed, 3);
    assert_eq!(snapshot.messages_emitted, 3);
    assert_eq!(node.live_topics(), 0);
}

#[test]
fn test_unbounded_delay_batches_until_full() {
    let config = BatcherConfig::new()
        .with_max_topics(2)
        .with_max_messages_per_topic(2)
        .with_max_delay(Duration::MAX);
    let (mut node, sink, clock) = batcher(config);

    node.handle(Message::new("a", 1));
    assert_eq!(node.live_topics(), 1);
    assert_eq!(node.next_deadline(), None);

    clock.advance(Duration::from_secs(86_400));
    assert_eq!(node.fire_due_timers(), 0);
    assert_eq!(sink.count(), 0);

    node.handle(Message::new("a", 2));
    assert_eq!(sink.payloads(), vec![json!([1, 2])]);
}
