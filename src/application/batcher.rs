//! Aggregating batch policy.
//!
//! Payloads are collected per topic and released together as one message
//! `{ topic, payload: [p1, p2, ...] }` when the batch is full, when the
//! batch has been open for `max_delay`, when the topic is evicted to make
//! room, on an explicit flush, or on close.

use crate::application::flow::{Buffered, FlowCore};
use crate::application::node::FlowNode;
use crate::application::ports::{Clock, OutputSink};
use crate::application::timer::FiredTimer;
use crate::domain::config::BatcherConfig;
use crate::domain::message::Message;
use crate::domain::settings::NodeSettings;
use crate::domain::topic::TopicKey;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Payloads collected for one topic, in arrival order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Batch {
    payloads: Vec<Value>,
}

impl Batch {
    /// Payloads collected so far.
    pub fn payloads(&self) -> &[Value] {
        &self.payloads
    }
}

impl Buffered for Batch {
    fn into_messages(self, key: &TopicKey) -> Vec<Message> {
        vec![Message {
            topic: key.to_topic(),
            payload: Some(Value::Array(self.payloads)),
            extra: Map::new(),
        }]
    }
}

/// Batching node.
pub struct Batcher<S: OutputSink> {
    core: FlowCore<Batch, S>,
    config: BatcherConfig,
}

impl<S: OutputSink> std::fmt::Debug for Batcher<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Batcher")
            .field("core", &self.core)
            .field("config", &self.config)
            .finish()
    }
}

impl<S: OutputSink> Batcher<S> {
    /// Create a batcher.
    pub fn new(config: BatcherConfig, clock: Arc<dyn Clock>, sink: S) -> Self {
        Self {
            core: FlowCore::new(config.max_topics(), clock, sink),
            config,
        }
    }

    /// Create a batcher from host settings.
    pub fn from_settings(settings: &NodeSettings, clock: Arc<dyn Clock>, sink: S) -> Self {
        let mut batcher = Self::new(settings.batcher_config(), clock, sink);
        if let Some(name) = &settings.name {
            batcher.core.set_name(name);
        }
        batcher
    }

    /// Set the node name used in log spans.
    pub fn with_name(mut self, name: &str) -> Self {
        self.core.set_name(name);
        self
    }

    /// The active configuration.
    pub fn config(&self) -> &BatcherConfig {
        &self.config
    }

    /// Payloads currently buffered for a topic.
    pub fn batch(&self, key: &TopicKey) -> Option<&[Value]> {
        self.core.entry(key).map(Batch::payloads)
    }
}

impl<S: OutputSink> FlowNode for Batcher<S> {
    type Entry = Batch;
    type Sink = S;

    fn core(&self) -> &FlowCore<Batch, S> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut FlowCore<Batch, S> {
        &mut self.core
    }

    fn on_data(&mut self, key: TopicKey, message: Message) {
        if self.core.admit(&key, Batch::default) {
            // The idle timer is armed once per batch, on its first payload.
            if let Some(delay) = self.config.max_delay() {
                self.core.arm(&key, delay);
            }
            self.core.enforce_capacity();
        }

        let payload = message.payload.unwrap_or(Value::Null);
        let full = match self.core.entry_mut(&key) {
            Some(batch) => {
                batch.payloads.push(payload);
                batch.payloads.len() >= self.config.max_messages_per_topic()
            }
            None => false,
        };
        if full {
            self.core.flush(&key);
        }
    }

    fn on_timer(&mut self, timer: FiredTimer) {
        self.core.flush(timer.guard.key());
    }
}
