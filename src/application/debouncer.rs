//! Trailing-edge debounce policy.
//!
//! Each topic keeps only its most recent message. The message is released
//! once the topic has been quiet for `interval`; every new message restarts
//! the wait.

use crate::application::flow::{Buffered, FlowCore};
use crate::application::node::FlowNode;
use crate::application::ports::{Clock, OutputSink};
use crate::application::timer::FiredTimer;
use crate::domain::config::DebouncerConfig;
use crate::domain::message::Message;
use crate::domain::settings::NodeSettings;
use crate::domain::topic::TopicKey;
use std::sync::Arc;

/// The latest message seen for a topic.
#[derive(Debug, Clone, PartialEq)]
pub struct Pending {
    latest: Message,
}

impl Pending {
    /// The message that will be released.
    pub fn latest(&self) -> &Message {
        &self.latest
    }
}

impl Buffered for Pending {
    fn into_messages(self, _key: &TopicKey) -> Vec<Message> {
        vec![self.latest]
    }
}

/// Debouncing node.
pub struct Debouncer<S: OutputSink> {
    core: FlowCore<Pending, S>,
    config: DebouncerConfig,
}

impl<S: OutputSink> std::fmt::Debug for Debouncer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("core", &self.core)
            .field("config", &self.config)
            .finish()
    }
}

impl<S: OutputSink> Debouncer<S> {
    /// Create a debouncer.
    pub fn new(config: DebouncerConfig, clock: Arc<dyn Clock>, sink: S) -> Self {
        Self {
            core: FlowCore::new(config.max_topics(), clock, sink),
            config,
        }
    }

    /// Create a debouncer from host settings.
    pub fn from_settings(settings: &NodeSettings, clock: Arc<dyn Clock>, sink: S) -> Self {
        let mut debouncer = Self::new(settings.debouncer_config(), clock, sink);
        if let Some(name) = &settings.name {
            debouncer.core.set_name(name);
        }
        debouncer
    }

    /// Set the node name used in log spans.
    pub fn with_name(mut self, name: &str) -> Self {
        self.core.set_name(name);
        self
    }

    /// The active configuration.
    pub fn config(&self) -> &DebouncerConfig {
        &self.config
    }

    /// Message currently held back for a topic.
    pub fn pending(&self, key: &TopicKey) -> Option<&Message> {
        self.core.entry(key).map(Pending::latest)
    }
}

impl<S: OutputSink> FlowNode for Debouncer<S> {
    type Entry = Pending;
    type Sink = S;

    fn core(&self) -> &FlowCore<Pending, S> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut FlowCore<Pending, S> {
        &mut self.core
    }

    fn on_data(&mut self, key: TopicKey, message: Message) {
        let mut message = Some(message);
        let created = self.core.admit(&key, || Pending {
            latest: message.take().unwrap_or_default(),
        });
        if created {
            self.core.enforce_capacity();
        }
        if let Some(message) = message {
            if let Some(pending) = self.core.entry_mut(&key) {
                pending.latest = message;
            }
        }
        self.core.arm(&key, self.config.interval());
    }

    fn on_timer(&mut self, timer: FiredTimer) {
        self.core.flush(timer.guard.key());
    }
}
