//! Trickle rate limiting policy.
//!
//! The first message of a topic passes straight through and starts a
//! periodic tick. Messages arriving while the topic is live queue up and one
//! is released per tick; a tick that finds the queue empty retires the topic,
//! so the next message passes straight through again.
//!
//! When a backlog is full, the overflow policy decides:
//! - **drop**: the new message is discarded
//! - **burst**: the whole backlog is released at once and the new message
//!   starts a fresh topic
//!
//! # Example
//!
//! ```
//! use topic_throttle::{FlowNode, Message, RateLimitConfig, RateLimiter, SystemClock};
//! use std::sync::{Arc, Mutex};
//! use std::time::Duration;
//!
//! let out = Arc::new(Mutex::new(Vec::new()));
//! let sink = {
//!     let out = Arc::clone(&out);
//!     topic_throttle::FnSink::new(move |m: Message| out.lock().unwrap().push(m))
//! };
//! let config = RateLimitConfig::new()
//!     .with_max_topics(10)
//!     .with_max_messages_per_topic(5)
//!     .with_interval(Duration::from_secs(1));
//! let mut limiter = RateLimiter::new(config, Arc::new(SystemClock::new()), sink);
//!
//! limiter.handle(Message::new("sensor", 1));
//! limiter.handle(Message::new("sensor", 2));
//!
//! // First message passes, the second waits for the next tick
//! assert_eq!(out.lock().unwrap().len(), 1);
//! ```

use crate::application::flow::{Buffered, FlowCore};
use crate::application::node::FlowNode;
use crate::application::ports::{Clock, OutputSink};
use crate::application::timer::FiredTimer;
use crate::domain::config::RateLimitConfig;
use crate::domain::message::Message;
use crate::domain::settings::NodeSettings;
use crate::domain::topic::TopicKey;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, trace};

/// Messages waiting for a tick, oldest first.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Backlog {
    queue: VecDeque<Message>,
}

impl Backlog {
    /// Number of queued messages.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Check if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Queued messages, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.queue.iter()
    }
}

impl Buffered for Backlog {
    fn into_messages(self, _key: &TopicKey) -> Vec<Message> {
        self.queue.into()
    }
}

/// Trickle rate limiting node.
pub struct RateLimiter<S: OutputSink> {
    core: FlowCore<Backlog, S>,
    config: RateLimitConfig,
}

impl<S: OutputSink> std::fmt::Debug for RateLimiter<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("core", &self.core)
            .field("config", &self.config)
            .finish()
    }
}

impl<S: OutputSink> RateLimiter<S> {
    /// Create a rate limiter.
    pub fn new(config: RateLimitConfig, clock: Arc<dyn Clock>, sink: S) -> Self {
        Self {
            core: FlowCore::new(config.max_topics(), clock, sink),
            config,
        }
    }

    /// Create a rate limiter from host settings.
    pub fn from_settings(settings: &NodeSettings, clock: Arc<dyn Clock>, sink: S) -> Self {
        let mut limiter = Self::new(settings.rate_limit_config(), clock, sink);
        if let Some(name) = &settings.name {
            limiter.core.set_name(name);
        }
        limiter
    }

    /// Set the node name used in log spans.
    pub fn with_name(mut self, name: &str) -> Self {
        self.core.set_name(name);
        self
    }

    /// The active configuration.
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Backlog of a live topic.
    pub fn backlog(&self, key: &TopicKey) -> Option<&Backlog> {
        self.core.entry(key)
    }

    /// Start a topic: pass the message through and begin ticking.
    fn open(&mut self, key: TopicKey, message: Message) {
        self.core.admit(&key, Backlog::default);
        self.core.enforce_capacity();
        self.core.emit(message);
        self.core.arm(&key, self.config.interval());
    }
}

impl<S: OutputSink> FlowNode for RateLimiter<S> {
    type Entry = Backlog;
    type Sink = S;

    fn core(&self) -> &FlowCore<Backlog, S> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut FlowCore<Backlog, S> {
        &mut self.core
    }

    fn on_data(&mut self, key: TopicKey, message: Message) {
        let max = self.config.max_messages_per_topic();
        let Some(queued) = self.core.entry(&key).map(Backlog::len) else {
            self.open(key, message);
            return;
        };
        if queued < max {
            if let Some(backlog) = self.core.entry_mut(&key) {
                backlog.queue.push_back(message);
            }
            return;
        }

        if self.config.drop_overflow_messages() {
            debug!(topic = %key, backlog = max, "backlog full, dropping message");
            self.core.metrics().record_dropped();
            return;
        }

        debug!(topic = %key, backlog = max, "backlog full, releasing burst");
        self.core.flush(&key);
        self.open(key, message);
    }

    fn on_timer(&mut self, timer: FiredTimer) {
        let key = timer.guard.key();
        let next = self
            .core
            .entry_mut(key)
            .and_then(|backlog| backlog.queue.pop_front());

        let Some(message) = next else {
            trace!(topic = %key, "backlog empty, retiring topic");
            self.core.flush(key);
            return;
        };
        trace!(topic = %key, "releasing queued message");
        self.core.emit(message);

        // Fixed cadence from the previous deadline, without catching up
        // after a late wakeup.
        let interval = self.config.interval();
        let now = self.core.now();
        match timer.deadline.checked_add(interval) {
            Some(deadline) if deadline > now || interval.is_zero() => {
                self.core.arm_at(key, deadline);
            }
            _ => {
                self.core.arm(key, interval);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::mocks::{CollectingSink, MockClock};
    use serde_json::json;
    use std::time::{Duration, Instant};

    fn limiter(config: RateLimitConfig) -> (RateLimiter<CollectingSink>, CollectingSink, MockClock) {
        let clock = MockClock::new(Instant::now());
        let sink = CollectingSink::new();
        let node = RateLimiter::new(config, Arc::new(clock.clone()), sink.clone());
        (node, sink, clock)
    }

    fn config(max_messages: usize, interval_ms: u64, drop: bool) -> RateLimitConfig {
        RateLimitConfig::new()
            .with_max_topics(5)
            .with_max_messages_per_topic(max_messages)
            .with_interval(Duration::from_millis(interval_ms))
            .with_drop_overflow_messages(drop)
    }

    #[test]
    fn test_first_message_passes_immediately() {
        let (mut node, sink, _) = limiter(config(5, 100, false));
        node.handle(Message::new("a", 1));
        assert_eq!(sink.messages(), vec![Message::new("a", 1)]);
        assert_eq!(node.backlog(&"a".into()).map(Backlog::len), Some(0));
        assert!(node.next_deadline().is_some());
    }

    #[test]
    fn test_trickles_one_per_tick() {
        let (mut node, sink, clock) = limiter(config(5, 100, false));
        for i in 1..=3 {
            node.handle(Message::new("a", i));
        }
        assert_eq!(sink.payloads(), vec![json!(1)]);

        clock.advance(Duration::from_millis(100));
        assert_eq!(node.fire_due_timers(), 1);
        assert_eq!(sink.payloads(), vec![json!(1), json!(2)]);

        clock.advance(Duration::from_millis(100));
        node.fire_due_timers();
        assert_eq!(sink.payloads(), vec![json!(1), json!(2), json!(3)]);

        // The empty tick retires the topic.
        clock.advance(Duration::from_millis(100));
        node.fire_due_timers();
        assert_eq!(node.live_topics(), 0);
        assert_eq!(node.next_deadline(), None);

        node.handle(Message::new("a", 4));
        assert_eq!(sink.count(), 4);
    }

    #[test]
    fn test_drop_overflow() {
        let (mut node, sink, clock) = limiter(config(2, 100, true));
        for i in 1..=4 {
            node.handle(Message::new("a", i));
        }
        assert_eq!(node.backlog(&"a".into()).map(Backlog::len), Some(2));
        assert_eq!(node.metrics().messages_dropped(), 1);

        clock.advance(Duration::from_millis(200));
        node.fire_due_timers();
        clock.advance(Duration::from_millis(100));
        node.fire_due_timers();
        assert_eq!(sink.payloads(), vec![json!(1), json!(2), json!(3)]);
    }

    #[test]
    fn test_burst_overflow() {
        let (mut node, sink, _) = limiter(config(2, 100, false));
        for i in 1..=4 {
            node.handle(Message::new("a", i));
        }
        assert_eq!(
            sink.payloads(),
            vec![json!(1), json!(2), json!(3), json!(4)]
        );
        assert_eq!(node.backlog(&"a".into()).map(Backlog::len), Some(0));
        assert_eq!(node.core().pending_timers(), 1);
        assert_eq!(node.metrics().messages_dropped(), 0);
    }

    #[test]
    fn test_zero_backlog_drops_everything_after_first() {
        let (mut node, sink, _) = limiter(config(0, 100, true));
        node.handle(Message::new("a", 1));
        node.handle(Message::new("a", 2));
        node.handle(Message::new("a", 3));
        assert_eq!(sink.payloads(), vec![json!(1)]);
        assert_eq!(node.metrics().messages_dropped(), 2);
    }

    #[test]
    fn test_late_wakeup_does_not_catch_up() {
        let (mut node, sink, clock) = limiter(config(5, 100, false));
        for i in 1..=4 {
            node.handle(Message::new("a", i));
        }
        clock.advance(Duration::from_millis(1_000));
        assert_eq!(node.fire_due_timers(), 1);
        assert_eq!(sink.count(), 2);
        assert_eq!(
            node.next_deadline(),
            Some(clock.now() + Duration::from_millis(100))
        );
    }

    #[test]
    fn test_zero_interval_drains_in_one_poll() {
        let (mut node, sink, _) = limiter(config(5, 0, false));
        for i in 1..=3 {
            node.handle(Message::new("a", i));
        }
        node.fire_due_timers();
        assert_eq!(sink.count(), 3);
        assert_eq!(node.live_topics(), 0);
    }

    #[test]
    fn test_flush_releases_backlog() {
        let (mut node, sink, _) = limiter(config(5, 100, false));
        for i in 1..=3 {
            node.handle(Message::new("a", i));
        }
        node.handle(Message::flush(Some("a")));
        assert_eq!(sink.payloads(), vec![json!(1), json!(2), json!(3)]);
        assert_eq!(node.next_deadline(), None);
    }
}
