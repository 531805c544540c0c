//! Per-policy configuration.
//!
//! Configuration never fails: out-of-range values are clamped to the nearest
//! safe value, so a node can always be constructed.

use std::time::Duration;

/// Default number of concurrently tracked topics.
pub const DEFAULT_MAX_TOPICS: usize = 1;

/// Default number of buffered messages per topic.
pub const DEFAULT_MAX_MESSAGES_PER_TOPIC: usize = 1;

/// Configuration for the [`Batcher`](crate::Batcher).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatcherConfig {
    max_topics: usize,
    max_messages_per_topic: usize,
    max_delay: Option<Duration>,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            max_topics: DEFAULT_MAX_TOPICS,
            max_messages_per_topic: DEFAULT_MAX_MESSAGES_PER_TOPIC,
            max_delay: Some(Duration::ZERO),
        }
    }
}

impl BatcherConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of live topics (at least 1).
    pub fn with_max_topics(mut self, max_topics: usize) -> Self {
        self.max_topics = max_topics.max(1);
        self
    }

    /// Set the batch size that triggers a flush (at least 1).
    pub fn with_max_messages_per_topic(mut self, max: usize) -> Self {
        self.max_messages_per_topic = max.max(1);
        self
    }

    /// Set how long a batch may stay open after its first message.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    /// Disable the idle timeout; batches then close only on size, command,
    /// eviction or shutdown.
    pub fn without_max_delay(mut self) -> Self {
        self.max_delay = None;
        self
    }

    /// Maximum number of live topics.
    pub fn max_topics(&self) -> usize {
        self.max_topics
    }

    /// Batch size that triggers a flush.
    pub fn max_messages_per_topic(&self) -> usize {
        self.max_messages_per_topic
    }

    /// Idle timeout, if enabled.
    pub fn max_delay(&self) -> Option<Duration> {
        self.max_delay
    }
}

/// Configuration for the [`Debouncer`](crate::Debouncer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebouncerConfig {
    max_topics: usize,
    interval: Duration,
}

impl Default for DebouncerConfig {
    fn default() -> Self {
        Self {
            max_topics: DEFAULT_MAX_TOPICS,
            interval: Duration::ZERO,
        }
    }
}

impl DebouncerConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of live topics (at least 1).
    pub fn with_max_topics(mut self, max_topics: usize) -> Self {
        self.max_topics = max_topics.max(1);
        self
    }

    /// Set the quiet period after which the latest message is released.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Maximum number of live topics.
    pub fn max_topics(&self) -> usize {
        self.max_topics
    }

    /// Quiet period.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

/// Configuration for the trickle [`RateLimiter`](crate::RateLimiter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    max_topics: usize,
    max_messages_per_topic: usize,
    interval: Duration,
    drop_overflow_messages: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_topics: DEFAULT_MAX_TOPICS,
            max_messages_per_topic: DEFAULT_MAX_MESSAGES_PER_TOPIC,
            interval: Duration::ZERO,
            drop_overflow_messages: false,
        }
    }
}

impl RateLimitConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of live topics (at least 1).
    pub fn with_max_topics(mut self, max_topics: usize) -> Self {
        self.max_topics = max_topics.max(1);
        self
    }

    /// Set the backlog size per topic. Zero is allowed: every message after
    /// the first then overflows.
    pub fn with_max_messages_per_topic(mut self, max: usize) -> Self {
        self.max_messages_per_topic = max;
        self
    }

    /// Set the release cadence.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Drop overflowing messages instead of bursting the backlog.
    pub fn with_drop_overflow_messages(mut self, drop: bool) -> Self {
        self.drop_overflow_messages = drop;
        self
    }

    /// Maximum number of live topics.
    pub fn max_topics(&self) -> usize {
        self.max_topics
    }

    /// Backlog size per topic.
    pub fn max_messages_per_topic(&self) -> usize {
        self.max_messages_per_topic
    }

    /// Release cadence.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether overflow drops the new message.
    pub fn drop_overflow_messages(&self) -> bool {
        self.drop_overflow_messages
    }
}
