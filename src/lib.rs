//! # topic-throttle
//!
//! Topic-keyed message flow control: batching, debouncing and rate-limited
//! trickle with a bounded number of tracked topics.
//!
//! Every node groups incoming messages by `topic`, keeps at most `max_topics`
//! topics live at a time, and evicts the oldest topic (flushing its buffered
//! output, never dropping it silently) when a new one arrives at capacity.
//!
//! ## Quick Start
//!
//! ```rust
//! use topic_throttle::{Batcher, BatcherConfig, FlowNode, Message, SystemClock};
//! use topic_throttle::FnSink;
//! use std::sync::{Arc, Mutex};
//! use std::time::Duration;
//!
//! let out = Arc::new(Mutex::new(Vec::new()));
//! let sink = {
//!     let out = Arc::clone(&out);
//!     FnSink::new(move |m: Message| out.lock().unwrap().push(m))
//! };
//!
//! let config = BatcherConfig::new()
//!     .with_max_topics(100)
//!     .with_max_messages_per_topic(3)
//!     .with_max_delay(Duration::from_secs(1));
//! let mut batcher = Batcher::new(config, Arc::new(SystemClock::new()), sink);
//!
//! for i in 1..=3 {
//!     batcher.handle(Message::new("orders", i));
//! }
//!
//! // {"topic":"orders","payload":[1,2,3]}
//! assert_eq!(out.lock().unwrap().len(), 1);
//! ```
//!
//! ## Policies
//!
//! - **[`Batcher`]**: collects payloads per topic and emits them as one array
//!   when the batch is full, after `max_delay`, on flush, eviction or close.
//! - **[`Debouncer`]**: emits only the latest message of a topic once the
//!   topic has been quiet for `interval`.
//! - **[`RateLimiter`]**: passes the first message through, then releases the
//!   backlog one message per `interval`; a full backlog either drops new
//!   messages or bursts.
//!
//! ## Commands
//!
//! A message without a payload is a command: with a topic it flushes that
//! topic, without one it flushes every topic. The host treats falsy payloads
//! (`0`, `false`, `""`) the same way; such messages are logged at `warn`
//! level and counted in [`FlowMetrics::ambiguous_commands`]. Use
//! [`Input::data`] with [`FlowNode::handle_input`] to buffer falsy payloads.
//!
//! ## Timers
//!
//! Nodes never spawn anything on their own. A synchronous host calls
//! [`FlowNode::fire_due_timers`] at [`FlowNode::next_deadline`]. With the
//! `async` feature, [`NodeRuntime`] does this from a tokio task.
//!
//! ## Shutdown
//!
//! [`FlowNode::close`] flushes every live topic before returning and leaves
//! no timer behind. [`NodeRuntime::shutdown`] stops the driver first and then
//! closes the node.
//!
//! ## Configuration from host settings
//!
//! ```rust
//! use topic_throttle::{FnSink, Message, NodeSettings, RateLimiter, SystemClock};
//! use std::sync::Arc;
//!
//! let settings = NodeSettings::from_json(
//!     r#"{"maxTopics":"10","maxMessagesPerTopic":"5","interval":"250","dropOverflowMessages":true}"#,
//! ).unwrap();
//! let limiter = RateLimiter::from_settings(
//!     &settings,
//!     Arc::new(SystemClock::new()),
//!     FnSink::new(|_: Message| {}),
//! );
//! assert_eq!(limiter.config().max_messages_per_topic(), 5);
//! ```

// Domain layer - pure business logic
pub mod domain;

// Application layer - orchestration
pub mod application;

// Infrastructure layer - external adapters
pub mod infrastructure;

// Re-export commonly used types for convenience
pub use domain::{
    config::{BatcherConfig, DebouncerConfig, RateLimitConfig},
    message::{Input, Message},
    settings::{NodeSettings, SettingsError},
    topic::TopicKey,
};

pub use application::{
    batcher::{Batch, Batcher},
    debouncer::{Debouncer, Pending},
    flow::{Buffered, FlowCore},
    limiter::{Backlog, RateLimiter},
    metrics::{FlowMetrics, MetricsSnapshot},
    node::FlowNode,
    ports::{Clock, OutputSink},
    registry::{Generation, KeyRegistry, RegistryError},
    timer::{FiredTimer, TimerGuard, TimerId, TimerQueue},
};

pub use infrastructure::{clock::SystemClock, sink::FnSink};

#[cfg(feature = "async")]
pub use infrastructure::{
    clock::TokioClock,
    runtime::{NodeRuntime, ShutdownError},
    sink::ChannelSink,
};
