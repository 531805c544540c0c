//! Observability metrics for flow control nodes.
//!
//! Provides counters about buffering behaviour for monitoring and debugging.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Metrics tracking flow control statistics.
///
/// All metrics use atomic operations for thread-safe updates and reads.
/// Clones share the same counters, so a host can keep a handle while the
/// node is owned by a runtime.
#[derive(Debug, Clone)]
pub struct FlowMetrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    /// Data messages accepted
    messages_received: AtomicU64,
    /// Messages handed to the output sink
    messages_emitted: AtomicU64,
    /// Topics torn down by any flush path
    topics_flushed: AtomicU64,
    /// Topics flushed to make room for a new one
    topics_evicted: AtomicU64,
    /// Messages discarded by the overflow policy
    messages_dropped: AtomicU64,
    /// Timers that fired after their entry was gone
    stale_timers: AtomicU64,
    /// Commands whose payload field was present but falsy
    ambiguous_commands: AtomicU64,
}

impl FlowMetrics {
    /// Create a new metrics tracker.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner::default()),
        }
    }

    pub(crate) fn record_received(&self) {
        self.inner.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_emitted(&self) {
        self.inner.messages_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_flush(&self) {
        self.inner.topics_flushed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_eviction(&self) {
        self.inner.topics_evicted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.inner.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_stale_timer(&self) {
        self.inner.stale_timers.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_ambiguous_command(&self) {
        self.inner.ambiguous_commands.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the number of data messages received.
    pub fn messages_received(&self) -> u64 {
        self.inner.messages_received.load(Ordering::Relaxed)
    }

    /// Get the number of messages emitted.
    pub fn messages_emitted(&self) -> u64 {
        self.inner.messages_emitted.load(Ordering::Relaxed)
    }

    /// Get the number of topic flushes.
    pub fn topics_flushed(&self) -> u64 {
        self.inner.topics_flushed.load(Ordering::Relaxed)
    }

    /// Get the number of capacity evictions.
    pub fn topics_evicted(&self) -> u64 {
        self.inner.topics_evicted.load(Ordering::Relaxed)
    }

    /// Get the number of dropped overflow messages.
    pub fn messages_dropped(&self) -> u64 {
        self.inner.messages_dropped.load(Ordering::Relaxed)
    }

    /// Get the number of suppressed stale timers.
    pub fn stale_timers(&self) -> u64 {
        self.inner.stale_timers.load(Ordering::Relaxed)
    }

    /// Get the number of ambiguous flush commands.
    pub fn ambiguous_commands(&self) -> u64 {
        self.inner.ambiguous_commands.load(Ordering::Relaxed)
    }

    /// Get a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_received: self.messages_received(),
            messages_emitted: self.messages_emitted(),
            topics_flushed: self.topics_flushed(),
            topics_evicted: self.topics_evicted(),
            messages_dropped: self.messages_dropped(),
            stale_timers: self.stale_timers(),
            ambiguous_commands: self.ambiguous_commands(),
        }
    }

    /// Reset all metrics to zero.
    ///
    /// Useful for testing or when starting a new monitoring period.
    pub fn reset(&self) {
        let inner = &self.inner;
        for counter in [
            &inner.messages_received,
            &inner.messages_emitted,
            &inner.topics_flushed,
            &inner.topics_evicted,
            &inner.messages_dropped,
            &inner.stale_timers,
            &inner.ambiguous_commands,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for FlowMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    /// Data messages accepted
    pub messages_received: u64,
    /// Messages handed to the output sink
    pub messages_emitted: u64,
    /// Topics torn down by any flush path
    pub topics_flushed: u64,
    /// Topics flushed to make room for a new one
    pub topics_evicted: u64,
    /// Messages discarded by the overflow policy
    pub messages_dropped: u64,
    /// Timers that fired after their entry was gone
    pub stale_timers: u64,
    /// Commands whose payload field was present but falsy
    pub ambiguous_commands: u64,
}

impl MetricsSnapshot {
    /// Fraction of received messages that were dropped (0.0 to 1.0).
    ///
    /// Returns 0.0 if no messages have been received.
    pub fn drop_rate(&self) -> f64 {
        if self.messages_received == 0 {
            0.0
        } else {
            self.messages_dropped as f64 / self.messages_received as f64
        }
    }
}
