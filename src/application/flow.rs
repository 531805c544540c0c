//! Shared key lifecycle for all flow policies.
//!
//! [`FlowCore`] owns one node's registry, timer queue, output sink and
//! metrics, and implements the parts of the lifecycle every policy shares:
//! admitting a topic, arming its timer, evicting the oldest topic when over
//! capacity, and tearing a topic down on flush. Policies differ only in what
//! they buffer and when they decide to flush.

use crate::application::metrics::FlowMetrics;
use crate::application::ports::{Clock, OutputSink};
use crate::application::registry::KeyRegistry;
use crate::application::timer::{FiredTimer, TimerGuard, TimerId, TimerQueue};
use crate::domain::message::Message;
use crate::domain::topic::TopicKey;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace, Span};

/// Buffered per-topic state that can be released as output.
pub trait Buffered {
    /// Messages emitted when the topic is flushed, in emission order.
    fn into_messages(self, key: &TopicKey) -> Vec<Message>;
}

/// Registry, timers and sink of one node instance.
pub struct FlowCore<E, S> {
    registry: KeyRegistry<E>,
    timers: TimerQueue,
    clock: Arc<dyn Clock>,
    sink: S,
    metrics: FlowMetrics,
    name: Arc<str>,
}

impl<E, S> std::fmt::Debug for FlowCore<E, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowCore")
            .field("name", &self.name)
            .field("live_topics", &self.registry.len())
            .field("max_topics", &self.registry.capacity())
            .field("pending_timers", &self.timers.len())
            .finish()
    }
}

impl<E, S> FlowCore<E, S>
where
    E: Buffered,
    S: OutputSink,
{
    /// Create a core tracking at most `max_topics` topics.
    pub fn new(max_topics: usize, clock: Arc<dyn Clock>, sink: S) -> Self {
        Self {
            registry: KeyRegistry::new(max_topics),
            timers: TimerQueue::new(),
            clock,
            sink,
            metrics: FlowMetrics::new(),
            name: Arc::from(""),
        }
    }

    /// Set the node name used in log spans.
    pub fn set_name(&mut self, name: &str) {
        self.name = Arc::from(name);
    }

    /// Node name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Span that node activity is logged under.
    pub fn span(&self) -> Span {
        tracing::debug_span!("flow_node", node = %self.name)
    }

    /// Current time according to the node clock.
    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    /// The topic registry.
    pub fn registry(&self) -> &KeyRegistry<E> {
        &self.registry
    }

    /// Metrics shared with the host.
    pub fn metrics(&self) -> &FlowMetrics {
        &self.metrics
    }

    /// Buffered state of a live topic.
    pub fn entry(&self, key: &TopicKey) -> Option<&E> {
        self.registry.get(key.as_str()).map(|slot| slot.value())
    }

    /// Mutable buffered state of a live topic.
    pub fn entry_mut(&mut self, key: &TopicKey) -> Option<&mut E> {
        self.registry.get_mut(key.as_str()).map(|slot| slot.value_mut())
    }

    /// Create the entry for `key` if it is not live.
    ///
    /// Returns true if a new entry was created. The caller arms timers and
    /// then calls [`enforce_capacity`](Self::enforce_capacity).
    pub fn admit(&mut self, key: &TopicKey, make: impl FnOnce() -> E) -> bool {
        if self.registry.contains(key.as_str()) {
            return false;
        }
        self.registry.insert(key.clone(), make()).is_ok()
    }

    /// Arm a one-shot timer `delay` from now for the live entry of `key`,
    /// replacing any timer already armed for it.
    ///
    /// A delay too large to represent as a deadline never fires: the topic
    /// is left without a timer and is released only by flush or eviction.
    pub fn arm(&mut self, key: &TopicKey, delay: Duration) -> Option<TimerId> {
        match self.now().checked_add(delay) {
            Some(deadline) => self.arm_at(key, deadline),
            None => {
                trace!(topic = %key, ?delay, "delay out of range, timer not armed");
                self.disarm(key);
                None
            }
        }
    }

    /// Cancel the timer of a live topic, if it has one.
    pub fn disarm(&mut self, key: &TopicKey) -> bool {
        let Some(slot) = self.registry.get_mut(key.as_str()) else {
            return false;
        };
        match slot.replace_timer(None) {
            Some(timer) => self.timers.cancel(timer),
            None => false,
        }
    }

    /// Arm a timer at an absolute deadline, replacing any existing one.
    ///
    /// Returns `None` if the topic is not live.
    pub fn arm_at(&mut self, key: &TopicKey, deadline: Instant) -> Option<TimerId> {
        let slot = self.registry.get_mut(key.as_str())?;
        let guard = TimerGuard::new(key.clone(), slot.generation());
        let id = self.timers.schedule(deadline, guard);
        if let Some(previous) = slot.replace_timer(Some(id)) {
            self.timers.cancel(previous);
        }
        Some(id)
    }

    /// Flush the oldest topics until the registry is within capacity.
    ///
    /// Returns the number of evicted topics.
    pub fn enforce_capacity(&mut self) -> usize {
        let mut evicted = 0;
        while self.registry.is_over_capacity() {
            let Some(oldest) = self.registry.oldest_key().cloned() else {
                break;
            };
            debug!(
                topic = %oldest,
                live_topics = self.registry.len(),
                max_topics = self.registry.capacity(),
                "evicting oldest topic"
            );
            self.metrics.record_eviction();
            self.flush(&oldest);
            evicted += 1;
        }
        evicted
    }

    /// Tear down a topic and emit its buffered output.
    ///
    /// The topic is unlinked and its timer cancelled before anything is
    /// emitted. Flushing a topic that is not live is a no-op.
    pub fn flush(&mut self, key: &TopicKey) -> bool {
        let Some(mut slot) = self.registry.remove(key.as_str()) else {
            return false;
        };
        if let Some(timer) = slot.replace_timer(None) {
            self.timers.cancel(timer);
        }
        self.metrics.record_flush();

        let messages = slot.into_value().into_messages(key);
        debug!(topic = %key, messages = messages.len(), "flushing topic");
        for message in messages {
            self.emit(message);
        }
        true
    }

    /// Flush every live topic, oldest first.
    ///
    /// Returns the number of flushed topics.
    pub fn flush_all(&mut self) -> usize {
        let mut flushed = 0;
        while let Some(oldest) = self.registry.oldest_key().cloned() {
            self.flush(&oldest);
            flushed += 1;
        }
        flushed
    }

    /// Hand a message to the output sink.
    pub fn emit(&self, message: Message) {
        self.metrics.record_emitted();
        self.sink.send(message);
    }

    /// Pop the next due timer whose entry is still live.
    ///
    /// Timers whose entry was flushed or replaced since they were armed are
    /// discarded here. The returned timer is no longer attached to its
    /// entry, so flushing the entry will not try to cancel it.
    pub fn next_due(&mut self, now: Instant) -> Option<FiredTimer> {
        while let Some(fired) = self.timers.pop_due(now) {
            let Some(slot) = self.registry.get_mut(fired.guard.key().as_str()) else {
                self.record_stale(&fired);
                continue;
            };
            if slot.generation() != fired.guard.generation() {
                self.record_stale(&fired);
                continue;
            }
            if slot.timer() == Some(fired.id) {
                slot.replace_timer(None);
            }
            return Some(fired);
        }
        None
    }

    fn record_stale(&self, fired: &FiredTimer) {
        trace!(
            topic = %fired.guard.key(),
            generation = %fired.guard.generation(),
            "ignoring timer for replaced topic"
        );
        self.metrics.record_stale_timer();
    }

    /// Deadline of the earliest pending timer.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    /// Number of pending timers.
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Drain every topic and drop all timers.
    pub fn close(&mut self) -> usize {
        let flushed = self.flush_all();
        self.timers.clear();
        flushed
    }

    #[cfg(test)]
    pub(crate) fn schedule_raw(&mut self, deadline: Instant, guard: TimerGuard) -> TimerId {
        self.timers.schedule(deadline, guard)
    }
}
