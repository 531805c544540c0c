//! The node contract shared by every flow policy.
//!
//! A node receives input events one at a time, fires its timers when asked,
//! and drains synchronously on close. Policies only provide the two policy
//! specific transitions (`on_data` and `on_timer`); command handling,
//! timer dispatch and draining are common.

use crate::application::flow::{Buffered, FlowCore};
use crate::application::metrics::FlowMetrics;
use crate::application::ports::OutputSink;
use crate::application::timer::FiredTimer;
use crate::domain::message::{Input, Message};
use crate::domain::topic::TopicKey;
use std::time::Instant;
use tracing::{info, warn};

/// A flow control node: one policy over one independent registry.
pub trait FlowNode: Send {
    /// Per-topic buffered state.
    type Entry: Buffered;
    /// Where output goes.
    type Sink: OutputSink;

    /// Shared lifecycle state.
    fn core(&self) -> &FlowCore<Self::Entry, Self::Sink>;

    /// Shared lifecycle state, mutably.
    fn core_mut(&mut self) -> &mut FlowCore<Self::Entry, Self::Sink>;

    /// Handle a data message for `key`.
    fn on_data(&mut self, key: TopicKey, message: Message);

    /// Handle a due timer whose entry is still live.
    fn on_timer(&mut self, timer: FiredTimer);

    /// Handle one wire message from the host.
    ///
    /// Messages whose payload is present but falsy are treated as flush
    /// commands, as the host does, and reported as ambiguous.
    fn handle(&mut self, message: Message) {
        if message.has_ambiguous_payload() {
            let span = self.core().span();
            let _enter = span.enter();
            warn!(
                topic = ?message.topic,
                payload = ?message.payload,
                "falsy payload treated as flush command"
            );
            self.core().metrics().record_ambiguous_command();
        }
        self.handle_input(Input::from(message));
    }

    /// Handle one decoded input event.
    fn handle_input(&mut self, input: Input) {
        let span = self.core().span();
        let _enter = span.enter();
        match input {
            Input::Data { key, message } => {
                self.core().metrics().record_received();
                self.on_data(key, message);
            }
            Input::FlushKey(key) => {
                self.flush_topic(&key);
            }
            Input::FlushAll => {
                self.flush_all();
            }
        }
    }

    /// Fire every timer that is due now.
    ///
    /// Returns the number of timers that acted on a live topic.
    fn fire_due_timers(&mut self) -> usize {
        let span = self.core().span();
        let _enter = span.enter();
        let now = self.core().now();
        let mut fired = 0;
        while let Some(timer) = self.core_mut().next_due(now) {
            self.on_timer(timer);
            fired += 1;
        }
        fired
    }

    /// When `fire_due_timers` should next be called.
    fn next_deadline(&self) -> Option<Instant> {
        self.core().next_deadline()
    }

    /// Flush one topic. Returns false if it was not live.
    fn flush_topic(&mut self, key: &TopicKey) -> bool {
        self.core_mut().flush(key)
    }

    /// Flush every live topic. Returns how many were flushed.
    fn flush_all(&mut self) -> usize {
        self.core_mut().flush_all()
    }

    /// Drain everything synchronously; no timer survives this call.
    fn close(&mut self) -> usize {
        let span = self.core().span();
        let _enter = span.enter();
        let drained = self.core_mut().close();
        info!(drained_topics = drained, "node closed");
        drained
    }

    /// Number of live topics.
    fn live_topics(&self) -> usize {
        self.core().registry().len()
    }

    /// Node metrics.
    fn metrics(&self) -> &FlowMetrics {
        self.core().metrics()
    }
}
