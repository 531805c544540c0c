//! Capturing output sink for testing.

use crate::application::ports::OutputSink;
use crate::domain::message::Message;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Sink that records every emitted message.
///
/// Clones share the same buffer: hand one clone to the node and inspect
/// another.
#[derive(Debug, Clone, Default)]
pub struct CollectingSink {
    messages: Arc<Mutex<Vec<Message>>>,
}

impl CollectingSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    fn buffer(&self) -> MutexGuard<'_, Vec<Message>> {
        self.messages.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// All messages emitted so far, in emission order.
    pub fn messages(&self) -> Vec<Message> {
        self.buffer().clone()
    }

    /// Payloads of all emitted messages (`null` where absent).
    pub fn payloads(&self) -> Vec<Value> {
        self.buffer()
            .iter()
            .map(|m| m.payload.clone().unwrap_or(Value::Null))
            .collect()
    }

    /// Number of messages emitted so far.
    pub fn count(&self) -> usize {
        self.buffer().len()
    }

    /// Take all messages, leaving the sink empty.
    pub fn take(&self) -> Vec<Message> {
        std::mem::take(&mut *self.buffer())
    }

    /// Discard all recorded messages.
    pub fn clear(&self) {
        self.buffer().clear();
    }
}

impl OutputSink for CollectingSink {
    fn send(&self, message: Message) {
        self.buffer().push(message);
    }
}
