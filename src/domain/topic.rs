//! Topic keys for per-topic buffering.
//!
//! A topic key identifies a group of messages. All buffering and flush
//! decisions are scoped per key. The empty key is the "unscoped" group that
//! collects messages which arrive without a topic.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Grouping key for buffered messages.
///
/// Keys are cheap to clone: the registry stores each key several times
/// (map key plus the neighbour links of the insertion chain).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TopicKey(Arc<str>);

impl TopicKey {
    /// Create a key from a topic string.
    pub fn new(topic: impl AsRef<str>) -> Self {
        TopicKey(Arc::from(topic.as_ref()))
    }

    /// The key used for messages that carry no topic.
    pub fn unscoped() -> Self {
        TopicKey(Arc::from(""))
    }

    /// Build the key for an optional wire topic.
    ///
    /// An absent topic and an empty topic map to the same unscoped key.
    pub fn from_topic(topic: Option<&str>) -> Self {
        match topic {
            Some(t) if !t.is_empty() => TopicKey::new(t),
            _ => TopicKey::unscoped(),
        }
    }

    /// Check whether this is the unscoped key.
    pub fn is_unscoped(&self) -> bool {
        self.0.is_empty()
    }

    /// Get the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert back to a wire topic (`None` for the unscoped key).
    pub fn to_topic(&self) -> Option<String> {
        if self.is_unscoped() {
            None
        } else {
            Some(self.0.to_string())
        }
    }
}

impl fmt::Display for TopicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TopicKey {
    fn from(topic: &str) -> Self {
        TopicKey::new(topic)
    }
}

impl From<String> for TopicKey {
    fn from(topic: String) -> Self {
        TopicKey(Arc::from(topic))
    }
}

impl Borrow<str> for TopicKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}
