//! Wire messages and the tagged input they decode into.
//!
//! The host delivers `{ topic?, payload?, ... }` objects. A message with a
//! present payload is data; a message without one is a flush command, scoped
//! to its topic when it has one and to every topic otherwise. [`Input`] keeps
//! that decision explicit so the key of a data message is never confused with
//! a command marker.

use crate::domain::topic::TopicKey;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A message as exchanged with the hosting runtime.
///
/// Fields other than `topic` and `payload` are preserved in `extra`, so
/// policies that forward original messages re-emit them unmodified.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Message {
    /// Grouping topic (absent or empty means unscoped)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// Message body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    /// Any other fields the host attached
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Message {
    /// Create a message with a topic and payload.
    pub fn new(topic: impl Into<String>, payload: impl Into<Value>) -> Self {
        Self {
            topic: Some(topic.into()),
            payload: Some(payload.into()),
            extra: Map::new(),
        }
    }

    /// Create a message without a topic.
    pub fn unscoped(payload: impl Into<Value>) -> Self {
        Self {
            topic: None,
            payload: Some(payload.into()),
            extra: Map::new(),
        }
    }

    /// A payload-less message: flushes `topic`, or everything when `None`.
    pub fn flush(topic: Option<&str>) -> Self {
        Self {
            topic: topic.map(str::to_string),
            payload: None,
            extra: Map::new(),
        }
    }

    /// Attach an extra field.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }

    /// The grouping key for this message.
    pub fn key(&self) -> TopicKey {
        TopicKey::from_topic(self.topic.as_deref())
    }

    /// Whether the payload counts as present under the host's rules.
    ///
    /// Absent, `null`, `false`, numeric zero and the empty string all count
    /// as "no payload".
    pub fn has_payload(&self) -> bool {
        self.payload.as_ref().is_some_and(is_truthy)
    }

    /// Whether the message carries a payload value that is nonetheless
    /// treated as a command (e.g. `0`, `false` or `""`).
    ///
    /// Such messages cannot be told apart from flush commands on the wire.
    pub fn has_ambiguous_payload(&self) -> bool {
        matches!(&self.payload, Some(v) if !v.is_null() && !is_truthy(v))
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// A decoded input event.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    /// A data message to buffer under `key`
    Data {
        /// Grouping key
        key: TopicKey,
        /// The original message
        message: Message,
    },
    /// Flush one key
    FlushKey(TopicKey),
    /// Flush every live key
    FlushAll,
}

impl Input {
    /// Data input for an explicit key, regardless of payload truthiness.
    pub fn data(key: impl Into<TopicKey>, message: Message) -> Self {
        Input::Data {
            key: key.into(),
            message,
        }
    }

    /// Check whether this input is a command rather than data.
    pub fn is_command(&self) -> bool {
        !matches!(self, Input::Data { .. })
    }
}

impl From<Message> for Input {
    fn from(message: Message) -> Self {
        let key = message.key();
        if message.has_payload() {
            Input::Data { key, message }
        } else if key.is_unscoped() {
            Input::FlushAll
        } else {
            Input::FlushKey(key)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_data_message() {
        let input = Input::from(Message::new("a", 1));
        match input {
            Input::Data { key, message } => {
                assert_eq!(key, TopicKey::from("a"));
                assert_eq!(message.payload, Some(json!(1)));
            }
            other => panic!("expected data, got {:?}", other),
        }
    }

    #[test]
    fn test_flush_commands() {
        assert_eq!(
            Input::from(Message::flush(Some("a"))),
            Input::FlushKey(TopicKey::from("a"))
        );
        assert_eq!(Input::from(Message::flush(None)), Input::FlushAll);
        assert_eq!(Input::from(Message::flush(Some(""))), Input::FlushAll);
    }

    #[test]
    fn test_unscoped_data_is_not_a_command() {
        let input = Input::from(Message::unscoped("hello"));
        assert!(!input.is_command());
        assert!(matches!(input, Input::Data { key, .. } if key.is_unscoped()));
    }

    #[test]
    fn test_falsy_payloads_are_commands() {
        for payload in [json!(0), json!(false), json!(""), json!(0.0)] {
            let msg = Message::new("a", payload.clone());
            assert!(!msg.has_payload(), "{} should not count", payload);
            assert!(msg.has_ambiguous_payload());
            assert_eq!(Input::from(msg), Input::FlushKey(TopicKey::from("a")));
        }
    }

    #[test]
    fn test_null_and_absent_are_not_ambiguous() {
        let mut msg = Message::flush(Some("a"));
        assert!(!msg.has_ambiguous_payload());
        msg.payload = Some(Value::Null);
        assert!(!msg.has_ambiguous_payload());
    }

    #[test]
    fn test_truthy_payloads() {
        for payload in [json!(1), json!(true), json!("x"), json!([]), json!({})] {
            assert!(Message::new("a", payload).has_payload());
        }
    }

    #[test]
    fn test_explicit_data_keeps_falsy_payload() {
        let input = Input::data("a", Message::new("a", 0));
        assert!(!input.is_command());
    }

    #[test]
    fn test_wire_format_preserves_extra_fields() {
        let msg: Message =
            serde_json::from_str(r#"{"topic":"t","payload":5,"_msgid":"abc"}"#).unwrap();
        assert_eq!(msg.topic.as_deref(), Some("t"));
        assert_eq!(msg.extra.get("_msgid"), Some(&json!("abc")));

        let back = serde_json::to_value(&msg).unwrap();
        assert_eq!(back, json!({"topic": "t", "payload": 5, "_msgid": "abc"}));
    }

    #[test]
    fn test_wire_format_missing_fields() {
        let msg: Message = serde_json::from_str("{}").unwrap();
        assert_eq!(msg.topic, None);
        assert_eq!(msg.payload, None);
        assert_eq!(Input::from(msg), Input::FlushAll);
    }
}
