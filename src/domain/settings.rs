//! Host-supplied node settings.
//!
//! Node editors hand over settings as loosely typed JSON: numbers may arrive
//! as strings, be missing, or be garbage. [`NodeSettings`] keeps the raw
//! values and normalises them into the typed per-policy configs, degrading
//! anything unusable to a safe value instead of failing.

use crate::domain::config::{BatcherConfig, DebouncerConfig, RateLimitConfig};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Largest delay the host timer can represent, in milliseconds.
const MAX_DELAY_MS: f64 = 2_147_483_647.0;

/// Error returned when a settings document cannot be read.
#[derive(Debug)]
pub enum SettingsError {
    /// The document is not valid JSON
    Json(serde_json::Error),
    /// The document is valid JSON but not an object
    NotAnObject,
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsError::Json(e) => write!(f, "invalid node settings: {}", e),
            SettingsError::NotAnObject => write!(f, "invalid node settings: expected an object"),
        }
    }
}

impl std::error::Error for SettingsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SettingsError::Json(e) => Some(e),
            SettingsError::NotAnObject => None,
        }
    }
}

impl From<serde_json::Error> for SettingsError {
    fn from(e: serde_json::Error) -> Self {
        SettingsError::Json(e)
    }
}

/// Raw settings of one node instance, as configured in the host.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeSettings {
    /// Display name of the node
    pub name: Option<String>,
    /// Maximum number of live topics
    pub max_topics: Value,
    /// Per-topic message bound
    pub max_messages_per_topic: Value,
    /// Batch idle timeout in milliseconds
    pub max_delay: Value,
    /// Debounce / trickle interval in milliseconds
    pub interval: Value,
    /// Rate limiter overflow policy
    pub drop_overflow_messages: Value,
}

impl NodeSettings {
    /// Parse a settings document.
    ///
    /// # Errors
    /// Returns `SettingsError::Json` if the document is not valid JSON and
    /// `SettingsError::NotAnObject` if it is not a JSON object. Individual
    /// values never cause errors.
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        Self::from_value(serde_json::from_str(json)?)
    }

    /// Build settings from an already parsed JSON value.
    ///
    /// # Errors
    /// Returns `SettingsError::NotAnObject` if `value` is not an object.
    pub fn from_value(value: Value) -> Result<Self, SettingsError> {
        if !value.is_object() {
            return Err(SettingsError::NotAnObject);
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Normalised batcher configuration.
    pub fn batcher_config(&self) -> BatcherConfig {
        BatcherConfig::new()
            .with_max_topics(int_setting(&self.max_topics, 1))
            .with_max_messages_per_topic(int_setting(&self.max_messages_per_topic, 1))
            .with_max_delay(delay_setting(&self.max_delay))
    }

    /// Normalised debouncer configuration.
    pub fn debouncer_config(&self) -> DebouncerConfig {
        DebouncerConfig::new()
            .with_max_topics(int_setting(&self.max_topics, 1))
            .with_interval(delay_setting(&self.interval))
    }

    /// Normalised rate limiter configuration.
    ///
    /// A missing backlog bound keeps the default of 1; an explicit zero is
    /// honoured.
    pub fn rate_limit_config(&self) -> RateLimitConfig {
        let max_messages = if self.max_messages_per_topic.is_null() {
            crate::domain::config::DEFAULT_MAX_MESSAGES_PER_TOPIC
        } else {
            int_setting(&self.max_messages_per_topic, 0)
        };
        RateLimitConfig::new()
            .with_max_topics(int_setting(&self.max_topics, 1))
            .with_max_messages_per_topic(max_messages)
            .with_interval(delay_setting(&self.interval))
            .with_drop_overflow_messages(bool_setting(&self.drop_overflow_messages))
    }
}

/// Read an integer setting, flooring at `min`.
///
/// Numbers are truncated, strings are read up to the first non-digit
/// (`"12abc"` is 12, `"0x10"` is 16, runs too long for `i64` saturate),
/// anything else counts as 0.
pub fn int_setting(value: &Value, min: usize) -> usize {
    let parsed = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Value::String(s) => leading_integer(s),
        _ => 0,
    };
    usize::try_from(parsed).unwrap_or(0).max(min)
}

fn leading_integer(s: &str) -> i64 {
    let s = s.trim_start();
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let (radix, digits) = match rest.get(..2) {
        Some("0x" | "0X") => (16, &rest[2..]),
        _ => (10, rest),
    };
    let (value, _) = leading_digits(digits, radix);
    let value = i64::try_from(value).unwrap_or(i64::MAX);
    if negative {
        -value
    } else {
        value
    }
}

/// Read the leading run of `radix` digits, saturating on overflow.
///
/// Returns the value and the number of digits consumed.
fn leading_digits(s: &str, radix: u32) -> (u64, usize) {
    let mut value: u64 = 0;
    let mut consumed = 0;
    for digit in s.chars().map_while(|c| c.to_digit(radix)) {
        value = value
            .saturating_mul(u64::from(radix))
            .saturating_add(u64::from(digit));
        consumed += 1;
    }
    (value, consumed)
}

/// Read a whole string as a number the way the host coerces strings.
///
/// Unsigned `0x`, `0o` and `0b` literals are integers in that radix; any
/// other string must be a decimal number. Unreadable strings are 0.
fn numeric_string(s: &str) -> f64 {
    let s = s.trim();
    let radix = match s.get(..2) {
        Some("0x" | "0X") => 16,
        Some("0o" | "0O") => 8,
        Some("0b" | "0B") => 2,
        _ => return s.parse::<f64>().unwrap_or(0.0),
    };
    let digits = &s[2..];
    match leading_digits(digits, radix) {
        (value, consumed) if consumed > 0 && consumed == digits.len() => value as f64,
        _ => 0.0,
    }
}

/// Read a millisecond delay setting.
///
/// Accepts numbers and numeric strings, including `0x`, `0o` and `0b`
/// literals; negative, non-finite and non-numeric values become zero.
pub fn delay_setting(value: &Value) -> Duration {
    let millis = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => numeric_string(s),
        Value::Bool(true) => 1.0,
        _ => 0.0,
    };
    if !millis.is_finite() || millis <= 0.0 {
        return Duration::ZERO;
    }
    Duration::from_micros((millis.min(MAX_DELAY_MS) * 1000.0).round() as u64)
}

/// Read a boolean setting (`true` or `"true"`).
pub fn bool_setting(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}
