//! Structured log events

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Local};

use super::level::Severity;

/// Typed value attached to a log event field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Str(String),
    I64(i64),
    /// Only used for values above `i64::MAX`; `From<u64>` normalizes smaller ones to `I64`
    U64(u64),
    F64(f64),
    Bool(bool),
    /// Written as whole milliseconds, so it reads back as `I64`
    Duration(Duration),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Str(s) => f.write_str(s),
            FieldValue::I64(v) => write!(f, "{}", v),
            FieldValue::U64(v) => write!(f, "{}", v),
            // Debug keeps the fractional part so `1.0` does not read back as an integer
            FieldValue::F64(v) => write!(f, "{:?}", v),
            FieldValue::Bool(v) => write!(f, "{}", v),
            FieldValue::Duration(v) => write!(f, "{}", v.as_millis()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Str(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Str(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::I64(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::I64(value.into())
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        FieldValue::I64(value.into())
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(v) => FieldValue::I64(v),
            Err(_) => FieldValue::U64(value),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::F64(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<Duration> for FieldValue {
    fn from(value: Duration) -> Self {
        FieldValue::Duration(value)
    }
}

/// A single log event
///
/// Built once at the call site and handed to the pipeline by reference.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEvent {
    /// When the event was recorded
    pub timestamp: DateTime<Local>,
    pub severity: Severity,
    /// Caller location, usually `dir/file.rs:line`
    pub source_location: String,
    pub message: String,
    /// Key/value fields in call-site order
    pub fields: Vec<(String, FieldValue)>,
}

impl LogEvent {
    /// Create an event stamped with the current local time
    pub fn new(
        severity: Severity,
        source_location: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Local::now(),
            severity,
            source_location: source_location.into(),
            message: message.into(),
            fields: Vec::new(),
        }
    }

    /// Override the timestamp
    pub fn at(mut self, timestamp: DateTime<Local>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Append a field
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }
}

/// Shorten a caller path to its last directory and file name, plus line
///
/// `/home/me/app/src/net/server.rs` at line 42 becomes `net/server.rs:42`.
pub fn short_caller(file: &str, line: Option<u32>) -> String {
    let normalized = file.replace('\\', "/");
    let mut parts = normalized.rsplitn(3, '/');
    let name = parts.next().unwrap_or_default();
    let short = match parts.next() {
        Some(dir) if !dir.is_empty() => format!("{}/{}", dir, name),
        _ => name.to_string(),
    };
    match line {
        Some(line) => format!("{}:{}", short, line),
        None => short,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u64_normalizes_to_i64() {
        assert_eq!(FieldValue::from(5u64), FieldValue::I64(5));
        assert_eq!(FieldValue::from(u64::MAX), FieldValue::U64(u64::MAX));
    }

    #[test]
    fn test_float_display_keeps_fraction() {
        assert_eq!(FieldValue::F64(1.0).to_string(), "1.0");
        assert_eq!(FieldValue::F64(0.25).to_string(), "0.25");
    }

    #[test]
    fn test_duration_displays_whole_millis() {
        assert_eq!(FieldValue::from(Duration::from_micros(1_500_900)).to_string(), "1500");
        assert_eq!(FieldValue::from(Duration::from_secs(2)).to_string(), "2000");
        assert_eq!(FieldValue::from(Duration::ZERO).to_string(), "0");
    }

    #[test]
    fn test_event_builder_preserves_field_order() {
        let event = LogEvent::new(Severity::Info, "main.rs:1", "hello")
            .with_field("b", 1)
            .with_field("a", "x");
        let keys: Vec<_> = event.fields.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn test_short_caller() {
        assert_eq!(
            short_caller("/home/me/app/src/net/server.rs", Some(42)),
            "net/server.rs:42"
        );
        assert_eq!(short_caller("src/main.rs", Some(7)), "src/main.rs:7");
        assert_eq!(short_caller("main.rs", None), "main.rs");
        assert_eq!(short_caller("C:\\app\\src\\lib.rs", Some(3)), "src/lib.rs:3");
    }
}
