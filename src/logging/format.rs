//! Single-line text encoding of log events
//!
//! Lines look like:
//!
//! ```text
//! level=INFO ts="2026-01-21 14:30:45" file=net/server.rs:42 msg="listening" port=8080 host="my host"
//! ```
//!
//! The first four keys are always `level`, `ts`, `file` and `msg`, in that order.
//! String values are quoted when they contain whitespace or special characters, or
//! when they would otherwise read back as a number or boolean.

use std::fmt::Write as _;
use std::iter::Peekable;
use std::str::Chars;

use chrono::NaiveDateTime;
use thiserror::Error;

use super::event::{FieldValue, LogEvent};
use super::level::Severity;

/// Timestamp rendering: second precision, no zone suffix
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render an event as a single line without a terminator
pub fn format_event(event: &LogEvent) -> String {
    let mut line = String::with_capacity(96 + event.message.len());

    line.push_str("level=");
    line.push_str(event.severity.as_str());

    let _ = write!(line, " ts=\"{}\"", event.timestamp.format(TIMESTAMP_FORMAT));

    line.push_str(" file=");
    push_str_value(&mut line, &event.source_location);

    line.push_str(" msg=");
    push_quoted(&mut line, &event.message);

    for (key, value) in &event.fields {
        line.push(' ');
        push_key(&mut line, key);
        line.push('=');
        match value {
            FieldValue::Str(s) => push_str_value(&mut line, s),
            other => {
                let _ = write!(line, "{}", other);
            }
        }
    }

    line
}

fn push_key(line: &mut String, key: &str) {
    if key.is_empty() {
        line.push('_');
        return;
    }
    for c in key.chars() {
        if c.is_whitespace() || c.is_control() || c == '=' || c == '"' {
            line.push('_');
        } else {
            line.push(c);
        }
    }
}

fn push_str_value(line: &mut String, value: &str) {
    if needs_quoting(value) {
        push_quoted(line, value);
    } else {
        line.push_str(value);
    }
}

fn push_quoted(line: &mut String, value: &str) {
    line.push('"');
    for c in value.chars() {
        match c {
            '"' => line.push_str("\\\""),
            '\\' => line.push_str("\\\\"),
            '\n' => line.push_str("\\n"),
            '\r' => line.push_str("\\r"),
            '\t' => line.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(line, "\\u{{{:x}}}", c as u32);
            }
            c => line.push(c),
        }
    }
    line.push('"');
}

fn needs_quoting(value: &str) -> bool {
    value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || c == '"' || c == '=' || c == '\\')
        || !matches!(infer_bare(value), FieldValue::Str(_))
}

/// Type an unquoted value the way the formatter would have written it
fn infer_bare(raw: &str) -> FieldValue {
    match raw {
        "true" => return FieldValue::Bool(true),
        "false" => return FieldValue::Bool(false),
        _ => {}
    }
    if let Ok(v) = raw.parse::<i64>() {
        return FieldValue::I64(v);
    }
    if let Ok(v) = raw.parse::<u64>() {
        return FieldValue::U64(v);
    }
    if let Ok(v) = raw.parse::<f64>() {
        return FieldValue::F64(v);
    }
    FieldValue::Str(raw.to_string())
}

/// A log line read back from disk
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLine {
    pub severity: Severity,
    /// Wall-clock time as written, without zone
    pub timestamp: NaiveDateTime,
    pub source_location: String,
    pub message: String,
    pub fields: Vec<(String, FieldValue)>,
}

/// Reasons a line does not match the on-disk format
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseLineError {
    #[error("expected key {expected:?} at position {position}")]
    UnexpectedKey {
        expected: &'static str,
        position: usize,
    },

    #[error("missing '=' after key {0:?}")]
    MissingEquals(String),

    #[error("unterminated quoted value for key {0:?}")]
    UnterminatedQuote(String),

    #[error("invalid escape sequence in value for key {0:?}")]
    InvalidEscape(String),

    #[error("expected a space after value for key {0:?}")]
    MissingSeparator(String),

    #[error("unknown level {0:?}")]
    InvalidLevel(String),

    #[error("invalid timestamp {0:?}")]
    InvalidTimestamp(String),
}

/// Raw key/value pair as read from a line
struct Pair {
    key: String,
    value: String,
    quoted: bool,
}

/// Parse a line produced by [`format_event`]
pub fn parse_line(line: &str) -> Result<ParsedLine, ParseLineError> {
    let line = line.strip_suffix('\n').unwrap_or(line);
    let mut chars = line.chars().peekable();
    let mut pairs = Vec::new();
    while chars.peek().is_some() {
        pairs.push(read_pair(&mut chars)?);
    }

    let mut pairs = pairs.into_iter();
    let level = expect_key(pairs.next(), "level", 0)?;
    let ts = expect_key(pairs.next(), "ts", 1)?;
    let file = expect_key(pairs.next(), "file", 2)?;
    let msg = expect_key(pairs.next(), "msg", 3)?;

    let severity = level
        .value
        .parse::<Severity>()
        .map_err(|_| ParseLineError::InvalidLevel(level.value.clone()))?;
    let timestamp = NaiveDateTime::parse_from_str(&ts.value, TIMESTAMP_FORMAT)
        .map_err(|_| ParseLineError::InvalidTimestamp(ts.value.clone()))?;

    let fields = pairs
        .map(|pair| {
            let value = if pair.quoted {
                FieldValue::Str(pair.value)
            } else {
                infer_bare(&pair.value)
            };
            (pair.key, value)
        })
        .collect();

    Ok(ParsedLine {
        severity,
        timestamp,
        source_location: file.value,
        message: msg.value,
        fields,
    })
}

fn expect_key(
    pair: Option<Pair>,
    expected: &'static str,
    position: usize,
) -> Result<Pair, ParseLineError> {
    match pair {
        Some(pair) if pair.key == expected => Ok(pair),
        _ => Err(ParseLineError::UnexpectedKey { expected, position }),
    }
}

fn read_pair(chars: &mut Peekable<Chars<'_>>) -> Result<Pair, ParseLineError> {
    let mut key = String::new();
    loop {
        match chars.next() {
            Some('=') => break,
            Some(' ') | None => return Err(ParseLineError::MissingEquals(key)),
            Some(c) => key.push(c),
        }
    }

    let (value, quoted) = if chars.peek() == Some(&'"') {
        chars.next();
        (read_quoted(chars, &key)?, true)
    } else {
        let mut value = String::new();
        while let Some(&c) = chars.peek() {
            if c == ' ' {
                break;
            }
            value.push(c);
            chars.next();
        }
        (value, false)
    };

    match chars.next() {
        None | Some(' ') => Ok(Pair { key, value, quoted }),
        Some(_) => Err(ParseLineError::MissingSeparator(key)),
    }
}

fn read_quoted(chars: &mut Peekable<Chars<'_>>, key: &str) -> Result<String, ParseLineError> {
    let mut value = String::new();
    loop {
        match chars.next() {
            None => return Err(ParseLineError::UnterminatedQuote(key.to_string())),
            Some('"') => return Ok(value),
            Some('\\') => match chars.next() {
                Some('"') => value.push('"'),
                Some('\\') => value.push('\\'),
                Some('n') => value.push('\n'),
                Some('r') => value.push('\r'),
                Some('t') => value.push('\t'),
                Some('u') => value.push(read_unicode_escape(chars, key)?),
                _ => return Err(ParseLineError::InvalidEscape(key.to_string())),
            },
            Some(c) => value.push(c),
        }
    }
}

fn read_unicode_escape(chars: &mut Peekable<Chars<'_>>, key: &str) -> Result<char, ParseLineError> {
    let invalid = || ParseLineError::InvalidEscape(key.to_string());
    if chars.next() != Some('{') {
        return Err(invalid());
    }
    let mut hex = String::new();
    loop {
        match chars.next() {
            Some('}') => break,
            Some(c) if c.is_ascii_hexdigit() && hex.len() < 6 => hex.push(c),
            _ => return Err(invalid()),
        }
    }
    u32::from_str_radix(&hex, 16)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(invalid)
}
