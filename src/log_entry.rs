use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

pub const DEFAULT_MESSAGE: &str = "No message provided";

/// Severity of a log entry. Anything the server sends outside this set
/// is read as `Info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LogLevel {
    #[default]
    Info,
    Warning,
    Error,
    Debug,
}

impl LogLevel {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "info" => Some(LogLevel::Info),
            "warning" => Some(LogLevel::Warning),
            "error" => Some(LogLevel::Error),
            "debug" => Some(LogLevel::Debug),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Debug => "debug",
        }
    }
}

/// A single normalized log entry. Every field is populated.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub id: String,
    /// ISO 8601 timestamp as sent by the server, or the fetch time
    pub timestamp: String,
    pub level: LogLevel,
    pub message: String,
    pub details: Map<String, Value>,
}

impl LogEntry {
    pub fn has_details(&self) -> bool {
        !self.details.is_empty()
    }
}

/// Maps one decoded response body into entries. A body that is not a JSON
/// array yields no entries.
pub fn normalize_payload(body: &Value, fetched_at: DateTime<Utc>) -> Vec<LogEntry> {
    match body {
        Value::Array(records) => records
            .iter()
            .enumerate()
            .map(|(index, record)| normalize_record(record, index, fetched_at))
            .collect(),
        _ => Vec::new(),
    }
}

pub fn normalize_record(record: &Value, index: usize, fetched_at: DateTime<Utc>) -> LogEntry {
    let id = non_empty_str(record, "id")
        .map(str::to_string)
        .unwrap_or_else(|| format!("log-{}-{}", index, fetched_at.timestamp_millis()));

    let timestamp = non_empty_str(record, "timestamp")
        .map(str::to_string)
        .unwrap_or_else(|| fetched_at.to_rfc3339_opts(SecondsFormat::Millis, true));

    let level = record
        .get("level")
        .and_then(Value::as_str)
        .and_then(LogLevel::parse)
        .unwrap_or_default();

    let message = non_empty_str(record, "message")
        .unwrap_or(DEFAULT_MESSAGE)
        .to_string();

    let details = record
        .get("details")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    LogEntry {
        id,
        timestamp,
        level,
        message,
        details,
    }
}

fn non_empty_str<'a>(record: &'a Value, key: &str) -> Option<&'a str> {
    record
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}
