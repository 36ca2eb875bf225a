//! Log event wire model.
//!
//! Events travel through the broker as compact JSON objects with the fixed
//! field names `timestamp`, `level`, `service` and `message`. Field order is
//! irrelevant when decoding; unknown extra fields are ignored.

use std::fmt;

use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Timestamp layout used in persisted lines.
pub const LINE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Severity of a log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Info,
    Warning,
    Error,
}

impl Level {
    /// Every level, in roster order.
    pub const ALL: [Level; 3] = [Level::Info, Level::Warning, Level::Error];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured log event.
///
/// Each encoded event is self-contained: decoding never depends on any
/// other record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Seconds since the Unix epoch, stamped by the producer.
    pub timestamp: i64,
    pub level: Level,
    /// Originating service.
    pub service: String,
    pub message: String,
}

/// Payload that is not a structurally valid encoded event.
#[derive(Debug, thiserror::Error)]
#[error("malformed event payload: {0}")]
pub struct DecodeError(#[from] serde_json::Error);

impl Event {
    pub fn new(
        timestamp: i64,
        level: Level,
        service: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            level,
            service: service.into(),
            message: message.into(),
        }
    }

    /// Serialize to the wire form.
    pub fn encode(&self) -> Vec<u8> {
        json!({
            "timestamp": self.timestamp,
            "level": self.level.as_str(),
            "service": self.service,
            "message": self.message,
        })
        .to_string()
        .into_bytes()
    }

    /// Parse the wire form.
    ///
    /// Missing fields, wrong types, unknown levels and truncated input all
    /// fail; a partially populated event is never returned.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Persisted line in the consumer's local time zone.
    pub fn format_line(&self) -> String {
        self.format_line_in(&Local)
    }

    /// Persisted line: `[<time>] <LEVEL> [<service>] <message>\n`.
    pub fn format_line_in<Tz>(&self, tz: &Tz) -> String
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        let time = match DateTime::from_timestamp(self.timestamp, 0) {
            Some(utc) => utc.with_timezone(tz).format(LINE_TIME_FORMAT).to_string(),
            None => self.timestamp.to_string(),
        };
        format!(
            "[{}] {} [{}] {}\n",
            time, self.level, self.service, self.message
        )
    }
}
