//! Monitored domains of the integration console.
//!
//! Each domain is a zero-sized marker implementing [`FeedDomain`](crate::core::FeedDomain):
//! its endpoint path, its scope query parameter, the frame discriminators it understands and
//! the payload types they decode into.

pub mod adapters;
pub mod channels;
pub mod flows;
pub mod messages;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub use adapters::{AdapterAlert, AdapterFeed, AdapterLogEntry, AdapterStats, AdapterStatus};
pub use channels::{Channel, ChannelAlert, ChannelFeed, ChannelLog, ChannelStats, ChannelStatus};
pub use flows::{ExecutionStatus, FlowAlert, FlowExecution, FlowFeed, FlowStats};
pub use messages::{Message, MessageAlert, MessageFeed, MessageStats, MessageStatus};

/// Alert severity shared by every domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    Error,
    Critical,
    #[serde(other)]
    Unknown,
}

/// Log level carried by log-stream frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    #[serde(alias = "warning")]
    Warn,
    Error,
    #[serde(other)]
    Unknown,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Unknown => "unknown",
        }
    }
}

/// Log payload type for domains without a log stream. Uninhabited: such frames are never
/// routed as logs.
#[derive(Debug, Clone, Deserialize)]
pub enum NoLogs {}

/// Optional timestamp that never fails the surrounding payload.
///
/// Accepts RFC 3339, offset-less ISO 8601 (read as UTC) and epoch milliseconds. Anything
/// else becomes `None`.
pub(crate) fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(raw)) => parse_timestamp(&raw),
        Some(Value::Number(n)) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    })
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}
