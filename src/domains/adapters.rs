//! Adapter status and log stream: `/ws/adapters[?adapterId=..]`.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use super::{AlertSeverity, LogLevel, lenient_timestamp};
use crate::core::{FeedCommand, FeedDomain, FrameKind, Identified};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterStatus {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub adapter_type: Option<String>,
    #[serde(default)]
    pub healthy: Option<bool>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub last_seen: Option<DateTime<Utc>>,
}

impl Identified for AdapterStatus {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdapterStats {
    pub total_logs: u64,
    pub errors: u64,
    pub warnings: u64,
    pub logs_per_minute: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterAlert {
    pub adapter_id: String,
    pub severity: AlertSeverity,
    pub message: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// One adapter log line, as pushed over the socket and returned by the log REST endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterLogEntry {
    #[serde(default)]
    pub id: Option<String>,
    pub adapter_id: String,
    pub level: LogLevel,
    pub message: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub context: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AdapterFeed;

impl FeedDomain for AdapterFeed {
    type Entity = AdapterStatus;
    type Stats = AdapterStats;
    type Alert = AdapterAlert;
    type Log = AdapterLogEntry;

    const NAME: &'static str = "adapters";
    const PATH: &'static str = "/ws/adapters";
    const SCOPE_PARAM: &'static str = "adapterId";

    fn frame_kind(discriminator: &str) -> Option<FrameKind> {
        match discriminator {
            "adapter_status" => Some(FrameKind::Update),
            "stats_update" => Some(FrameKind::Stats),
            "adapter_alert" => Some(FrameKind::Alert),
            "adapter_log" => Some(FrameKind::Log),
            _ => None,
        }
    }
}

impl AdapterFeed {
    /// Stream logs at or above `min_level` for one adapter.
    pub fn subscribe_logs(adapter_id: &str, min_level: Option<LogLevel>) -> FeedCommand {
        FeedCommand::with_data(
            "subscribe_adapter_logs",
            json!({ "adapterId": adapter_id, "level": min_level.map(|l| l.as_str()) }),
        )
    }

    pub fn unsubscribe_logs(adapter_id: &str) -> FeedCommand {
        FeedCommand::with_data("unsubscribe_adapter_logs", json!({ "adapterId": adapter_id }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Decoded, FeedEvent, decode_frame};

    #[test]
    fn decodes_adapter_log_with_context() {
        let frame = br#"{"type":"adapter_log","data":{"adapterId":"a1","level":"error","message":"auth failed","context":{"attempt":2}}}"#;
        let Decoded::Event(FeedEvent::Log(entry)) = decode_frame::<AdapterFeed>(frame).unwrap()
        else {
            panic!("expected log");
        };
        assert_eq!(entry.level, LogLevel::Error);
        assert_eq!(entry.context.unwrap()["attempt"], 2);
    }

    #[test]
    fn adapter_status_is_the_update_kind() {
        assert_eq!(AdapterFeed::frame_kind("adapter_status"), Some(FrameKind::Update));
        assert_eq!(AdapterFeed::frame_kind("channel_log"), None);
    }

    #[test]
    fn subscribe_logs_serializes_level() {
        assert_eq!(
            AdapterFeed::subscribe_logs("a1", Some(LogLevel::Warn)).to_json().unwrap(),
            r#"{"command":"subscribe_adapter_logs","data":{"adapterId":"a1","level":"warn"}}"#
        );
    }
}
