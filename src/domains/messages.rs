//! Message monitoring feed: `/ws/messages[?customerId=..]`.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use super::{AlertSeverity, NoLogs, lenient_timestamp};
use crate::core::{FeedCommand, FeedDomain, FrameKind, Identified};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Received,
    Processing,
    Processed,
    Failed,
    Retrying,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub status: Option<MessageStatus>,
    #[serde(default)]
    pub message_type: Option<String>,
    #[serde(default)]
    pub size_bytes: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub received_at: Option<DateTime<Utc>>,
}

impl Identified for Message {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MessageStats {
    pub total: u64,
    pub processed: u64,
    pub failed: u64,
    pub pending: u64,
    pub messages_per_minute: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageAlert {
    #[serde(default)]
    pub message_id: Option<String>,
    pub severity: AlertSeverity,
    pub message: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MessageFeed;

impl FeedDomain for MessageFeed {
    type Entity = Message;
    type Stats = MessageStats;
    type Alert = MessageAlert;
    type Log = NoLogs;

    const NAME: &'static str = "messages";
    const PATH: &'static str = "/ws/messages";
    const SCOPE_PARAM: &'static str = "customerId";

    fn frame_kind(discriminator: &str) -> Option<FrameKind> {
        match discriminator {
            "message_update" => Some(FrameKind::Update),
            "stats_update" => Some(FrameKind::Stats),
            "message_alert" => Some(FrameKind::Alert),
            _ => None,
        }
    }
}

impl MessageFeed {
    /// Restrict pushed updates to one channel and/or status.
    pub fn filter(channel_id: Option<&str>, status: Option<&str>) -> FeedCommand {
        FeedCommand::with_data(
            "filter_messages",
            json!({ "channelId": channel_id, "status": status }),
        )
    }
}
