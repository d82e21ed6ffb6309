//! Channel monitoring feed: `/ws/channels[?customerId=..]`.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use super::{AlertSeverity, LogLevel, lenient_timestamp};
use crate::core::{FeedCommand, FeedDomain, FrameKind, Identified};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelStatus {
    Running,
    Starting,
    Stopping,
    Stopped,
    Error,
    #[serde(other)]
    Unknown,
}

/// Snapshot of a running adapter pairing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<ChannelStatus>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub messages_processed: u64,
    #[serde(default)]
    pub error_count: u64,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub last_activity: Option<DateTime<Utc>>,
}

impl Identified for Channel {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelStats {
    pub total_channels: u64,
    pub running: u64,
    pub stopped: u64,
    pub errors: u64,
    pub messages_per_minute: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelAlert {
    pub channel_id: String,
    pub severity: AlertSeverity,
    pub message: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelLog {
    pub channel_id: String,
    pub level: LogLevel,
    pub message: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Marker for the channel domain.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelFeed;

impl FeedDomain for ChannelFeed {
    type Entity = Channel;
    type Stats = ChannelStats;
    type Alert = ChannelAlert;
    type Log = ChannelLog;

    const NAME: &'static str = "channels";
    const PATH: &'static str = "/ws/channels";
    const SCOPE_PARAM: &'static str = "customerId";

    fn frame_kind(discriminator: &str) -> Option<FrameKind> {
        match discriminator {
            "channel_update" => Some(FrameKind::Update),
            "stats_update" => Some(FrameKind::Stats),
            "channel_alert" => Some(FrameKind::Alert),
            "channel_log" => Some(FrameKind::Log),
            _ => None,
        }
    }
}

impl ChannelFeed {
    /// Start streaming `channel_log` frames for one channel.
    pub fn subscribe_logs(channel_id: &str) -> FeedCommand {
        FeedCommand::with_data("subscribe_channel_logs", json!({ "channelId": channel_id }))
    }

    pub fn unsubscribe_logs(channel_id: &str) -> FeedCommand {
        FeedCommand::with_data("unsubscribe_channel_logs", json!({ "channelId": channel_id }))
    }

    /// Narrow pushed updates to channels in `status`.
    pub fn filter_status(status: &str) -> FeedCommand {
        FeedCommand::with_data("filter_channels", json!({ "status": status }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Decoded, FeedEvent, decode_frame};

    #[test]
    fn decodes_channel_update_with_camel_case_fields() {
        let frame = br#"{"type":"channel_update","data":{"id":"c1","name":"orders","status":"running","customerId":"acme","messagesProcessed":42,"lastActivity":"2024-05-01T10:00:00Z"}}"#;
        let Decoded::Event(FeedEvent::Update(channel)) = decode_frame::<ChannelFeed>(frame).unwrap()
        else {
            panic!("expected update");
        };
        assert_eq!(channel.status, Some(ChannelStatus::Running));
        assert_eq!(channel.customer_id.as_deref(), Some("acme"));
        assert_eq!(channel.messages_processed, 42);
        assert!(channel.last_activity.is_some());
    }

    #[test]
    fn odd_timestamps_do_not_lose_the_update() {
        let frame = br#"{"type":"channel_update","data":{"id":"c2","status":"error","lastActivity":"2024-05-01T10:00:00"}}"#;
        let Decoded::Event(FeedEvent::Update(channel)) = decode_frame::<ChannelFeed>(frame).unwrap()
        else {
            panic!("expected update");
        };
        assert_eq!(channel.status, Some(ChannelStatus::Error));
        assert!(channel.last_activity.is_some());

        let frame = br#"{"type":"channel_update","data":{"id":"c3","lastActivity":"n/a"}}"#;
        let Decoded::Event(FeedEvent::Update(channel)) = decode_frame::<ChannelFeed>(frame).unwrap()
        else {
            panic!("expected update");
        };
        assert_eq!(channel.id, "c3");
        assert_eq!(channel.last_activity, None);
    }

    #[test]
    fn stats_fields_default_when_absent() {
        let frame = br#"{"type":"stats_update","data":{"running":3}}"#;
        let Decoded::Event(FeedEvent::Stats(stats)) = decode_frame::<ChannelFeed>(frame).unwrap()
        else {
            panic!("expected stats");
        };
        assert_eq!(stats.running, 3);
        assert_eq!(stats.total_channels, 0);
    }

    #[test]
    fn alert_frame_maps_to_alert() {
        let frame = br#"{"type":"channel_alert","data":{"channelId":"c9","severity":"critical","message":"queue full"}}"#;
        let Decoded::Event(FeedEvent::Alert(alert)) = decode_frame::<ChannelFeed>(frame).unwrap()
        else {
            panic!("expected alert");
        };
        assert_eq!(alert.severity, AlertSeverity::Critical);
    }

    #[test]
    fn log_subscription_command_shape() {
        assert_eq!(
            ChannelFeed::subscribe_logs("c1").to_json().unwrap(),
            r#"{"command":"subscribe_channel_logs","data":{"channelId":"c1"}}"#
        );
    }
}
