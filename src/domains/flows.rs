//! Flow execution feed: `/ws/flows[?flowId=..]`.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use super::{AlertSeverity, NoLogs, lenient_timestamp};
use crate::core::{FeedCommand, FeedDomain, FrameKind, Identified};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Stopped,
    #[serde(other)]
    Unknown,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Stopped
        )
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowExecution {
    pub id: String,
    #[serde(default)]
    pub flow_id: Option<String>,
    #[serde(default)]
    pub flow_name: Option<String>,
    #[serde(default)]
    pub status: Option<ExecutionStatus>,
    #[serde(default)]
    pub current_step: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error: Option<String>,
}

impl Identified for FlowExecution {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FlowStats {
    pub total_executions: u64,
    pub running: u64,
    pub completed: u64,
    pub failed: u64,
    pub average_duration_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowAlert {
    #[serde(default)]
    pub flow_id: Option<String>,
    #[serde(default)]
    pub execution_id: Option<String>,
    pub severity: AlertSeverity,
    pub message: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FlowFeed;

impl FeedDomain for FlowFeed {
    type Entity = FlowExecution;
    type Stats = FlowStats;
    type Alert = FlowAlert;
    type Log = NoLogs;

    const NAME: &'static str = "flows";
    const PATH: &'static str = "/ws/flows";
    const SCOPE_PARAM: &'static str = "flowId";

    fn frame_kind(discriminator: &str) -> Option<FrameKind> {
        match discriminator {
            "execution_update" => Some(FrameKind::Update),
            "stats_update" => Some(FrameKind::Stats),
            "flow_alert" => Some(FrameKind::Alert),
            _ => None,
        }
    }
}

impl FlowFeed {
    pub fn subscribe_flow(flow_id: &str) -> FeedCommand {
        FeedCommand::with_data("subscribe_flow", json!({ "flowId": flow_id }))
    }

    pub fn unsubscribe_flow(flow_id: &str) -> FeedCommand {
        FeedCommand::with_data("unsubscribe_flow", json!({ "flowId": flow_id }))
    }
}
