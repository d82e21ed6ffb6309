use http::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use super::notify::{Notification, Notifier, TracingNotifier};
use super::transport::{ControlRequest, ControlTransport, ReqwestControlTransport};
use super::{ApiEnvelope, ControlError, ControlResult};
use crate::config::ConsoleConfig;
use crate::domains::{AdapterLogEntry, LogLevel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelAction {
    Start,
    Stop,
    Restart,
}

impl ChannelAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelAction::Start => "start",
            ChannelAction::Stop => "stop",
            ChannelAction::Restart => "restart",
        }
    }

    fn past_tense(&self) -> &'static str {
        match self {
            ChannelAction::Start => "started",
            ChannelAction::Stop => "stopped",
            ChannelAction::Restart => "restarted",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }
}

/// Filters for the adapter log endpoint. Unset fields are left off the query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogQuery {
    pub level: Option<LogLevel>,
    pub limit: Option<u32>,
    pub search: Option<String>,
}

/// Control actions against the console REST api.
pub struct ConsoleControl<C = ReqwestControlTransport, N = TracingNotifier>
where
    C: ControlTransport,
    N: Notifier,
{
    base: Url,
    transport: C,
    notifier: N,
}

impl ConsoleControl {
    pub fn from_config(config: &ConsoleConfig) -> ControlResult<Self> {
        let transport = ReqwestControlTransport::new(config.request_timeout, config.validate_certs)?;
        Ok(Self::new(config.api_url.clone(), transport, TracingNotifier))
    }
}

impl<C, N> ConsoleControl<C, N>
where
    C: ControlTransport,
    N: Notifier,
{
    pub fn new(base: Url, transport: C, notifier: N) -> Self {
        Self {
            base,
            transport,
            notifier,
        }
    }

    /// `POST channels/{id}/{start|stop|restart}`
    pub async fn control_channel(&self, id: &str, action: ChannelAction) -> ControlResult<()> {
        let result = async {
            let url = self.endpoint(&["channels", id, action.as_str()])?;
            self.call::<Value>(Method::POST, url).await.map(|_| ())
        }
        .await;
        self.report(
            result,
            Notification::success(
                format!("Channel {}", action.past_tense()),
                format!("Channel {id} {}", action.past_tense()),
            ),
            format!("Failed to {} channel", action.as_str()),
        )
    }

    /// `POST flows/executions/{id}/stop`
    pub async fn stop_execution(&self, id: &str) -> ControlResult<()> {
        let result = async {
            let url = self.endpoint(&["flows", "executions", id, "stop"])?;
            self.call::<Value>(Method::POST, url).await.map(|_| ())
        }
        .await;
        self.report(
            result,
            Notification::success("Execution stopped", format!("Execution {id} was stopped")),
            "Failed to stop execution".to_string(),
        )
    }

    /// `POST flows/executions/{id}/retry`
    pub async fn retry_execution(&self, id: &str) -> ControlResult<()> {
        let result = async {
            let url = self.endpoint(&["flows", "executions", id, "retry"])?;
            self.call::<Value>(Method::POST, url).await.map(|_| ())
        }
        .await;
        self.report(
            result,
            Notification::success("Execution retried", format!("Execution {id} was resubmitted")),
            "Failed to retry execution".to_string(),
        )
    }

    /// `GET adapters/{id}/logs?level=&limit=&search=`
    ///
    /// Only failures are notified; a successful fetch is silent.
    pub async fn fetch_adapter_logs(
        &self,
        id: &str,
        query: &LogQuery,
    ) -> ControlResult<Vec<AdapterLogEntry>> {
        let result = async {
            let mut url = self.endpoint(&["adapters", id, "logs"])?;
            {
                let mut pairs = url.query_pairs_mut();
                if let Some(level) = query.level {
                    pairs.append_pair("level", level.as_str());
                }
                if let Some(limit) = query.limit {
                    pairs.append_pair("limit", &limit.to_string());
                }
                if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
                    pairs.append_pair("search", search);
                }
            }
            if url.query() == Some("") {
                url.set_query(None);
            }
            self.call::<Vec<AdapterLogEntry>>(Method::GET, url)
                .await
                .map(Option::unwrap_or_default)
        }
        .await;

        match result {
            Ok(entries) => {
                debug!(adapter = id, count = entries.len(), "adapter logs fetched");
                Ok(entries)
            }
            Err(err) => {
                self.fail("Failed to load adapter logs", &err);
                Err(err)
            }
        }
    }

    /// `GET adapters/{id}/logs/export?format={json|csv}`; returns the export body.
    pub async fn export_adapter_logs(&self, id: &str, format: ExportFormat) -> ControlResult<String> {
        let result = async {
            let mut url = self.endpoint(&["adapters", id, "logs", "export"])?;
            url.query_pairs_mut().append_pair("format", format.as_str());
            let body = match self.call::<Value>(Method::GET, url).await? {
                Some(Value::String(text)) => text,
                Some(other) => other.to_string(),
                None => String::new(),
            };
            Ok(body)
        }
        .await;
        self.report(
            result,
            Notification::success(
                "Logs exported",
                format!("Adapter {id} logs exported as {}", format.as_str()),
            ),
            "Failed to export logs".to_string(),
        )
    }

    fn endpoint(&self, segments: &[&str]) -> ControlResult<Url> {
        if segments.iter().any(|s| s.is_empty()) {
            return Err(ControlError::InvalidRequest("empty path segment".into()));
        }
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ControlError::InvalidRequest(format!("{} cannot be a base", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn call<T: DeserializeOwned>(&self, method: Method, url: Url) -> ControlResult<Option<T>> {
        let response = self
            .transport
            .execute(ControlRequest { method, url })
            .await?;

        if !response.is_success() {
            let message = serde_json::from_str::<ApiEnvelope<Value>>(&response.body)
                .ok()
                .and_then(|env| env.failure_text().map(str::to_owned))
                .unwrap_or_else(|| format!("request failed with status {}", response.status));
            return Err(ControlError::Http {
                status: response.status,
                message,
            });
        }

        let envelope: ApiEnvelope<T> = serde_json::from_str(&response.body)
            .map_err(|e| ControlError::Decode(e.to_string()))?;
        envelope.into_result()
    }

    fn report<T>(
        &self,
        result: ControlResult<T>,
        success: Notification,
        failure_title: String,
    ) -> ControlResult<T> {
        match result {
            Ok(value) => {
                self.notifier.notify(success);
                Ok(value)
            }
            Err(err) => {
                self.fail(&failure_title, &err);
                Err(err)
            }
        }
    }

    fn fail(&self, title: &str, err: &ControlError) {
        warn!(title, error = %err, "control action failed");
        self.notifier.notify(Notification::error(title, err.to_string()));
    }
}
