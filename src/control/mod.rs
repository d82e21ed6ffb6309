//! Request/response surface used next to the live feeds: channel and flow-execution control
//! actions plus adapter log queries. Every call issues one REST request, decodes the
//! `{success, data?, error?}` envelope and emits one notification; nothing is retried and no
//! local state is touched, the push feeds reconcile.

mod console;
mod notify;
mod transport;

use serde::Deserialize;
use thiserror::Error;

pub use console::{ChannelAction, ConsoleControl, ExportFormat, LogQuery};
pub use notify::{ChannelNotifier, Notification, NotificationKind, Notifier, TracingNotifier};
pub use transport::{ControlRequest, ControlResponse, ControlTransport, ReqwestControlTransport};

pub type ControlResult<T> = Result<T, ControlError>;

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("Request failed: {0}")]
    Transport(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Rejected by server: {0}")]
    Rejected(String),

    #[error("Invalid response: {0}")]
    Decode(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Uniform REST response body.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl<T> ApiEnvelope<T> {
    /// Server-provided failure text, falling back to `message`.
    pub fn failure_text(&self) -> Option<&str> {
        self.error.as_deref().or(self.message.as_deref())
    }

    pub fn into_result(self) -> ControlResult<Option<T>> {
        if self.success {
            Ok(self.data)
        } else {
            let text = self
                .failure_text()
                .unwrap_or("request was not successful")
                .to_string();
            Err(ControlError::Rejected(text))
        }
    }
}
