use std::time::Duration;

use futures_util::future::BoxFuture;
use http::Method;
use reqwest::Client;
use tracing::debug;
use url::Url;

use super::{ControlError, ControlResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlRequest {
    pub method: Method,
    pub url: Url,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlResponse {
    pub status: u16,
    pub body: String,
}

impl ControlResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Executes one REST request. Swapped for an in-memory double in tests.
pub trait ControlTransport: Send + Sync + 'static {
    fn execute(&self, request: ControlRequest) -> BoxFuture<'_, ControlResult<ControlResponse>>;
}

#[derive(Debug, Clone)]
pub struct ReqwestControlTransport {
    client: Client,
}

impl ReqwestControlTransport {
    pub fn new(timeout: Duration, validate_certs: bool) -> ControlResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(!validate_certs)
            .build()
            .map_err(|e| ControlError::Transport(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl ControlTransport for ReqwestControlTransport {
    fn execute(&self, request: ControlRequest) -> BoxFuture<'_, ControlResult<ControlResponse>> {
        Box::pin(async move {
            debug!(method = %request.method, url = %request.url, "control request");
            let resp = self
                .client
                .request(request.method, request.url)
                .header("Accept", "application/json")
                .send()
                .await
                .map_err(|e| ControlError::Transport(e.to_string()))?;

            let status = resp.status().as_u16();
            let body = resp
                .text()
                .await
                .map_err(|e| ControlError::Transport(format!("failed to read body: {e}")))?;
            Ok(ControlResponse { status, body })
        })
    }
}
