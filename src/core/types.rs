use std::fmt::Debug;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use super::store::Identified;

/// Convenience result alias for feed operations.
pub type WebSocketResult<T> = Result<T, WebSocketError>;

/// Canonical error surface for the feed infrastructure.
#[derive(Debug, Error)]
pub enum WebSocketError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Transport error ({context}): {error}")]
    TransportError {
        context: &'static str,
        error: String,
    },

    #[error("Parse failed: {0}")]
    ParseFailed(String),

    #[error("Actor error: {0}")]
    ActorError(String),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Timeout: {context}")]
    Timeout { context: String },
}

/// Transport-independent buffer sizing used for websocket configuration.
#[derive(Clone, Copy, Debug)]
pub struct WebSocketBufferConfig {
    pub write_buffer_bytes: usize,
    pub max_write_buffer_bytes: usize,
    pub max_message_bytes: usize,
    pub max_frame_bytes: usize,
}

impl Default for WebSocketBufferConfig {
    fn default() -> Self {
        // Console frames are small JSON documents; log exports go over REST, not the feed.
        Self {
            write_buffer_bytes: 64 << 10,
            max_write_buffer_bytes: 256 << 10,
            max_message_bytes: 4 * 1024 * 1024,
            max_frame_bytes: 4 * 1024 * 1024,
        }
    }
}

/// TLS configuration for `wss://` feeds.
///
/// Certificate validation is on unless explicitly disabled for development backends.
#[derive(Clone, Copy, Debug)]
pub struct WsTlsConfig {
    pub validate_certs: bool,
}

impl Default for WsTlsConfig {
    fn default() -> Self {
        Self {
            validate_certs: true,
        }
    }
}

/// Lifecycle of a single feed connection.
///
/// `Idle → Connecting → Open → (disconnect: Idle) | (unexpected close → Reconnecting →
/// Connecting ...) → Exhausted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WsConnectionStatus {
    Idle,
    Connecting,
    Open,
    Reconnecting { attempt: u32 },
    Exhausted,
}

impl WsConnectionStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, WsConnectionStatus::Open)
    }

    /// A connection is live or on its way to being live.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            WsConnectionStatus::Connecting
                | WsConnectionStatus::Open
                | WsConnectionStatus::Reconnecting { .. }
        )
    }
}

/// Why a connection went away without the caller asking for it.
#[derive(Debug, Clone)]
pub enum WsDisconnectCause {
    RemoteClosed { reason: String },
    StreamEnded,
    ReadFailure { error: String },
    WriteFailure { error: String },
    HandshakeFailed { message: String },
}

/// Reconnect policy consulted by the connection manager after an unexpected close.
pub trait WsReconnectStrategy: Send + Sync + 'static {
    /// Advance the attempt counter and return the delay before the next attempt.
    fn next_delay(&mut self) -> Duration;
    /// Called on every successful open.
    fn reset(&mut self);
    fn should_retry(&self) -> bool;
    /// Attempts made since the last successful open.
    fn attempts(&self) -> u32;
}

/// Connection counters exposed for dashboards and tests.
#[derive(Clone, Debug, Default)]
pub struct WsConnectionStats {
    pub uptime: Duration,
    pub last_message_age: Duration,
    pub frames_received: u64,
    pub events_dispatched: u64,
    pub parse_failures: u64,
    pub ignored_frames: u64,
    pub reconnects: u64,
    pub commands_sent: u64,
    pub commands_dropped: u64,
    pub recent_errors: usize,
}

/// Category of a routed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Update,
    Stats,
    Alert,
    Log,
}

/// Everything that distinguishes one monitored domain from another.
///
/// The connection manager, router and registry are generic over this trait; a domain only
/// declares its endpoint, its payload types and the discriminators it understands.
pub trait FeedDomain: Send + Sync + 'static {
    type Entity: Identified + DeserializeOwned + Clone + Debug + Send + Sync + 'static;
    type Stats: DeserializeOwned + Clone + Debug + Send + Sync + 'static;
    type Alert: DeserializeOwned + Clone + Debug + Send + Sync + 'static;
    type Log: DeserializeOwned + Clone + Debug + Send + Sync + 'static;

    /// Stable label used in logs.
    const NAME: &'static str;
    /// Endpoint path relative to the websocket base url.
    const PATH: &'static str;
    /// Query parameter carrying the optional scope id.
    const SCOPE_PARAM: &'static str;

    /// Map a frame `type` to its category; `None` means the frame is ignored.
    fn frame_kind(discriminator: &str) -> Option<FrameKind>;
}

/// Outbound control message: `{"command": ..., "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedCommand {
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl FeedCommand {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            data: None,
        }
    }

    pub fn with_data(command: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            command: command.into(),
            data: Some(data),
        }
    }

    pub fn to_json(&self) -> WebSocketResult<String> {
        serde_json::to_string(self).map_err(|err| WebSocketError::ParseFailed(err.to_string()))
    }
}

/// Result of handing a command to the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Sent,
    /// The socket was not open; nothing was written.
    NotConnected,
}
