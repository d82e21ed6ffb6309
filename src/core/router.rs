//! Frame decoding and fan-out.
//!
//! Every inbound data frame is a JSON object `{"type": <discriminator>, "data": <payload>}`.
//! The discriminator is mapped to a [`FrameKind`] by the domain, the payload is decoded into
//! the matching associated type, and the resulting [`FeedEvent`] is handed to the listener
//! registry. Unknown discriminators are ignored; malformed frames are reported and dropped.

use std::fmt;

use serde::Deserialize;
use tracing::{debug, warn};

use super::registry::FeedListeners;
use super::types::{FeedDomain, FrameKind, WebSocketError, WebSocketResult};

/// A decoded frame of domain `D`.
pub enum FeedEvent<D: FeedDomain> {
    Update(D::Entity),
    Stats(D::Stats),
    Alert(D::Alert),
    Log(D::Log),
}

impl<D: FeedDomain> FeedEvent<D> {
    pub fn kind(&self) -> FrameKind {
        match self {
            FeedEvent::Update(_) => FrameKind::Update,
            FeedEvent::Stats(_) => FrameKind::Stats,
            FeedEvent::Alert(_) => FrameKind::Alert,
            FeedEvent::Log(_) => FrameKind::Log,
        }
    }
}

impl<D: FeedDomain> Clone for FeedEvent<D> {
    fn clone(&self) -> Self {
        match self {
            FeedEvent::Update(v) => FeedEvent::Update(v.clone()),
            FeedEvent::Stats(v) => FeedEvent::Stats(v.clone()),
            FeedEvent::Alert(v) => FeedEvent::Alert(v.clone()),
            FeedEvent::Log(v) => FeedEvent::Log(v.clone()),
        }
    }
}

impl<D: FeedDomain> fmt::Debug for FeedEvent<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedEvent::Update(v) => f.debug_tuple("Update").field(v).finish(),
            FeedEvent::Stats(v) => f.debug_tuple("Stats").field(v).finish(),
            FeedEvent::Alert(v) => f.debug_tuple("Alert").field(v).finish(),
            FeedEvent::Log(v) => f.debug_tuple("Log").field(v).finish(),
        }
    }
}

#[derive(Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// Result of decoding one frame.
pub enum Decoded<D: FeedDomain> {
    Event(FeedEvent<D>),
    /// Well-formed frame with a discriminator this domain does not know.
    Unknown(String),
}

fn payload<T: serde::de::DeserializeOwned>(kind: &str, data: serde_json::Value) -> WebSocketResult<T> {
    serde_json::from_value(data)
        .map_err(|err| WebSocketError::ParseFailed(format!("{kind} payload: {err}")))
}

/// Decode a raw frame into a typed event of domain `D`.
pub fn decode_frame<D: FeedDomain>(bytes: &[u8]) -> WebSocketResult<Decoded<D>> {
    let raw: RawFrame =
        serde_json::from_slice(bytes).map_err(|err| WebSocketError::ParseFailed(err.to_string()))?;

    let Some(kind) = D::frame_kind(&raw.kind) else {
        return Ok(Decoded::Unknown(raw.kind));
    };

    let event = match kind {
        FrameKind::Update => FeedEvent::Update(payload(&raw.kind, raw.data)?),
        FrameKind::Stats => FeedEvent::Stats(payload(&raw.kind, raw.data)?),
        FrameKind::Alert => FeedEvent::Alert(payload(&raw.kind, raw.data)?),
        FrameKind::Log => FeedEvent::Log(payload(&raw.kind, raw.data)?),
    };
    Ok(Decoded::Event(event))
}

/// What happened to a routed frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    Dispatched { kind: FrameKind, listeners: usize },
    Ignored { discriminator: String },
    Malformed { error: String },
}

/// Decodes frames of one domain and fans them out to its listeners.
pub struct FeedRouter<D: FeedDomain> {
    listeners: FeedListeners<D>,
}

impl<D: FeedDomain> FeedRouter<D> {
    pub fn new(listeners: FeedListeners<D>) -> Self {
        Self { listeners }
    }

    pub fn listeners(&self) -> &FeedListeners<D> {
        &self.listeners
    }

    /// Route one data frame. Never fails: parse errors are logged and reported in the outcome.
    pub fn route(&self, bytes: &[u8]) -> RouteOutcome {
        match decode_frame::<D>(bytes) {
            Ok(Decoded::Event(event)) => {
                let kind = event.kind();
                let listeners = self.listeners.dispatch(&event);
                RouteOutcome::Dispatched { kind, listeners }
            }
            Ok(Decoded::Unknown(discriminator)) => {
                debug!(domain = D::NAME, discriminator = %discriminator, "ignoring unknown frame type");
                RouteOutcome::Ignored { discriminator }
            }
            Err(err) => {
                warn!(domain = D::NAME, error = %err, len = bytes.len(), "dropping malformed frame");
                RouteOutcome::Malformed {
                    error: err.to_string(),
                }
            }
        }
    }
}
