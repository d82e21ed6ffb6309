//! Bare websocket endpoint used by local servers in tests and demos.
//!
//! Unlike the feed actor this does no routing or reconnecting; it simply exchanges
//! [`WsFrame`]s over one socket.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, accept_hdr_async,
    tungstenite::handshake::server::{ErrorResponse, Request, Response},
};

use crate::core::{WebSocketError, WsFrame};
use crate::transport::tungstenite::{frame_to_msg, map_ws_error, msg_to_frame};

/// Thin wrapper around a websocket stream that hides tungstenite types.
pub struct WsClient {
    inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsClient {
    pub async fn send(&mut self, frame: WsFrame) -> Result<(), WebSocketError> {
        self.inner
            .send(frame_to_msg(frame))
            .await
            .map_err(|e| map_ws_error("write", e))
    }

    pub async fn send_text(&mut self, text: impl Into<String>) -> Result<(), WebSocketError> {
        self.send(WsFrame::text(text)).await
    }

    pub async fn next(&mut self) -> Option<Result<WsFrame, WebSocketError>> {
        self.inner
            .next()
            .await
            .map(|res| res.map(msg_to_frame).map_err(|e| map_ws_error("read", e)))
    }
}

/// Accept an incoming websocket connection and report the request target (path and query).
pub async fn accept_with_target(stream: TcpStream) -> Result<(WsClient, String), WebSocketError> {
    let mut target = String::new();
    let ws = accept_hdr_async(
        MaybeTlsStream::Plain(stream),
        |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            target = req.uri().to_string();
            Ok(resp)
        },
    )
    .await
    .map_err(|err| WebSocketError::ConnectionFailed(err.to_string()))?;
    Ok((WsClient { inner: ws }, target))
}
