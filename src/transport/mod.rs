use std::future::Future;
use std::pin::Pin;

use futures_util::{Sink, Stream};

use crate::core::{WebSocketBufferConfig, WebSocketError, WsFrame, WsTlsConfig};

pub mod tungstenite;

/// Future returned by [`WsTransport::connect`].
pub type WsConnectFuture<R, W> =
    Pin<Box<dyn Future<Output = Result<(R, W), WebSocketError>> + Send>>;

/// Transport boundary for websocket IO.
///
/// The feed actor owns connection state and policy; the transport only opens a socket and
/// hands back its two halves. Tests swap in [`crate::testing::MockTransport`].
pub trait WsTransport: Clone + Send + Sync + 'static {
    type Reader: Stream<Item = Result<WsFrame, WebSocketError>> + Send + Unpin + 'static;
    type Writer: Sink<WsFrame, Error = WebSocketError> + Send + Sync + Unpin + 'static;

    fn connect(
        &self,
        url: String,
        buffers: WebSocketBufferConfig,
        tls: WsTlsConfig,
    ) -> WsConnectFuture<Self::Reader, Self::Writer>;
}
