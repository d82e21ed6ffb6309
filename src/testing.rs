//! Reusable test utilities for exercising feeds and controllers without a real server.
//!
//! [`MockTransport`] hands every accepted connection to a [`MockListener`] as a
//! [`MockServer`], so tests can push frames, read commands and drop sockets to drive the
//! reconnect path deterministically. [`MockControlTransport`] replays canned REST responses.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::Sink;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::control::{ControlError, ControlRequest, ControlResponse, ControlResult, ControlTransport};
use crate::core::{WebSocketBufferConfig, WebSocketError, WsFrame, WsTlsConfig};
use crate::transport::{WsConnectFuture, WsTransport};

struct MockInner {
    accepted_tx: mpsc::UnboundedSender<MockServer>,
    connects: AtomicU32,
    refuse: AtomicBool,
    fail_writes: AtomicBool,
    handshake_delay: Mutex<Duration>,
    urls: Mutex<Vec<String>>,
}

/// A transport that uses in-memory channels so tests can emulate server behavior.
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<MockInner>,
}

impl MockTransport {
    /// Build a transport and the listener that receives its connections.
    pub fn new() -> (Self, MockListener) {
        let (accepted_tx, accepted_rx) = mpsc::unbounded_channel();
        (
            Self {
                inner: Arc::new(MockInner {
                    accepted_tx,
                    connects: AtomicU32::new(0),
                    refuse: AtomicBool::new(false),
                    fail_writes: AtomicBool::new(false),
                    handshake_delay: Mutex::new(Duration::ZERO),
                    urls: Mutex::new(Vec::new()),
                }),
            },
            MockListener { accepted_rx },
        )
    }

    /// Connection attempts seen so far, refused ones included.
    pub fn connect_count(&self) -> u32 {
        self.inner.connects.load(Ordering::SeqCst)
    }

    /// Fail every following handshake until switched back.
    pub fn set_refuse(&self, refuse: bool) {
        self.inner.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Make every writer, open or future, reject frames until switched back.
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Hold each following handshake for `delay` before it completes.
    pub fn set_handshake_delay(&self, delay: Duration) {
        *self.inner.handshake_delay.lock() = delay;
    }

    /// Urls of every attempt, in order.
    pub fn urls(&self) -> Vec<String> {
        self.inner.urls.lock().clone()
    }
}

impl WsTransport for MockTransport {
    type Reader = MockReader;
    type Writer = MockWriter;

    fn connect(
        &self,
        url: String,
        _buffers: WebSocketBufferConfig,
        _tls: WsTlsConfig,
    ) -> WsConnectFuture<Self::Reader, Self::Writer> {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            inner.connects.fetch_add(1, Ordering::SeqCst);
            inner.urls.lock().push(url.clone());
            let delay = *inner.handshake_delay.lock();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if inner.refuse.load(Ordering::SeqCst) {
                return Err(WebSocketError::ConnectionFailed(format!(
                    "connection refused: {url}"
                )));
            }

            let (sent_tx, sent_rx) = mpsc::unbounded_channel();
            let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
            let _ = inner.accepted_tx.send(MockServer {
                url,
                outbound_rx: sent_rx,
                inbound_tx: Some(inbound_tx),
            });
            Ok((
                MockReader { rx: inbound_rx },
                MockWriter {
                    sent_tx,
                    inner: Arc::clone(&inner),
                },
            ))
        })
    }
}

/// Receives the server side of every connection a [`MockTransport`] accepts.
pub struct MockListener {
    accepted_rx: mpsc::UnboundedReceiver<MockServer>,
}

impl MockListener {
    pub async fn accept(&mut self) -> Option<MockServer> {
        self.accepted_rx.recv().await
    }

    pub async fn accept_timeout(&mut self, timeout: Duration) -> Option<MockServer> {
        tokio::time::timeout(timeout, self.accepted_rx.recv())
            .await
            .unwrap_or_default()
    }
}

/// Error surface for operations on [`MockServer`].
#[derive(Debug, Clone, Copy, Eq, PartialEq, thiserror::Error)]
pub enum MockServerError {
    #[error("mock socket already dropped")]
    SocketDropped,
    #[error("mock client side is closed")]
    ChannelClosed,
}

/// Server-side handle of one mock connection.
pub struct MockServer {
    url: String,
    outbound_rx: mpsc::UnboundedReceiver<WsFrame>,
    inbound_tx: Option<mpsc::UnboundedSender<WsFrame>>,
}

impl MockServer {
    /// Url the client connected to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Receive a frame written by the client.
    pub async fn recv_outbound(&mut self) -> Option<WsFrame> {
        self.outbound_rx.recv().await
    }

    pub async fn recv_outbound_timeout(&mut self, timeout: Duration) -> Option<WsFrame> {
        tokio::time::timeout(timeout, self.outbound_rx.recv())
            .await
            .unwrap_or_default()
    }

    pub fn send_inbound(&self, frame: WsFrame) -> Result<(), MockServerError> {
        let Some(tx) = self.inbound_tx.as_ref() else {
            return Err(MockServerError::SocketDropped);
        };
        tx.send(frame).map_err(|_| MockServerError::ChannelClosed)
    }

    pub fn send_text(&self, text: impl Into<String>) -> Result<(), MockServerError> {
        self.send_inbound(WsFrame::text(text))
    }

    /// Send a close frame, then end the stream.
    pub fn close(&mut self, code: u16, reason: &'static str) -> Result<(), MockServerError> {
        let sent = self.send_inbound(WsFrame::close(code, reason));
        self.inbound_tx = None;
        sent
    }

    /// Simulate an abrupt drop: the client's reader sees the stream end.
    pub fn drop_socket(&mut self) {
        self.inbound_tx = None;
    }
}

/// Reader side for [`MockTransport`].
pub struct MockReader {
    rx: mpsc::UnboundedReceiver<WsFrame>,
}

impl futures_util::Stream for MockReader {
    type Item = Result<WsFrame, WebSocketError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match Pin::new(&mut self.rx).poll_recv(cx) {
            Poll::Ready(Some(frame)) => Poll::Ready(Some(Ok(frame))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Writer side for [`MockTransport`].
pub struct MockWriter {
    sent_tx: mpsc::UnboundedSender<WsFrame>,
    inner: Arc<MockInner>,
}

impl Sink<WsFrame> for MockWriter {
    type Error = WebSocketError;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn start_send(self: Pin<&mut Self>, item: WsFrame) -> Result<(), Self::Error> {
        let this = self.get_mut();
        if this.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(WebSocketError::TransportError {
                context: "mock_transport_write",
                error: "broken pipe".to_string(),
            });
        }
        this.sent_tx
            .send(item)
            .map_err(|_| WebSocketError::TransportError {
                context: "mock_transport_write",
                error: "mock outbound channel closed".to_string(),
            })
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }
}

/// Replays queued REST responses and records every request.
#[derive(Clone, Default)]
pub struct MockControlTransport {
    responses: Arc<Mutex<VecDeque<ControlResult<ControlResponse>>>>,
    requests: Arc<Mutex<Vec<ControlRequest>>>,
}

impl MockControlTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response with `status` and `body`.
    pub fn respond(&self, status: u16, body: impl Into<String>) {
        self.responses.lock().push_back(Ok(ControlResponse {
            status,
            body: body.into(),
        }));
    }

    /// Queue a transport-level failure.
    pub fn fail(&self, error: impl Into<String>) {
        self.responses
            .lock()
            .push_back(Err(ControlError::Transport(error.into())));
    }

    pub fn requests(&self) -> Vec<ControlRequest> {
        self.requests.lock().clone()
    }
}

impl ControlTransport for MockControlTransport {
    fn execute(&self, request: ControlRequest) -> BoxFuture<'_, ControlResult<ControlResponse>> {
        self.requests.lock().push(request);
        let next = self.responses.lock().pop_front();
        Box::pin(async move {
            next.unwrap_or_else(|| Err(ControlError::Transport("no mock response queued".into())))
        })
    }
}
