//! Feed connection actor.
//!
//! The websocket IO loop runs outside kameo; the actor owns connection state, the reconnect
//! policy and the router, and receives frames via messages. Every connection attempt is
//! tagged with a generation number so that events from a superseded socket (after a
//! disconnect or a reconnect) are discarded instead of acted on.

use std::time::Duration;

use futures_util::StreamExt;
use kameo::error::{ActorStopReason, SendError};
use kameo::prelude::{Actor, ActorRef, Context, Message as KameoMessage, WeakActorRef};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, warn};
use url::Url;

use super::endpoint::feed_endpoint;
use super::writer::{WriterWrite, WsWriterActor};
use crate::core::{
    CLOSE_NORMAL, CommandOutcome, FeedCommand, FeedDomain, FeedListeners, FeedRouter,
    LinearBackoffReconnect, RouteOutcome, WebSocketBufferConfig, WebSocketError, WebSocketResult,
    WsConnectionStats, WsConnectionStatus, WsDisconnectCause, WsFrame, WsHealthMonitor,
    WsReconnectStrategy, WsTlsConfig, describe_close,
};
use crate::transport::WsTransport;
use crate::transport::tungstenite::TungsteniteTransport;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Arguments passed when constructing a feed actor.
pub struct FeedActorArgs<D, R = LinearBackoffReconnect, T = TungsteniteTransport>
where
    D: FeedDomain,
    R: WsReconnectStrategy,
    T: WsTransport,
{
    pub base_url: Url,
    pub transport: T,
    pub reconnect: R,
    pub listeners: FeedListeners<D>,
    pub status_tx: watch::Sender<WsConnectionStatus>,
    pub buffers: WebSocketBufferConfig,
    pub tls: WsTlsConfig,
}

/// Owns one feed connection of domain `D`.
pub struct FeedActor<D, R = LinearBackoffReconnect, T = TungsteniteTransport>
where
    D: FeedDomain,
    R: WsReconnectStrategy,
    T: WsTransport,
{
    base_url: Url,
    transport: T,
    reconnect: R,
    router: FeedRouter<D>,
    health: WsHealthMonitor,
    buffers: WebSocketBufferConfig,
    tls: WsTlsConfig,
    actor_ref: ActorRef<Self>,
    status: WsConnectionStatus,
    status_tx: watch::Sender<WsConnectionStatus>,
    endpoint: Option<String>,
    generation: u64,
    connect_task: Option<JoinHandle<()>>,
    reconnect_task: Option<JoinHandle<()>>,
    reader_task: Option<JoinHandle<()>>,
    writer_ref: Option<ActorRef<WsWriterActor<T::Writer>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl<D, R, T> Actor for FeedActor<D, R, T>
where
    D: FeedDomain,
    R: WsReconnectStrategy,
    T: WsTransport,
{
    type Args = FeedActorArgs<D, R, T>;
    type Error = WebSocketError;

    async fn on_start(args: Self::Args, ctx: ActorRef<Self>) -> WebSocketResult<Self> {
        let FeedActorArgs {
            base_url,
            transport,
            reconnect,
            listeners,
            status_tx,
            buffers,
            tls,
        } = args;

        let (shutdown_tx, _) = watch::channel(false);
        status_tx.send_replace(WsConnectionStatus::Idle);

        Ok(Self {
            base_url,
            transport,
            reconnect,
            router: FeedRouter::new(listeners),
            health: WsHealthMonitor::new(),
            buffers,
            tls,
            actor_ref: ctx,
            status: WsConnectionStatus::Idle,
            status_tx,
            endpoint: None,
            generation: 0,
            connect_task: None,
            reconnect_task: None,
            reader_task: None,
            writer_ref: None,
            shutdown_tx,
        })
    }

    async fn on_stop(
        &mut self,
        _ctx: WeakActorRef<Self>,
        _reason: ActorStopReason,
    ) -> WebSocketResult<()> {
        self.cancel_pending();
        self.teardown_connection().await;
        self.set_status(WsConnectionStatus::Idle);
        Ok(())
    }
}

/// Open the feed. A no-op while a connection is active; from `Idle` or `Exhausted` it starts
/// a fresh cycle with the attempt counter reset.
pub struct Connect {
    pub scope: Option<String>,
}

/// Close the feed on purpose: no reconnect follows and every listener is dropped.
pub struct Disconnect;

/// Serialize and write one command if the socket is open.
pub struct SendCommand(pub FeedCommand);

pub struct GetConnectionStatus;

pub struct GetConnectionStats;

pub(crate) struct ConnectionEstablished<T: WsTransport> {
    generation: u64,
    reader: T::Reader,
    writer: T::Writer,
}

pub(crate) struct ConnectionFailed {
    generation: u64,
    error: String,
}

pub(crate) struct InboundFrame {
    generation: u64,
    frame: WsFrame,
}

pub(crate) struct ConnectionLost {
    generation: u64,
    cause: WsDisconnectCause,
}

pub(crate) struct ReconnectDue {
    generation: u64,
}

impl<D, R, T> KameoMessage<Connect> for FeedActor<D, R, T>
where
    D: FeedDomain,
    R: WsReconnectStrategy,
    T: WsTransport,
{
    type Reply = WebSocketResult<()>;

    async fn handle(&mut self, msg: Connect, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        if self.status.is_active() {
            debug!(domain = D::NAME, status = ?self.status, "connect ignored; connection already active");
            return Ok(());
        }

        let url = feed_endpoint::<D>(&self.base_url, msg.scope.as_deref())?;
        self.endpoint = Some(url.to_string());
        self.generation = self.generation.wrapping_add(1);
        self.reconnect.reset();
        self.start_connect();
        Ok(())
    }
}

impl<D, R, T> KameoMessage<Disconnect> for FeedActor<D, R, T>
where
    D: FeedDomain,
    R: WsReconnectStrategy,
    T: WsTransport,
{
    type Reply = WebSocketResult<()>;

    async fn handle(
        &mut self,
        _msg: Disconnect,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        self.generation = self.generation.wrapping_add(1);
        self.cancel_pending();

        if let Some(writer) = self.writer_ref.as_ref() {
            let close = WriterWrite {
                frame: WsFrame::close(CLOSE_NORMAL, "client disconnect"),
            };
            match tokio::time::timeout(CLOSE_TIMEOUT, async { writer.ask(close).await }).await {
                Ok(Ok(())) => debug!(domain = D::NAME, "close frame sent"),
                Ok(Err(_)) | Err(_) => debug!(domain = D::NAME, "close frame not delivered"),
            }
        }

        self.teardown_connection().await;
        self.router.listeners().clear_all();
        self.reconnect.reset();
        self.endpoint = None;
        self.set_status(WsConnectionStatus::Idle);
        info!(domain = D::NAME, "feed disconnected");
        Ok(())
    }
}

impl<D, R, T> KameoMessage<SendCommand> for FeedActor<D, R, T>
where
    D: FeedDomain,
    R: WsReconnectStrategy,
    T: WsTransport,
{
    type Reply = WebSocketResult<CommandOutcome>;

    async fn handle(
        &mut self,
        msg: SendCommand,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        let writer = match (&self.writer_ref, self.status.is_open()) {
            (Some(writer), true) => writer.clone(),
            _ => {
                self.health.record_command(false);
                debug!(domain = D::NAME, command = %msg.0.command, "command dropped; feed not open");
                return Ok(CommandOutcome::NotConnected);
            }
        };

        let payload = msg.0.to_json()?;
        match writer.ask(WriterWrite { frame: WsFrame::text(payload) }).await {
            Ok(()) => {
                self.health.record_command(true);
                Ok(CommandOutcome::Sent)
            }
            Err(err) => {
                let error = match err {
                    SendError::HandlerError(err) => err.to_string(),
                    _ => "writer unavailable".to_string(),
                };
                self.health.record_command(false);
                self.health.record_error("command", &error);
                warn!(domain = D::NAME, command = %msg.0.command, error = %error, "command write failed");
                self.on_connection_lost(WsDisconnectCause::WriteFailure { error })
                    .await;
                Ok(CommandOutcome::NotConnected)
            }
        }
    }
}

impl<D, R, T> KameoMessage<GetConnectionStatus> for FeedActor<D, R, T>
where
    D: FeedDomain,
    R: WsReconnectStrategy,
    T: WsTransport,
{
    type Reply = WebSocketResult<WsConnectionStatus>;

    async fn handle(
        &mut self,
        _msg: GetConnectionStatus,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        Ok(self.status)
    }
}

impl<D, R, T> KameoMessage<GetConnectionStats> for FeedActor<D, R, T>
where
    D: FeedDomain,
    R: WsReconnectStrategy,
    T: WsTransport,
{
    type Reply = WebSocketResult<WsConnectionStats>;

    async fn handle(
        &mut self,
        _msg: GetConnectionStats,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        Ok(self.health.get_stats())
    }
}

impl<D, R, T> KameoMessage<ConnectionEstablished<T>> for FeedActor<D, R, T>
where
    D: FeedDomain,
    R: WsReconnectStrategy,
    T: WsTransport,
{
    type Reply = ();

    async fn handle(
        &mut self,
        msg: ConnectionEstablished<T>,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        if msg.generation != self.generation {
            debug!(domain = D::NAME, "discarding connection from a superseded attempt");
            return;
        }
        self.connect_task = None;
        self.on_connection_established(msg.reader, msg.writer);
    }
}

impl<D, R, T> KameoMessage<ConnectionFailed> for FeedActor<D, R, T>
where
    D: FeedDomain,
    R: WsReconnectStrategy,
    T: WsTransport,
{
    type Reply = ();

    async fn handle(
        &mut self,
        msg: ConnectionFailed,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        if msg.generation != self.generation {
            return;
        }
        self.connect_task = None;
        self.health.record_error("connect", &msg.error);
        warn!(domain = D::NAME, error = %msg.error, "feed connection failed");
        self.schedule_reconnect(WsDisconnectCause::HandshakeFailed { message: msg.error });
    }
}

impl<D, R, T> KameoMessage<InboundFrame> for FeedActor<D, R, T>
where
    D: FeedDomain,
    R: WsReconnectStrategy,
    T: WsTransport,
{
    type Reply = ();

    async fn handle(
        &mut self,
        msg: InboundFrame,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        if msg.generation != self.generation {
            return;
        }
        self.process_inbound(msg.frame).await;
    }
}

impl<D, R, T> KameoMessage<ConnectionLost> for FeedActor<D, R, T>
where
    D: FeedDomain,
    R: WsReconnectStrategy,
    T: WsTransport,
{
    type Reply = ();

    async fn handle(
        &mut self,
        msg: ConnectionLost,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        if msg.generation != self.generation {
            return;
        }
        self.on_connection_lost(msg.cause).await;
    }
}

impl<D, R, T> KameoMessage<ReconnectDue> for FeedActor<D, R, T>
where
    D: FeedDomain,
    R: WsReconnectStrategy,
    T: WsTransport,
{
    type Reply = ();

    async fn handle(
        &mut self,
        msg: ReconnectDue,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        if msg.generation != self.generation
            || !matches!(self.status, WsConnectionStatus::Reconnecting { .. })
        {
            return;
        }
        self.reconnect_task = None;
        self.start_connect();
    }
}

impl<D, R, T> FeedActor<D, R, T>
where
    D: FeedDomain,
    R: WsReconnectStrategy,
    T: WsTransport,
{
    fn set_status(&mut self, status: WsConnectionStatus) {
        if self.status == status {
            return;
        }
        debug!(domain = D::NAME, from = ?self.status, to = ?status, "connection status changed");
        self.status = status;
        self.status_tx.send_replace(status);
    }

    fn start_connect(&mut self) {
        let Some(url) = self.endpoint.clone() else {
            return;
        };
        self.set_status(WsConnectionStatus::Connecting);
        info!(domain = D::NAME, url = %url, attempt = self.reconnect.attempts(), "connecting feed");

        let actor_ref = self.actor_ref.clone();
        let transport = self.transport.clone();
        let buffers = self.buffers;
        let tls = self.tls;
        let generation = self.generation;

        self.connect_task = Some(tokio::spawn(async move {
            match transport.connect(url, buffers, tls).await {
                Ok((reader, writer)) => {
                    let _ = actor_ref
                        .tell(ConnectionEstablished::<T> {
                            generation,
                            reader,
                            writer,
                        })
                        .send()
                        .await;
                }
                Err(err) => {
                    let _ = actor_ref
                        .tell(ConnectionFailed {
                            generation,
                            error: err.to_string(),
                        })
                        .send()
                        .await;
                }
            }
        }));
    }

    fn on_connection_established(&mut self, reader: T::Reader, writer: T::Writer) {
        self.health.reset();
        self.reconnect.reset();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        self.shutdown_tx = shutdown_tx;
        self.writer_ref = Some(WsWriterActor::spawn(WsWriterActor::new(
            writer,
            shutdown_rx.clone(),
        )));
        self.reader_task = Some(spawn_reader::<D, R, T>(
            self.actor_ref.clone(),
            self.generation,
            reader,
            shutdown_rx,
        ));

        self.set_status(WsConnectionStatus::Open);
        info!(domain = D::NAME, "feed connection established");
    }

    async fn process_inbound(&mut self, frame: WsFrame) {
        self.health.record_frame();
        match frame {
            WsFrame::Text(bytes) | WsFrame::Binary(bytes) => match self.router.route(&bytes) {
                RouteOutcome::Dispatched { .. } => self.health.record_dispatch(),
                RouteOutcome::Ignored { .. } => self.health.record_ignored(),
                RouteOutcome::Malformed { error } => self.health.record_parse_failure(&error),
            },
            WsFrame::Ping(payload) => {
                let Some(writer) = self.writer_ref.clone() else {
                    return;
                };
                if writer
                    .ask(WriterWrite {
                        frame: WsFrame::Pong(payload),
                    })
                    .await
                    .is_err()
                {
                    debug!(domain = D::NAME, "pong not delivered");
                }
            }
            // Close frames are reported by the reader as a lost connection.
            WsFrame::Pong(_) | WsFrame::Close(_) => {}
        }
    }

    async fn on_connection_lost(&mut self, cause: WsDisconnectCause) {
        if !self.status.is_open() {
            return;
        }
        info!(domain = D::NAME, cause = ?cause, "feed connection lost");
        // Frames still in flight from the dead socket must not be routed.
        self.generation = self.generation.wrapping_add(1);
        self.teardown_connection().await;
        self.schedule_reconnect(cause);
    }

    fn schedule_reconnect(&mut self, cause: WsDisconnectCause) {
        if !self.reconnect.should_retry() {
            warn!(
                domain = D::NAME,
                attempts = self.reconnect.attempts(),
                cause = ?cause,
                "reconnect attempts exhausted; feed stays closed until reconnected manually"
            );
            self.set_status(WsConnectionStatus::Exhausted);
            return;
        }

        let delay = self.reconnect.next_delay();
        let attempt = self.reconnect.attempts();
        self.health.increment_reconnect();
        info!(
            domain = D::NAME,
            attempt,
            delay_ms = delay.as_millis() as u64,
            cause = ?cause,
            "scheduling reconnect"
        );
        self.set_status(WsConnectionStatus::Reconnecting { attempt });

        let actor_ref = self.actor_ref.clone();
        let generation = self.generation;
        self.reconnect_task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = actor_ref.tell(ReconnectDue { generation }).send().await;
        }));
    }

    fn cancel_pending(&mut self) {
        if let Some(task) = self.connect_task.take() {
            task.abort();
        }
        if let Some(task) = self.reconnect_task.take() {
            task.abort();
        }
    }

    async fn teardown_connection(&mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(reader) = self.reader_task.take() {
            reader.abort();
        }
        if let Some(writer) = self.writer_ref.take() {
            let _ = writer.stop_gracefully().await;
            writer.wait_for_shutdown().await;
        }
    }
}

fn spawn_reader<D, R, T>(
    actor_ref: ActorRef<FeedActor<D, R, T>>,
    generation: u64,
    mut reader: T::Reader,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    D: FeedDomain,
    R: WsReconnectStrategy,
    T: WsTransport,
{
    tokio::spawn(async move {
        let cause = loop {
            tokio::select! {
                res = shutdown_rx.changed() => {
                    if res.is_err() || *shutdown_rx.borrow_and_update() {
                        return;
                    }
                }
                next = reader.next() => match next {
                    Some(Ok(WsFrame::Close(frame))) => {
                        break WsDisconnectCause::RemoteClosed {
                            reason: describe_close(frame.as_ref()),
                        };
                    }
                    Some(Ok(frame)) => {
                        if actor_ref
                            .tell(InboundFrame { generation, frame })
                            .send()
                            .await
                            .is_err()
                        {
                            return;
                        }
                    }
                    Some(Err(err)) => {
                        break WsDisconnectCause::ReadFailure {
                            error: err.to_string(),
                        };
                    }
                    None => break WsDisconnectCause::StreamEnded,
                },
            }
        };
        let _ = actor_ref.tell(ConnectionLost { generation, cause }).send().await;
    })
}
