use futures_util::{Sink, SinkExt};
use kameo::error::ActorStopReason;
use kameo::prelude::{Actor, ActorRef, Context, Message as KameoMessage, WeakActorRef};
use tokio::sync::watch;
use tracing::debug;

use crate::core::{WebSocketError, WebSocketResult, WsFrame};

/// Writer actor that owns the transport writer and serializes writes.
///
/// One writer is spawned per established connection and stopped when the connection is torn
/// down; it never outlives the socket it writes to.
pub struct WsWriterActor<W>
where
    W: Sink<WsFrame, Error = WebSocketError> + Send + Sync + Unpin + 'static,
{
    writer: W,
    shutdown_rx: watch::Receiver<bool>,
}

impl<W> WsWriterActor<W>
where
    W: Sink<WsFrame, Error = WebSocketError> + Send + Sync + Unpin + 'static,
{
    pub fn new(writer: W, shutdown_rx: watch::Receiver<bool>) -> Self {
        Self {
            writer,
            shutdown_rx,
        }
    }
}

impl<W> Actor for WsWriterActor<W>
where
    W: Sink<WsFrame, Error = WebSocketError> + Send + Sync + Unpin + 'static,
{
    type Args = Self;
    type Error = WebSocketError;

    async fn on_start(args: Self::Args, _ctx: ActorRef<Self>) -> Result<Self, Self::Error> {
        Ok(args)
    }

    async fn on_stop(
        &mut self,
        _ctx: WeakActorRef<Self>,
        _reason: ActorStopReason,
    ) -> Result<(), Self::Error> {
        if let Err(err) = self.writer.close().await {
            debug!(target: "ws-writer", error = %err, "writer close failed");
        }
        Ok(())
    }
}

pub struct WriterWrite {
    pub frame: WsFrame,
}

impl<W> KameoMessage<WriterWrite> for WsWriterActor<W>
where
    W: Sink<WsFrame, Error = WebSocketError> + Send + Sync + Unpin + 'static,
{
    type Reply = WebSocketResult<()>;

    async fn handle(
        &mut self,
        msg: WriterWrite,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        if *self.shutdown_rx.borrow() {
            return Err(WebSocketError::InvalidState("writer stopped".to_string()));
        }
        debug!(target: "ws-writer", "sending websocket frame to wire");
        self.writer.send(msg.frame).await
    }
}
