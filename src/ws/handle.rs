use kameo::error::SendError;
use kameo::prelude::{Actor, ActorRef};
use tokio::sync::watch;
use url::Url;

use super::actor::{
    Connect, Disconnect, FeedActor, FeedActorArgs, GetConnectionStats, GetConnectionStatus,
    SendCommand,
};
use crate::config::ConsoleConfig;
use crate::core::{
    CommandOutcome, FeedCommand, FeedDomain, FeedListeners, LinearBackoffReconnect, Listener,
    Subscription, WebSocketBufferConfig, WebSocketError, WebSocketResult, WsConnectionStats,
    WsConnectionStatus, WsReconnectStrategy, WsTlsConfig,
};
use crate::transport::WsTransport;
use crate::transport::tungstenite::TungsteniteTransport;

fn flatten<M, T>(res: Result<T, SendError<M, WebSocketError>>) -> WebSocketResult<T> {
    match res {
        Ok(value) => Ok(value),
        Err(SendError::HandlerError(err)) => Err(err),
        Err(_) => Err(WebSocketError::ActorError("feed actor unavailable".to_string())),
    }
}

/// Construction parameters for a [`FeedClient`].
pub struct FeedClientOptions<R, T> {
    pub base_url: Url,
    pub transport: T,
    pub reconnect: R,
    pub buffers: WebSocketBufferConfig,
    pub tls: WsTlsConfig,
}

impl FeedClientOptions<LinearBackoffReconnect, TungsteniteTransport> {
    /// Production options derived from the console configuration.
    pub fn from_config(config: &ConsoleConfig) -> Self {
        Self {
            base_url: config.ws_url.clone(),
            transport: TungsteniteTransport,
            reconnect: LinearBackoffReconnect::new(
                config.reconnect_base_interval,
                config.reconnect_max_attempts,
            ),
            buffers: WebSocketBufferConfig::default(),
            tls: WsTlsConfig {
                validate_certs: config.validate_certs,
            },
        }
    }
}

/// Cloneable handle to one feed connection.
///
/// Listeners are registered directly on the shared registries, so registration never waits
/// on the actor. Connection control goes through the actor mailbox.
pub struct FeedClient<D, R = LinearBackoffReconnect, T = TungsteniteTransport>
where
    D: FeedDomain,
    R: WsReconnectStrategy,
    T: WsTransport,
{
    actor: ActorRef<FeedActor<D, R, T>>,
    listeners: FeedListeners<D>,
    status_rx: watch::Receiver<WsConnectionStatus>,
}

impl<D, R, T> Clone for FeedClient<D, R, T>
where
    D: FeedDomain,
    R: WsReconnectStrategy,
    T: WsTransport,
{
    fn clone(&self) -> Self {
        Self {
            actor: self.actor.clone(),
            listeners: self.listeners.clone(),
            status_rx: self.status_rx.clone(),
        }
    }
}

impl<D: FeedDomain> FeedClient<D> {
    /// Spawn a production feed client for `D`.
    pub fn from_config(config: &ConsoleConfig) -> Self {
        Self::spawn(FeedClientOptions::from_config(config))
    }
}

impl<D, R, T> FeedClient<D, R, T>
where
    D: FeedDomain,
    R: WsReconnectStrategy,
    T: WsTransport,
{
    /// Spawn the feed actor. The feed starts `Idle`; call [`connect`](Self::connect) to open it.
    pub fn spawn(options: FeedClientOptions<R, T>) -> Self {
        let listeners = FeedListeners::<D>::new();
        let (status_tx, status_rx) = watch::channel(WsConnectionStatus::Idle);
        let actor = FeedActor::spawn(FeedActorArgs {
            base_url: options.base_url,
            transport: options.transport,
            reconnect: options.reconnect,
            listeners: listeners.clone(),
            status_tx,
            buffers: options.buffers,
            tls: options.tls,
        });
        Self {
            actor,
            listeners,
            status_rx,
        }
    }

    pub async fn connect(&self, scope: Option<&str>) -> WebSocketResult<()> {
        flatten(
            self.actor
                .ask(Connect {
                    scope: scope.map(str::to_owned),
                })
                .await,
        )
    }

    pub async fn disconnect(&self) -> WebSocketResult<()> {
        flatten(self.actor.ask(Disconnect).await)
    }

    /// Write a command when the feed is open; otherwise nothing is sent.
    pub async fn send_command(&self, command: FeedCommand) -> WebSocketResult<CommandOutcome> {
        flatten(self.actor.ask(SendCommand(command)).await)
    }

    pub fn on_update<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&D::Entity) + Send + Sync + 'static,
    {
        self.listeners.updates.add(callback)
    }

    pub fn on_stats<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&D::Stats) + Send + Sync + 'static,
    {
        self.listeners.stats.add(callback)
    }

    pub fn on_alert<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&D::Alert) + Send + Sync + 'static,
    {
        self.listeners.alerts.add(callback)
    }

    pub fn on_log<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&D::Log) + Send + Sync + 'static,
    {
        self.listeners.logs.add(callback)
    }

    /// Remove a previously registered update callback by identity.
    pub fn remove_update_listener(&self, listener: &Listener<D::Entity>) -> bool {
        self.listeners.updates.remove_listener(listener)
    }

    pub fn remove_stats_listener(&self, listener: &Listener<D::Stats>) -> bool {
        self.listeners.stats.remove_listener(listener)
    }

    pub fn remove_alert_listener(&self, listener: &Listener<D::Alert>) -> bool {
        self.listeners.alerts.remove_listener(listener)
    }

    pub fn remove_log_listener(&self, listener: &Listener<D::Log>) -> bool {
        self.listeners.logs.remove_listener(listener)
    }

    pub fn listeners(&self) -> &FeedListeners<D> {
        &self.listeners
    }

    /// Last status published by the actor.
    pub fn status(&self) -> WsConnectionStatus {
        *self.status_rx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.status().is_open()
    }

    /// Watch status transitions.
    pub fn status_receiver(&self) -> watch::Receiver<WsConnectionStatus> {
        self.status_rx.clone()
    }

    /// Wait until the published status satisfies `pred`.
    pub async fn wait_for_status<P>(&self, pred: P) -> WebSocketResult<WsConnectionStatus>
    where
        P: FnMut(&WsConnectionStatus) -> bool,
    {
        let mut rx = self.status_rx.clone();
        rx.wait_for(pred)
            .await
            .map(|status| *status)
            .map_err(|_| WebSocketError::ActorError("feed actor stopped".to_string()))
    }

    /// Status as seen by the actor itself, after every queued message is handled.
    pub async fn current_status(&self) -> WebSocketResult<WsConnectionStatus> {
        flatten(self.actor.ask(GetConnectionStatus).await)
    }

    pub async fn stats(&self) -> WebSocketResult<WsConnectionStats> {
        flatten(self.actor.ask(GetConnectionStats).await)
    }

    /// Disconnect and stop the actor. Other clones of this handle become inert.
    pub async fn shutdown(&self) {
        let _ = self.disconnect().await;
        let _ = self.actor.stop_gracefully().await;
        self.actor.wait_for_shutdown().await;
    }
}
