//! Scoped live view over one feed.
//!
//! A [`FeedScope`] connects a [`FeedClient`], folds every pushed event into local state
//! (entity list, latest stats, recent alerts and logs) and tears the connection down when it
//! is closed or dropped.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::debug;

use super::handle::FeedClient;
use crate::core::{
    CircularBuffer, CommandOutcome, EntityStore, FeedCommand, FeedDomain, LinearBackoffReconnect,
    Listener, Subscription, WebSocketResult, WsConnectionStatus, WsReconnectStrategy,
};
use crate::transport::WsTransport;
use crate::transport::tungstenite::TungsteniteTransport;

pub const DEFAULT_ALERT_HISTORY: usize = 50;
pub const DEFAULT_LOG_HISTORY: usize = 500;

struct ScopeState<D: FeedDomain> {
    entities: EntityStore<D::Entity>,
    stats: Option<D::Stats>,
    alerts: CircularBuffer<D::Alert>,
    logs: CircularBuffer<D::Log>,
}

/// The scope's own folding callbacks, kept so they can be registered again after a
/// disconnect has cleared the client's registries.
struct ScopeListeners<D: FeedDomain> {
    update: Listener<D::Entity>,
    stats: Listener<D::Stats>,
    alert: Listener<D::Alert>,
    log: Listener<D::Log>,
}

impl<D: FeedDomain> ScopeListeners<D> {
    fn new(state: &Arc<Mutex<ScopeState<D>>>, version: &Arc<watch::Sender<u64>>) -> Self {
        let update: Listener<D::Entity> = {
            let (state, version) = (Arc::clone(state), Arc::clone(version));
            Arc::new(move |entity: &D::Entity| {
                state.lock().entities.upsert(entity.clone());
                version.send_modify(|v| *v += 1);
            })
        };
        let stats: Listener<D::Stats> = {
            let (state, version) = (Arc::clone(state), Arc::clone(version));
            Arc::new(move |stats: &D::Stats| {
                state.lock().stats = Some(stats.clone());
                version.send_modify(|v| *v += 1);
            })
        };
        let alert: Listener<D::Alert> = {
            let (state, version) = (Arc::clone(state), Arc::clone(version));
            Arc::new(move |alert: &D::Alert| {
                state.lock().alerts.push(alert.clone());
                version.send_modify(|v| *v += 1);
            })
        };
        let log: Listener<D::Log> = {
            let (state, version) = (Arc::clone(state), Arc::clone(version));
            Arc::new(move |entry: &D::Log| {
                state.lock().logs.push(entry.clone());
                version.send_modify(|v| *v += 1);
            })
        };
        Self {
            update,
            stats,
            alert,
            log,
        }
    }
}

pub struct FeedScope<D, R = LinearBackoffReconnect, T = TungsteniteTransport>
where
    D: FeedDomain,
    R: WsReconnectStrategy,
    T: WsTransport,
{
    client: FeedClient<D, R, T>,
    state: Arc<Mutex<ScopeState<D>>>,
    version: Arc<watch::Sender<u64>>,
    listeners: ScopeListeners<D>,
    subscriptions: Mutex<Vec<Subscription>>,
    closed: bool,
}

impl<D, R, T> FeedScope<D, R, T>
where
    D: FeedDomain,
    R: WsReconnectStrategy,
    T: WsTransport,
{
    /// Take ownership of `client`, subscribe to all four categories and connect.
    pub async fn open(client: FeedClient<D, R, T>, scope: Option<&str>) -> WebSocketResult<Self> {
        Self::open_with_history(client, scope, DEFAULT_ALERT_HISTORY, DEFAULT_LOG_HISTORY).await
    }

    pub async fn open_with_history(
        client: FeedClient<D, R, T>,
        scope: Option<&str>,
        alert_history: usize,
        log_history: usize,
    ) -> WebSocketResult<Self> {
        let state = Arc::new(Mutex::new(ScopeState::<D> {
            entities: EntityStore::new(),
            stats: None,
            alerts: CircularBuffer::new(alert_history),
            logs: CircularBuffer::new(log_history),
        }));
        let (version, _) = watch::channel(0u64);
        let version = Arc::new(version);
        let listeners = ScopeListeners::new(&state, &version);

        let scope_view = Self {
            client,
            state,
            version,
            listeners,
            subscriptions: Mutex::new(Vec::with_capacity(4)),
            closed: false,
        };
        scope_view.attach_listeners();
        scope_view.client.connect(scope).await?;
        Ok(scope_view)
    }

    /// Register every folding callback the client's registries no longer hold.
    /// Returns how many were registered.
    fn attach_listeners(&self) -> usize {
        let registries = self.client.listeners();
        let mut subscriptions = self.subscriptions.lock();
        let before = subscriptions.len();
        if !registries.updates.contains(&self.listeners.update) {
            subscriptions.push(registries.updates.add_listener(Arc::clone(&self.listeners.update)));
        }
        if !registries.stats.contains(&self.listeners.stats) {
            subscriptions.push(registries.stats.add_listener(Arc::clone(&self.listeners.stats)));
        }
        if !registries.alerts.contains(&self.listeners.alert) {
            subscriptions.push(registries.alerts.add_listener(Arc::clone(&self.listeners.alert)));
        }
        if !registries.logs.contains(&self.listeners.log) {
            subscriptions.push(registries.logs.add_listener(Arc::clone(&self.listeners.log)));
        }
        subscriptions.len() - before
    }

    /// Replace the entity list with a freshly fetched snapshot; later pushes merge into it.
    pub fn seed(&self, items: Vec<D::Entity>) {
        self.state.lock().entities = EntityStore::from_items(items);
        self.version.send_modify(|v| *v += 1);
    }

    pub fn entities(&self) -> Vec<D::Entity> {
        self.state.lock().entities.items().to_vec()
    }

    pub fn entity(&self, id: &str) -> Option<D::Entity> {
        self.state.lock().entities.get(id).cloned()
    }

    pub fn latest_stats(&self) -> Option<D::Stats> {
        self.state.lock().stats.clone()
    }

    /// Newest first.
    pub fn recent_alerts(&self) -> Vec<D::Alert> {
        self.state.lock().alerts.newest_first()
    }

    /// Newest first.
    pub fn recent_logs(&self) -> Vec<D::Log> {
        self.state.lock().logs.newest_first()
    }

    pub fn clear_alerts(&self) {
        self.state.lock().alerts.clear();
        self.version.send_modify(|v| *v += 1);
    }

    /// Bumped after every change to the scope's state.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    pub fn status(&self) -> WsConnectionStatus {
        self.client.status()
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    pub async fn send_command(&self, command: FeedCommand) -> WebSocketResult<CommandOutcome> {
        self.client.send_command(command).await
    }

    /// Reconnect after the feed gave up or was disconnected. Listeners dropped by a
    /// disconnect are registered again first.
    pub async fn reconnect(&self, scope: Option<&str>) -> WebSocketResult<()> {
        let restored = self.attach_listeners();
        if restored > 0 {
            debug!(domain = D::NAME, restored, "scope listeners registered again");
        }
        self.client.connect(scope).await
    }

    pub fn client(&self) -> &FeedClient<D, R, T> {
        &self.client
    }

    fn release_listeners(&mut self) {
        for sub in self.subscriptions.get_mut().drain(..) {
            sub.unsubscribe();
        }
    }

    /// Unsubscribe, disconnect and stop the feed actor.
    pub async fn close(mut self) {
        self.release_listeners();
        self.closed = true;
        self.client.shutdown().await;
    }
}

impl<D, R, T> Drop for FeedScope<D, R, T>
where
    D: FeedDomain,
    R: WsReconnectStrategy,
    T: WsTransport,
{
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.release_listeners();
        match Handle::try_current() {
            Ok(handle) => {
                let client = self.client.clone();
                handle.spawn(async move { client.shutdown().await });
            }
            Err(_) => debug!(domain = D::NAME, "no runtime at drop; feed actor left to its runtime"),
        }
    }
}
