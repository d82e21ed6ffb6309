//! Interval refresh for views without a push feed.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Shortest interval a poller runs at; smaller values, zero included, are raised to it.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Runs a fetch function every `interval` while enabled and publishes the latest success.
///
/// Dropping the poller (or calling [`stop`](Self::stop)) cancels the timer.
pub struct Poller<T> {
    name: &'static str,
    interval: Duration,
    enabled: watch::Sender<bool>,
    refetch: Arc<Notify>,
    latest: watch::Receiver<Option<T>>,
    task: JoinHandle<()>,
}

impl<T> Poller<T>
where
    T: Send + Sync + 'static,
{
    pub fn spawn<F, Fut, E>(name: &'static str, interval: Duration, mut fetch: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        if interval < MIN_POLL_INTERVAL {
            warn!(poller = name, requested_ms = interval.as_millis() as u64, "poll interval raised to minimum");
        }
        let interval = interval.max(MIN_POLL_INTERVAL);
        let (enabled, mut enabled_rx) = watch::channel(true);
        let (latest_tx, latest) = watch::channel(None);
        let refetch = Arc::new(Notify::new());
        let refetch_rx = Arc::clone(&refetch);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if !*enabled_rx.borrow() {
                            continue;
                        }
                    }
                    _ = refetch_rx.notified() => {
                        ticker.reset();
                    }
                    res = enabled_rx.changed() => {
                        if res.is_err() {
                            break;
                        }
                        if *enabled_rx.borrow_and_update() {
                            ticker.reset_immediately();
                        }
                        continue;
                    }
                }

                match fetch().await {
                    Ok(value) => {
                        latest_tx.send_replace(Some(value));
                    }
                    Err(err) => warn!(poller = name, error = %err, "poll fetch failed"),
                }
            }
            debug!(poller = name, "poller stopped");
        });

        Self {
            name,
            interval,
            enabled,
            refetch,
            latest,
            task,
        }
    }

    /// Pause or resume interval fetches. Resuming fetches immediately.
    pub fn set_enabled(&self, enabled: bool) {
        debug!(poller = self.name, enabled, "poller toggled");
        self.enabled.send_replace(enabled);
    }

    /// Interval actually in effect.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_enabled(&self) -> bool {
        *self.enabled.borrow()
    }

    /// Fetch now, regardless of the enabled flag, and restart the interval.
    pub fn refetch(&self) {
        self.refetch.notify_one();
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<T>> {
        self.latest.clone()
    }

    pub fn stop(self) {}
}

impl<T: Clone> Poller<T> {
    pub fn latest(&self) -> Option<T> {
        self.latest.borrow().clone()
    }
}

impl<T> Drop for Poller<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}
