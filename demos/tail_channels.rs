//! Tail the channel feed and print the live view after every change.
//!
//! Usage: `tail_channels [customer-id] [adapter-id]`. With an adapter id, that adapter's error
//! logs are also polled over REST at `CONSOLE_POLL_INTERVAL_MS`.

use std::sync::Arc;

use console_ws::control::LogQuery;
use console_ws::domains::{ChannelFeed, ChannelStatus, LogLevel};
use console_ws::{ConsoleConfig, ConsoleControl, FeedClient, FeedScope, Poller};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "console_ws=debug,tail_channels=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ConsoleConfig::from_env()?;
    let mut args = std::env::args().skip(1);
    let customer = args.next();
    let adapter = args.next();

    let view = FeedScope::open(FeedClient::<ChannelFeed>::from_config(&config), customer.as_deref())
        .await?;
    info!(url = %config.ws_url, customer = ?customer, "tailing channels");

    let log_poller = match adapter {
        Some(adapter_id) => {
            let control = ConsoleControl::from_config(&config)?;
            let control = Arc::new(control);
            Some(Poller::spawn("adapter_logs", config.poll_interval, move || {
                let control = Arc::clone(&control);
                let adapter_id = adapter_id.clone();
                async move {
                    let query = LogQuery {
                        level: Some(LogLevel::Error),
                        limit: Some(20),
                        search: None,
                    };
                    control.fetch_adapter_logs(&adapter_id, &query).await
                }
            }))
        }
        None => None,
    };
    if let Some(mut logs) = log_poller.as_ref().map(Poller::subscribe) {
        tokio::spawn(async move {
            while logs.changed().await.is_ok() {
                let count = logs.borrow().as_ref().map_or(0, Vec::len);
                info!(count, "adapter error logs polled");
            }
        });
    }

    let mut changes = view.changes();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            res = changes.changed() => {
                if res.is_err() {
                    break;
                }
                let channels = view.entities();
                let running = channels
                    .iter()
                    .filter(|c| matches!(c.status, Some(ChannelStatus::Running)))
                    .count();
                info!(channels = channels.len(), running, status = ?view.status(), "channel view updated");
                if let Some(stats) = view.latest_stats() {
                    info!(total = stats.total_channels, errors = stats.errors, mpm = stats.messages_per_minute, "stats");
                }
                if let Some(alert) = view.recent_alerts().first() {
                    warn!(channel = %alert.channel_id, severity = ?alert.severity, "{}", alert.message);
                }
            }
        }
    }

    if let Some(poller) = log_poller {
        poller.stop();
    }
    view.close().await;
    Ok(())
}
