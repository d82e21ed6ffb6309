//! Real-time feed client for the integration console.
//!
//! Each monitored domain (channels, messages, flows, adapters) is served by one websocket
//! feed. A [`FeedClient`] owns the connection, reconnects with a bounded linear backoff and
//! routes typed frames to registered listeners; a [`FeedScope`] folds them into a live view.
//! [`ConsoleControl`] covers the REST control actions issued next to the feeds.

pub mod client;
pub mod config;
pub mod control;
pub mod core;
pub mod domains;
pub mod poll;
pub mod testing;
pub mod tls;
pub mod transport;
pub mod ws;

pub use config::{ConfigError, ConsoleConfig};
pub use control::{ChannelAction, ConsoleControl, ControlError, ExportFormat, LogQuery};
pub use poll::Poller;
pub use ws::{FeedClient, FeedClientOptions, FeedScope};
