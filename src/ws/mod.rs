//! Feed connection management: the connection actor, its writer, the cloneable client handle
//! and scoped live views built on top of it.

pub mod actor;
pub mod endpoint;
pub mod handle;
pub mod scope;
pub mod writer;

pub use crate::core::*;

pub use actor::{
    Connect, Disconnect, FeedActor, FeedActorArgs, GetConnectionStats, GetConnectionStatus,
    SendCommand,
};
pub use endpoint::feed_endpoint;
pub use handle::{FeedClient, FeedClientOptions};
pub use scope::{DEFAULT_ALERT_HISTORY, DEFAULT_LOG_HISTORY, FeedScope};
pub use writer::{WriterWrite, WsWriterActor};
