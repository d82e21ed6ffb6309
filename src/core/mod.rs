pub mod circular_buffer;
pub mod frame;
pub mod health;
pub mod reconnect;
pub mod registry;
pub mod router;
pub mod store;
pub mod types;

pub use circular_buffer::*;

pub use frame::*;
pub use health::*;
pub use reconnect::*;
pub use registry::*;
pub use router::*;
pub use store::*;
pub use types::*;
