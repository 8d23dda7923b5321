// Module declarations
mod builder;
mod connection;
mod core;
mod state;

// Public API exports
pub use builder::{Logger, RealtimeClientBuilder, RealtimeClientOptions};
pub use connection::{ConnectionManager, ConnectionState};
pub use core::RealtimeClient;
pub use state::HeartbeatStatus;

pub(crate) use core::ClientInner;
