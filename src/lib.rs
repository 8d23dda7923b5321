//! # Realtime Channels
//!
//! Client-side engine for the Phoenix Channels realtime protocol: one
//! persistent connection multiplexing topic-scoped channels, with
//! request/reply correlation, heartbeats, and automatic reconnect and rejoin.
//!
//! ## Example
//!
//! ```no_run
//! use realtime_channels::{RealtimeClient, RealtimeClientOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = RealtimeClient::new(
//!         "wss://example.com/socket",
//!         RealtimeClientOptions {
//!             api_key: "your-key".to_string(),
//!             ..Default::default()
//!         }
//!     )?;
//!
//!     client.connect().await?;
//!     Ok(())
//! }
//! ```
//!
//! All timers run as tokio tasks, so the client must be used from within a
//! tokio runtime.

pub mod channel;
pub mod client;
pub mod infrastructure;
pub mod messaging;
pub mod types;
pub mod websocket;

pub use channel::{
    ChannelStatus, PresenceMeta, PresenceState, Push, PushReply, PushStatus, RealtimeChannel,
    RealtimeChannelOptions, SubscribeStatus,
};
pub use client::{
    ConnectionState, HeartbeatStatus, RealtimeClient, RealtimeClientBuilder, RealtimeClientOptions,
};
pub use infrastructure::Backoff;
pub use messaging::{ArraySerializer, ChannelEvent, JsonSerializer, Serializer, SystemEvent};
pub use types::{RealtimeError, RealtimeMessage, Result};
pub use websocket::{Transport, TransportCommand, TransportEvent, TransportHandle, WebSocketTransport};
