// Module declarations
mod config;
mod core;
mod presence;
pub mod push;
mod state;

// Public API exports
pub use config::{BroadcastConfig, ChannelJoinConfig, JoinPayload, PresenceConfig, RealtimeChannelOptions};
pub use core::{RealtimeChannel, SubscribeStatus};
pub use presence::{
    Presence, PresenceEvent, PresenceMeta, PresenceState, RawPresenceDiff, RawPresenceState,
};
pub use push::{Push, PushReply, PushStatus};
pub use state::ChannelStatus;
