/// Phoenix protocol event strings (magic strings layer)
pub mod phoenix_events {
    pub const CLOSE: &str = "phx_close";
    pub const ERROR: &str = "phx_error";
    pub const JOIN: &str = "phx_join";
    pub const REPLY: &str = "phx_reply";
    pub const LEAVE: &str = "phx_leave";
    pub const HEARTBEAT: &str = "heartbeat";
}

/// Reserved system topic used for heartbeats
pub const PHOENIX_TOPIC: &str = "phoenix";

/// Channel event strings (magic strings layer)
pub mod channel_events {
    pub const ACCESS_TOKEN: &str = "access_token";
    pub const BROADCAST: &str = "broadcast";
    pub const PRESENCE: &str = "presence";
    pub const PRESENCE_STATE: &str = "presence_state";
    pub const PRESENCE_DIFF: &str = "presence_diff";
}

/// Protocol version of the JSON object wire format
pub const VSN_1_0_0: &str = "1.0.0";

/// Protocol version of the JSON array wire format
pub const VSN_2_0_0: &str = "2.0.0";

/// Default push timeout (milliseconds)
pub const DEFAULT_TIMEOUT: u64 = 10_000;

/// Default heartbeat interval (milliseconds)
pub const HEARTBEAT_INTERVAL: u64 = 25_000;

/// Default rejoin intervals (milliseconds)
pub const REJOIN_INTERVALS: [u64; 4] = [1000, 2000, 5000, 10000];
pub const DEFAULT_RECONNECT_FALLBACK: u64 = 10_000;

/// Default reconnect backoff bounds (milliseconds) and jitter fraction
pub const RECONNECT_INITIAL_DELAY: u64 = 1000;
pub const RECONNECT_MAX_DELAY: u64 = 10_000;
pub const RECONNECT_JITTER: f64 = 0.25;

/// Max buffered pushes per channel while not joined
pub const MAX_PUSH_BUFFER_SIZE: usize = 1000;

/// Max presence diffs held back while waiting for the state of the current join
pub const MAX_PENDING_PRESENCE_DIFFS: usize = 100;

/// Capacity of receivers handed out by `RealtimeChannel::listen`
pub const LISTENER_CAPACITY: usize = 100;

/// WebSocket close codes
pub const WS_CLOSE_NORMAL: u16 = 1000;
