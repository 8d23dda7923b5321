use super::connection::ConnectionState;
use crate::channel::RealtimeChannel;
use crate::infrastructure::TaskManager;
use crate::types::RealtimeMessage;
use std::sync::Arc;
use tokio::sync::watch;

pub(crate) type OpenCallback = Arc<dyn Fn() + Send + Sync>;
pub(crate) type CloseCallback = Arc<dyn Fn(Option<u16>, &str) + Send + Sync>;
pub(crate) type ErrorCallback = Arc<dyn Fn(&str) + Send + Sync>;
pub(crate) type MessageCallback = Arc<dyn Fn(&RealtimeMessage) + Send + Sync>;
pub(crate) type HeartbeatCallback = Arc<dyn Fn(HeartbeatStatus) + Send + Sync>;

/// Heartbeat lifecycle reported to `on_heartbeat` hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatStatus {
    /// A heartbeat went out
    Sent,
    /// The server acknowledged the last heartbeat
    Ok,
    /// The server answered the last heartbeat with an error
    Error,
    /// The last heartbeat was never acknowledged; the connection is being replaced
    Timeout,
    /// The connection closed
    Disconnected,
}

/// Socket-level callbacks registered by the caller
#[derive(Default)]
pub(crate) struct Callbacks {
    pub open: Vec<OpenCallback>,
    pub close: Vec<CloseCallback>,
    pub error: Vec<ErrorCallback>,
    pub message: Vec<MessageCallback>,
    pub heartbeat: Vec<HeartbeatCallback>,
}

/// Consolidated mutable state for RealtimeClient
/// Using a single struct reduces lock contention
pub(crate) struct ClientState {
    /// Current ref counter for message IDs
    pub ref_counter: u64,

    /// Pending heartbeat ref (if any)
    pub pending_heartbeat_ref: Option<String>,

    /// All channels managed by this client
    pub channels: Vec<Arc<RealtimeChannel>>,

    /// Background tasks of the current connection
    pub task_manager: TaskManager,

    /// Whether the disconnect was manual (prevents auto-reconnect)
    pub was_manual_disconnect: bool,

    /// Token included in join payloads
    pub access_token: Option<String>,

    pub callbacks: Callbacks,

    /// Sender for state change notifications
    pub state_change_tx: watch::Sender<ConnectionState>,
}

impl ClientState {
    pub fn new(access_token: Option<String>) -> Self {
        let (state_change_tx, _) = watch::channel(ConnectionState::Closed);
        Self {
            ref_counter: 0,
            pending_heartbeat_ref: None,
            channels: Vec::new(),
            task_manager: TaskManager::new(),
            was_manual_disconnect: false,
            access_token,
            callbacks: Callbacks::default(),
            state_change_tx,
        }
    }

    /// Generate next message reference
    pub fn make_ref(&mut self) -> String {
        self.ref_counter += 1;
        self.ref_counter.to_string()
    }

    /// Notify state change watchers
    pub fn notify_state_change(&self, state: ConnectionState) {
        self.state_change_tx.send_replace(state);
    }
}
