use super::presence::Presence;
use super::push::Push;
use crate::messaging::ChannelEvent;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub(crate) type BindingCallback = Arc<dyn Fn(Value) + Send + Sync + 'static>;
pub(crate) type StateCallback = Arc<dyn Fn(ChannelStatus) + Send + Sync + 'static>;

/// Channel status enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    Closed,
    Errored,
    Joined,
    Joining,
    Leaving,
}

impl ChannelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Errored => "errored",
            Self::Joined => "joined",
            Self::Joining => "joining",
            Self::Leaving => "leaving",
        }
    }
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event binding for channel event listeners
pub(crate) struct EventBinding {
    pub event: ChannelEvent,
    /// Only deliver payloads whose `event` field equals this
    pub filter: Option<String>,
    pub id: u64,
    pub callback: BindingCallback,
}

/// Mutable state for a RealtimeChannel
pub(crate) struct ChannelState {
    pub status: ChannelStatus,
    pub bindings: Vec<EventBinding>,
    pub state_hooks: Vec<(u64, StateCallback)>,
    /// Pushes awaiting a reply, keyed by ref
    pub pending_pushes: HashMap<String, Arc<Push>>,
    /// Pushes created before the channel could transmit them
    pub push_buffer: VecDeque<Arc<Push>>,
    /// Set while a join `ok` is draining `push_buffer`; new pushes queue behind it
    pub flushing: bool,
    pub presence: Presence,
    pub joined_once: bool,
    pub timeout: Duration,
    next_binding_id: u64,
}

impl ChannelState {
    pub fn new(timeout: Duration) -> Self {
        Self {
            status: ChannelStatus::Closed,
            bindings: Vec::new(),
            state_hooks: Vec::new(),
            pending_pushes: HashMap::new(),
            push_buffer: VecDeque::new(),
            flushing: false,
            presence: Presence::default(),
            joined_once: false,
            timeout,
            next_binding_id: 0,
        }
    }

    pub fn next_binding_id(&mut self) -> u64 {
        self.next_binding_id += 1;
        self.next_binding_id
    }

    /// Callbacks bound to `event`, in registration order
    pub fn callbacks_for(&self, event: &ChannelEvent, payload: &Value) -> Vec<BindingCallback> {
        let sub_event = payload.get("event").and_then(Value::as_str);
        self.bindings
            .iter()
            .filter(|binding| &binding.event == event)
            .filter(|binding| match &binding.filter {
                Some(filter) => sub_event == Some(filter.as_str()),
                None => true,
            })
            .map(|binding| Arc::clone(&binding.callback))
            .collect()
    }

    pub fn state_callbacks(&self) -> Vec<StateCallback> {
        self.state_hooks
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect()
    }
}
