use crate::types::constants::{channel_events, phoenix_events};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Type-safe channel events.
///
/// On the wire every event is a plain string; [`ChannelEvent::parse`] and
/// [`ChannelEvent::as_str`] convert between the two representations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChannelEvent {
    /// Broadcast messages (user-defined pub/sub)
    Broadcast,

    /// Presence tracking events
    Presence,

    /// Full presence snapshot sent after a join
    PresenceState,

    /// Incremental presence joins/leaves
    PresenceDiff,

    /// Access token refresh pushed to joined channels
    AccessToken,

    /// System events (phx_*)
    System(SystemEvent),

    /// Custom user-defined event
    Custom(String),
}

impl ChannelEvent {
    /// Parse a string into a ChannelEvent
    pub fn parse(s: &str) -> Self {
        match s {
            channel_events::BROADCAST => Self::Broadcast,
            channel_events::PRESENCE => Self::Presence,
            channel_events::PRESENCE_STATE => Self::PresenceState,
            channel_events::PRESENCE_DIFF => Self::PresenceDiff,
            channel_events::ACCESS_TOKEN => Self::AccessToken,
            _ => match SystemEvent::parse(s) {
                Some(system) => Self::System(system),
                None => Self::Custom(s.to_string()),
            },
        }
    }

    /// Convert event to string representation
    pub fn as_str(&self) -> &str {
        match self {
            Self::Broadcast => channel_events::BROADCAST,
            Self::Presence => channel_events::PRESENCE,
            Self::PresenceState => channel_events::PRESENCE_STATE,
            Self::PresenceDiff => channel_events::PRESENCE_DIFF,
            Self::AccessToken => channel_events::ACCESS_TOKEN,
            Self::System(sys) => sys.as_str(),
            Self::Custom(s) => s,
        }
    }

    /// Lifecycle events are subject to stale `join_ref` filtering
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            Self::System(
                SystemEvent::Join
                    | SystemEvent::Leave
                    | SystemEvent::Reply
                    | SystemEvent::Close
                    | SystemEvent::Error
            )
        )
    }
}

impl From<&str> for ChannelEvent {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<String> for ChannelEvent {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<SystemEvent> for ChannelEvent {
    fn from(event: SystemEvent) -> Self {
        Self::System(event)
    }
}

impl std::fmt::Display for ChannelEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for ChannelEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ChannelEvent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// Phoenix system events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemEvent {
    /// Join channel
    Join,

    /// Leave channel
    Leave,

    /// Reply to a message
    Reply,

    /// Close channel
    Close,

    /// Error event
    Error,

    /// Heartbeat
    Heartbeat,
}

impl SystemEvent {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            phoenix_events::JOIN => Some(Self::Join),
            phoenix_events::LEAVE => Some(Self::Leave),
            phoenix_events::REPLY => Some(Self::Reply),
            phoenix_events::CLOSE => Some(Self::Close),
            phoenix_events::ERROR => Some(Self::Error),
            phoenix_events::HEARTBEAT => Some(Self::Heartbeat),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Join => phoenix_events::JOIN,
            Self::Leave => phoenix_events::LEAVE,
            Self::Reply => phoenix_events::REPLY,
            Self::Close => phoenix_events::CLOSE,
            Self::Error => phoenix_events::ERROR,
            Self::Heartbeat => phoenix_events::HEARTBEAT,
        }
    }
}
