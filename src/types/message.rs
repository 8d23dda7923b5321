use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::messaging::{ChannelEvent, SystemEvent};
use crate::types::constants::PHOENIX_TOPIC;

/// A protocol envelope exchanged with the server.
///
/// `ref` correlates a request with its reply; `join_ref` names the join attempt
/// of the channel the envelope belongs to, so replies to an older join can be
/// told apart from current ones.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RealtimeMessage {
    pub topic: String,
    pub event: ChannelEvent,
    #[serde(default = "empty_payload")]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_ref: Option<String>,
}

fn empty_payload() -> Value {
    Value::Object(Default::default())
}

impl RealtimeMessage {
    pub fn new(topic: impl Into<String>, event: impl Into<ChannelEvent>, payload: Value) -> Self {
        Self {
            topic: topic.into(),
            event: event.into(),
            payload,
            r#ref: None,
            join_ref: None,
        }
    }

    /// Heartbeat envelope on the reserved system topic
    pub fn heartbeat(r#ref: String) -> Self {
        Self::new(
            PHOENIX_TOPIC,
            ChannelEvent::System(SystemEvent::Heartbeat),
            empty_payload(),
        )
        .with_ref(r#ref)
    }

    pub fn with_ref(mut self, r#ref: String) -> Self {
        self.r#ref = Some(r#ref);
        self
    }

    pub fn with_join_ref(mut self, join_ref: String) -> Self {
        self.join_ref = Some(join_ref);
        self
    }

    pub fn is_reply(&self) -> bool {
        self.event == ChannelEvent::System(SystemEvent::Reply)
    }

    /// `payload.status` of a `phx_reply`, if present
    pub fn reply_status(&self) -> Option<&str> {
        self.payload.get("status").and_then(Value::as_str)
    }

    /// `payload.response` of a `phx_reply`, `null` when absent
    pub fn reply_response(&self) -> Value {
        self.payload.get("response").cloned().unwrap_or(Value::Null)
    }
}
