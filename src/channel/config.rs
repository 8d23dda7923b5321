use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Options for creating a channel
#[derive(Debug, Clone, Default)]
pub struct RealtimeChannelOptions {
    /// Receive our own broadcasts
    pub broadcast_self: bool,
    /// Ask the server to acknowledge broadcasts
    pub broadcast_ack: bool,
    /// Key this client is tracked under in presence
    pub presence_key: Option<String>,
    pub is_private: bool,
    /// Overrides the client's default push timeout for this channel
    pub timeout: Option<Duration>,
}

impl RealtimeChannelOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub(crate) fn join_config(&self) -> ChannelJoinConfig {
        ChannelJoinConfig {
            broadcast: BroadcastConfig {
                self_: self.broadcast_self,
                ack: self.broadcast_ack,
            },
            presence: PresenceConfig {
                key: self.presence_key.clone(),
                enabled: self.presence_key.is_some(),
            },
            is_private: self.is_private,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BroadcastConfig {
    /// Enable client to receive messages it broadcast
    #[serde(rename = "self")]
    pub self_: bool,
    /// Instruct server to acknowledge broadcast receipt
    pub ack: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PresenceConfig {
    /// Track presence payload across clients
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Enable presence tracking
    #[serde(default)]
    pub enabled: bool,
}

/// Channel join payload configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChannelJoinConfig {
    pub broadcast: BroadcastConfig,
    pub presence: PresenceConfig,
    #[serde(rename = "private")]
    pub is_private: bool,
}

/// Full join payload sent to server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinPayload {
    pub config: ChannelJoinConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}
