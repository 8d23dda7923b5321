use super::{ChannelEvent, SystemEvent};
use crate::channel::{PushStatus, RealtimeChannel};
use crate::client::RealtimeClient;
use crate::types::constants::PHOENIX_TOPIC;
use crate::types::message::RealtimeMessage;
use std::sync::Arc;

/// Routes incoming messages to appropriate handlers
pub(crate) struct MessageRouter<'a> {
    client: &'a RealtimeClient,
}

impl<'a> MessageRouter<'a> {
    pub fn new(client: &'a RealtimeClient) -> Self {
        Self { client }
    }

    /// Routes a message to the appropriate handler(s)
    pub fn route(&self, message: &RealtimeMessage) {
        // Handle heartbeat acknowledgment
        if message.topic == PHOENIX_TOPIC {
            if message.is_reply() {
                self.client.handle_heartbeat_reply(message);
            }
            return;
        }

        let members: Vec<Arc<RealtimeChannel>> = self
            .client
            .channels()
            .into_iter()
            .filter(|channel| channel.is_member(message))
            .collect();

        if members.is_empty() {
            tracing::debug!(
                "No channel for {} on topic {}",
                message.event,
                message.topic
            );
            return;
        }

        for channel in members {
            self.route_to_channel(&channel, message);
        }
    }

    fn route_to_channel(&self, channel: &RealtimeChannel, message: &RealtimeMessage) {
        // Handle push replies
        if message.event == ChannelEvent::System(SystemEvent::Reply)
            && self.handle_push_reply(channel, message)
        {
            return;
        }

        match message.event {
            ChannelEvent::PresenceState => channel.sync_presence_state(&message.payload),
            ChannelEvent::PresenceDiff => channel.sync_presence_diff(&message.payload),
            _ => {}
        }

        channel.handle_message(message);
    }

    /// Resolves the push a reply correlates with. Returns false when no push
    /// is waiting on the reply's ref.
    fn handle_push_reply(&self, channel: &RealtimeChannel, message: &RealtimeMessage) -> bool {
        let Some(msg_ref) = &message.r#ref else {
            return false;
        };
        let Some(push) = channel.take_pending(msg_ref) else {
            tracing::debug!("Reply for unknown ref {} on {}", msg_ref, channel.topic());
            return false;
        };

        let status = PushStatus::parse(message.reply_status().unwrap_or("error"));
        push.trigger_for_ref(msg_ref, status, message.reply_response());
        true
    }
}
