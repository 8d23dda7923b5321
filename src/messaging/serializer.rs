//! Wire codecs for [`RealtimeMessage`] envelopes.
//!
//! Two text formats are spoken by Phoenix servers: the `1.0.0` object form and
//! the `2.0.0` array form `[join_ref, ref, topic, event, payload]`. The client
//! advertises whichever one it uses through the `vsn` query parameter.

use crate::messaging::ChannelEvent;
use crate::types::constants::{VSN_1_0_0, VSN_2_0_0};
use crate::types::{RealtimeError, RealtimeMessage, Result};
use serde_json::Value;

/// Encodes envelopes to wire text and decodes them back.
pub trait Serializer: Send + Sync + 'static {
    /// Protocol version sent as the `vsn` query parameter
    fn vsn(&self) -> &'static str;

    fn encode(&self, message: &RealtimeMessage) -> Result<String>;

    fn decode(&self, raw: &str) -> Result<RealtimeMessage>;
}

/// JSON object envelopes (`vsn=1.0.0`)
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn vsn(&self) -> &'static str {
        VSN_1_0_0
    }

    fn encode(&self, message: &RealtimeMessage) -> Result<String> {
        Ok(serde_json::to_string(message)?)
    }

    fn decode(&self, raw: &str) -> Result<RealtimeMessage> {
        serde_json::from_str(raw).map_err(|e| RealtimeError::Decode(e.to_string()))
    }
}

/// JSON array envelopes (`vsn=2.0.0`)
#[derive(Debug, Clone, Copy, Default)]
pub struct ArraySerializer;

type ArrayFrame = (Option<String>, Option<String>, String, String, Value);

impl Serializer for ArraySerializer {
    fn vsn(&self) -> &'static str {
        VSN_2_0_0
    }

    fn encode(&self, message: &RealtimeMessage) -> Result<String> {
        let frame = (
            &message.join_ref,
            &message.r#ref,
            &message.topic,
            message.event.as_str(),
            &message.payload,
        );
        Ok(serde_json::to_string(&frame)?)
    }

    fn decode(&self, raw: &str) -> Result<RealtimeMessage> {
        let (join_ref, r#ref, topic, event, payload): ArrayFrame =
            serde_json::from_str(raw).map_err(|e| RealtimeError::Decode(e.to_string()))?;

        Ok(RealtimeMessage {
            topic,
            event: ChannelEvent::parse(&event),
            payload,
            r#ref,
            join_ref,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::SystemEvent;
    use serde_json::json;

    fn samples() -> Vec<RealtimeMessage> {
        vec![
            RealtimeMessage::new(
                "room:1",
                SystemEvent::Reply,
                json!({"status": "ok", "response": {}}),
            )
            .with_ref("1".to_string())
            .with_join_ref("1".to_string()),
            RealtimeMessage::new("room:1", "shout", json!({"body": "hi", "n": [1, 2, 3]})),
            RealtimeMessage::heartbeat("42".to_string()),
            RealtimeMessage::new("room:2", ChannelEvent::PresenceDiff, json!({"joins": {}}))
                .with_join_ref("7".to_string()),
        ]
    }

    #[test]
    fn test_object_format_round_trip() {
        for message in samples() {
            let wire = JsonSerializer.encode(&message).unwrap();
            assert_eq!(JsonSerializer.decode(&wire).unwrap(), message);
        }
    }

    #[test]
    fn test_array_format_round_trip() {
        for message in samples() {
            let wire = ArraySerializer.encode(&message).unwrap();
            assert_eq!(ArraySerializer.decode(&wire).unwrap(), message);
        }
    }

    #[test]
    fn test_array_format_layout() {
        let message = RealtimeMessage::new("room:1", SystemEvent::Join, json!({}))
            .with_ref("2".to_string())
            .with_join_ref("2".to_string());

        let wire = ArraySerializer.encode(&message).unwrap();
        assert_eq!(wire, r#"["2","2","room:1","phx_join",{}]"#);

        let heartbeat = ArraySerializer
            .encode(&RealtimeMessage::heartbeat("3".to_string()))
            .unwrap();
        assert_eq!(heartbeat, r#"[null,"3","phoenix","heartbeat",{}]"#);
    }

    #[test]
    fn test_malformed_frames_are_decode_errors() {
        for raw in ["not json", "{\"topic\": 1}", "[1, 2]", ""] {
            assert!(matches!(
                JsonSerializer.decode(raw),
                Err(RealtimeError::Decode(_))
            ));
            assert!(matches!(
                ArraySerializer.decode(raw),
                Err(RealtimeError::Decode(_))
            ));
        }
    }
}
