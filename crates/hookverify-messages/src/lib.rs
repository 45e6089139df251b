use std::collections::HashMap;

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// Keepalive token the listener sends to the relay.
pub const PING: &str = "ping";

/// Keepalive acknowledgement sent back by the relay.
pub const PONG: &str = "pong";

/// A frame received from the relay, decoded once at the connection boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// First frame of an accepted session. Holds every field besides `type`.
    Connected { session_info: Map<String, Value> },
    Webhook(WebhookFrame),
    Pong,
    /// Malformed JSON or a frame shape this client does not know about.
    Unrecognized,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WebhookFrame {
    #[serde(rename = "deliveryId", default, deserialize_with = "delivery_id")]
    pub delivery_id: Option<String>,
    #[serde(default = "empty_object")]
    pub payload: Value,
    #[serde(default, deserialize_with = "header_values")]
    pub headers: HashMap<String, String>,
}

impl WebhookFrame {
    pub fn delivery_id(&self) -> &str {
        self.delivery_id.as_deref().unwrap_or("unknown")
    }
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum TaggedFrame {
    Connected(Map<String, Value>),
    Webhook(WebhookFrame),
}

impl InboundFrame {
    pub fn decode(text: &str) -> Self {
        if text == PONG {
            return Self::Pong;
        }

        match serde_json::from_str::<TaggedFrame>(text) {
            Ok(TaggedFrame::Connected(session_info)) => Self::Connected { session_info },
            Ok(TaggedFrame::Webhook(frame)) => Self::Webhook(frame),
            Err(_) => Self::Unrecognized,
        }
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

// Relays are not strict about field types: ids may be numbers, header values
// may be numbers, and anything but an object for `headers` means no headers.
fn delivery_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

fn header_values<'de, D>(deserializer: D) -> Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::Object(raw) = Value::deserialize(deserializer)? else {
        return Ok(HashMap::new());
    };
    Ok(raw
        .into_iter()
        .map(|(name, value)| match value {
            Value::String(s) => (name, s),
            other => (name, other.to_string()),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn decodes_connected_frame() {
        let frame = InboundFrame::decode(r#"{"type":"connected","endpointId":"ep_1"}"#);

        let mut session_info = Map::new();
        session_info.insert("endpointId".to_string(), json!("ep_1"));
        assert_eq!(frame, InboundFrame::Connected { session_info });
    }

    #[test]
    fn decodes_bare_connected_frame() {
        assert_eq!(
            InboundFrame::decode(r#"{"type":"connected"}"#),
            InboundFrame::Connected {
                session_info: Map::new()
            }
        );
    }

    #[test]
    fn decodes_webhook_frame() {
        let text = json!({
            "type": "webhook",
            "deliveryId": "dlv_42",
            "payload": {"event": "invoice.paid", "amount": 1200},
            "headers": {"X-Signature": "sha256=abc", "X-Attempt": 2}
        })
        .to_string();

        let InboundFrame::Webhook(frame) = InboundFrame::decode(&text) else {
            panic!("expected webhook frame");
        };
        assert_eq!(frame.delivery_id(), "dlv_42");
        assert_eq!(frame.payload, json!({"event": "invoice.paid", "amount": 1200}));
        assert_eq!(frame.headers["X-Signature"], "sha256=abc");
        assert_eq!(frame.headers["X-Attempt"], "2");
    }

    #[test]
    fn webhook_frame_fills_missing_fields() {
        let InboundFrame::Webhook(frame) = InboundFrame::decode(r#"{"type":"webhook"}"#) else {
            panic!("expected webhook frame");
        };
        assert_eq!(frame.delivery_id(), "unknown");
        assert_eq!(frame.payload, json!({}));
        assert!(frame.headers.is_empty());
    }

    #[test]
    fn webhook_frame_tolerates_loose_field_types() {
        let InboundFrame::Webhook(frame) =
            InboundFrame::decode(r#"{"type":"webhook","deliveryId":42,"payload":{"a":1},"headers":"nope"}"#)
        else {
            panic!("expected webhook frame");
        };
        assert_eq!(frame.delivery_id(), "42");
        assert_eq!(frame.payload, json!({"a": 1}));
        assert!(frame.headers.is_empty());

        let InboundFrame::Webhook(frame) =
            InboundFrame::decode(r#"{"type":"webhook","deliveryId":null,"headers":null}"#)
        else {
            panic!("expected webhook frame");
        };
        assert_eq!(frame.delivery_id(), "unknown");
        assert!(frame.headers.is_empty());
    }

    #[test]
    fn pong_literal_is_pong() {
        assert_eq!(InboundFrame::decode(PONG), InboundFrame::Pong);
    }

    #[test]
    fn anything_else_is_unrecognized() {
        for text in [
            "",
            "ping",
            "{not json",
            "[1,2,3]",
            "42",
            r#"{"payload":{}}"#,
            r#"{"type":"error","message":"invalid api key"}"#,
        ] {
            assert_eq!(InboundFrame::decode(text), InboundFrame::Unrecognized, "{text}");
        }
    }
}
