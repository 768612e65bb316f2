use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Broker-assigned handle identifying one delivery for ack/nack.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeliveryTag(String);

impl DeliveryTag {
    pub fn new(tag: impl Into<String>) -> Self { Self(tag.into()) }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl std::fmt::Display for DeliveryTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One raw message handed out by a subscription.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub topic: String,
    pub tag: DeliveryTag,
    pub body: Bytes,
    pub redelivered: bool,
}

/// A delivery whose body parsed as JSON.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub topic: String,
    pub tag: DeliveryTag,
    pub payload: serde_json::Value,
    pub redelivered: bool,
}

/// Wire shape of a cross-service event: `{"type": ..., "payload": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<P> {
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: P,
}

impl<P: Serialize> Envelope<P> {
    pub fn new(event_type: impl Into<String>, payload: P) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
        }
    }

    pub fn to_bytes(&self) -> Result<Bytes, serde_json::Error> {
        serde_json::to_vec(self).map(Bytes::from)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_envelope_wire_shape() {
        let envelope = Envelope::new("user.delete", json!({ "userId": "42" }));
        let value: serde_json::Value =
            serde_json::from_slice(&envelope.to_bytes().unwrap()).unwrap();

        assert_eq!(
            value,
            json!({ "type": "user.delete", "payload": { "userId": "42" } })
        );
    }
}
