//! The outer transport envelope (§6: "Transport envelope (wire)").

use crate::error::TypesError;
use serde::{Deserialize, Deserializer, Serialize};
use std::convert::TryFrom;

/// The tag on the outer transport envelope identifying what kind of frame this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageType {
    /// A signed `KeysplittingMessage`.
    Keysplitting,
    /// A `StreamMessage` carrying out-of-band bulk output.
    Stream,
    /// The agent signalling it is ready to accept datachannel traffic.
    Ready,
    /// Either side tearing down the session.
    Stop,
    /// A control-channel health-check request or response.
    HealthCheck,
    /// A control-channel directive to spawn a fresh datachannel.
    NewDatachannel,
    /// A generic control-channel frame.
    Control,
    /// The agent's registration handshake with the relay.
    Register,
}

impl TryFrom<&str> for MessageType {
    type Error = TypesError;

    fn try_from(tag: &str) -> crate::Result<Self> {
        match tag {
            "keysplitting" => Ok(Self::Keysplitting),
            "stream" => Ok(Self::Stream),
            "ready" => Ok(Self::Ready),
            "stop" => Ok(Self::Stop),
            "healthCheck" => Ok(Self::HealthCheck),
            "newDatachannel" => Ok(Self::NewDatachannel),
            "control" => Ok(Self::Control),
            "register" => Ok(Self::Register),
            other => Err(TypesError::UnknownMessageType(other.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for MessageType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Self::try_from(tag.as_str()).map_err(serde::de::Error::custom)
    }
}

/// The outer transport envelope carried by the relay.
///
/// Field names match the wire JSON exactly (§6): `messageType`,
/// `schemaVersion`, `requestId`, `sequenceId`, `messagePayload`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentMessage {
    /// What kind of frame this is.
    pub message_type: MessageType,
    /// The protocol schema version this envelope was built for.
    pub schema_version: String,
    /// Identifies the action session this envelope belongs to.
    pub request_id: u32,
    /// Monotonic per `(requestId, direction)` sequence number.
    pub sequence_id: u32,
    /// Opaque payload bytes; interpretation depends on `message_type`.
    #[serde(with = "payload_as_json_value")]
    pub message_payload: Vec<u8>,
}

impl AgentMessage {
    /// The schema version this crate produces and expects.
    pub const SCHEMA_VERSION: &'static str = "1.0";

    /// Builds an envelope wrapping an already-serialized payload.
    pub fn new(
        message_type: MessageType,
        request_id: u32,
        sequence_id: u32,
        message_payload: Vec<u8>,
    ) -> Self {
        Self {
            message_type,
            schema_version: Self::SCHEMA_VERSION.to_string(),
            request_id,
            sequence_id,
            message_payload,
        }
    }
}

/// `messagePayload` travels as an embedded JSON value on the wire (not a
/// base64 string) for human-debuggable relay logs; internally we keep it as
/// raw bytes so dispatch doesn't need to know the variant's concrete type.
mod payload_as_json_value {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        let value: serde_json::Value = serde_json::from_slice(bytes).map_err(serde::ser::Error::custom)?;
        value.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let value = serde_json::Value::deserialize(d)?;
        serde_json::to_vec(&value).map_err(serde::de::Error::custom)
    }
}

/// ASCII record separator used to frame successive envelopes when the relay
/// uses a text framing rather than a length-prefixed one (§6).
pub const RECORD_SEPARATOR: u8 = 0x1E;

/// Splits a buffer of one-or-more record-separator-framed envelopes.
pub fn split_records(buf: &[u8]) -> Vec<&[u8]> {
    buf.split(|&b| b == RECORD_SEPARATOR)
        .filter(|chunk| !chunk.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_json() {
        let msg = AgentMessage::new(
            MessageType::Keysplitting,
            42,
            1,
            serde_json::to_vec(&serde_json::json!({"hello": "world"})).unwrap(),
        );
        let encoded = serde_json::to_string(&msg).unwrap();
        assert!(encoded.contains("\"messageType\":\"keysplitting\""));
        let decoded: AgentMessage = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.request_id, 42);
        assert_eq!(decoded.sequence_id, 1);
        assert_eq!(decoded.message_payload, msg.message_payload);
    }

    #[test]
    fn unknown_message_type_tag_is_a_typed_error() {
        let err = serde_json::from_str::<MessageType>("\"bogus\"").unwrap_err();
        assert!(err.to_string().contains("unknown message type"));
    }

    #[test]
    fn splits_record_separated_frames() {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"{\"a\":1}");
        buf.push(RECORD_SEPARATOR);
        buf.extend_from_slice(b"{\"b\":2}");
        let records = split_records(&buf);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], b"{\"a\":1}");
        assert_eq!(records[1], b"{\"b\":2}");
    }
}
