//! Out-of-band bulk output frames (§3 "StreamMessage").

use crate::error::TypesError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Deserializer, Serialize};
use std::convert::TryFrom;

/// The `type` tag on a `StreamMessage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StreamMessageType {
    /// Exec stdout bytes.
    Stdout,
    /// Exec stderr bytes.
    Stderr,
    /// Log tail bytes.
    Logout,
    /// Port-forward data-stream bytes, agent to client.
    PortforwardData,
    /// Port-forward error-stream bytes, agent to client.
    PortforwardError,
    /// Port-forward readiness signal, agent to client.
    ReadyPortforward,
}

impl TryFrom<&str> for StreamMessageType {
    type Error = TypesError;

    fn try_from(tag: &str) -> crate::Result<Self> {
        match tag {
            "stdout" => Ok(Self::Stdout),
            "stderr" => Ok(Self::Stderr),
            "logout" => Ok(Self::Logout),
            "portforwardData" => Ok(Self::PortforwardData),
            "portforwardError" => Ok(Self::PortforwardError),
            "readyPortforward" => Ok(Self::ReadyPortforward),
            other => Err(TypesError::UnknownStreamType(other.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for StreamMessageType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Self::try_from(tag.as_str()).map_err(serde::de::Error::custom)
    }
}

/// An out-of-band bulk output frame (§3).
///
/// Sequence numbers are per-stream monotonic; gaps are tolerated and ordering
/// is restored at the reader (§5).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamMessage {
    /// What kind of stream content this carries.
    #[serde(rename = "type")]
    pub type_: StreamMessageType,
    /// The action session this belongs to.
    pub request_id: u32,
    /// Correlates multiple stream frames belonging to one logical log/exec output.
    pub log_id: String,
    /// Per-stream monotonic sequence number.
    pub sequence_number: u64,
    /// Base64-encoded payload bytes.
    pub content: String,
}

impl StreamMessage {
    /// Decodes `content` from its wire base64 encoding.
    pub fn decode_content(&self) -> crate::Result<Vec<u8>> {
        STANDARD.decode(&self.content).map_err(|source| TypesError::InvalidBase64 { field: "content", source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let msg = StreamMessage {
            type_: StreamMessageType::Stdout,
            request_id: 7,
            log_id: "log-1".into(),
            sequence_number: 3,
            content: "aGVsbG8=".into(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"stdout\""));
        let decoded: StreamMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.sequence_number, 3);
    }

    #[test]
    fn unknown_stream_type_tag_is_a_typed_error() {
        let err = serde_json::from_str::<StreamMessageType>("\"bogus\"").unwrap_err();
        assert!(err.to_string().contains("unknown stream message type"));
    }

    #[test]
    fn decode_content_rejects_malformed_base64() {
        let msg = StreamMessage {
            type_: StreamMessageType::Stdout,
            request_id: 1,
            log_id: "log-1".into(),
            sequence_number: 0,
            content: "not valid base64!!".into(),
        };
        let err = msg.decode_content().unwrap_err();
        assert_eq!(crate::ErrorCode::code(&err), "TYPES_INVALID_BASE64");
    }

    #[test]
    fn decode_content_round_trips_valid_base64() {
        let msg = StreamMessage {
            type_: StreamMessageType::Stdout,
            request_id: 1,
            log_id: "log-1".into(),
            sequence_number: 0,
            content: "aGVsbG8=".into(),
        };
        assert_eq!(msg.decode_content().unwrap(), b"hello");
    }
}
