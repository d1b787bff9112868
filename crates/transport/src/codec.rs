//! The outer envelope codec (§6: "Transport envelope (wire)"): `AgentMessage`
//! JSON (de)serialization plus the 0x1E record-separator framing helper for
//! relays that use a text framing rather than a length-prefixed one.

use crate::error::TransportError;
use mrzap_types::{split_records, AgentMessage, RECORD_SEPARATOR};

/// Encodes one envelope as a JSON frame, ready to be written to the socket.
pub fn encode(message: &AgentMessage) -> Result<Vec<u8>, TransportError> {
    serde_json::to_vec(message).map_err(|e| TransportError::Encode(e.to_string()))
}

/// Encodes one envelope and appends the record-separator framing byte (§6).
pub fn encode_framed(message: &AgentMessage) -> Result<Vec<u8>, TransportError> {
    let mut bytes = encode(message)?;
    bytes.push(RECORD_SEPARATOR);
    Ok(bytes)
}

/// Decodes a single JSON frame into an envelope.
pub fn decode(frame: &[u8]) -> Result<AgentMessage, TransportError> {
    serde_json::from_slice(frame).map_err(|e| TransportError::Decode(e.to_string()))
}

/// Splits a buffer that may carry one-or-more record-separator-framed
/// envelopes and decodes each one.
pub fn decode_all_framed(buf: &[u8]) -> Result<Vec<AgentMessage>, TransportError> {
    split_records(buf).into_iter().map(decode).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mrzap_types::MessageType;

    #[test]
    fn round_trips_a_single_envelope() {
        let msg = AgentMessage::new(MessageType::Ready, 1, 0, serde_json::to_vec(&serde_json::json!({})).unwrap());
        let encoded = encode(&msg).unwrap();
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded.request_id, 1);
    }

    #[test]
    fn decodes_multiple_record_separated_envelopes() {
        let a = AgentMessage::new(MessageType::Ready, 1, 0, serde_json::to_vec(&serde_json::json!({})).unwrap());
        let b = AgentMessage::new(MessageType::Stop, 1, 1, serde_json::to_vec(&serde_json::json!({})).unwrap());
        let mut buf = encode_framed(&a).unwrap();
        buf.extend(encode_framed(&b).unwrap());
        let decoded = decode_all_framed(&buf).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[1].sequence_id, 1);
    }
}
