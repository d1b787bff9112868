//! The four keysplitting payload variants and their signed envelope (§3, §4.1).

use crate::error::TypesError;
use serde::{Deserialize, Deserializer, Serialize};
use std::convert::TryFrom;

/// The `type` tag on a keysplitting payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum KeysplittingPayloadType {
    /// Opens a session.
    Syn,
    /// Accepts a session.
    SynAck,
    /// A request.
    Data,
    /// A response.
    DataAck,
}

impl TryFrom<&str> for KeysplittingPayloadType {
    type Error = TypesError;

    fn try_from(tag: &str) -> crate::Result<Self> {
        match tag {
            "Syn" => Ok(Self::Syn),
            "SynAck" => Ok(Self::SynAck),
            "Data" => Ok(Self::Data),
            "DataAck" => Ok(Self::DataAck),
            other => Err(TypesError::UnknownPayloadType(other.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for KeysplittingPayloadType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Self::try_from(tag.as_str()).map_err(serde::de::Error::custom)
    }
}

/// The user's bundled identity credential (§3 "BZCert").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BzCert {
    /// The id-token from the session's original OIDC login.
    pub initial_id_token: String,
    /// The most recently refreshed id-token.
    pub current_id_token: String,
    /// Base64 Ed25519 public key of the ephemeral client keypair.
    pub client_public_key: String,
    /// Base64 random commitment.
    pub rand: String,
    /// Base64 Ed25519 signature over `rand`, under the matching private key.
    pub signature_on_rand: String,
}

impl BzCert {
    /// Canonical bytes hashed to produce `bZCertHash` (§3).
    ///
    /// Field order matches the struct definition order, the same convention
    /// used for the payload variants below.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        push_str(&mut buf, &self.initial_id_token);
        push_str(&mut buf, &self.current_id_token);
        push_str(&mut buf, &self.client_public_key);
        push_str(&mut buf, &self.rand);
        push_str(&mut buf, &self.signature_on_rand);
        buf
    }
}

/// A base64 SHA3-256 digest of a peer payload's canonical bytes, chaining one
/// message to the one before it (§3 "hPointer").
///
/// Wrapped rather than left as a plain `String` so a hash can't be passed
/// where a nonce or an arbitrary string was meant, and vice versa.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HPointer(String);

impl HPointer {
    /// Wraps an already-computed base64 SHA3-256 digest.
    pub fn new(digest: impl Into<String>) -> Self {
        Self(digest.into())
    }

    /// The digest as a plain string slice, e.g. for canonical-byte encoding.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for HPointer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for HPointer {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for HPointer {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<HPointer> for String {
    fn from(value: HPointer) -> Self {
        value.0
    }
}

/// A fresh random nonce exchanged in `Syn`/`SynAck`, base64-encoded (§3).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NonceValue(String);

impl NonceValue {
    /// Wraps an already-generated base64 nonce.
    pub fn new(nonce: impl Into<String>) -> Self {
        Self(nonce.into())
    }

    /// The nonce as a plain string slice, e.g. for canonical-byte encoding.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NonceValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for NonceValue {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for NonceValue {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<NonceValue> for String {
    fn from(value: NonceValue) -> Self {
        value.0
    }
}

/// Fields shared by every keysplitting payload variant (§3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommonFields {
    /// Unix-seconds timestamp.
    pub timestamp: i64,
    /// Protocol schema version.
    pub schema_version: String,
    /// The action being requested, e.g. `kube/exec/start`.
    pub action: String,
}

/// One of the four keysplitting payload variants (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "PascalCase", rename_all_fields = "camelCase")]
pub enum KeysplittingPayload {
    /// Opens a session.
    Syn {
        /// Shared prefix fields.
        #[serde(flatten)]
        common: CommonFields,
        /// The agent being targeted.
        target_id: String,
        /// Fresh random nonce, base64.
        nonce: NonceValue,
        /// The client's bundled identity credential.
        #[serde(rename = "BZCert")]
        bzcert: BzCert,
    },
    /// Accepts a session.
    SynAck {
        /// Shared prefix fields.
        #[serde(flatten)]
        common: CommonFields,
        /// The agent's Ed25519 public key, base64.
        target_public_key: String,
        /// Copied verbatim from the `Syn` being acknowledged.
        nonce: NonceValue,
        /// Base64 SHA3-256 of the canonical `Syn` this acknowledges.
        h_pointer: HPointer,
    },
    /// A request.
    Data {
        /// Shared prefix fields.
        #[serde(flatten)]
        common: CommonFields,
        /// The agent being targeted.
        target_id: String,
        /// Base64 SHA3-256 of the canonical previous peer payload.
        h_pointer: HPointer,
        /// Base64 SHA3-256 commitment to the active `BzCert`.
        #[serde(rename = "bZCertHash")]
        bzcert_hash: String,
        /// Opaque, action-specific request payload.
        action_payload: serde_json::Value,
    },
    /// A response.
    DataAck {
        /// Shared prefix fields.
        #[serde(flatten)]
        common: CommonFields,
        /// The agent's Ed25519 public key, base64.
        target_public_key: String,
        /// Base64 SHA3-256 of the canonical `Data` this acknowledges.
        h_pointer: HPointer,
        /// Opaque, action-specific response payload.
        action_response_payload: serde_json::Value,
    },
}

impl KeysplittingPayload {
    /// The discriminant of this payload.
    pub fn kind(&self) -> KeysplittingPayloadType {
        match self {
            Self::Syn { .. } => KeysplittingPayloadType::Syn,
            Self::SynAck { .. } => KeysplittingPayloadType::SynAck,
            Self::Data { .. } => KeysplittingPayloadType::Data,
            Self::DataAck { .. } => KeysplittingPayloadType::DataAck,
        }
    }

    /// The shared prefix fields.
    pub fn common(&self) -> &CommonFields {
        match self {
            Self::Syn { common, .. }
            | Self::SynAck { common, .. }
            | Self::Data { common, .. }
            | Self::DataAck { common, .. } => common,
        }
    }

    /// Canonical byte serialization used for hash-chain pointers and for the
    /// Ed25519 signature (§4.1: "byte-identical canonical forms for sender
    /// and receiver or the chain will diverge").
    ///
    /// Field order follows the order each variant is tabulated in §3: the
    /// shared prefix first (timestamp, schemaVersion, type, action), then the
    /// variant-specific fields in the order listed.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        let common = self.common();
        push_i64(&mut buf, common.timestamp);
        push_str(&mut buf, &common.schema_version);
        push_str(&mut buf, kind_str(self.kind()));
        push_str(&mut buf, &common.action);
        match self {
            Self::Syn {
                target_id,
                nonce,
                bzcert,
                ..
            } => {
                push_str(&mut buf, target_id);
                push_str(&mut buf, nonce.as_str());
                buf.extend_from_slice(&bzcert.canonical_bytes());
            }
            Self::SynAck {
                target_public_key,
                nonce,
                h_pointer,
                ..
            } => {
                push_str(&mut buf, target_public_key);
                push_str(&mut buf, nonce.as_str());
                push_str(&mut buf, h_pointer.as_str());
            }
            Self::Data {
                target_id,
                h_pointer,
                bzcert_hash,
                action_payload,
                ..
            } => {
                push_str(&mut buf, target_id);
                push_str(&mut buf, h_pointer.as_str());
                push_str(&mut buf, bzcert_hash);
                push_str(&mut buf, &action_payload.to_string());
            }
            Self::DataAck {
                target_public_key,
                h_pointer,
                action_response_payload,
                ..
            } => {
                push_str(&mut buf, target_public_key);
                push_str(&mut buf, h_pointer.as_str());
                push_str(&mut buf, &action_response_payload.to_string());
            }
        }
        buf
    }
}

fn kind_str(kind: KeysplittingPayloadType) -> &'static str {
    match kind {
        KeysplittingPayloadType::Syn => "Syn",
        KeysplittingPayloadType::SynAck => "SynAck",
        KeysplittingPayloadType::Data => "Data",
        KeysplittingPayloadType::DataAck => "DataAck",
    }
}

fn push_str(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(s.as_bytes());
    buf.push(0); // field separator; UTF-8 strings never contain NUL.
}

fn push_i64(buf: &mut Vec<u8>, v: i64) {
    push_str(buf, &v.to_string());
}

/// A signed keysplitting payload, as it travels inside an `AgentMessage` of
/// type `Keysplitting` (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeysplittingMessage {
    /// The typed payload.
    pub payload: KeysplittingPayload,
    /// Base64 Ed25519 signature over `payload.canonical_bytes()`.
    pub signature: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bzcert() -> BzCert {
        BzCert {
            initial_id_token: "initial.jwt".into(),
            current_id_token: "current.jwt".into(),
            client_public_key: "cGs=".into(),
            rand: "cmFuZA==".into(),
            signature_on_rand: "c2ln".into(),
        }
    }

    #[test]
    fn syn_round_trips_through_json() {
        let payload = KeysplittingPayload::Syn {
            common: CommonFields {
                timestamp: 1_700_000_000,
                schema_version: "1.0".into(),
                action: "kube/restapi/request".into(),
            },
            target_id: "agent-1".into(),
            nonce: "bm9uY2U=".into(),
            bzcert: sample_bzcert(),
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"type\":\"Syn\""));
        assert!(json.contains("\"BZCert\""));
        assert!(json.contains("\"targetId\":\"agent-1\""));
        assert!(!json.contains("target_id"));
        let decoded: KeysplittingPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn data_ack_fields_are_camel_case_on_the_wire() {
        let payload = KeysplittingPayload::DataAck {
            common: CommonFields {
                timestamp: 1,
                schema_version: "1.0".into(),
                action: "kube/restapi/request".into(),
            },
            target_public_key: "abc".into(),
            h_pointer: "ghi".into(),
            action_response_payload: serde_json::json!({"ok": true}),
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"targetPublicKey\":\"abc\""));
        assert!(json.contains("\"hPointer\":\"ghi\""));
        assert!(json.contains("\"actionResponsePayload\""));
        assert!(!json.contains("target_public_key"));
        assert!(!json.contains("h_pointer"));
        assert!(!json.contains("action_response_payload"));
    }

    #[test]
    fn canonical_bytes_are_deterministic_and_order_sensitive() {
        let a = KeysplittingPayload::SynAck {
            common: CommonFields {
                timestamp: 1,
                schema_version: "1.0".into(),
                action: "kube/exec/start".into(),
            },
            target_public_key: "abc".into(),
            nonce: "def".into(),
            h_pointer: "ghi".into(),
        };
        let b = a.clone();
        assert_eq!(a.canonical_bytes(), b.canonical_bytes());

        let mut c = a.clone();
        if let KeysplittingPayload::SynAck { nonce, .. } = &mut c {
            *nonce = "zzz".into();
        }
        assert_ne!(a.canonical_bytes(), c.canonical_bytes());
    }
}
