//! Canonical hashing of keysplitting payloads (§4.1).
//!
//! The canonical byte form itself is owned by `mrzap_types::KeysplittingPayload`
//! (fixed field order, NUL-delimited UTF-8) since it is part of the wire data
//! model; this module is just the SHA3-256-over-canonical-bytes step that
//! produces an `hPointer`.

use mrzap_crypto::hash::sha3_256_base64;
use mrzap_types::KeysplittingPayload;

/// Computes the base64 SHA3-256 `hPointer` of a payload's canonical bytes.
pub fn hash_of(payload: &KeysplittingPayload) -> String {
    sha3_256_base64(&payload.canonical_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mrzap_types::keysplitting::CommonFields;

    #[test]
    fn is_stable_for_identical_payloads() {
        let payload = KeysplittingPayload::SynAck {
            common: CommonFields {
                timestamp: 1,
                schema_version: "1.0".into(),
                action: "kube/exec/start".into(),
            },
            target_public_key: "abc".into(),
            nonce: "def".into(),
            h_pointer: "ghi".into(),
        };
        assert_eq!(hash_of(&payload), hash_of(&payload.clone()));
    }
}
