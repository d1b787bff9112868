//! SHA3-256 hashing, used to build the keysplitting `hPointer` chain (§4.1).

use crate::b64;
use sha3::{Digest, Sha3_256};

/// Hashes `bytes` with SHA3-256 and returns the base64-encoded digest — the
/// form used for every `hPointer` and `bZCertHash` on the wire.
pub fn sha3_256_base64(bytes: &[u8]) -> String {
    let mut hasher = Sha3_256::new();
    hasher.update(bytes);
    b64::encode(&hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_deterministic() {
        assert_eq!(sha3_256_base64(b"abc"), sha3_256_base64(b"abc"));
    }

    #[test]
    fn is_sensitive_to_input() {
        assert_ne!(sha3_256_base64(b"abc"), sha3_256_base64(b"abd"));
    }

    #[test]
    fn produces_32_byte_digests() {
        let decoded = crate::b64::decode(&sha3_256_base64(b"abc")).unwrap();
        assert_eq!(decoded.len(), 32);
    }
}
