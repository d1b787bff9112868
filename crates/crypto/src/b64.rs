//! Base64 codec, centralized on the standard engine used everywhere on the wire.

use crate::error::CryptoError;
use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Encodes bytes as standard (with padding) base64.
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decodes standard base64 into bytes.
pub fn decode(s: &str) -> Result<Vec<u8>, CryptoError> {
    STANDARD
        .decode(s)
        .map_err(|e| CryptoError::InvalidBase64(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let encoded = encode(b"hello world");
        assert_eq!(decode(&encoded).unwrap(), b"hello world");
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(decode("not base64!!").is_err());
    }
}
