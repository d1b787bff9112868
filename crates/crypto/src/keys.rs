//! Ed25519 key generation, signing, and verification.
//!
//! Grounded on the teacher's `SigningKeyPair`/`VerifyingKey` split (a public
//! key that verifies, a private key that signs, a signature that carries
//! both), re-implemented directly on `ed25519-dalek` rather than the
//! teacher's `dcrypt` wrapper — see DESIGN.md for why that dependency was
//! swapped.

use crate::b64;
use crate::error::CryptoError;
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use rand_core::OsRng;
use zeroize::Zeroize;

/// An Ed25519 key pair: an ephemeral client key, or the agent's persistent
/// signing identity.
#[derive(Clone)]
pub struct Ed25519KeyPair {
    signing_key: SigningKey,
}

impl Ed25519KeyPair {
    /// Generates a fresh key pair from the OS CSPRNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Reconstructs a key pair from a base64-encoded 32-byte seed.
    pub fn from_base64_seed(seed_b64: &str) -> Result<Self, CryptoError> {
        let mut bytes = b64::decode(seed_b64)?;
        let seed_result: Result<[u8; 32], _> = bytes.as_slice().try_into();
        let result = seed_result
            .map_err(|_| CryptoError::InvalidLength {
                expected: 32,
                got: bytes.len(),
            })
            .map(|mut seed| {
                let key_pair = Self {
                    signing_key: SigningKey::from_bytes(&seed),
                };
                seed.zeroize();
                key_pair
            });
        bytes.zeroize();
        result
    }

    /// The base64-encoded 32-byte seed, suitable for persistence in a vault.
    ///
    /// Zeroizes the intermediate raw-seed copy once it's been encoded, since
    /// that's the one buffer on this path not already covered by
    /// `SigningKey`'s own `ZeroizeOnDrop`.
    pub fn to_base64_seed(&self) -> String {
        let mut seed = self.signing_key.to_bytes();
        let encoded = b64::encode(&seed);
        seed.zeroize();
        encoded
    }

    /// The public key half.
    pub fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey(self.signing_key.verifying_key())
    }

    /// Signs `message` and returns the base64-encoded signature.
    pub fn sign(&self, message: &[u8]) -> String {
        let sig = self.signing_key.sign(message);
        b64::encode(&sig.to_bytes())
    }
}

/// An Ed25519 public key used to verify signatures produced by the matching
/// `Ed25519KeyPair`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Ed25519PublicKey(VerifyingKey);

impl Ed25519PublicKey {
    /// Parses a base64-encoded 32-byte public key.
    pub fn from_base64(s: &str) -> Result<Self, CryptoError> {
        let bytes = b64::decode(s)?;
        let array: [u8; 32] =
            bytes
                .as_slice()
                .try_into()
                .map_err(|_| CryptoError::InvalidLength {
                    expected: 32,
                    got: bytes.len(),
                })?;
        VerifyingKey::from_bytes(&array)
            .map(Ed25519PublicKey)
            .map_err(|_| CryptoError::InvalidLength {
                expected: 32,
                got: array.len(),
            })
    }

    /// Base64-encodes the public key.
    pub fn to_base64(&self) -> String {
        b64::encode(self.0.as_bytes())
    }

    /// Verifies a base64-encoded Ed25519 signature over `message` (§4.1:
    /// "Ed25519 over canonical payload bytes (not over the hash)").
    ///
    /// Any malformed base64, wrong-length signature, or failed cryptographic
    /// verification is a fatal `SignatureInvalid`/length error — the engine
    /// above never distinguishes these at the protocol layer (§4.1).
    pub fn verify(&self, message: &[u8], signature_b64: &str) -> Result<(), CryptoError> {
        let sig_bytes = b64::decode(signature_b64)?;
        let array: [u8; 64] =
            sig_bytes
                .as_slice()
                .try_into()
                .map_err(|_| CryptoError::InvalidLength {
                    expected: 64,
                    got: sig_bytes.len(),
                })?;
        let signature = ed25519_dalek::Signature::from_bytes(&array);
        self.0
            .verify(message, &signature)
            .map_err(|_| CryptoError::SignatureInvalid)
    }
}

impl std::fmt::Debug for Ed25519PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ed25519PublicKey({})", self.to_base64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_round_trips() {
        let kp = Ed25519KeyPair::generate();
        let sig = kp.sign(b"hello");
        kp.public_key().verify(b"hello", &sig).unwrap();
    }

    #[test]
    fn tampered_message_fails_verification() {
        let kp = Ed25519KeyPair::generate();
        let sig = kp.sign(b"hello");
        assert!(kp.public_key().verify(b"goodbye", &sig).is_err());
    }

    #[test]
    fn seed_round_trips_through_base64() {
        let kp = Ed25519KeyPair::generate();
        let seed = kp.to_base64_seed();
        let restored = Ed25519KeyPair::from_base64_seed(&seed).unwrap();
        assert_eq!(kp.public_key().to_base64(), restored.public_key().to_base64());
    }
}
