#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! # MrZAP cryptographic primitives
//!
//! Ed25519 sign/verify, SHA3-256 hashing, Base64 codec, and BZCert/OIDC
//! identity verification (§2, §4.1, §4.7).

/// A crate-wide `Result` alias.
pub type Result<T, E = error::CryptoError> = std::result::Result<T, E>;

/// Base64 encode/decode helpers, centralized so every crate uses the same engine.
pub mod b64;
/// BZCert verification: signature-on-rand plus both id-tokens (§4.7).
pub mod bzcert;
/// Crate-local error type.
pub mod error;
/// SHA3-256 hashing helpers used to build hash-chain pointers (§4.1).
pub mod hash;
/// Ed25519 keypair generation, signing, and verification.
pub mod keys;
/// OIDC id-token claim decoding and verification (signature verification is
/// delegated to an injected `IdTokenVerifier` since the IdP is out of scope).
pub mod oidc;

pub use error::CryptoError;
pub use keys::{Ed25519KeyPair, Ed25519PublicKey};
