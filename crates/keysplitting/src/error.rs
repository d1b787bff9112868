//! Protocol-level errors (§4.1, §7): every variant here is fatal to the
//! session — the caller tears the datachannel down and emits `stop`.

use mrzap_types::ErrorCode;
use thiserror::Error;

/// Errors raised while advancing a keysplitting engine.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The Ed25519 signature over the payload's canonical bytes did not verify.
    #[error("signature invalid")]
    SignatureInvalid(#[from] mrzap_crypto::CryptoError),
    /// The incoming message's `hPointer` did not match the hash it was expected to chain from.
    #[error("hPointer mismatch: expected {expected}, got {got}")]
    HPointerMismatch {
        /// The hash the engine expected.
        expected: String,
        /// The hash actually present on the incoming message.
        got: String,
    },
    /// A `SynAck`'s nonce did not match the nonce sent in the `Syn`.
    #[error("nonce mismatch: expected {expected}, got {got}")]
    NonceMismatch {
        /// The nonce the engine sent.
        expected: String,
        /// The nonce returned by the peer.
        got: String,
    },
    /// A `Data`'s `bZCertHash` changed mid-session without a fresh `Syn`.
    #[error("bZCertHash drifted mid-session")]
    BzCertDrift,
    /// The engine received a message that does not belong in its current state
    /// (e.g. a `Data` while still waiting for a `SynAck`).
    #[error("unexpected message in state {state}: {message_kind}")]
    StateMismatch {
        /// The engine's current state, for diagnostics.
        state: &'static str,
        /// The kind of message that arrived unexpectedly.
        message_kind: &'static str,
    },
    /// A payload variant did not match the one the engine expected at this point.
    #[error("unexpected payload variant: expected {expected}, got {got}")]
    UnexpectedVariant {
        /// The variant the engine expected.
        expected: &'static str,
        /// The variant actually received.
        got: &'static str,
    },
}

impl ErrorCode for ProtocolError {
    fn code(&self) -> &'static str {
        match self {
            Self::SignatureInvalid(_) => "KEYSPLITTING_SIGNATURE_INVALID",
            Self::HPointerMismatch { .. } => "KEYSPLITTING_HPOINTER_MISMATCH",
            Self::NonceMismatch { .. } => "KEYSPLITTING_NONCE_MISMATCH",
            Self::BzCertDrift => "KEYSPLITTING_BZCERT_DRIFT",
            Self::StateMismatch { .. } => "KEYSPLITTING_STATE_MISMATCH",
            Self::UnexpectedVariant { .. } => "KEYSPLITTING_UNEXPECTED_VARIANT",
        }
    }
}
