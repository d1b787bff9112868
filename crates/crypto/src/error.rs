// Crate-local error type, grounded on the teacher's `ErrorCode` convention.

use mrzap_types::ErrorCode;
use thiserror::Error;

/// Errors raised by cryptographic operations.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// A base64 field failed to decode.
    #[error("invalid base64: {0}")]
    InvalidBase64(String),
    /// A key or signature had the wrong byte length.
    #[error("invalid key or signature length: expected {expected}, got {got}")]
    InvalidLength {
        /// The expected byte length.
        expected: usize,
        /// The byte length actually supplied.
        got: usize,
    },
    /// Ed25519 signature verification failed.
    #[error("signature verification failed")]
    SignatureInvalid,
    /// An id-token could not be parsed or its signature did not verify.
    #[error("id-token invalid: {0}")]
    IdTokenInvalid(String),
    /// An id-token's `exp` claim is in the past.
    #[error("id-token expired")]
    IdTokenExpired,
    /// An id-token's `iss` claim did not match the expected issuer.
    #[error("id-token issuer mismatch: expected `{expected}`, got `{got}`")]
    IdTokenIssuerMismatch {
        /// The issuer the verifier expected.
        expected: String,
        /// The issuer the token actually carried.
        got: String,
    },
    /// The initial and current id-tokens in a BZCert do not share a subject,
    /// so rotation is not permitted between them (§4.7).
    #[error("id-token rotation subject mismatch")]
    RotationSubjectMismatch,
    /// The BZCert's signature over `rand` did not verify under its own
    /// `clientPublicKey`.
    #[error("BZCert signature-on-rand invalid")]
    BzCertSignatureInvalid,
}

impl ErrorCode for CryptoError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidBase64(_) => "CRYPTO_INVALID_BASE64",
            Self::InvalidLength { .. } => "CRYPTO_INVALID_LENGTH",
            Self::SignatureInvalid => "CRYPTO_SIGNATURE_INVALID",
            Self::IdTokenInvalid(_) => "CRYPTO_ID_TOKEN_INVALID",
            Self::IdTokenExpired => "CRYPTO_ID_TOKEN_EXPIRED",
            Self::IdTokenIssuerMismatch { .. } => "CRYPTO_ID_TOKEN_ISSUER_MISMATCH",
            Self::RotationSubjectMismatch => "CRYPTO_ROTATION_SUBJECT_MISMATCH",
            Self::BzCertSignatureInvalid => "CRYPTO_BZCERT_SIGNATURE_INVALID",
        }
    }
}
