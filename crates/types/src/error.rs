// Shared error vocabulary for the MrZAP data plane.

use thiserror::Error;

/// A trait for assigning a stable, machine-readable string code to an error.
///
/// Mirrors the convention used across the wider corpus: every error variant
/// gets a code that is safe to log, alert on, or assert against in tests
/// without coupling to the `Display` wording.
pub trait ErrorCode {
    /// Returns the unique, stable string identifier for this error variant.
    fn code(&self) -> &'static str;
}

/// Errors raised while decoding or validating wire-format types.
#[derive(Error, Debug)]
pub enum TypesError {
    /// The `messageType` tag did not match any known variant.
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),
    /// The `type` tag on a keysplitting payload did not match any known variant.
    #[error("unknown keysplitting payload type: {0}")]
    UnknownPayloadType(String),
    /// The `type` tag on a stream payload did not match any known variant.
    #[error("unknown stream message type: {0}")]
    UnknownStreamType(String),
    /// Base64 decoding of a wire field failed.
    #[error("invalid base64 in field `{field}`: {source}")]
    InvalidBase64 {
        /// The field name that failed to decode.
        field: &'static str,
        /// The underlying decode error.
        #[source]
        source: base64::DecodeError,
    },
}

impl ErrorCode for TypesError {
    fn code(&self) -> &'static str {
        match self {
            Self::UnknownMessageType(_) => "TYPES_UNKNOWN_MESSAGE_TYPE",
            Self::UnknownPayloadType(_) => "TYPES_UNKNOWN_PAYLOAD_TYPE",
            Self::UnknownStreamType(_) => "TYPES_UNKNOWN_STREAM_TYPE",
            Self::InvalidBase64 { .. } => "TYPES_INVALID_BASE64",
        }
    }
}
