//! Transport-layer errors (§4.5, §4.6).

use mrzap_types::ErrorCode;
use thiserror::Error;

/// Errors raised by the outer envelope codec or a `RelayTransport`.
#[derive(Error, Debug)]
pub enum TransportError {
    /// An envelope frame failed to JSON-decode.
    #[error("envelope decode failed: {0}")]
    Decode(String),
    /// An envelope failed to JSON-encode.
    #[error("envelope encode failed: {0}")]
    Encode(String),
    /// The underlying socket closed or errored.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),
    /// The registration challenge flow failed after exhausting its retry budget.
    #[error("registration failed: {0}")]
    RegistrationFailed(String),
}

impl ErrorCode for TransportError {
    fn code(&self) -> &'static str {
        match self {
            Self::Decode(_) => "TRANSPORT_DECODE_ERROR",
            Self::Encode(_) => "TRANSPORT_ENCODE_ERROR",
            Self::ConnectionClosed(_) => "TRANSPORT_CONNECTION_CLOSED",
            Self::RegistrationFailed(_) => "TRANSPORT_REGISTRATION_FAILED",
        }
    }
}
