//! Datachannel-layer errors (§4.2, §7).

use mrzap_types::ErrorCode;
use thiserror::Error;

/// Errors raised while operating a datachannel.
#[derive(Error, Debug)]
pub enum DatachannelError {
    /// The keysplitting engine rejected a message; fatal to the whole session (§4.1, §7).
    #[error("protocol error: {0}")]
    Protocol(#[from] mrzap_keysplitting::ProtocolError),
    /// The transport failed to send or receive.
    #[error("transport error: {0}")]
    Transport(#[from] mrzap_transport::TransportError),
    /// An operation referenced a requestId with no registered action.
    #[error("no action registered for requestId {0}")]
    UnknownRequestId(u32),
    /// An envelope's message payload did not decode into the expected shape.
    #[error("malformed envelope payload: {0}")]
    MalformedPayload(String),
}

impl ErrorCode for DatachannelError {
    fn code(&self) -> &'static str {
        match self {
            Self::Protocol(_) => "DATACHANNEL_PROTOCOL_ERROR",
            Self::Transport(_) => "DATACHANNEL_TRANSPORT_ERROR",
            Self::UnknownRequestId(_) => "DATACHANNEL_UNKNOWN_REQUEST_ID",
            Self::MalformedPayload(_) => "DATACHANNEL_MALFORMED_PAYLOAD",
        }
    }
}
