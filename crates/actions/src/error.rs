//! Action-layer errors (§4.3 "Failure semantics for actions").

use mrzap_types::ErrorCode;
use thiserror::Error;

/// Errors raised while driving an action's client or agent half.
///
/// Per §4.3, a malformed payload or cluster-API failure is never fatal to the
/// session the way a [`mrzap_keysplitting::ProtocolError`] is — it surfaces as
/// an error body in the `DataAck`, or as an explicit stop datagram for local
/// cancellation.
#[derive(Error, Debug)]
pub enum ActionError {
    /// The action payload did not deserialize into the shape this action expects.
    #[error("malformed payload for action {action}: {reason}")]
    MalformedPayload {
        /// The action name the payload was addressed to.
        action: String,
        /// Why deserialization failed.
        reason: String,
    },
    /// The cluster API returned an error for a RestAPI or exec/log/port-forward request.
    #[error("cluster API error: status {status}")]
    ClusterApi {
        /// HTTP status returned by the cluster API.
        status: u16,
        /// Response body, if any.
        body: String,
    },
    /// An operation was attempted against an action that has already closed.
    #[error("action {request_id} is already closed")]
    AlreadyClosed {
        /// The closed action's request id.
        request_id: u32,
    },
    /// A port-forward operation referenced an inner connection id that is not open.
    #[error("no such port-forward inner connection: {inner_id}")]
    UnknownInnerConnection {
        /// The inner connection id that was not found.
        inner_id: u32,
    },
    /// A peer stalled a stream past its reorder buffer's capacity (§9).
    #[error(transparent)]
    StreamOverflow(#[from] crate::reorder::ReorderError),
}

impl ErrorCode for ActionError {
    fn code(&self) -> &'static str {
        match self {
            Self::MalformedPayload { .. } => "ACTION_MALFORMED_PAYLOAD",
            Self::ClusterApi { .. } => "ACTION_CLUSTER_API_ERROR",
            Self::AlreadyClosed { .. } => "ACTION_ALREADY_CLOSED",
            Self::UnknownInnerConnection { .. } => "ACTION_UNKNOWN_INNER_CONNECTION",
            Self::StreamOverflow(_) => "ACTION_STREAM_OVERFLOW",
        }
    }
}
