#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! # MrZAP action layer
//!
//! Client and agent halves of the four action state machines carried inside
//! keysplitting `Data`/`DataAck` payloads and their out-of-band `Stream`
//! messages (§4.3).

/// Action-name slash-paths.
pub mod action_name;
/// Action-layer errors.
pub mod error;
/// Exec: interactive stdin/stdout/stderr.
pub mod exec;
/// Log: agent-to-client streaming log tail.
pub mod log;
/// Port-Forward: multiplexed bidirectional byte streams.
pub mod portforward;
/// Per-stream out-of-order reassembly buffer.
pub mod reorder;
/// RestAPI: single-shot proxied cluster API calls.
pub mod restapi;

pub use error::ActionError;
pub use reorder::{ReorderBuffer, ReorderError};
