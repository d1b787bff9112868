#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! # MrZAP data plane types
//!
//! This crate is the foundational library for the keysplitting data plane,
//! containing all wire data structures and the shared error vocabulary.
//!
//! ## Architectural role
//!
//! As the base crate, `mrzap-types` has minimal dependencies and is a
//! dependency of almost every other crate in the workspace. This keeps the
//! wire format's canonical definition (`AgentMessage`, `KeysplittingMessage`,
//! `StreamMessage`, `BzCert`) in exactly one place.

/// A crate-wide `Result` alias with a default error type.
pub type Result<T, E = error::TypesError> = std::result::Result<T, E>;

/// The outer transport envelope and its message-type tag.
pub mod envelope;
/// Shared error vocabulary and the `ErrorCode` trait.
pub mod error;
/// Four-message keysplitting payloads, signed envelopes, and BZCert.
pub mod keysplitting;
/// Per-action-session bookkeeping shared between the datachannel and actions.
pub mod session;
/// Out-of-band bulk stream payloads.
pub mod stream;

pub use envelope::{split_records, AgentMessage, MessageType, RECORD_SEPARATOR};
pub use error::{ErrorCode, TypesError};
pub use keysplitting::{BzCert, KeysplittingMessage, KeysplittingPayload, KeysplittingPayloadType};
pub use session::{ActionSession, ImpersonationContext};
pub use stream::{StreamMessage, StreamMessageType};
