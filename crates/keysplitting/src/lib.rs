#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! # MrZAP keysplitting engine
//!
//! The four-message, hash-chained, Ed25519-signed handshake (§3, §4.1): one
//! engine per session, strictly half-duplex, with fatal failure semantics on
//! any chain or signature mismatch.

/// A crate-wide `Result` alias.
pub type Result<T, E = error::ProtocolError> = std::result::Result<T, E>;

/// Canonical-hash helper built on the payload's own canonical byte form.
pub mod canonical;
/// Protocol-level errors, all fatal to the session.
pub mod error;
/// The client and agent engine state machines.
pub mod engine;

pub use engine::{AgentEngine, AgentState, ClientEngine, ClientState, ReceivedData, ReceivedSyn};
pub use error::ProtocolError;
