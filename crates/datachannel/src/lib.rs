#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! # MrZAP datachannel
//!
//! Ties the keysplitting engine, the action registry, and a `RelayTransport`
//! into one running session (§4.2): exactly one hash chain per datachannel,
//! shared by every action opened over it, serialized through a single-lane
//! outbound FIFO.

/// The agent half: dispatches verified requests to an `ActionHandler`.
pub mod agent;
/// The client half: opens and drives actions over the session.
pub mod client;
/// Crate-local error type.
pub mod error;
/// Per-requestId ack/stream routing.
pub mod registry;

pub use agent::{ActionHandler, AgentDatachannel};
pub use client::{ActionChannels, ClientDatachannel};
pub use error::DatachannelError;
pub use registry::{ActionHandle, ActionRegistry};
