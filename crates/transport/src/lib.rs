#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! # MrZAP transport layer
//!
//! The outer envelope codec, the `RelayTransport` boundary and its default
//! WebSocket implementation, and the registration/challenge flow (§4.5, §4.6).

/// `AgentMessage` JSON (de)serialization and record-separator framing.
pub mod codec;
/// Transport-layer errors.
pub mod error;
/// The `RelayTransport` trait and `WebSocketRelayTransport`.
pub mod relay_transport;
/// Registration & Challenge.
pub mod registration;

pub use error::TransportError;
pub use relay_transport::{RelayTransport, WebSocketRelayTransport};
