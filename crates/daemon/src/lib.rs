#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! # MrZAP daemon
//!
//! The client-side daemon (§6): local-frontend bearer-token gating,
//! URL-based action dispatch, and CSPRNG `request_id` generation.

/// Bearer-token parsing and constant-time comparison.
pub mod bearer_token;
/// The `LocalFrontend` boundary and URL-based action dispatch.
pub mod frontend;
/// Collision-checked `request_id` generation.
pub mod request_id;

pub use bearer_token::{authorize, strip_bearer_scheme, strip_extra_suffix, token_matches};
pub use frontend::{route_for_path, FrontendRequest, LocalFrontend, RouteKind};
pub use request_id::generate_request_id;
