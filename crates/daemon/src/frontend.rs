//! The client-side local frontend (§6): an HTTPS listener gated by a bearer
//! token, dispatching by URL to the exec/log/portforward/restapi actions.
//!
//! The listener itself (TLS termination, HTTP parsing, SPDY upgrade) is an
//! external collaborator out of scope per §1; `LocalFrontend` is the
//! boundary a production binary implements against a real HTTP server, and
//! `route_for_path` is the in-scope dispatch rule it is expected to apply.

use async_trait::async_trait;
use mrzap_actions::action_name;

/// One already-authenticated inbound request from the local frontend.
pub struct FrontendRequest {
    /// The request path, e.g. `/exec`, `/log`, `/portforward`, or anything else (→ restapi).
    pub path: String,
    /// The raw `Authorization` header value, prior to gating.
    pub authorization: String,
}

/// Which action kind a path routes to (§6: "dispatches by URL").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    /// `/exec`.
    Exec,
    /// `/log`.
    Log,
    /// A SPDY-upgrade `/portforward` request.
    PortForward,
    /// Anything else.
    RestApi,
}

/// Applies the §6 URL-substring dispatch rule.
pub fn route_for_path(path: &str) -> RouteKind {
    if path.contains("/exec") {
        RouteKind::Exec
    } else if path.contains("/log") {
        RouteKind::Log
    } else if path.contains("/portforward") {
        RouteKind::PortForward
    } else {
        RouteKind::RestApi
    }
}

impl RouteKind {
    /// The action name this route opens (§4.3).
    pub fn start_action_name(self) -> &'static str {
        match self {
            RouteKind::Exec => action_name::EXEC_START,
            RouteKind::Log => action_name::LOG_START,
            RouteKind::PortForward => action_name::PORTFORWARD_START,
            RouteKind::RestApi => action_name::RESTAPI_REQUEST,
        }
    }
}

/// External collaborator boundary for the local HTTPS listener (§1, §6): a
/// production implementation owns TLS, HTTP parsing, and SPDY upgrade, and
/// calls back into the daemon's action layer once a request is authorized.
#[async_trait]
pub trait LocalFrontend: Send + Sync {
    /// Serves forever, handing each authorized request to `on_request`.
    async fn serve(&self, on_request: &(dyn Fn(FrontendRequest) + Send + Sync));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_by_url_substring() {
        assert_eq!(route_for_path("/api/v1/pods/foo/exec"), RouteKind::Exec);
        assert_eq!(route_for_path("/api/v1/pods/foo/log"), RouteKind::Log);
        assert_eq!(route_for_path("/api/v1/pods/foo/portforward"), RouteKind::PortForward);
        assert_eq!(route_for_path("/api/v1/namespaces/default/services"), RouteKind::RestApi);
    }

    #[test]
    fn action_names_match_the_action_registry() {
        assert_eq!(RouteKind::Exec.start_action_name(), "kube/exec/start");
        assert_eq!(RouteKind::RestApi.start_action_name(), "kube/restapi/request");
    }
}
