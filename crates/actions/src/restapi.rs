//! The RestAPI action (§4.3): a single-shot proxied Kubernetes API call.

use crate::error::ActionError;
use async_trait::async_trait;
use mrzap_types::ImpersonationContext;
use serde::{Deserialize, Serialize};

/// The client half's request payload, packed into a `Data`'s `actionPayload`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestApiRequest {
    /// The cluster API endpoint path, e.g. `/api/v1/namespaces`.
    pub endpoint: String,
    /// The HTTP method.
    pub method: String,
    /// Extra headers the local tool sent, forwarded verbatim alongside the injected ones.
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    /// The request body, if any.
    #[serde(default)]
    pub body: Vec<u8>,
}

/// The agent half's response payload, packed into the matching `DataAck`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestApiResponse {
    /// HTTP status the cluster API returned.
    pub status: u16,
    /// Response headers.
    pub headers: Vec<(String, String)>,
    /// Response body.
    pub body: Vec<u8>,
}

/// The service-account bearer token used to authenticate to the cluster API,
/// distinct from the per-call impersonation context.
#[derive(Debug, Clone)]
pub struct ServiceAccountToken(
    /// The raw bearer token value.
    pub String,
);

/// Builds the header set the agent injects before proxying to the cluster API
/// (§4.3: `Authorization=Bearer <service-account-token>`,
/// `Impersonate-User=<target user>`, `Impersonate-Group=<target group>`).
pub fn build_injected_headers(token: &ServiceAccountToken, impersonation: &ImpersonationContext) -> Vec<(String, String)> {
    let mut headers = vec![("Authorization".to_string(), format!("Bearer {}", token.0))];
    if let Some(user) = &impersonation.target_user {
        headers.push(("Impersonate-User".to_string(), user.clone()));
    }
    for group in &impersonation.target_groups {
        headers.push(("Impersonate-Group".to_string(), group.clone()));
    }
    headers
}

/// The cluster API surface a RestAPI action's agent half calls into.
///
/// The real implementation (an HTTPS client trusting the cluster's CA bundle)
/// is an external collaborator out of scope for this crate (§1); this trait
/// is the seam the agent binary plugs into.
#[async_trait]
pub trait ClusterApiClient: Send + Sync {
    /// Proxies one request to the cluster API and returns its response.
    async fn call(&self, request: &RestApiRequest, headers: &[(String, String)]) -> Result<RestApiResponse, ActionError>;
}

/// Drives the agent half of a RestAPI action: a single call, `closed` true
/// immediately afterward (§4.3: "`closed` returns true immediately after the
/// single response").
pub struct AgentRestApiAction<'a> {
    client: &'a dyn ClusterApiClient,
    token: ServiceAccountToken,
    impersonation: ImpersonationContext,
    closed: bool,
}

impl<'a> AgentRestApiAction<'a> {
    /// Creates a new single-shot RestAPI action bound to the datachannel's
    /// service-account token and impersonation context.
    pub fn new(client: &'a dyn ClusterApiClient, token: ServiceAccountToken, impersonation: ImpersonationContext) -> Self {
        Self {
            client,
            token,
            impersonation,
            closed: false,
        }
    }

    /// Issues the proxied call and marks the action closed.
    pub async fn handle(&mut self, request: &RestApiRequest) -> Result<RestApiResponse, ActionError> {
        let headers = build_injected_headers(&self.token, &self.impersonation);
        let mut headers = headers;
        headers.extend(request.headers.iter().cloned());
        let response = self.client.call(request, &headers).await;
        self.closed = true;
        response
    }

    /// Whether this action has produced its single response.
    pub fn closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn injects_bearer_and_impersonation_headers() {
        let token = ServiceAccountToken("sa-token".to_string());
        let impersonation = ImpersonationContext {
            target_user: Some("alice".to_string()),
            target_groups: vec!["admins".to_string(), "devs".to_string()],
        };
        let headers = build_injected_headers(&token, &impersonation);
        assert!(headers.contains(&("Authorization".to_string(), "Bearer sa-token".to_string())));
        assert!(headers.contains(&("Impersonate-User".to_string(), "alice".to_string())));
        assert!(headers.contains(&("Impersonate-Group".to_string(), "admins".to_string())));
        assert!(headers.contains(&("Impersonate-Group".to_string(), "devs".to_string())));
    }

    #[test]
    fn omits_impersonation_headers_when_unset() {
        let token = ServiceAccountToken("sa-token".to_string());
        let headers = build_injected_headers(&token, &ImpersonationContext::default());
        assert_eq!(headers.len(), 1);
    }

    struct EchoClient;

    #[async_trait]
    impl ClusterApiClient for EchoClient {
        async fn call(&self, _request: &RestApiRequest, _headers: &[(String, String)]) -> Result<RestApiResponse, ActionError> {
            Ok(RestApiResponse {
                status: 200,
                headers: Vec::new(),
                body: b"ok".to_vec(),
            })
        }
    }

    #[tokio::test]
    async fn closes_immediately_after_the_single_response() {
        let client = EchoClient;
        let mut action = AgentRestApiAction::new(&client, ServiceAccountToken("t".into()), ImpersonationContext::default());
        assert!(!action.closed());
        let request = RestApiRequest {
            endpoint: "/api/v1/namespaces".into(),
            method: "GET".into(),
            headers: Vec::new(),
            body: Vec::new(),
        };
        let response = action.handle(&request).await.unwrap();
        assert_eq!(response.status, 200);
        assert!(action.closed());
    }
}
