//! Registration & Challenge (§4.5): before opening a websocket, the agent
//! proves possession of its private key to obtain a short-lived token.

use crate::error::TransportError;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use mrzap_crypto::hash::sha3_256_base64;
use mrzap_crypto::keys::Ed25519KeyPair;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The request body POSTed to the challenge endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ChallengeRequest {
    /// The agent's organization id.
    pub org_id: String,
    /// The agent's cluster id.
    pub cluster_id: String,
    /// The agent's cluster name.
    pub cluster_name: String,
}

#[derive(Debug, Deserialize)]
struct ChallengeResponse {
    challenge: String,
}

#[derive(Debug, Serialize)]
struct SolvedChallenge {
    challenge: String,
    signature: String,
}

#[derive(Debug, Deserialize)]
struct ActivationResponse {
    token: String,
}

/// HTTP status codes the registration flow never retries (§4.5).
const NON_RETRYABLE_STATUSES: [u16; 3] = [400, 404, 500];

/// Builds the backoff policy for a general registration POST (§4.5: initial
/// 500ms, factor 1.5, cap 60s, max elapsed 8h).
pub fn general_backoff() -> ExponentialBackoff {
    backoff_with_max_elapsed(Duration::from_secs(8 * 60 * 60))
}

/// Builds the backoff policy specific to the registration challenge itself
/// (§4.5: same curve, max elapsed 4h).
pub fn registration_backoff() -> ExponentialBackoff {
    backoff_with_max_elapsed(Duration::from_secs(4 * 60 * 60))
}

fn backoff_with_max_elapsed(max_elapsed: Duration) -> ExponentialBackoff {
    ExponentialBackoff {
        initial_interval: Duration::from_millis(500),
        multiplier: 1.5,
        max_interval: Duration::from_secs(60),
        max_elapsed_time: Some(max_elapsed),
        ..ExponentialBackoff::default()
    }
}

fn is_retryable(status: reqwest::StatusCode) -> bool {
    !NON_RETRYABLE_STATUSES.contains(&status.as_u16())
}

/// Runs the full registration challenge flow: POST the cluster identity,
/// receive a challenge, sign its SHA3-256 hash with the agent's private key,
/// and exchange the signature for a short-lived activation token.
pub async fn register(
    client: &reqwest::Client,
    challenge_url: &str,
    activate_url: &str,
    request: &ChallengeRequest,
    signing_key: &Ed25519KeyPair,
) -> Result<String, TransportError> {
    let challenge = post_with_backoff::<_, ChallengeResponse>(client, challenge_url, request, registration_backoff()).await?;

    let digest = sha3_256_base64(challenge.challenge.as_bytes());
    let signature = signing_key.sign(digest.as_bytes());
    let solved = SolvedChallenge {
        challenge: challenge.challenge,
        signature,
    };

    let activation = post_with_backoff::<_, ActivationResponse>(client, activate_url, &solved, general_backoff()).await?;
    Ok(activation.token)
}

async fn post_with_backoff<Req: Serialize, Resp: for<'de> Deserialize<'de>>(
    client: &reqwest::Client,
    url: &str,
    body: &Req,
    mut backoff: ExponentialBackoff,
) -> Result<Resp, TransportError> {
    loop {
        let attempt = client.post(url).json(body).send().await;
        match attempt {
            Ok(response) if response.status().is_success() => {
                return response
                    .json::<Resp>()
                    .await
                    .map_err(|e| TransportError::RegistrationFailed(e.to_string()));
            }
            Ok(response) if !is_retryable(response.status()) => {
                return Err(TransportError::RegistrationFailed(format!("non-retryable status {}", response.status())));
            }
            Ok(response) => {
                tracing::warn!(status = %response.status(), url, "registration POST failed, retrying");
            }
            Err(e) => {
                tracing::warn!(error = %e, url, "registration POST transport error, retrying");
            }
        }
        match backoff.next_backoff() {
            Some(delay) => tokio::time::sleep(delay).await,
            None => return Err(TransportError::RegistrationFailed("retry budget exhausted".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_retryable_statuses_match_the_spec_exactly() {
        assert!(!is_retryable(reqwest::StatusCode::BAD_REQUEST));
        assert!(!is_retryable(reqwest::StatusCode::NOT_FOUND));
        assert!(!is_retryable(reqwest::StatusCode::INTERNAL_SERVER_ERROR));
        assert!(is_retryable(reqwest::StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_retryable(reqwest::StatusCode::TOO_MANY_REQUESTS));
    }

    #[test]
    fn backoff_policies_match_the_configured_curve() {
        let general = general_backoff();
        assert_eq!(general.initial_interval, Duration::from_millis(500));
        assert_eq!(general.max_interval, Duration::from_secs(60));
        assert_eq!(general.max_elapsed_time, Some(Duration::from_secs(8 * 60 * 60)));

        let registration = registration_backoff();
        assert_eq!(registration.max_elapsed_time, Some(Duration::from_secs(4 * 60 * 60)));
    }
}
