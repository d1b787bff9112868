#![forbid(unsafe_code)]

//! Agent binary: registers with the relay, then serves datachannels opened
//! against it.

use anyhow::Context;
use clap::Parser;
use mrzap_agent::{JsonFileKeyVault, KeyVault};
use mrzap_datachannel::{ActionHandler, AgentDatachannel, DatachannelError};
use mrzap_transport::registration::{self, ChallengeRequest};
use mrzap_transport::WebSocketRelayTransport;
use std::path::PathBuf;

/// MrZAP agent: the cluster-side half of the zero-trust data plane.
#[derive(Parser, Debug)]
#[clap(name = "mrzap-agent", about = "MrZAP agent process")]
struct AgentOpts {
    /// Directory holding the agent's persisted signing identity.
    #[clap(long, default_value = "./mrzap-agent-data")]
    data_dir: PathBuf,
    /// Relay challenge endpoint, e.g. `https://relay.example.invalid/challenge`.
    #[clap(long, env = "MRZAP_CHALLENGE_URL")]
    challenge_url: String,
    /// Relay activation endpoint, e.g. `https://relay.example.invalid/activate`.
    #[clap(long, env = "MRZAP_ACTIVATE_URL")]
    activate_url: String,
    /// Relay datachannel websocket base URL.
    #[clap(long, env = "MRZAP_RELAY_WS_URL")]
    relay_ws_url: String,
    /// Organization id presented during registration.
    #[clap(long, env = "MRZAP_ORG_ID")]
    org_id: String,
    /// Cluster id presented during registration.
    #[clap(long, env = "MRZAP_CLUSTER_ID")]
    cluster_id: String,
    /// Human-readable cluster name presented during registration.
    #[clap(long, env = "MRZAP_CLUSTER_NAME")]
    cluster_name: String,
}

/// Dispatches verified requests by action name. The real cluster-API calls
/// behind `kube/*` actions are out of scope (§1); this stands in as the seam
/// a production binary would fill with `mrzap_actions` session state plus a
/// concrete `ClusterApiClient`.
struct StubActionHandler;

#[async_trait::async_trait]
impl ActionHandler for StubActionHandler {
    async fn handle(&self, action: &str, request_id: u32, _payload: serde_json::Value) -> Result<serde_json::Value, DatachannelError> {
        tracing::info!(action, request_id, "handling action");
        Ok(serde_json::json!({ "status": 501, "body": format!("{action} not wired to a cluster API client") }))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mrzap_telemetry::init_tracing().context("initializing tracing")?;
    let opts = AgentOpts::parse();
    std::fs::create_dir_all(&opts.data_dir).context("creating data dir")?;

    let vault = JsonFileKeyVault::new(opts.data_dir.join("identity.json"));
    let signing_key = vault.load_or_generate().context("loading agent identity")?;
    tracing::info!(public_key = %signing_key.public_key().to_base64(), "agent identity ready");

    let http_client = reqwest::Client::new();
    let token = registration::register(
        &http_client,
        &opts.challenge_url,
        &opts.activate_url,
        &ChallengeRequest {
            org_id: opts.org_id,
            cluster_id: opts.cluster_id,
            cluster_name: opts.cluster_name,
        },
        &signing_key,
    )
    .await
    .context("registering with the relay")?;

    let ws_url = format!("{}?token={}", opts.relay_ws_url, token);
    let transport = WebSocketRelayTransport::connect(&ws_url).await.context("connecting to relay")?;

    let (_datachannel, handle) = AgentDatachannel::spawn(transport, signing_key, StubActionHandler);
    handle.await.context("datachannel task panicked")?;
    Ok(())
}
