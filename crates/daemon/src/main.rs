#![forbid(unsafe_code)]

//! Daemon binary: connects to the relay and opens one action per line of
//! newline-delimited JSON read from stdin.
//!
//! A production binary would replace stdin with a real `LocalFrontend`
//! (HTTPS listener, bearer-token gating, SPDY upgrade) — out of scope here
//! per §1 — but the connect/open-action/print-response wiring below is the
//! real path a request takes once it clears that boundary.

use anyhow::Context;
use clap::Parser;
use mrzap_crypto::keys::Ed25519KeyPair;
use mrzap_datachannel::ClientDatachannel;
use mrzap_daemon::{authorize, generate_request_id, route_for_path};
use mrzap_transport::WebSocketRelayTransport;
use mrzap_types::BzCert;
use serde::Deserialize;
use std::io::BufRead;

/// MrZAP daemon: the user-facing half of the zero-trust data plane.
#[derive(Parser, Debug)]
#[clap(name = "mrzap-daemon", about = "MrZAP client daemon")]
struct DaemonOpts {
    /// Relay datachannel websocket URL, including any relay-assigned token query parameter.
    #[clap(long, env = "MRZAP_RELAY_WS_URL")]
    relay_ws_url: String,
    /// The agent id this daemon's actions target.
    #[clap(long, env = "MRZAP_TARGET_ID")]
    target_id: String,
    /// Bearer token gating the (not-yet-implemented) local HTTPS frontend.
    #[clap(long, env = "MRZAP_LOCALHOST_TOKEN")]
    localhost_token: String,
}

/// One line of the stdin demo protocol.
#[derive(Debug, Deserialize)]
struct StdinRequest {
    authorization: String,
    path: String,
    body: serde_json::Value,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mrzap_telemetry::init_tracing().context("initializing tracing")?;
    let opts = DaemonOpts::parse();

    let client_key = Ed25519KeyPair::generate();
    let bzcert = BzCert {
        initial_id_token: std::env::var("MRZAP_INITIAL_ID_TOKEN").unwrap_or_default(),
        current_id_token: std::env::var("MRZAP_CURRENT_ID_TOKEN").unwrap_or_default(),
        client_public_key: client_key.public_key().to_base64(),
        rand: mrzap_crypto::b64::encode(b"daemon-demo-rand"),
        signature_on_rand: client_key.sign(b"daemon-demo-rand"),
    };

    let transport = WebSocketRelayTransport::connect(&opts.relay_ws_url).await.context("connecting to relay")?;
    let (datachannel, _handle) = ClientDatachannel::spawn(transport, client_key, bzcert, opts.target_id);

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("reading stdin")?;
        if line.trim().is_empty() {
            continue;
        }
        let request: StdinRequest = serde_json::from_str(&line).context("parsing demo request")?;
        if !authorize(&request.authorization, &opts.localhost_token) {
            tracing::warn!("rejected request with an invalid bearer token");
            continue;
        }
        let route = route_for_path(&request.path);
        let timestamp = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH)?.as_secs() as i64;
        let request_id = generate_request_id(|candidate| {
            let datachannel = datachannel.clone();
            async move { datachannel.has_action(candidate).await }
        })
        .await
        .context("no free request id found")?;
        let mut channels = datachannel
            .start_action(request_id, format!("log-{request_id}"), route.start_action_name(), request.body, timestamp)
            .await
            .context("opening action")?;
        if let Some(ack) = channels.ack_rx.recv().await {
            println!("{ack}");
        }
    }
    Ok(())
}
