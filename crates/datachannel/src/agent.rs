//! The agent half of a datachannel (§4.2): mirrors `ClientDatachannel`, but
//! dispatches inbound `Syn`/`Data` to a caller-supplied handler rather than
//! driving the chain itself, since the agent only ever reacts.

use crate::error::DatachannelError;
use crate::registry::ActionRegistry;
use async_trait::async_trait;
use mrzap_crypto::keys::Ed25519KeyPair;
use mrzap_keysplitting::{AgentEngine, ReceivedData, ReceivedSyn};
use mrzap_transport::RelayTransport;
use mrzap_types::{AgentMessage, ImpersonationContext, KeysplittingMessage, MessageType, StreamMessage};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// Runs the action-specific work behind a `Syn`/`Data`, producing the value
/// that becomes `actionResponsePayload`.
///
/// Implementations live in the agent binary (one per action kind, §4.3); the
/// datachannel only needs to call them between verifying the request and
/// signing the reply.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Handles one verified inbound request and returns its response payload.
    async fn handle(&self, action: &str, request_id: u32, payload: serde_json::Value) -> Result<serde_json::Value, DatachannelError>;
}

/// Drives one agent-side datachannel: a single keysplitting session shared
/// by every action the client opens over it.
pub struct AgentDatachannel {
    engine: Mutex<AgentEngine>,
    registry: Arc<ActionRegistry>,
    outbound_tx: mpsc::UnboundedSender<AgentMessage>,
    outbound_seq: AtomicU32,
    last_sent_request_id: AtomicU32,
    own_public_key_b64: String,
}

impl AgentDatachannel {
    /// Spawns the datachannel's transport-owning task, dispatching verified
    /// requests to `handler` and signing its responses back.
    pub fn spawn<T, H>(mut transport: T, signing_key: Ed25519KeyPair, handler: H) -> (Arc<Self>, tokio::task::JoinHandle<()>)
    where
        T: RelayTransport + 'static,
        H: ActionHandler + 'static,
    {
        let own_public_key_b64 = signing_key.public_key().to_base64();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<AgentMessage>();
        let dc = Arc::new(Self {
            engine: Mutex::new(AgentEngine::new(signing_key)),
            registry: Arc::new(ActionRegistry::new()),
            outbound_tx,
            outbound_seq: AtomicU32::new(0),
            last_sent_request_id: AtomicU32::new(0),
            own_public_key_b64,
        });
        let handler = Arc::new(handler);
        let dispatch_dc = dc.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    outbound = outbound_rx.recv() => {
                        match outbound {
                            Some(message) => {
                                if let Err(e) = transport.send(&message).await {
                                    tracing::warn!(error = %e, "datachannel outbound send failed");
                                    break;
                                }
                            }
                            None => break,
                        }
                    }
                    inbound = transport.recv() => {
                        match inbound {
                            Ok(message) => dispatch_dc.on_envelope(message, handler.clone()).await,
                            Err(e) => {
                                tracing::warn!(error = %e, "datachannel transport dropped, attempting reconnect");
                                if let Err(e) = transport.reconnect().await {
                                    tracing::warn!(error = %e, "reconnect failed, closing datachannel");
                                    break;
                                }
                                if let Err(e) = dispatch_dc.replay_last_sent(&mut transport).await {
                                    tracing::warn!(error = %e, "replay after reconnect failed, closing datachannel");
                                    break;
                                }
                            }
                        }
                    }
                }
            }
        });
        (dc, handle)
    }

    /// Delivers a `StreamMessage` for `request_id` out to the relay (exec
    /// stdout/stderr, log tail, port-forward data).
    pub fn send_stream(&self, message: StreamMessage) -> Result<(), DatachannelError> {
        let payload = serde_json::to_vec(&message).map_err(|e| DatachannelError::MalformedPayload(e.to_string()))?;
        let envelope = AgentMessage::new(MessageType::Stream, message.request_id, self.next_sequence(), payload);
        self.outbound_tx
            .send(envelope)
            .map_err(|_| DatachannelError::Transport(mrzap_transport::TransportError::ConnectionClosed("outbound task gone".into())))
    }

    /// Registers bookkeeping for a fresh requestId before its `Syn`/first
    /// `Data` arrives, so stream delivery has somewhere to land.
    pub async fn track(&self, request_id: u32, log_id: String, impersonation: ImpersonationContext) {
        self.registry.register(request_id, log_id, impersonation).await;
    }

    fn next_sequence(&self) -> u32 {
        self.outbound_seq.fetch_add(1, Ordering::SeqCst)
    }

    async fn on_envelope(&self, envelope: AgentMessage, handler: Arc<impl ActionHandler + 'static>) {
        match envelope.message_type {
            MessageType::Keysplitting => {
                let decoded: Result<KeysplittingMessage, _> = serde_json::from_slice(&envelope.message_payload);
                let msg = match decoded {
                    Ok(msg) => msg,
                    Err(e) => {
                        tracing::warn!(error = %e, "malformed keysplitting envelope");
                        return;
                    }
                };
                if let Err(e) = self.handle_keysplitting(envelope.request_id, &msg, handler).await {
                    tracing::warn!(error = %e, "keysplitting handling failed, closing session");
                    self.engine.lock().await.close();
                }
            }
            MessageType::Stop => {
                self.registry.remove(envelope.request_id).await;
            }
            MessageType::HealthCheck | MessageType::NewDatachannel | MessageType::Control | MessageType::Register => {
                tracing::debug!(message_type = ?envelope.message_type, "ignoring control-channel frame on a datachannel");
            }
            MessageType::Stream | MessageType::Ready => {
                tracing::debug!(message_type = ?envelope.message_type, "unexpected inbound frame kind on the agent side");
            }
        }
    }

    async fn handle_keysplitting(&self, request_id: u32, msg: &KeysplittingMessage, handler: Arc<impl ActionHandler + 'static>) -> Result<(), DatachannelError> {
        let is_syn = matches!(self.engine.lock().await.state(), mrzap_keysplitting::AgentState::Idle);
        if is_syn {
            let ReceivedSyn { action, .. } = self.engine.lock().await.on_syn(msg)?;
            let response = handler.handle(&action, request_id, serde_json::Value::Null).await?;
            let _ = response; // the Syn itself carries no action payload to answer with (§3).
            let syn_ack = {
                let mut engine = self.engine.lock().await;
                engine.build_syn_ack(&action, &self.own_public_key_b64, now_placeholder())?
            };
            self.reply(request_id, &syn_ack)
        } else {
            let ReceivedData { action, action_payload } = self.engine.lock().await.on_data(msg)?;
            let response = handler.handle(&action, request_id, action_payload).await?;
            let ack = {
                let mut engine = self.engine.lock().await;
                engine.build_data_ack(&action, &self.own_public_key_b64, response, now_placeholder())?
            };
            self.reply(request_id, &ack)
        }
    }

    fn reply(&self, request_id: u32, message: &KeysplittingMessage) -> Result<(), DatachannelError> {
        let payload = serde_json::to_vec(message).map_err(|e| DatachannelError::MalformedPayload(e.to_string()))?;
        let envelope = AgentMessage::new(MessageType::Keysplitting, request_id, self.next_sequence(), payload);
        self.last_sent_request_id.store(request_id, Ordering::SeqCst);
        self.outbound_tx
            .send(envelope)
            .map_err(|_| DatachannelError::Transport(mrzap_transport::TransportError::ConnectionClosed("outbound task gone".into())))
    }

    /// Resends the session's last unacked keysplitting reply byte-identically
    /// after a reconnect (§4.2), using `AgentEngine::last_sent` rather than the
    /// outbound queue, which the dropped connection may have already drained.
    async fn replay_last_sent<T: RelayTransport>(&self, transport: &mut T) -> Result<(), DatachannelError> {
        let Some(message) = self.engine.lock().await.last_sent().cloned() else {
            return Ok(());
        };
        let payload = serde_json::to_vec(&message).map_err(|e| DatachannelError::MalformedPayload(e.to_string()))?;
        let request_id = self.last_sent_request_id.load(Ordering::SeqCst);
        let envelope = AgentMessage::new(MessageType::Keysplitting, request_id, self.next_sequence(), payload);
        transport.send(&envelope).await.map_err(DatachannelError::Transport)
    }
}

/// Timestamps are supplied by the caller in every other layer; the
/// datachannel itself has no use for wall-clock skew so it stamps replies
/// with the Unix epoch second at build time.
fn now_placeholder() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mrzap_transport::relay_transport::test_support::pair as transport_pair;

    struct EchoHandler;

    #[async_trait]
    impl ActionHandler for EchoHandler {
        async fn handle(&self, _action: &str, _request_id: u32, payload: serde_json::Value) -> Result<serde_json::Value, DatachannelError> {
            Ok(payload)
        }
    }

    #[tokio::test]
    async fn answers_a_syn_then_a_data_over_a_loopback_transport() {
        let agent_key = Ed25519KeyPair::generate();
        let client_key = Ed25519KeyPair::generate();
        let bzcert = mrzap_types::BzCert {
            initial_id_token: "initial.jwt".into(),
            current_id_token: "current.jwt".into(),
            client_public_key: client_key.public_key().to_base64(),
            rand: "cmFuZA==".into(),
            signature_on_rand: "c2ln".into(),
        };

        let (client_transport, agent_transport) = transport_pair();
        let (_agent_dc, _handle) = AgentDatachannel::spawn(agent_transport, agent_key, EchoHandler);

        let mut client_engine = mrzap_keysplitting::ClientEngine::new(client_key, bzcert);
        let syn = client_engine.open("kube/restapi/request", "agent-1", "nonce-1".into(), 1).unwrap();
        drive_client(client_transport, syn, client_engine).await;
    }

    async fn drive_client(mut transport: impl mrzap_transport::RelayTransport, syn: KeysplittingMessage, mut client_engine: mrzap_keysplitting::ClientEngine) {
        let payload = serde_json::to_vec(&syn).unwrap();
        let envelope = AgentMessage::new(MessageType::Keysplitting, 1, 0, payload);
        transport.send(&envelope).await.unwrap();
        let reply = transport.recv().await.unwrap();
        let syn_ack: KeysplittingMessage = serde_json::from_slice(&reply.message_payload).unwrap();
        client_engine.on_syn_ack(&syn_ack).unwrap();

        let data = client_engine.send("kube/restapi/request", serde_json::json!({"method": "GET"}), 3).unwrap();
        let payload = serde_json::to_vec(&data).unwrap();
        let envelope = AgentMessage::new(MessageType::Keysplitting, 1, 1, payload);
        transport.send(&envelope).await.unwrap();
        let reply = transport.recv().await.unwrap();
        let data_ack: KeysplittingMessage = serde_json::from_slice(&reply.message_payload).unwrap();
        let response = client_engine.on_data_ack(&data_ack).unwrap();
        assert_eq!(response["method"], "GET");
    }
}
