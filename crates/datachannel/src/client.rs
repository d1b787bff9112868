//! The client half of a datachannel (§4.2): one keysplitting engine shared by
//! every action opened over this session, a registry routing inbound acks
//! and stream frames to the right action, and a single-lane outbound FIFO.

use crate::error::DatachannelError;
use crate::registry::ActionRegistry;
use mrzap_crypto::keys::Ed25519KeyPair;
use mrzap_keysplitting::{ClientEngine, ClientState};
use mrzap_transport::RelayTransport;
use mrzap_types::{AgentMessage, BzCert, ImpersonationContext, KeysplittingMessage, MessageType, StreamMessage};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex, Notify};

/// Everything a caller needs to drive one action: its requestId, and the
/// receiving ends of its ack/stream channels.
pub struct ActionChannels {
    /// The requestId this action was registered under.
    pub request_id: u32,
    /// Decoded `actionResponsePayload` values addressed to this action.
    pub ack_rx: mpsc::UnboundedReceiver<serde_json::Value>,
    /// `StreamMessage`s addressed to this action.
    pub stream_rx: mpsc::UnboundedReceiver<StreamMessage>,
}

/// Drives one client-side datachannel: a single keysplitting session shared
/// by all of its actions (§4.2).
pub struct ClientDatachannel {
    engine: Mutex<ClientEngine>,
    send_lane: Mutex<()>,
    registry: Arc<ActionRegistry>,
    outbound_tx: mpsc::UnboundedSender<AgentMessage>,
    pending_keysplitting: Mutex<Option<oneshot::Sender<KeysplittingMessage>>>,
    ready: Notify,
    outbound_seq: AtomicU32,
    last_sent_request_id: AtomicU32,
    target_id: String,
}

impl ClientDatachannel {
    /// Spawns the datachannel's transport-owning task and returns a handle
    /// plus the task's `JoinHandle`, so the caller can drive actions while
    /// the task pumps the socket in the background.
    pub fn spawn<T: RelayTransport + 'static>(
        mut transport: T,
        signing_key: Ed25519KeyPair,
        bzcert: BzCert,
        target_id: String,
    ) -> (Arc<Self>, tokio::task::JoinHandle<()>) {
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<AgentMessage>();
        let dc = Arc::new(Self {
            engine: Mutex::new(ClientEngine::new(signing_key, bzcert)),
            send_lane: Mutex::new(()),
            registry: Arc::new(ActionRegistry::new()),
            outbound_tx,
            pending_keysplitting: Mutex::new(None),
            ready: Notify::new(),
            outbound_seq: AtomicU32::new(0),
            last_sent_request_id: AtomicU32::new(0),
            target_id,
        });
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
                            Ok(message) => dispatch_dc.on_envelope(message).await,
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

    /// Opens a new action, performing the session's `Syn`/`SynAck` handshake
    /// first if this is the session's first action (§4.2).
    pub async fn start_action(
        self: &Arc<Self>,
        request_id: u32,
        log_id: String,
        action: &str,
        action_payload: serde_json::Value,
        timestamp: i64,
    ) -> Result<ActionChannels, DatachannelError> {
        let (ack_rx, stream_rx) = self.registry.register(request_id, log_id, ImpersonationContext::default()).await;

        let _lane = self.send_lane.lock().await;
        {
            let needs_syn = self.engine.lock().await.state() == ClientState::Idle;
            if needs_syn {
                self.open_session(action, timestamp).await?;
            }
        }
        let response = self.send_data(request_id, action, action_payload, timestamp).await?;
        self.registry.deliver_ack(request_id, response).await;

        Ok(ActionChannels { request_id, ack_rx, stream_rx })
    }

    /// Sends a subsequent `Data` for an already-open action (e.g. exec
    /// stdin), reusing the session's existing hash chain.
    pub async fn feed_action(&self, request_id: u32, action: &str, action_payload: serde_json::Value, timestamp: i64) -> Result<(), DatachannelError> {
        let _lane = self.send_lane.lock().await;
        let response = self.send_data(request_id, action, action_payload, timestamp).await?;
        self.registry.deliver_ack(request_id, response).await;
        Ok(())
    }

    /// Emits the action's terminator and removes it from the registry (§4.2).
    pub async fn stop_action(&self, request_id: u32) {
        self.registry.remove(request_id).await;
        let envelope = AgentMessage::new(MessageType::Stop, request_id, self.next_sequence(), Vec::new());
        let _ = self.outbound_tx.send(envelope);
    }

    /// Blocks until the agent's `ready` envelope arrives, gating the first action (§4.2).
    pub async fn wait_ready(&self) {
        self.ready.notified().await;
    }

    /// Whether `request_id` currently has a registered action — the
    /// collision check a caller threads into `generate_request_id`.
    pub async fn has_action(&self, request_id: u32) -> bool {
        self.registry.contains(request_id).await
    }

    async fn open_session(&self, action: &str, timestamp: i64) -> Result<(), DatachannelError> {
        let nonce = mrzap_types::keysplitting::NonceValue::new(mrzap_crypto::b64::encode(&rand_bytes()));
        let syn = {
            let mut engine = self.engine.lock().await;
            engine.open(action, &self.target_id, nonce, timestamp)?
        };
        let (tx, rx) = oneshot::channel();
        *self.pending_keysplitting.lock().await = Some(tx);
        self.send_keysplitting(0, &syn)?;
        let syn_ack = rx.await.map_err(|_| DatachannelError::Transport(mrzap_transport::TransportError::ConnectionClosed("dispatch task gone".into())))?;
        self.engine.lock().await.on_syn_ack(&syn_ack)?;
        Ok(())
    }

    async fn send_data(&self, request_id: u32, action: &str, action_payload: serde_json::Value, timestamp: i64) -> Result<serde_json::Value, DatachannelError> {
        let data = {
            let mut engine = self.engine.lock().await;
            engine.send(action, action_payload, timestamp)?
        };
        let (tx, rx) = oneshot::channel();
        *self.pending_keysplitting.lock().await = Some(tx);
        self.send_keysplitting(request_id, &data)?;
        let data_ack = rx.await.map_err(|_| DatachannelError::Transport(mrzap_transport::TransportError::ConnectionClosed("dispatch task gone".into())))?;
        let response = self.engine.lock().await.on_data_ack(&data_ack)?;
        Ok(response)
    }

    fn send_keysplitting(&self, request_id: u32, message: &KeysplittingMessage) -> Result<(), DatachannelError> {
        let payload = serde_json::to_vec(message).map_err(|e| DatachannelError::MalformedPayload(e.to_string()))?;
        let envelope = AgentMessage::new(MessageType::Keysplitting, request_id, self.next_sequence(), payload);
        self.last_sent_request_id.store(request_id, Ordering::SeqCst);
        self.outbound_tx
            .send(envelope)
            .map_err(|_| DatachannelError::Transport(mrzap_transport::TransportError::ConnectionClosed("outbound task gone".into())))
    }

    /// Resends the session's last unacked keysplitting message byte-identically
    /// after a reconnect (§4.2), using `ClientEngine::last_sent` rather than the
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

    fn next_sequence(&self) -> u32 {
        self.outbound_seq.fetch_add(1, Ordering::SeqCst)
    }

    async fn on_envelope(&self, envelope: AgentMessage) {
        match envelope.message_type {
            MessageType::Keysplitting => {
                let decoded: Result<KeysplittingMessage, _> = serde_json::from_slice(&envelope.message_payload);
                match decoded {
                    Ok(msg) => {
                        if let Some(tx) = self.pending_keysplitting.lock().await.take() {
                            let _ = tx.send(msg);
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "malformed keysplitting envelope"),
                }
            }
            MessageType::Stream => {
                let decoded: Result<StreamMessage, _> = serde_json::from_slice(&envelope.message_payload);
                match decoded {
                    Ok(msg) => {
                        self.registry.deliver_stream(envelope.request_id, msg).await;
                    }
                    Err(e) => tracing::warn!(error = %e, "malformed stream envelope"),
                }
            }
            MessageType::Stop => {
                self.registry.remove(envelope.request_id).await;
            }
            MessageType::Ready => {
                self.ready.notify_waiters();
            }
            MessageType::HealthCheck | MessageType::NewDatachannel | MessageType::Control | MessageType::Register => {
                tracing::debug!(message_type = ?envelope.message_type, "ignoring control-channel frame on a datachannel");
            }
        }
    }
}

fn rand_bytes() -> [u8; 16] {
    use rand::RngCore;
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    bytes
}
