//! The keysplitting state machines (§4.1): one hash-chain per session, a
//! strictly sequential request/response API, Ed25519-signed transitions.
//!
//! The client and agent halves are mirror images but not identical: the
//! agent splits each inbound message into a *verify* step (`on_syn`/`on_data`)
//! and a separate *build-and-sign-the-reply* step (`build_syn_ack`/
//! `build_data_ack`), since the agent needs to run the action handler in
//! between receiving a request and producing its response. The client never
//! needs that gap — it always has the payload in hand before it calls
//! `send` — so its API stays a single atomic step per transition.

use crate::canonical;
use crate::error::ProtocolError;
use mrzap_crypto::hash::sha3_256_base64;
use mrzap_crypto::keys::{Ed25519KeyPair, Ed25519PublicKey};
use mrzap_types::keysplitting::{CommonFields, HPointer, NonceValue};
use mrzap_types::{AgentMessage, BzCert, KeysplittingMessage, KeysplittingPayload};

const SCHEMA_VERSION: &str = AgentMessage::SCHEMA_VERSION;

fn variant_name(payload: &KeysplittingPayload) -> &'static str {
    match payload {
        KeysplittingPayload::Syn { .. } => "Syn",
        KeysplittingPayload::SynAck { .. } => "SynAck",
        KeysplittingPayload::Data { .. } => "Data",
        KeysplittingPayload::DataAck { .. } => "DataAck",
    }
}

fn sign_and_wrap(payload: KeysplittingPayload, signing_key: &Ed25519KeyPair) -> KeysplittingMessage {
    let signature = signing_key.sign(&payload.canonical_bytes());
    KeysplittingMessage { payload, signature }
}

fn verify(msg: &KeysplittingMessage, peer_key: &Ed25519PublicKey) -> Result<(), ProtocolError> {
    peer_key
        .verify(&msg.payload.canonical_bytes(), &msg.signature)
        .map_err(ProtocolError::SignatureInvalid)
}

/// Client-side engine state (§4.1: `Idle → SynSent → Ready → DataSent → Ready … → Closed`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// No session opened yet.
    Idle,
    /// `Syn` sent, awaiting `SynAck`.
    SynSent,
    /// Handshake or a prior exchange complete; may send the next `Data`.
    Ready,
    /// `Data` sent, awaiting `DataAck`.
    DataSent,
    /// Session torn down.
    Closed,
}

/// Drives the client half of a single session's hash chain.
pub struct ClientEngine {
    state: ClientState,
    signing_key: Ed25519KeyPair,
    peer_public_key: Option<Ed25519PublicKey>,
    target_id: String,
    bzcert: BzCert,
    sent_nonce: Option<NonceValue>,
    /// Hash of the last payload *this side* sent — what the next inbound ack's `hPointer` must equal.
    last_sent_hash: Option<HPointer>,
    /// Hash of the last payload *the peer* sent — what the next outgoing `Data`'s `hPointer` will be.
    last_peer_hash: Option<HPointer>,
    /// The last message sent, kept byte-identical for retry (§4.1 failure semantics).
    last_sent_message: Option<KeysplittingMessage>,
}

impl ClientEngine {
    /// Creates a fresh client engine in `Idle`, bound to one ephemeral keypair and one BZCert.
    pub fn new(signing_key: Ed25519KeyPair, bzcert: BzCert) -> Self {
        Self {
            state: ClientState::Idle,
            signing_key,
            peer_public_key: None,
            target_id: String::new(),
            bzcert,
            sent_nonce: None,
            last_sent_hash: None,
            last_peer_hash: None,
            last_sent_message: None,
        }
    }

    /// The engine's current state.
    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Builds, signs and remembers a `Syn` opening `target_id`, transitioning `Idle → SynSent`.
    pub fn open(&mut self, action: &str, target_id: &str, nonce: NonceValue, timestamp: i64) -> Result<KeysplittingMessage, ProtocolError> {
        self.require_state(ClientState::Idle, "Syn")?;
        let payload = KeysplittingPayload::Syn {
            common: CommonFields {
                timestamp,
                schema_version: SCHEMA_VERSION.to_string(),
                action: action.to_string(),
            },
            target_id: target_id.to_string(),
            nonce: nonce.clone(),
            bzcert: self.bzcert.clone(),
        };
        let hash = canonical::hash_of(&payload);
        let message = sign_and_wrap(payload, &self.signing_key);
        self.target_id = target_id.to_string();
        self.sent_nonce = Some(nonce);
        self.last_sent_hash = Some(HPointer::new(hash));
        self.last_sent_message = Some(message.clone());
        self.state = ClientState::SynSent;
        Ok(message)
    }

    /// Verifies an inbound `SynAck`, storing the agent's public key and advancing `SynSent → Ready`.
    pub fn on_syn_ack(&mut self, msg: &KeysplittingMessage) -> Result<(), ProtocolError> {
        self.require_state(ClientState::SynSent, "SynAck")?;
        let (target_public_key, nonce, h_pointer) = match &msg.payload {
            KeysplittingPayload::SynAck {
                target_public_key,
                nonce,
                h_pointer,
                ..
            } => (target_public_key, nonce, h_pointer),
            other => {
                return Err(ProtocolError::UnexpectedVariant {
                    expected: "SynAck",
                    got: variant_name(other),
                })
            }
        };
        let peer_key = Ed25519PublicKey::from_base64(target_public_key).map_err(ProtocolError::SignatureInvalid)?;
        verify(msg, &peer_key)?;

        let expected_nonce = self.sent_nonce.as_ref();
        if Some(nonce) != expected_nonce {
            return Err(ProtocolError::NonceMismatch {
                expected: expected_nonce.map(NonceValue::to_string).unwrap_or_default(),
                got: nonce.to_string(),
            });
        }
        let expected_hash = self.last_sent_hash.as_ref();
        if Some(h_pointer) != expected_hash {
            return Err(ProtocolError::HPointerMismatch {
                expected: expected_hash.map(HPointer::to_string).unwrap_or_default(),
                got: h_pointer.to_string(),
            });
        }

        self.peer_public_key = Some(peer_key);
        self.last_peer_hash = Some(HPointer::new(canonical::hash_of(&msg.payload)));
        self.state = ClientState::Ready;
        Ok(())
    }

    /// Builds, signs and remembers the next `Data`, transitioning `Ready → DataSent`.
    pub fn send(&mut self, action: &str, action_payload: serde_json::Value, timestamp: i64) -> Result<KeysplittingMessage, ProtocolError> {
        self.require_state(ClientState::Ready, "Data")?;
        let payload = KeysplittingPayload::Data {
            common: CommonFields {
                timestamp,
                schema_version: SCHEMA_VERSION.to_string(),
                action: action.to_string(),
            },
            target_id: self.target_id.clone(),
            h_pointer: self.last_peer_hash.clone().unwrap_or_else(|| HPointer::new(String::new())),
            bzcert_hash: sha3_256_base64(&self.bzcert.canonical_bytes()),
            action_payload,
        };
        let hash = canonical::hash_of(&payload);
        let message = sign_and_wrap(payload, &self.signing_key);
        self.last_sent_hash = Some(HPointer::new(hash));
        self.last_sent_message = Some(message.clone());
        self.state = ClientState::DataSent;
        Ok(message)
    }

    /// Verifies an inbound `DataAck`, returning the response payload and advancing `DataSent → Ready`.
    pub fn on_data_ack(&mut self, msg: &KeysplittingMessage) -> Result<serde_json::Value, ProtocolError> {
        self.require_state(ClientState::DataSent, "DataAck")?;
        let (h_pointer, response) = match &msg.payload {
            KeysplittingPayload::DataAck {
                h_pointer,
                action_response_payload,
                ..
            } => (h_pointer, action_response_payload.clone()),
            other => {
                return Err(ProtocolError::UnexpectedVariant {
                    expected: "DataAck",
                    got: variant_name(other),
                })
            }
        };
        let peer_key = self.peer_public_key.clone().ok_or(ProtocolError::StateMismatch {
            state: "DataSent",
            message_kind: "DataAck",
        })?;
        verify(msg, &peer_key)?;

        let expected_hash = self.last_sent_hash.as_ref();
        if Some(h_pointer) != expected_hash {
            return Err(ProtocolError::HPointerMismatch {
                expected: expected_hash.map(HPointer::to_string).unwrap_or_default(),
                got: h_pointer.to_string(),
            });
        }

        self.last_peer_hash = Some(HPointer::new(canonical::hash_of(&msg.payload)));
        self.state = ClientState::Ready;
        Ok(response)
    }

    /// The last message sent, for byte-identical retransmission on transport loss (§4.1).
    pub fn last_sent(&self) -> Option<&KeysplittingMessage> {
        self.last_sent_message.as_ref()
    }

    /// Tears the session down; the chain is discarded (§3 "Lifecycles").
    pub fn close(&mut self) {
        self.state = ClientState::Closed;
    }

    fn require_state(&self, expected: ClientState, incoming_kind: &'static str) -> Result<(), ProtocolError> {
        if self.state != expected {
            return Err(ProtocolError::StateMismatch {
                state: state_name(self.state),
                message_kind: incoming_kind,
            });
        }
        Ok(())
    }
}

fn state_name(state: ClientState) -> &'static str {
    match state {
        ClientState::Idle => "Idle",
        ClientState::SynSent => "SynSent",
        ClientState::Ready => "Ready",
        ClientState::DataSent => "DataSent",
        ClientState::Closed => "Closed",
    }
}

/// Agent-side engine state (§4.1: `Idle → SynAckSent → Ready → DataAckSent → Ready … → Closed`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    /// No `Syn` received yet.
    Idle,
    /// `SynAck` sent, awaiting the first `Data`.
    SynAckSent,
    /// A `Syn`/`Data` was just verified; the caller must run the action and call `build_syn_ack`/`build_data_ack` next.
    Ready,
    /// `DataAck` sent, awaiting the next `Data`.
    DataAckSent,
    /// Session torn down.
    Closed,
}

/// An inbound `Syn`, verified and ready for the caller to act on.
pub struct ReceivedSyn {
    /// The action name requested.
    pub action: String,
    /// The client's bundled identity credential, not yet checked against an IdP.
    pub bzcert: BzCert,
}

/// An inbound `Data`, verified and ready for the caller to act on.
#[derive(Debug)]
pub struct ReceivedData {
    /// The action name requested.
    pub action: String,
    /// The opaque, action-specific request payload.
    pub action_payload: serde_json::Value,
}

/// Drives the agent half of a single session's hash chain.
pub struct AgentEngine {
    state: AgentState,
    signing_key: Ed25519KeyPair,
    peer_public_key: Option<Ed25519PublicKey>,
    active_bzcert_hash: Option<String>,
    pending_nonce: Option<NonceValue>,
    last_received_hash: Option<HPointer>,
    last_sent_hash: Option<HPointer>,
    last_sent_message: Option<KeysplittingMessage>,
}

impl AgentEngine {
    /// Creates a fresh agent engine in `Idle`, bound to the agent's persistent signing identity.
    pub fn new(signing_key: Ed25519KeyPair) -> Self {
        Self {
            state: AgentState::Idle,
            signing_key,
            peer_public_key: None,
            active_bzcert_hash: None,
            pending_nonce: None,
            last_received_hash: None,
            last_sent_hash: None,
            last_sent_message: None,
        }
    }

    /// The engine's current state.
    pub fn state(&self) -> AgentState {
        self.state
    }

    /// Verifies an inbound `Syn` under the BZCert's `clientPublicKey`, transitioning `Idle → Ready`.
    pub fn on_syn(&mut self, msg: &KeysplittingMessage) -> Result<ReceivedSyn, ProtocolError> {
        self.require_state(AgentState::Idle, "Syn")?;
        let (action, nonce, bzcert) = match &msg.payload {
            KeysplittingPayload::Syn {
                common,
                nonce,
                bzcert,
                ..
            } => (common.action.clone(), nonce.clone(), bzcert.clone()),
            other => {
                return Err(ProtocolError::UnexpectedVariant {
                    expected: "Syn",
                    got: variant_name(other),
                })
            }
        };
        let client_key = Ed25519PublicKey::from_base64(&bzcert.client_public_key).map_err(ProtocolError::SignatureInvalid)?;
        verify(msg, &client_key)?;

        self.peer_public_key = Some(client_key);
        self.active_bzcert_hash = Some(sha3_256_base64(&bzcert.canonical_bytes()));
        self.pending_nonce = Some(nonce);
        self.last_received_hash = Some(HPointer::new(canonical::hash_of(&msg.payload)));
        self.state = AgentState::Ready;
        Ok(ReceivedSyn { action, bzcert })
    }

    /// Builds, signs and remembers the `SynAck`, transitioning `Ready → SynAckSent`.
    pub fn build_syn_ack(&mut self, action: &str, own_public_key_b64: &str, timestamp: i64) -> Result<KeysplittingMessage, ProtocolError> {
        self.require_state(AgentState::Ready, "SynAck")?;
        let payload = KeysplittingPayload::SynAck {
            common: CommonFields {
                timestamp,
                schema_version: SCHEMA_VERSION.to_string(),
                action: action.to_string(),
            },
            target_public_key: own_public_key_b64.to_string(),
            nonce: self.pending_nonce.clone().unwrap_or_else(|| NonceValue::new(String::new())),
            h_pointer: self.last_received_hash.clone().unwrap_or_else(|| HPointer::new(String::new())),
        };
        let hash = canonical::hash_of(&payload);
        let message = sign_and_wrap(payload, &self.signing_key);
        self.last_sent_hash = Some(HPointer::new(hash));
        self.last_sent_message = Some(message.clone());
        self.state = AgentState::SynAckSent;
        Ok(message)
    }

    /// Verifies an inbound `Data`, checking the hash chain and that the BZCert commitment has not
    /// drifted mid-session, transitioning `SynAckSent`/`DataAckSent → Ready`.
    pub fn on_data(&mut self, msg: &KeysplittingMessage) -> Result<ReceivedData, ProtocolError> {
        match self.state {
            AgentState::SynAckSent | AgentState::DataAckSent => {}
            _ => {
                return Err(ProtocolError::StateMismatch {
                    state: state_name_agent(self.state),
                    message_kind: "Data",
                })
            }
        }
        let (action, h_pointer, bzcert_hash, action_payload) = match &msg.payload {
            KeysplittingPayload::Data {
                common,
                h_pointer,
                bzcert_hash,
                action_payload,
                ..
            } => (common.action.clone(), h_pointer.clone(), bzcert_hash.clone(), action_payload.clone()),
            other => {
                return Err(ProtocolError::UnexpectedVariant {
                    expected: "Data",
                    got: variant_name(other),
                })
            }
        };
        let peer_key = self.peer_public_key.clone().ok_or(ProtocolError::StateMismatch {
            state: state_name_agent(self.state),
            message_kind: "Data",
        })?;
        verify(msg, &peer_key)?;

        let expected_hash = self.last_sent_hash.as_ref();
        if Some(&h_pointer) != expected_hash {
            return Err(ProtocolError::HPointerMismatch {
                expected: expected_hash.map(HPointer::to_string).unwrap_or_default(),
                got: h_pointer.to_string(),
            });
        }
        let expected_bzcert_hash = self.active_bzcert_hash.as_deref().unwrap_or_default();
        if bzcert_hash != expected_bzcert_hash {
            return Err(ProtocolError::BzCertDrift);
        }

        self.last_received_hash = Some(HPointer::new(canonical::hash_of(&msg.payload)));
        self.state = AgentState::Ready;
        Ok(ReceivedData { action, action_payload })
    }

    /// Builds, signs and remembers the `DataAck`, transitioning `Ready → DataAckSent`.
    ///
    /// `action` is threaded through from the `Data` this acknowledges (§3:
    /// every payload variant, including `DataAck`, carries the action name).
    pub fn build_data_ack(&mut self, action: &str, own_public_key_b64: &str, action_response_payload: serde_json::Value, timestamp: i64) -> Result<KeysplittingMessage, ProtocolError> {
        self.require_state(AgentState::Ready, "DataAck")?;
        let payload = KeysplittingPayload::DataAck {
            common: CommonFields {
                timestamp,
                schema_version: SCHEMA_VERSION.to_string(),
                action: action.to_string(),
            },
            target_public_key: own_public_key_b64.to_string(),
            h_pointer: self.last_received_hash.clone().unwrap_or_else(|| HPointer::new(String::new())),
            action_response_payload,
        };
        let hash = canonical::hash_of(&payload);
        let message = sign_and_wrap(payload, &self.signing_key);
        self.last_sent_hash = Some(HPointer::new(hash));
        self.last_sent_message = Some(message.clone());
        self.state = AgentState::DataAckSent;
        Ok(message)
    }

    /// The last message sent, for byte-identical retransmission on transport loss (§4.1).
    pub fn last_sent(&self) -> Option<&KeysplittingMessage> {
        self.last_sent_message.as_ref()
    }

    /// Tears the session down; the chain is discarded (§3 "Lifecycles").
    pub fn close(&mut self) {
        self.state = AgentState::Closed;
    }

    fn require_state(&self, expected: AgentState, incoming_kind: &'static str) -> Result<(), ProtocolError> {
        if self.state != expected {
            return Err(ProtocolError::StateMismatch {
                state: state_name_agent(self.state),
                message_kind: incoming_kind,
            });
        }
        Ok(())
    }
}

fn state_name_agent(state: AgentState) -> &'static str {
    match state {
        AgentState::Idle => "Idle",
        AgentState::SynAckSent => "SynAckSent",
        AgentState::Ready => "Ready",
        AgentState::DataAckSent => "DataAckSent",
        AgentState::Closed => "Closed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mrzap_types::BzCert;

    fn sample_bzcert(client_pub_b64: &str) -> BzCert {
        BzCert {
            initial_id_token: "initial.jwt".into(),
            current_id_token: "current.jwt".into(),
            client_public_key: client_pub_b64.to_string(),
            rand: "cmFuZA==".into(),
            signature_on_rand: "c2ln".into(),
        }
    }

    fn run_handshake() -> (ClientEngine, AgentEngine) {
        let client_key = Ed25519KeyPair::generate();
        let agent_key = Ed25519KeyPair::generate();
        let mut client = ClientEngine::new(client_key.clone(), sample_bzcert(&client_key.public_key().to_base64()));
        let mut agent = AgentEngine::new(agent_key.clone());

        let syn = client.open("kube/restapi/request", "agent-1", "nonce-1".into(), 1).unwrap();
        let received_syn = agent.on_syn(&syn).unwrap();
        let syn_ack = agent.build_syn_ack(&received_syn.action, &agent_key.public_key().to_base64(), 2).unwrap();
        client.on_syn_ack(&syn_ack).unwrap();
        (client, agent)
    }

    #[test]
    fn full_handshake_and_one_round_trip_reach_ready() {
        let (mut client, mut agent) = run_handshake();
        assert_eq!(client.state(), ClientState::Ready);
        assert_eq!(agent.state(), AgentState::SynAckSent);

        let data = client.send("kube/restapi/request", serde_json::json!({"method": "GET"}), 3).unwrap();
        let received = agent.on_data(&data).unwrap();
        assert_eq!(received.action, "kube/restapi/request");
        let ack = agent
            .build_data_ack(&received.action, &agent.signing_key.public_key().to_base64(), serde_json::json!({"status": 200}), 4)
            .unwrap();
        let response = client.on_data_ack(&ack).unwrap();
        assert_eq!(response["status"], 200);
        assert_eq!(client.state(), ClientState::Ready);
        assert_eq!(agent.state(), AgentState::DataAckSent);
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let (_client, mut agent) = run_handshake();
        let client_key2 = Ed25519KeyPair::generate();
        let mut forged = KeysplittingMessage {
            payload: KeysplittingPayload::Data {
                common: CommonFields {
                    timestamp: 3,
                    schema_version: SCHEMA_VERSION.to_string(),
                    action: "kube/restapi/request".to_string(),
                },
                target_id: "agent-1".into(),
                h_pointer: agent.last_sent_hash.clone().unwrap(),
                bzcert_hash: agent.active_bzcert_hash.clone().unwrap(),
                action_payload: serde_json::json!({}),
            },
            signature: String::new(),
        };
        forged.signature = client_key2.sign(&forged.payload.canonical_bytes());
        let err = agent.on_data(&forged).unwrap_err();
        assert!(matches!(err, ProtocolError::SignatureInvalid(_)));
    }

    #[test]
    fn replaying_a_data_hpointer_is_rejected() {
        let (mut client, mut agent) = run_handshake();
        let data = client.send("kube/restapi/request", serde_json::json!({}), 3).unwrap();
        let received = agent.on_data(&data).unwrap();
        let ack = agent
            .build_data_ack(&received.action, &agent.signing_key.public_key().to_base64(), serde_json::json!({}), 4)
            .unwrap();
        client.on_data_ack(&ack).unwrap();

        // A fresh agent engine replaying the *same* Data frame (stale hPointer) must be rejected.
        let replay_agent_key = Ed25519KeyPair::generate();
        let mut replay_agent = AgentEngine::new(replay_agent_key);
        replay_agent.state = AgentState::DataAckSent;
        replay_agent.peer_public_key = Some(client.signing_key.public_key());
        replay_agent.last_sent_hash = Some(HPointer::new("a-different-hash"));
        replay_agent.active_bzcert_hash = agent.active_bzcert_hash.clone();
        let err = replay_agent.on_data(&data).unwrap_err();
        assert!(matches!(err, ProtocolError::HPointerMismatch { .. }));
    }
}
