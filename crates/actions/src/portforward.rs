//! The Port-Forward action (§4.3): multiplexed bidirectional byte streams
//! over one action, each inner connection identified by a `portForwardRequestId`.

use crate::error::ActionError;
use crate::reorder::ReorderBuffer;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use mrzap_types::{StreamMessage, StreamMessageType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The client half's `kube/portforward/start` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortForwardStartRequest {
    /// The cluster port-forward endpoint.
    pub endpoint: String,
    /// Header template used when framing outbound error-stream SPDY headers.
    pub error_header_template: String,
    /// Header template used when framing outbound data-stream SPDY headers.
    pub data_header_template: String,
}

/// One `kube/portforward/datain` or `kube/portforward/errorin` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortForwardDataFrame {
    /// Identifies which inner connection this frame belongs to.
    pub port_forward_request_id: u32,
    /// The target pod port.
    pub target_pod_port: u16,
    /// Raw bytes for this frame.
    pub content: Vec<u8>,
}

/// One inner port-forward connection's reassembly state, client side.
#[derive(Default)]
struct InnerClientConnection {
    data: ReorderBuffer<String>,
    error: ReorderBuffer<String>,
}

/// Reassembles all inner connections of one port-forward action, client side.
#[derive(Default)]
pub struct ClientPortForwardSession {
    inner: HashMap<u32, InnerClientConnection>,
    ready: Option<Result<(), String>>,
}

impl ClientPortForwardSession {
    /// Creates a fresh session awaiting its `ready-portforward` signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the agent's readiness signal (§4.3: empty content = success,
    /// non-empty = error text to surface as HTTP 403 to the local tool).
    pub fn accept_ready(&mut self, msg: &StreamMessage) {
        if !matches!(msg.type_, StreamMessageType::ReadyPortforward) {
            return;
        }
        self.ready = Some(if msg.content.is_empty() { Ok(()) } else { Err(msg.content.clone()) });
    }

    /// Whether (and how) the action has become ready.
    pub fn readiness(&self) -> Option<&Result<(), String>> {
        self.ready.as_ref()
    }

    /// Feeds one inbound `portforward-data`/`portforward-error` message,
    /// returning the in-order decoded chunks for its inner connection, or
    /// `ActionError::StreamOverflow` if the peer has stalled that inner
    /// connection's stream past the buffer's capacity (§9).
    pub fn accept(&mut self, inner_id: u32, msg: &StreamMessage) -> Result<Vec<Vec<u8>>, ActionError> {
        let entry = self.inner.entry(inner_id).or_default();
        let buffer = match msg.type_ {
            StreamMessageType::PortforwardData => &mut entry.data,
            StreamMessageType::PortforwardError => &mut entry.error,
            _ => return Ok(Vec::new()),
        };
        Ok(buffer
            .accept(msg.sequence_number, msg.content.clone())?
            .into_iter()
            .map(|c| STANDARD.decode(c).unwrap_or_default())
            .collect())
    }

    /// Drops an inner connection's reassembly state (`kube/portforward/request/stop`).
    pub fn close_inner(&mut self, inner_id: u32) {
        self.inner.remove(&inner_id);
    }
}

/// One inner port-forward connection's SPDY-facing state, agent side: one
/// monotonic sequence counter per outbound direction.
#[derive(Default)]
struct InnerAgentConnection {
    data_seq: u64,
    error_seq: u64,
}

/// Owns every inner connection of one port-forward action, agent side.
#[derive(Default)]
pub struct AgentPortForwardSession {
    inner: HashMap<u32, InnerAgentConnection>,
    closed: bool,
}

impl AgentPortForwardSession {
    /// Creates a fresh session with its SPDY connection not yet opened.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens bookkeeping for a new inner connection the first time a
    /// `datain`/`errorin` frame references it (§4.3: "Agent opens the
    /// corresponding pair of SPDY streams to the pod on first `datain`").
    pub fn ensure_inner(&mut self, inner_id: u32) {
        self.inner.entry(inner_id).or_default();
    }

    /// Wraps a chunk of pod-to-tool data-stream bytes into the next
    /// `portforward-data` message for this inner connection.
    pub fn next_data(&mut self, inner_id: u32, request_id: u32, log_id: String, content: &[u8]) -> Result<StreamMessage, ActionError> {
        let inner = self.inner.get_mut(&inner_id).ok_or(ActionError::UnknownInnerConnection { inner_id })?;
        let sequence_number = inner.data_seq;
        inner.data_seq += 1;
        Ok(StreamMessage {
            type_: StreamMessageType::PortforwardData,
            request_id,
            log_id,
            sequence_number,
            content: STANDARD.encode(content),
        })
    }

    /// Wraps a chunk of pod-to-tool error-stream bytes into the next
    /// `portforward-error` message for this inner connection.
    pub fn next_error(&mut self, inner_id: u32, request_id: u32, log_id: String, content: &[u8]) -> Result<StreamMessage, ActionError> {
        let inner = self.inner.get_mut(&inner_id).ok_or(ActionError::UnknownInnerConnection { inner_id })?;
        let sequence_number = inner.error_seq;
        inner.error_seq += 1;
        Ok(StreamMessage {
            type_: StreamMessageType::PortforwardError,
            request_id,
            log_id,
            sequence_number,
            content: STANDARD.encode(content),
        })
    }

    /// Closes one inner connection (`kube/portforward/request/stop`), leaving the action open.
    pub fn close_inner(&mut self, inner_id: u32) {
        self.inner.remove(&inner_id);
    }

    /// Tears down the whole action and its SPDY connection (`kube/portforward/stop`).
    pub fn close(&mut self) {
        self.closed = true;
        self.inner.clear();
    }

    /// Whether the whole action has been torn down.
    pub fn closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_with_empty_content_is_success() {
        let mut session = ClientPortForwardSession::new();
        session.accept_ready(&StreamMessage {
            type_: StreamMessageType::ReadyPortforward,
            request_id: 1,
            log_id: "log-1".into(),
            sequence_number: 0,
            content: String::new(),
        });
        assert_eq!(session.readiness(), Some(&Ok(())));
    }

    #[test]
    fn ready_with_content_surfaces_as_an_error() {
        let mut session = ClientPortForwardSession::new();
        session.accept_ready(&StreamMessage {
            type_: StreamMessageType::ReadyPortforward,
            request_id: 1,
            log_id: "log-1".into(),
            sequence_number: 0,
            content: "pod not found".into(),
        });
        assert_eq!(session.readiness(), Some(&Err("pod not found".to_string())));
    }

    #[test]
    fn each_inner_connection_has_an_independent_reorder_space() {
        let mut session = ClientPortForwardSession::new();
        assert!(session
            .accept(7, &StreamMessage {
                type_: StreamMessageType::PortforwardData,
                request_id: 1,
                log_id: "log-1".into(),
                sequence_number: 1,
                content: STANDARD.encode("second"),
            })
            .unwrap()
            .is_empty());
        let drained = session
            .accept(7, &StreamMessage {
                type_: StreamMessageType::PortforwardData,
                request_id: 1,
                log_id: "log-1".into(),
                sequence_number: 0,
                content: STANDARD.encode("first"),
            })
            .unwrap();
        assert_eq!(drained, vec![b"first".to_vec(), b"second".to_vec()]);

        // A different inner id starts its own sequence space at 0 independently.
        let drained_other = session
            .accept(9, &StreamMessage {
                type_: StreamMessageType::PortforwardData,
                request_id: 1,
                log_id: "log-1".into(),
                sequence_number: 0,
                content: STANDARD.encode("other"),
            })
            .unwrap();
        assert_eq!(drained_other, vec![b"other".to_vec()]);
    }

    #[test]
    fn overflowing_one_inner_connections_buffer_surfaces_as_an_error() {
        let mut session = ClientPortForwardSession::new();
        let msg = |seq: u64| StreamMessage {
            type_: StreamMessageType::PortforwardData,
            request_id: 1,
            log_id: "log-1".into(),
            sequence_number: seq,
            content: STANDARD.encode("x"),
        };
        for seq in 1..=crate::reorder::DEFAULT_MAX_PENDING as u64 {
            session.accept(7, &msg(seq)).unwrap();
        }
        assert!(matches!(session.accept(7, &msg(crate::reorder::DEFAULT_MAX_PENDING as u64 + 1)), Err(ActionError::StreamOverflow(_))));
    }

    #[test]
    fn agent_session_rejects_frames_for_unopened_inner_connections() {
        let mut session = AgentPortForwardSession::new();
        let err = session.next_data(1, 1, "log-1".into(), b"x").unwrap_err();
        assert!(matches!(err, ActionError::UnknownInnerConnection { inner_id: 1 }));
    }

    #[test]
    fn agent_session_assigns_per_inner_per_direction_sequences() {
        let mut session = AgentPortForwardSession::new();
        session.ensure_inner(1);
        let d0 = session.next_data(1, 1, "log-1".into(), b"a").unwrap();
        let e0 = session.next_error(1, 1, "log-1".into(), b"x").unwrap();
        let d1 = session.next_data(1, 1, "log-1".into(), b"b").unwrap();
        assert_eq!(d0.sequence_number, 0);
        assert_eq!(e0.sequence_number, 0);
        assert_eq!(d1.sequence_number, 1);
    }
}
