//! The Exec action (§4.3): an interactive stdin/stdout/stderr stream.

use crate::error::ActionError;
use crate::reorder::ReorderBuffer;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use mrzap_types::{StreamMessage, StreamMessageType};
use serde::{Deserialize, Serialize};

/// The client half's `kube/exec/start` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecStartRequest {
    /// The command and arguments to run.
    pub argv: Vec<String>,
    /// The cluster exec endpoint.
    pub endpoint: String,
}

/// The client half's `kube/exec/input` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecInputRequest {
    /// Raw stdin bytes.
    pub content: Vec<u8>,
}

/// The client half's `kube/exec/resize` payload.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecResizeRequest {
    /// Terminal width in columns.
    pub width: u16,
    /// Terminal height in rows.
    pub height: u16,
}

/// Reassembles an exec session's stdout and stderr, each its own sequence
/// space per §5 ("Per (requestId, stream-kind) stream sequence numbers may
/// arrive out of order").
#[derive(Default)]
pub struct ClientExecReassembler {
    stdout: ReorderBuffer<String>,
    stderr: ReorderBuffer<String>,
    closed: bool,
}

impl ClientExecReassembler {
    /// Creates a fresh reassembler for one exec session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one inbound stream message, returning the in-order chunks (if
    /// any) now ready for the caller's terminal, tagged by which stream they
    /// came from and decoded from the wire's base64 `content`.
    ///
    /// Errors with `ActionError::StreamOverflow` if the peer has stalled the
    /// stream past the buffer's capacity (§9).
    pub fn accept(&mut self, msg: &StreamMessage) -> Result<Vec<(StreamMessageType, Vec<u8>)>, ActionError> {
        let decode = |s: String| STANDARD.decode(s).unwrap_or_default();
        match msg.type_ {
            StreamMessageType::Stdout => Ok(self
                .stdout
                .accept(msg.sequence_number, msg.content.clone())?
                .into_iter()
                .map(|c| (StreamMessageType::Stdout, decode(c)))
                .collect()),
            StreamMessageType::Stderr => Ok(self
                .stderr
                .accept(msg.sequence_number, msg.content.clone())?
                .into_iter()
                .map(|c| (StreamMessageType::Stderr, decode(c)))
                .collect()),
            StreamMessageType::Logout => {
                self.closed = true;
                Ok(Vec::new())
            }
            _ => Ok(Vec::new()),
        }
    }

    /// Whether the stream has signalled its end.
    pub fn closed(&self) -> bool {
        self.closed
    }
}

/// The agent half's bookkeeping for one open exec stream: a monotonic
/// sequence counter per output stream, and whether the cluster exec
/// connection is still open.
pub struct AgentExecSession {
    stdout_seq: u64,
    stderr_seq: u64,
    closed: bool,
}

impl AgentExecSession {
    /// Opens a fresh exec session with both output sequence counters at zero.
    pub fn new() -> Self {
        Self {
            stdout_seq: 0,
            stderr_seq: 0,
            closed: false,
        }
    }

    /// Wraps a chunk of stdout bytes read from the cluster exec stream into
    /// the next `StreamMessage`, advancing the stdout sequence counter.
    pub fn next_stdout(&mut self, request_id: u32, log_id: String, content: &[u8]) -> StreamMessage {
        let sequence_number = self.stdout_seq;
        self.stdout_seq += 1;
        StreamMessage {
            type_: StreamMessageType::Stdout,
            request_id,
            log_id,
            sequence_number,
            content: STANDARD.encode(content),
        }
    }

    /// Wraps a chunk of stderr bytes, advancing the stderr sequence counter.
    pub fn next_stderr(&mut self, request_id: u32, log_id: String, content: &[u8]) -> StreamMessage {
        let sequence_number = self.stderr_seq;
        self.stderr_seq += 1;
        StreamMessage {
            type_: StreamMessageType::Stderr,
            request_id,
            log_id,
            sequence_number,
            content: STANDARD.encode(content),
        }
    }

    /// Marks the exec stream closed (§4.3: "either side may send
    /// `kube/exec/stop`; both sides close").
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Whether this session has closed.
    pub fn closed(&self) -> bool {
        self.closed
    }
}

impl Default for AgentExecSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reassembles_out_of_order_stdout_and_leaves_stderr_untouched() {
        let mut reassembler = ClientExecReassembler::new();
        let msg = |seq: u64, content: &[u8]| StreamMessage {
            type_: StreamMessageType::Stdout,
            request_id: 1,
            log_id: "log-1".into(),
            sequence_number: seq,
            content: STANDARD.encode(content),
        };
        assert!(reassembler.accept(&msg(1, b"b")).unwrap().is_empty());
        let drained = reassembler.accept(&msg(0, b"a")).unwrap();
        assert_eq!(drained, vec![(StreamMessageType::Stdout, b"a".to_vec()), (StreamMessageType::Stdout, b"b".to_vec())]);
    }

    #[test]
    fn logout_message_closes_the_reassembler() {
        let mut reassembler = ClientExecReassembler::new();
        reassembler
            .accept(&StreamMessage {
                type_: StreamMessageType::Logout,
                request_id: 1,
                log_id: "log-1".into(),
                sequence_number: 0,
                content: String::new(),
            })
            .unwrap();
        assert!(reassembler.closed());
    }

    #[test]
    fn overflowing_the_stdout_buffer_surfaces_as_an_error() {
        let mut reassembler = ClientExecReassembler::new();
        let msg = |seq: u64| StreamMessage {
            type_: StreamMessageType::Stdout,
            request_id: 1,
            log_id: "log-1".into(),
            sequence_number: seq,
            content: STANDARD.encode(b"x"),
        };
        for seq in 1..=crate::reorder::DEFAULT_MAX_PENDING as u64 {
            reassembler.accept(&msg(seq)).unwrap();
        }
        assert!(matches!(reassembler.accept(&msg(crate::reorder::DEFAULT_MAX_PENDING as u64 + 1)), Err(ActionError::StreamOverflow(_))));
    }

    #[test]
    fn agent_session_assigns_independent_monotonic_sequences_per_stream() {
        let mut session = AgentExecSession::new();
        let out0 = session.next_stdout(1, "log-1".into(), b"a");
        let err0 = session.next_stderr(1, "log-1".into(), b"x");
        let out1 = session.next_stdout(1, "log-1".into(), b"b");
        assert_eq!(out0.sequence_number, 0);
        assert_eq!(err0.sequence_number, 0);
        assert_eq!(out1.sequence_number, 1);
    }
}
