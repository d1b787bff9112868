//! The Log action (§4.3): agent-to-client streaming of cluster log output.

use crate::error::ActionError;
use crate::reorder::ReorderBuffer;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use mrzap_types::{StreamMessage, StreamMessageType};
use serde::{Deserialize, Serialize};

/// The client half's `kube/log/start` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogStartRequest {
    /// The cluster log endpoint to tail.
    pub endpoint: String,
}

/// Reassembles a log action's `logout` stream into an ordered byte sequence.
#[derive(Default)]
pub struct ClientLogReassembler {
    buffer: ReorderBuffer<String>,
    eof: bool,
}

impl ClientLogReassembler {
    /// Creates a fresh reassembler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one inbound `logout` message, returning the in-order chunks now
    /// ready to surface, or `ActionError::StreamOverflow` if the peer has
    /// stalled the stream past the buffer's capacity (§9).
    pub fn accept(&mut self, msg: &StreamMessage) -> Result<Vec<Vec<u8>>, ActionError> {
        if !matches!(msg.type_, StreamMessageType::Logout) {
            return Ok(Vec::new());
        }
        if msg.content.is_empty() {
            self.eof = true;
        }
        Ok(self
            .buffer
            .accept(msg.sequence_number, msg.content.clone())?
            .into_iter()
            .map(|c| STANDARD.decode(c).unwrap_or_default())
            .collect())
    }

    /// Whether the reader has signalled end of file (an empty final chunk).
    pub fn at_eof(&self) -> bool {
        self.eof
    }
}

/// The agent half's bookkeeping for one open log reader.
pub struct AgentLogSession {
    seq: u64,
    cancelled: bool,
}

impl AgentLogSession {
    /// Opens a fresh log session.
    pub fn new() -> Self {
        Self { seq: 0, cancelled: false }
    }

    /// Wraps a chunk read from the cluster log reader into the next `logout` message.
    pub fn next_chunk(&mut self, request_id: u32, log_id: String, content: &[u8]) -> StreamMessage {
        let sequence_number = self.seq;
        self.seq += 1;
        StreamMessage {
            type_: StreamMessageType::Logout,
            request_id,
            log_id,
            sequence_number,
            content: STANDARD.encode(content),
        }
    }

    /// Marks the reader cancelled by the client's `kube/log/stop`.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    /// Whether the client has cancelled this reader.
    pub fn cancelled(&self) -> bool {
        self.cancelled
    }
}

impl Default for AgentLogSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_final_chunk_signals_eof() {
        let mut reassembler = ClientLogReassembler::new();
        reassembler
            .accept(&StreamMessage {
                type_: StreamMessageType::Logout,
                request_id: 1,
                log_id: "log-1".into(),
                sequence_number: 0,
                content: STANDARD.encode(b"line one\n"),
            })
            .unwrap();
        assert!(!reassembler.at_eof());
        reassembler
            .accept(&StreamMessage {
                type_: StreamMessageType::Logout,
                request_id: 1,
                log_id: "log-1".into(),
                sequence_number: 1,
                content: String::new(),
            })
            .unwrap();
        assert!(reassembler.at_eof());
    }

    #[test]
    fn cancelling_is_observable_by_the_agent_session() {
        let mut session = AgentLogSession::new();
        assert!(!session.cancelled());
        session.cancel();
        assert!(session.cancelled());
    }
}
