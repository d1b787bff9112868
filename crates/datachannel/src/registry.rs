//! The action registry (§4.2, §5): a reader-writer lock since mutations
//! (insert/delete) are rare and lookups are hot.

use mrzap_types::{ActionSession, ImpersonationContext, StreamMessage};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio::sync::RwLock;

/// The channels a registered action listens on for its slice of inbound traffic.
pub struct ActionHandle {
    /// Bookkeeping shared with the action layer (impersonation context, closed flag).
    pub session: ActionSession,
    /// Decoded `actionResponsePayload`/`actionPayload` values for this requestId.
    pub ack_tx: mpsc::UnboundedSender<serde_json::Value>,
    /// `StreamMessage`s addressed to this requestId.
    pub stream_tx: mpsc::UnboundedSender<StreamMessage>,
}

/// Tracks every live action in one datachannel, keyed by requestId.
#[derive(Default)]
pub struct ActionRegistry {
    actions: RwLock<HashMap<u32, ActionHandle>>,
}

impl ActionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fresh action, returning the receiving ends of its ack and stream channels.
    pub async fn register(
        &self,
        request_id: u32,
        log_id: String,
        impersonation: ImpersonationContext,
    ) -> (mpsc::UnboundedReceiver<serde_json::Value>, mpsc::UnboundedReceiver<StreamMessage>) {
        let (ack_tx, ack_rx) = mpsc::unbounded_channel();
        let (stream_tx, stream_rx) = mpsc::unbounded_channel();
        let handle = ActionHandle {
            session: ActionSession::new(request_id, log_id, impersonation),
            ack_tx,
            stream_tx,
        };
        self.actions.write().await.insert(request_id, handle);
        (ack_rx, stream_rx)
    }

    /// Removes an action's registration (`stop_action`, or `stop` from the peer).
    pub async fn remove(&self, request_id: u32) -> Option<ActionHandle> {
        self.actions.write().await.remove(&request_id)
    }

    /// Routes a decoded ack/data payload to its action, if still registered.
    pub async fn deliver_ack(&self, request_id: u32, payload: serde_json::Value) -> bool {
        let actions = self.actions.read().await;
        match actions.get(&request_id) {
            Some(handle) => handle.ack_tx.send(payload).is_ok(),
            None => false,
        }
    }

    /// Routes an inbound `StreamMessage` to its action, if still registered.
    pub async fn deliver_stream(&self, request_id: u32, msg: StreamMessage) -> bool {
        let actions = self.actions.read().await;
        match actions.get(&request_id) {
            Some(handle) => handle.stream_tx.send(msg).is_ok(),
            None => false,
        }
    }

    /// Whether `request_id` currently has a registered action.
    pub async fn contains(&self, request_id: u32) -> bool {
        self.actions.read().await.contains_key(&request_id)
    }

    /// The number of live actions — used by health-check-style diagnostics.
    pub async fn len(&self) -> usize {
        self.actions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn registers_and_delivers_acks_to_the_right_action() {
        let registry = ActionRegistry::new();
        let (mut ack_rx, _stream_rx) = registry.register(1, "log-1".into(), ImpersonationContext::default()).await;
        assert!(registry.deliver_ack(1, serde_json::json!({"status": 200})).await);
        let received = ack_rx.recv().await.unwrap();
        assert_eq!(received["status"], 200);
    }

    #[tokio::test]
    async fn delivering_to_an_unregistered_request_id_is_a_no_op() {
        let registry = ActionRegistry::new();
        assert!(!registry.deliver_ack(99, serde_json::json!({})).await);
    }

    #[tokio::test]
    async fn removal_drops_the_action_from_the_registry() {
        let registry = ActionRegistry::new();
        registry.register(1, "log-1".into(), ImpersonationContext::default()).await;
        assert!(registry.contains(1).await);
        registry.remove(1).await;
        assert!(!registry.contains(1).await);
    }
}
