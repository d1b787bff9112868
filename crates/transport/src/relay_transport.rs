//! The `RelayTransport` boundary (§4.6): the daemon and the agent both
//! program against this trait rather than a concrete socket, so the
//! keysplitting/datachannel layers above never see the relay's own routing
//! or signalling protocol — only a reliable ordered pipe of envelopes.

use crate::codec;
use crate::error::TransportError;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use mrzap_types::AgentMessage;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// A transport that moves `AgentMessage` envelopes to and from the relay.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    /// Sends one envelope, blocking until it is handed to the socket.
    async fn send(&mut self, message: &AgentMessage) -> Result<(), TransportError>;
    /// Waits for and returns the next inbound envelope.
    async fn recv(&mut self) -> Result<AgentMessage, TransportError>;
    /// Re-establishes the underlying connection after it has dropped (§4.2
    /// "Reconnection/replay semantics"). The default rejects the attempt;
    /// transports without a meaningful notion of reconnecting (loopback
    /// pairs, tests) leave it unimplemented.
    async fn reconnect(&mut self) -> Result<(), TransportError> {
        Err(TransportError::ConnectionClosed("this transport does not support reconnecting".to_string()))
    }
}

/// The default concrete transport: a `tokio-tungstenite` WebSocket carrying
/// one JSON envelope per text frame. Connection establishment, the relay's
/// query-parameter contract, and its own routing remain out of scope (§1) —
/// this type treats the socket purely as a byte pipe.
pub struct WebSocketRelayTransport {
    socket: WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
    url: String,
}

impl WebSocketRelayTransport {
    /// Connects to `url` and wraps the resulting WebSocket.
    pub async fn connect(url: &str) -> Result<Self, TransportError> {
        let (socket, _response) = connect_async(url)
            .await
            .map_err(|e| TransportError::ConnectionClosed(e.to_string()))?;
        Ok(Self { socket, url: url.to_string() })
    }
}

#[async_trait]
impl RelayTransport for WebSocketRelayTransport {
    async fn send(&mut self, message: &AgentMessage) -> Result<(), TransportError> {
        let bytes = codec::encode(message)?;
        let text = String::from_utf8(bytes).map_err(|e| TransportError::Encode(e.to_string()))?;
        self.socket
            .send(WsMessage::Text(text))
            .await
            .map_err(|e| TransportError::ConnectionClosed(e.to_string()))
    }

    async fn recv(&mut self) -> Result<AgentMessage, TransportError> {
        loop {
            let next = self
                .socket
                .next()
                .await
                .ok_or_else(|| TransportError::ConnectionClosed("stream ended".to_string()))?
                .map_err(|e| TransportError::ConnectionClosed(e.to_string()))?;
            match next {
                WsMessage::Text(text) => return codec::decode(text.as_bytes()),
                WsMessage::Binary(bytes) => return codec::decode(&bytes),
                WsMessage::Close(_) => return Err(TransportError::ConnectionClosed("peer closed".to_string())),
                WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => continue,
            }
        }
    }

    async fn reconnect(&mut self) -> Result<(), TransportError> {
        let (socket, _response) = connect_async(&self.url)
            .await
            .map_err(|e| TransportError::ConnectionClosed(e.to_string()))?;
        self.socket = socket;
        Ok(())
    }
}

/// An in-memory `RelayTransport` pair for tests: everything sent on one end
/// is observed on the other, FIFO.
#[cfg(any(test, feature = "test-support"))]
pub mod test_support {
    use super::*;
    use tokio::sync::mpsc;

    /// One half of an in-memory transport pair.
    pub struct ChannelTransport {
        tx: mpsc::UnboundedSender<AgentMessage>,
        rx: mpsc::UnboundedReceiver<AgentMessage>,
    }

    /// Builds a connected pair of in-memory transports.
    pub fn pair() -> (ChannelTransport, ChannelTransport) {
        let (tx_a, rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();
        (ChannelTransport { tx: tx_a, rx: rx_b }, ChannelTransport { tx: tx_b, rx: rx_a })
    }

    #[async_trait]
    impl RelayTransport for ChannelTransport {
        async fn send(&mut self, message: &AgentMessage) -> Result<(), TransportError> {
            self.tx
                .send(codec::decode(&codec::encode(message)?)?)
                .map_err(|e| TransportError::ConnectionClosed(e.to_string()))
        }

        async fn recv(&mut self) -> Result<AgentMessage, TransportError> {
            self.rx.recv().await.ok_or_else(|| TransportError::ConnectionClosed("closed".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::pair;
    use super::*;
    use mrzap_types::MessageType;

    #[tokio::test]
    async fn messages_sent_on_one_end_arrive_on_the_other() {
        let (mut a, mut b) = pair();
        let msg = AgentMessage::new(MessageType::Ready, 1, 0, serde_json::to_vec(&serde_json::json!({})).unwrap());
        a.send(&msg).await.unwrap();
        let received = b.recv().await.unwrap();
        assert_eq!(received.request_id, 1);
    }
}
