use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use super::{RelayTransport, TransportError};

/// In-process relay endpoint. Created in connected pairs: whatever one side
/// sends, the other side receives.
///
/// Like a real relay, one side closing does not tear down the other; the
/// peer only sees the end of the stream once this endpoint is dropped.
pub struct MemoryRelay {
    name: &'static str,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    inbound: mpsc::UnboundedReceiver<Vec<u8>>,
    connected: bool,
}

impl MemoryRelay {
    pub fn pair() -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        (
            Self {
                name: "a",
                outbound: b_tx,
                inbound: a_rx,
                connected: false,
            },
            Self {
                name: "b",
                outbound: a_tx,
                inbound: b_rx,
                connected: false,
            },
        )
    }
}

#[async_trait]
impl RelayTransport for MemoryRelay {
    async fn connect(&mut self, address: &str) -> Result<(), TransportError> {
        debug!(side = self.name, address, "memory relay connected");
        self.connected = true;
        Ok(())
    }

    async fn send(&self, data: Vec<u8>) -> Result<(), TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        self.outbound
            .send(data)
            .map_err(|_| TransportError::Disconnected)
    }

    async fn recv(&mut self) -> Option<Vec<u8>> {
        if !self.connected {
            return None;
        }
        self.inbound.recv().await
    }

    async fn close(&mut self) {
        debug!(side = self.name, "memory relay closed");
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_before_connect_fails() {
        let (a, _b) = MemoryRelay::pair();
        assert_eq!(
            a.send(b"x".to_vec()).await,
            Err(TransportError::NotConnected)
        );
    }

    #[tokio::test]
    async fn payloads_cross_over() {
        let (mut a, mut b) = MemoryRelay::pair();
        a.connect("memory").await.unwrap();
        b.connect("memory").await.unwrap();

        a.send(b"ping".to_vec()).await.unwrap();
        b.send(b"pong".to_vec()).await.unwrap();
        assert_eq!(b.recv().await.as_deref(), Some(&b"ping"[..]));
        assert_eq!(a.recv().await.as_deref(), Some(&b"pong"[..]));
    }

    #[tokio::test]
    async fn closed_side_stops_receiving_and_dropped_side_disconnects() {
        let (mut a, mut b) = MemoryRelay::pair();
        a.connect("memory").await.unwrap();
        b.connect("memory").await.unwrap();

        a.close().await;
        assert!(!a.is_connected());
        assert_eq!(a.recv().await, None);
        assert_eq!(
            a.send(b"late".to_vec()).await,
            Err(TransportError::NotConnected)
        );

        drop(a);
        assert_eq!(b.recv().await, None);
        assert_eq!(
            b.send(b"x".to_vec()).await,
            Err(TransportError::Disconnected)
        );
    }
}
