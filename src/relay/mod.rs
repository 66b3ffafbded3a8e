//! Relay transports: the opaque pipe signaling messages travel through
//! before the peers can talk directly.

use async_trait::async_trait;

pub mod memory;
pub mod server;
pub mod websocket;

pub use crate::error::TransportError;
pub use memory::MemoryRelay;
pub use server::RelayServer;
pub use websocket::WebSocketRelay;

/// Client side of a relay. One owner polls [`recv`](RelayTransport::recv);
/// `send` only needs a shared reference so it can run alongside.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    async fn connect(&mut self, address: &str) -> Result<(), TransportError>;

    async fn send(&self, data: Vec<u8>) -> Result<(), TransportError>;

    /// Next inbound payload, or `None` once the relay is gone.
    async fn recv(&mut self) -> Option<Vec<u8>>;

    async fn close(&mut self);

    fn is_connected(&self) -> bool;
}
