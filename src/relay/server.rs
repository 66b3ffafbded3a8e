//! WebSocket relay server
//!
//! Forwards every text or binary frame from one client to all other
//! connected clients. It never inspects payloads and never echoes a frame
//! back to its sender.

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, info, warn};

/// Pause after a failed accept; errors like EMFILE tend to persist
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

type Clients = Arc<Mutex<HashMap<u64, mpsc::UnboundedSender<Message>>>>;

pub struct RelayServer {
    listener: TcpListener,
    clients: Clients,
    next_id: AtomicU64,
}

impl RelayServer {
    pub async fn bind(addr: impl ToSocketAddrs) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            clients: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn client_count(&self) -> usize {
        self.clients.lock().len()
    }

    /// Accept clients until the future is dropped.
    pub async fn serve(&self) -> io::Result<()> {
        info!(addr = %self.local_addr()?, "relay server listening");
        loop {
            let (stream, peer) = accept_with_backoff(|| self.listener.accept()).await;
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            tokio::spawn(handle_client(id, stream, peer, self.clients.clone()));
        }
    }
}

/// Retry `accept` until it yields a connection, sleeping between failures.
async fn accept_with_backoff<F, Fut, T>(mut accept: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<T>>,
{
    loop {
        match accept().await {
            Ok(conn) => return conn,
            Err(e) => {
                warn!("accept failed: {e}");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
}

async fn handle_client(id: u64, stream: TcpStream, peer: SocketAddr, clients: Clients) {
    let ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(%peer, "websocket handshake failed: {e}");
            return;
        }
    };
    let (mut sink, mut source) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    clients.lock().insert(id, tx);
    info!(client = id, %peer, "client connected");

    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = source.next().await {
        match frame {
            Ok(msg @ (Message::Text(_) | Message::Binary(_))) => {
                debug!(client = id, len = msg.len(), "forwarding message");
                forward(&clients, id, msg);
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(client = id, "read failed: {e}");
                break;
            }
        }
    }

    clients.lock().remove(&id);
    writer.abort();
    info!(client = id, "client disconnected");
}

fn forward(clients: &Clients, from: u64, msg: Message) {
    let clients = clients.lock();
    for (id, tx) in clients.iter() {
        if *id != from {
            let _ = tx.send(msg.clone());
        }
    }
}
