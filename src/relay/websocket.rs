//! WebSocket relay client
//!
//! A background task owns the socket: it pumps the outbound queue into the
//! sink and every inbound text or binary frame into the inbound queue.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use super::{RelayTransport, TransportError};

const CLOSE_GRACE: Duration = Duration::from_secs(1);

#[derive(Default)]
pub struct WebSocketRelay {
    outbound: Option<mpsc::UnboundedSender<Vec<u8>>>,
    inbound: Option<mpsc::UnboundedReceiver<Vec<u8>>>,
    connected: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl WebSocketRelay {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Only `ws://` and `wss://` URLs are accepted.
fn check_url(address: &str) -> Result<Url, TransportError> {
    let url =
        Url::parse(address).map_err(|e| TransportError::ConnectionFailed(format!("{address}: {e}")))?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(TransportError::ConnectionFailed(format!(
            "unsupported relay scheme {other:?}"
        ))),
    }
}

#[async_trait]
impl RelayTransport for WebSocketRelay {
    async fn connect(&mut self, address: &str) -> Result<(), TransportError> {
        if self.is_connected() {
            return Ok(());
        }
        let url = check_url(address)?;
        let (ws, _) = connect_async(url.as_str())
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        info!(relay = %url, "relay connected");

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        self.connected.store(true, Ordering::SeqCst);
        self.task = Some(tokio::spawn(pump(
            ws,
            out_rx,
            in_tx,
            self.connected.clone(),
        )));
        self.outbound = Some(out_tx);
        self.inbound = Some(in_rx);
        Ok(())
    }

    async fn send(&self, data: Vec<u8>) -> Result<(), TransportError> {
        let tx = self.outbound.as_ref().ok_or(TransportError::NotConnected)?;
        if !self.is_connected() {
            return Err(TransportError::Disconnected);
        }
        tx.send(data)
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Vec<u8>> {
        self.inbound.as_mut()?.recv().await
    }

    async fn close(&mut self) {
        // dropping the sender makes the pump send a close frame and exit
        self.outbound = None;
        self.inbound = None;
        if let Some(task) = self.task.take() {
            let abort = task.abort_handle();
            if tokio::time::timeout(CLOSE_GRACE, task).await.is_err() {
                abort.abort();
            }
        }
        self.connected.store(false, Ordering::SeqCst);
        debug!("relay closed");
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

async fn pump(
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    inbound: mpsc::UnboundedSender<Vec<u8>>,
    connected: Arc<AtomicBool>,
) {
    let (mut sink, mut stream) = ws.split();
    loop {
        tokio::select! {
            out = outbound.recv() => match out {
                Some(data) => {
                    // signaling payloads are JSON, so text frames are the norm
                    let msg = match String::from_utf8(data) {
                        Ok(text) => Message::Text(text),
                        Err(e) => Message::Binary(e.into_bytes()),
                    };
                    if let Err(e) = sink.send(msg).await {
                        warn!("relay write failed: {e}");
                        break;
                    }
                }
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if inbound.send(text.into_bytes()).is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Binary(data))) => {
                    if inbound.send(data).is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    debug!("relay closed the connection");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("relay read failed: {e}");
                    break;
                }
            },
        }
    }
    connected.store(false, Ordering::SeqCst);
}

impl Drop for WebSocketRelay {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
