//! Line chat over an open session
//!
//! Frames on the data channel are JSON:
//! `{"kind":"text"|"echo"|"exit","body":"...","sentAt":1700000000000}`.
//! `sentAt` travels with the frame and is echoed back untouched, so the
//! sender can compute the round trip without remembering anything.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

use crate::bridge::RelayBridge;
use crate::peer::events::{CloseReason, SessionEvent, SessionEvents};
use crate::peer::session::PeerSession;
use crate::relay::RelayTransport;
use crate::utils::now_millis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameKind {
    Text,
    Echo,
    Exit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatFrame {
    pub kind: FrameKind,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<i64>,
}

impl ChatFrame {
    pub fn text(body: impl Into<String>, sent_at: i64) -> Self {
        Self {
            kind: FrameKind::Text,
            body: body.into(),
            sent_at: Some(sent_at),
        }
    }

    pub fn exit() -> Self {
        Self {
            kind: FrameKind::Exit,
            body: String::new(),
            sent_at: None,
        }
    }

    /// Reply to `self` carrying the same body and timestamp.
    pub fn echo(&self) -> Self {
        Self {
            kind: FrameKind::Echo,
            body: self.body.clone(),
            sent_at: self.sent_at,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(raw: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(raw)?)
    }
}

/// What to do about one received frame.
#[derive(Debug, PartialEq, Eq)]
pub enum Reaction {
    Print(String),
    PrintAndReply(String, ChatFrame),
    Quit,
}

pub fn react(frame: &ChatFrame, echo: bool, now: i64) -> Reaction {
    match frame.kind {
        FrameKind::Text => {
            let line = format!("peer: {}", frame.body);
            if echo {
                Reaction::PrintAndReply(line, frame.echo())
            } else {
                Reaction::Print(line)
            }
        }
        FrameKind::Echo => match frame.sent_at {
            Some(sent_at) => Reaction::Print(format!(
                "echo: {} (rtt {} ms)",
                frame.body,
                now - sent_at
            )),
            None => Reaction::Print(format!("echo: {}", frame.body)),
        },
        FrameKind::Exit => Reaction::Quit,
    }
}

/// Frame for one stdin line; blank lines send nothing.
pub fn outgoing(line: &str, now: i64) -> Option<ChatFrame> {
    let line = line.trim();
    match line {
        "" => None,
        "exit" => Some(ChatFrame::exit()),
        text => Some(ChatFrame::text(text, now)),
    }
}

/// Anything but an owner-requested close counts as failure.
pub fn closed_result(reason: CloseReason) -> Result<()> {
    match reason {
        CloseReason::Requested => Ok(()),
        other => Err(anyhow!("session closed: {other:?}")),
    }
}

/// Time the exit frame gets to leave before the channel is torn down.
/// Delivery is still best effort.
pub const EXIT_FLUSH: Duration = Duration::from_millis(250);

/// Tell the peer we are going, then close the session.
pub async fn leave(session: &PeerSession) -> Result<()> {
    match session.send(ChatFrame::exit().encode()?).await {
        Ok(()) => tokio::time::sleep(EXIT_FLUSH).await,
        Err(e) => warn!("could not send exit: {e}"),
    }
    session.close().await;
    Ok(())
}

async fn next_relay_payload<R: RelayTransport>(bridge: &mut Option<RelayBridge<R>>) -> Option<Vec<u8>> {
    match bridge {
        Some(bridge) => bridge.recv().await,
        None => std::future::pending().await,
    }
}

/// Chat until either side says `exit` or the session closes. `bridge` is
/// only given when the relay was kept open after the channel opened.
pub async fn chat<R: RelayTransport>(
    session: PeerSession,
    mut events: SessionEvents,
    echo: bool,
    mut bridge: Option<RelayBridge<R>>,
) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    println!("connected, type messages ('exit' to quit)");

    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => match line? {
                Some(line) => {
                    let Some(frame) = outgoing(&line, now_millis()) else {
                        continue;
                    };
                    if frame.kind == FrameKind::Exit {
                        leave(&session).await?;
                        return Ok(());
                    }
                    if let Err(e) = session.send(frame.encode()?).await {
                        warn!("send failed: {e}");
                    }
                }
                None => {
                    debug!("stdin closed");
                    stdin_open = false;
                }
            },
            raw = next_relay_payload(&mut bridge) => match raw {
                Some(raw) => {
                    if let Some(bridge) = bridge.as_ref() {
                        bridge.handle_inbound(&raw).await;
                    }
                }
                None => {
                    debug!("relay closed after open");
                    bridge = None;
                }
            },
            event = events.recv() => match event {
                Some(SessionEvent::Message(data)) => {
                    let frame = match ChatFrame::decode(&data) {
                        Ok(frame) => frame,
                        Err(e) => {
                            warn!("dropping unreadable frame: {e}");
                            continue;
                        }
                    };
                    match react(&frame, echo, now_millis()) {
                        Reaction::Print(line) => println!("{line}"),
                        Reaction::PrintAndReply(line, reply) => {
                            println!("{line}");
                            if let Err(e) = session.send(reply.encode()?).await {
                                warn!("echo failed: {e}");
                            }
                        }
                        Reaction::Quit => {
                            println!("peer left");
                            session.close().await;
                            return Ok(());
                        }
                    }
                }
                Some(SessionEvent::LocalCandidateDiscovered(candidate)) => {
                    if let Some(bridge) = bridge.as_ref() {
                        if let Err(e) = bridge.relay_local_candidate(candidate).await {
                            warn!("could not relay late candidate: {e}");
                        }
                    }
                }
                Some(SessionEvent::Closed(reason)) => return closed_result(reason),
                Some(other) => debug!(?other, "ignoring session event"),
                None => return Ok(()),
            }
        }
    }
}
