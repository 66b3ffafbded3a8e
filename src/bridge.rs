//! Relay bridge
//!
//! Glues a [`PeerSession`] to a [`RelayTransport`]: inbound relay payloads
//! are decoded and dispatched to the session, and the session's local
//! description and candidates are encoded and sent back out. Once the data
//! channel is open the bridge steps aside and hands the event stream back.

use tracing::{debug, info, trace, warn};

use crate::config::BridgeConfig;
use crate::error::{NegotiationError, TransportError};
use crate::peer::events::{CloseReason, SessionEvent, SessionEvents};
use crate::peer::session::PeerSession;
use crate::peer::types::{Candidate, Role, SessionDescription};
use crate::relay::RelayTransport;
use crate::signaling::{self, Message};

/// How [`RelayBridge::run`] ended.
#[derive(Debug)]
pub enum BridgeOutcome {
    /// Data channel open; the remaining session events are the owner's now.
    Ready(SessionEvents),
    /// Session closed before it ever opened.
    Closed(CloseReason),
    /// Relay went away before the session opened.
    RelayClosed,
}

enum Step {
    Continue,
    Ready,
    Closed(CloseReason),
}

pub struct RelayBridge<R> {
    session: PeerSession,
    relay: R,
    config: BridgeConfig,
}

impl<R: RelayTransport> RelayBridge<R> {
    /// `relay` is expected to be connected already.
    pub fn new(session: PeerSession, relay: R, config: BridgeConfig) -> Self {
        Self {
            session,
            relay,
            config,
        }
    }

    pub fn session(&self) -> &PeerSession {
        &self.session
    }

    pub fn relay_connected(&self) -> bool {
        self.relay.is_connected()
    }

    /// Drive negotiation until the session opens, closes, or the relay dies.
    ///
    /// Relay send failures are returned as errors; the session is left as
    /// is and the owner decides whether to close it.
    pub async fn run(&mut self, mut events: SessionEvents) -> Result<BridgeOutcome, TransportError> {
        self.start().await?;

        loop {
            tokio::select! {
                raw = self.relay.recv() => match raw {
                    Some(raw) => self.handle_inbound(&raw).await,
                    None => {
                        warn!(session = %self.session.id(), "relay closed before the data channel opened");
                        return Ok(BridgeOutcome::RelayClosed);
                    }
                },
                event = events.recv() => {
                    let Some(event) = event else {
                        return Ok(BridgeOutcome::Closed(CloseReason::Requested));
                    };
                    match self.handle_event(event).await? {
                        Step::Continue => {}
                        Step::Ready => {
                            if self.config.close_relay_on_ready {
                                info!(session = %self.session.id(), "data channel open, closing relay");
                                self.relay.close().await;
                            }
                            return Ok(BridgeOutcome::Ready(events));
                        }
                        Step::Closed(reason) => return Ok(BridgeOutcome::Closed(reason)),
                    }
                }
            }
        }
    }

    /// The offerer kicks negotiation off as soon as the relay is up.
    async fn start(&mut self) -> Result<(), TransportError> {
        if !self.relay.is_connected() {
            return Err(TransportError::NotConnected);
        }
        if self.session.role() == Role::Offerer {
            if let Err(e) = self.session.create_offer().await {
                // the session reports its own closure through the event stream
                warn!(session = %self.session.id(), "create_offer failed: {e}");
            }
        }
        Ok(())
    }

    /// Decode one relay payload and hand it to the session. Malformed
    /// payloads and calls the session rejects are logged and dropped.
    pub async fn handle_inbound(&self, raw: &[u8]) {
        let msg = match signaling::decode(raw) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(session = %self.session.id(), "dropping relay message: {e}");
                return;
            }
        };
        let tag = msg.type_tag();
        trace!(session = %self.session.id(), tag, "relay message received");

        let result = match msg {
            Message::Offer { sdp } => self.session.create_answer(SessionDescription::offer(sdp)).await,
            Message::Answer { sdp } => {
                self.session
                    .apply_remote_answer(SessionDescription::answer(sdp))
                    .await
            }
            Message::Candidate(candidate) => self.session.add_remote_candidate(candidate).await,
        };

        match result {
            Ok(()) => {}
            Err(e @ NegotiationError::InvalidState { .. }) => {
                warn!(session = %self.session.id(), tag, "dropping relay message: {e}");
            }
            Err(NegotiationError::Closed) => {
                debug!(session = %self.session.id(), tag, "session closed while handling relay message");
            }
            Err(e) => {
                warn!(session = %self.session.id(), tag, "relay message rejected: {e}");
            }
        }
    }

    /// Forward a late local candidate while the relay is still open.
    pub async fn relay_local_candidate(&self, candidate: Candidate) -> Result<(), TransportError> {
        self.relay
            .send(signaling::encode(&Message::Candidate(candidate)))
            .await
    }

    /// Next raw payload from the relay, for owners that keep it past open.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.relay.recv().await
    }

    pub async fn close_relay(&mut self) {
        self.relay.close().await;
    }

    async fn handle_event(&mut self, event: SessionEvent) -> Result<Step, TransportError> {
        match event {
            SessionEvent::LocalDescriptionReady(desc) => {
                debug!(session = %self.session.id(), kind = ?desc.kind, "sending local description");
                self.relay.send(signaling::encode(&desc.into())).await?;
            }
            SessionEvent::LocalCandidateDiscovered(candidate) => {
                self.relay_local_candidate(candidate).await?;
            }
            SessionEvent::Ready => return Ok(Step::Ready),
            SessionEvent::Closed(reason) => return Ok(Step::Closed(reason)),
            SessionEvent::Message(data) => {
                debug!(session = %self.session.id(), len = data.len(), "message before ready, ignoring");
            }
        }
        Ok(Step::Continue)
    }
}
