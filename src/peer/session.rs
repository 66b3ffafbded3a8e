//! Negotiation coordinator
//!
//! A [`PeerSession`] owns one capability handle and walks it through
//! offer/answer, candidate exchange and channel open. Callers drive it with
//! plain method calls; the capability drives it through a single ordered
//! event channel drained by one dispatcher task. All session fields sit
//! behind one lock that is never held across an `.await` or while emitting.

use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::error::NegotiationError;
use crate::logger::dump_candidate;
use crate::peer::capability::{Connectivity, ConnectivityFactory};
use crate::peer::events::{
    CloseReason, NegotiationEvent, NegotiationReceiver, SessionEvent, SessionEvents,
};
use crate::peer::state::{CandidateRoute, NegotiationState};
use crate::peer::types::{Candidate, ChannelState, Role, SdpKind, SessionDescription, SessionState};
use crate::utils::random_id;

struct Inner {
    id: String,
    role: Role,
    core: Mutex<NegotiationState>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

/// Cheap to clone; all clones drive the same session.
#[derive(Clone)]
pub struct PeerSession {
    inner: Arc<Inner>,
}

impl PeerSession {
    /// Build a session around a fresh capability handle from `factory`.
    ///
    /// A factory failure is fatal for this attempt; retrying means calling
    /// `new` again, never reusing a half-built handle.
    pub async fn new<F>(role: Role, factory: &F) -> Result<(Self, SessionEvents), NegotiationError>
    where
        F: ConnectivityFactory + ?Sized,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let capability = factory
            .create(role, tx)
            .await
            .map_err(|e| NegotiationError::Capability(e.to_string()))?;
        Ok(Self::with_capability(role, capability, rx))
    }

    /// Wrap an already created capability. `negotiation` must be the
    /// receiving end of the sender that capability reports through.
    ///
    /// Spawns the dispatcher task, so it has to run inside a Tokio runtime.
    pub fn with_capability(
        role: Role,
        capability: Arc<dyn Connectivity>,
        negotiation: NegotiationReceiver,
    ) -> (Self, SessionEvents) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let session = Self {
            inner: Arc::new(Inner {
                id: random_id(),
                role,
                core: Mutex::new(NegotiationState::new(role, capability)),
                events: events_tx,
            }),
        };
        info!(session = %session.id(), role = role.as_str(), "peer session created");
        tokio::spawn(dispatch(Arc::downgrade(&session.inner), negotiation));
        (session, events_rx)
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn role(&self) -> Role {
        self.inner.role
    }

    pub fn state(&self) -> SessionState {
        self.inner.core.lock().state
    }

    pub fn is_open(&self) -> bool {
        self.inner.core.lock().channel_open
    }

    pub fn pending_candidate_count(&self) -> usize {
        self.inner.core.lock().pending_candidates.len()
    }

    /// Offerer only: generate the local offer and announce it with
    /// `LocalDescriptionReady`.
    pub async fn create_offer(&self) -> Result<(), NegotiationError> {
        let capability = self.inner.core.lock().begin_offer()?;
        debug!(session = %self.id(), "creating local offer");

        match capability.create_local_offer().await {
            Ok(offer) => self.announce_local_description(offer),
            Err(e) => Err(self.fail_capability(e.to_string()).await),
        }
    }

    /// Answerer only: apply the remote offer, flush buffered candidates, then
    /// generate the local answer and announce it.
    pub async fn create_answer(&self, offer: SessionDescription) -> Result<(), NegotiationError> {
        if offer.kind != SdpKind::Offer {
            return Err(NegotiationError::InvalidState {
                op: "create_answer",
                state: self.state(),
            });
        }
        let capability = self.inner.core.lock().begin_answer()?;
        debug!(session = %self.id(), "applying remote offer");

        self.apply_remote_description(&capability, offer).await?;

        debug!(session = %self.id(), "creating local answer");
        match capability.create_local_answer().await {
            Ok(answer) => self.announce_local_description(answer),
            Err(e) => Err(self.fail_capability(e.to_string()).await),
        }
    }

    /// Offerer only: apply the answer received from the remote side.
    pub async fn apply_remote_answer(
        &self,
        answer: SessionDescription,
    ) -> Result<(), NegotiationError> {
        if answer.kind != SdpKind::Answer {
            return Err(NegotiationError::InvalidState {
                op: "apply_remote_answer",
                state: self.state(),
            });
        }
        let capability = self.inner.core.lock().begin_remote_answer()?;
        debug!(session = %self.id(), "applying remote answer");
        self.apply_remote_description(&capability, answer).await
    }

    /// Buffer or forward a remote candidate depending on whether a remote
    /// description exists yet.
    pub async fn add_remote_candidate(&self, candidate: Candidate) -> Result<(), NegotiationError> {
        let route = self
            .inner
            .core
            .lock()
            .route_remote_candidate(candidate.clone())?;

        match route {
            CandidateRoute::Buffered => {
                debug!(
                    session = %self.id(),
                    candidate = %candidate.candidate,
                    "remote description not set yet, queuing candidate"
                );
                Ok(())
            }
            CandidateRoute::Forward(capability) => {
                self.forward_candidates(&capability, vec![candidate]).await
            }
        }
    }

    /// Fire-and-forget send over the open data channel.
    pub async fn send(&self, data: impl Into<Bytes>) -> Result<(), NegotiationError> {
        let capability = self.inner.core.lock().sendable()?;
        let data = data.into();
        trace!(session = %self.id(), len = data.len(), "sending application data");
        capability
            .send_bytes(data)
            .await
            .map_err(|e| NegotiationError::SendFailed(e.to_string()))
    }

    /// Release the capability and emit `Closed(Requested)`. Safe to call in
    /// any state and any number of times.
    pub async fn close(&self) {
        self.close_with(CloseReason::Requested).await;
    }

    /// Entry point for capability events; the dispatcher calls this in
    /// arrival order.
    pub async fn handle_event(&self, event: NegotiationEvent) {
        if self.state() == SessionState::Closed {
            trace!(session = %self.id(), ?event, "session closed, ignoring capability event");
            return;
        }

        match event {
            NegotiationEvent::LocalCandidate(candidate) => {
                dump_candidate("LOCAL", &candidate);
                self.emit_if(
                    |core| core.state != SessionState::Closed,
                    SessionEvent::LocalCandidateDiscovered(candidate),
                );
            }
            NegotiationEvent::ChannelState(ChannelState::Open) => {
                if self.emit_if(|core| core.open_channel(), SessionEvent::Ready) {
                    info!(session = %self.id(), "data channel open");
                } else {
                    warn!(
                        session = %self.id(),
                        state = ?self.state(),
                        "channel open reported outside RemoteDescriptionSet, ignoring"
                    );
                }
            }
            NegotiationEvent::ChannelState(ChannelState::Closed) => {
                self.close_with(CloseReason::ChannelClosed).await;
            }
            NegotiationEvent::Message(data) => {
                let delivered = self.emit_if(
                    |core| core.state == SessionState::Open,
                    SessionEvent::Message(data),
                );
                if !delivered {
                    debug!(session = %self.id(), "dropping message received before open");
                }
            }
            NegotiationEvent::Failed(reason) => {
                warn!(session = %self.id(), %reason, "connectivity capability failed");
                self.close_with(CloseReason::CapabilityFailed(reason)).await;
            }
        }
    }

    async fn apply_remote_description(
        &self,
        capability: &Arc<dyn Connectivity>,
        desc: SessionDescription,
    ) -> Result<(), NegotiationError> {
        if let Err(e) = capability.set_remote_description(desc).await {
            if self.state() == SessionState::Closed {
                return Err(NegotiationError::Closed);
            }
            let err = NegotiationError::InvalidDescription(e.to_string());
            warn!(session = %self.id(), error = %err, "remote description rejected");
            self.close_with(CloseReason::Negotiation(err.clone())).await;
            return Err(err);
        }

        let drained = self.inner.core.lock().finish_remote_description()?;
        debug!(
            session = %self.id(),
            count = drained.len(),
            "remote description set, applying pending candidates"
        );
        self.forward_candidates(capability, drained).await
    }

    async fn forward_candidates(
        &self,
        capability: &Arc<dyn Connectivity>,
        candidates: Vec<Candidate>,
    ) -> Result<(), NegotiationError> {
        for candidate in candidates {
            trace!(session = %self.id(), candidate = %candidate.candidate, "adding remote candidate");
            if let Err(e) = capability.add_remote_candidate(candidate).await {
                if self.state() == SessionState::Closed {
                    return Err(NegotiationError::Closed);
                }
                let err = NegotiationError::InvalidCandidate(e.to_string());
                warn!(session = %self.id(), error = %err, "remote candidate rejected");
                self.close_with(CloseReason::Negotiation(err.clone())).await;
                return Err(err);
            }
        }
        Ok(())
    }

    fn announce_local_description(&self, desc: SessionDescription) -> Result<(), NegotiationError> {
        debug!(session = %self.id(), kind = ?desc.kind, "local description ready");
        let announced = self.emit_if(
            |core| core.state != SessionState::Closed,
            SessionEvent::LocalDescriptionReady(desc),
        );
        if announced {
            Ok(())
        } else {
            Err(NegotiationError::Closed)
        }
    }

    async fn fail_capability(&self, reason: String) -> NegotiationError {
        if self.state() == SessionState::Closed {
            return NegotiationError::Closed;
        }
        warn!(session = %self.id(), %reason, "capability failed during negotiation");
        self.close_with(CloseReason::CapabilityFailed(reason.clone()))
            .await;
        NegotiationError::Capability(reason)
    }

    async fn close_with(&self, reason: CloseReason) {
        let released = self.inner.core.lock().close();
        let Some(capability) = released else {
            trace!(session = %self.id(), "close on an already closed session");
            return;
        };
        info!(session = %self.id(), ?reason, "closing peer session");
        capability.close().await;
        self.emit(SessionEvent::Closed(reason));
    }

    /// Emit only if `allowed` holds, checked and sent under the session lock.
    /// `close` flips the state under that lock first, so nothing emitted here
    /// can follow `Closed` in the owner's stream.
    fn emit_if(
        &self,
        allowed: impl FnOnce(&mut NegotiationState) -> bool,
        event: SessionEvent,
    ) -> bool {
        let mut core = self.inner.core.lock();
        if !allowed(&mut core) {
            return false;
        }
        self.emit(event);
        true
    }

    fn emit(&self, event: SessionEvent) {
        if self.inner.events.send(event).is_err() {
            trace!(session = %self.id(), "session event receiver dropped");
        }
    }
}

async fn dispatch(session: Weak<Inner>, mut negotiation: NegotiationReceiver) {
    while let Some(event) = negotiation.recv().await {
        let Some(inner) = session.upgrade() else {
            break;
        };
        PeerSession { inner }.handle_event(event).await;
    }
}
