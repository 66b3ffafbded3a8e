use crate::error::NegotiationError;
use crate::peer::capability::Connectivity;
use crate::peer::types::{Candidate, Role, SessionState};
use std::sync::Arc;

/// ========== SESSION STATE ==========
///
/// Everything a session mutates lives here, behind the session's single lock.
/// Methods only update fields and hand back what the caller needs to act on
/// once the lock is released; none of them touch the capability.
pub(crate) struct NegotiationState {
    pub role: Role,
    pub state: SessionState,

    /// Set once the capability accepted a remote description.
    pub remote_description_set: bool,

    /// A remote description is being applied right now.
    pub remote_description_pending: bool,

    /// Candidates received before the remote description was set
    pub pending_candidates: Vec<Candidate>,

    /// Data channel has fired its open event
    pub channel_open: bool,

    /// Released exactly once, on the transition to `Closed`.
    capability: Option<Arc<dyn Connectivity>>,
}

/// What to do with a remote candidate once the lock is dropped.
pub(crate) enum CandidateRoute {
    Buffered,
    Forward(Arc<dyn Connectivity>),
}

impl NegotiationState {
    pub fn new(role: Role, capability: Arc<dyn Connectivity>) -> Self {
        Self {
            role,
            state: SessionState::Idle,
            remote_description_set: false,
            remote_description_pending: false,
            pending_candidates: Vec::new(),
            channel_open: false,
            capability: Some(capability),
        }
    }

    fn invalid(&self, op: &'static str) -> NegotiationError {
        NegotiationError::InvalidState {
            op,
            state: self.state,
        }
    }

    fn capability(&self, op: &'static str) -> Result<Arc<dyn Connectivity>, NegotiationError> {
        self.capability.clone().ok_or_else(|| self.invalid(op))
    }

    /// Idle → OfferCreated
    pub fn begin_offer(&mut self) -> Result<Arc<dyn Connectivity>, NegotiationError> {
        const OP: &str = "create_offer";
        if self.role != Role::Offerer || self.state != SessionState::Idle {
            return Err(self.invalid(OP));
        }
        let capability = self.capability(OP)?;
        self.state = SessionState::OfferCreated;
        Ok(capability)
    }

    /// Idle → AnswerCreated, with the remote offer about to be applied
    pub fn begin_answer(&mut self) -> Result<Arc<dyn Connectivity>, NegotiationError> {
        const OP: &str = "create_answer";
        if self.role != Role::Answerer || self.state != SessionState::Idle {
            return Err(self.invalid(OP));
        }
        let capability = self.capability(OP)?;
        self.state = SessionState::AnswerCreated;
        self.remote_description_pending = true;
        Ok(capability)
    }

    /// Guards OfferCreated against a second answer while the first is applied
    pub fn begin_remote_answer(&mut self) -> Result<Arc<dyn Connectivity>, NegotiationError> {
        const OP: &str = "apply_remote_answer";
        if self.state != SessionState::OfferCreated
            || self.remote_description_pending
            || self.remote_description_set
        {
            return Err(self.invalid(OP));
        }
        let capability = self.capability(OP)?;
        self.remote_description_pending = true;
        Ok(capability)
    }

    /// Remote description accepted: move to RemoteDescriptionSet and hand back
    /// the buffered candidates. They leave the buffer exactly once.
    pub fn finish_remote_description(&mut self) -> Result<Vec<Candidate>, NegotiationError> {
        if self.state == SessionState::Closed {
            return Err(NegotiationError::Closed);
        }
        self.remote_description_pending = false;
        self.remote_description_set = true;
        self.state = SessionState::RemoteDescriptionSet;
        Ok(std::mem::take(&mut self.pending_candidates))
    }

    pub fn route_remote_candidate(
        &mut self,
        candidate: Candidate,
    ) -> Result<CandidateRoute, NegotiationError> {
        const OP: &str = "add_remote_candidate";
        if self.state == SessionState::Closed {
            return Err(self.invalid(OP));
        }
        if !self.remote_description_set {
            self.pending_candidates.push(candidate);
            return Ok(CandidateRoute::Buffered);
        }
        Ok(CandidateRoute::Forward(self.capability(OP)?))
    }

    /// RemoteDescriptionSet → Open. Returns true when the transition happened.
    pub fn open_channel(&mut self) -> bool {
        if self.state != SessionState::RemoteDescriptionSet {
            return false;
        }
        self.state = SessionState::Open;
        self.channel_open = true;
        true
    }

    pub fn sendable(&self) -> Result<Arc<dyn Connectivity>, NegotiationError> {
        if self.state != SessionState::Open {
            return Err(NegotiationError::NotReady);
        }
        self.capability.clone().ok_or(NegotiationError::NotReady)
    }

    /// Any → Closed. `None` means the session was already closed.
    pub fn close(&mut self) -> Option<Arc<dyn Connectivity>> {
        if self.state == SessionState::Closed {
            return None;
        }
        self.state = SessionState::Closed;
        self.channel_open = false;
        self.remote_description_pending = false;
        self.pending_candidates.clear();
        self.capability.take()
    }
}
