//! Scripted connectivity capability for tests and simulation
//!
//! Records every call the session makes, lets the test inject capability
//! events, and can be told to reject descriptions or candidates.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use crate::error::CapabilityError;
use crate::peer::capability::{Connectivity, ConnectivityFactory};
use crate::peer::events::{NegotiationEvent, NegotiationSender};
use crate::peer::types::{Candidate, ChannelState, Role, SessionDescription};

/// One call made against a [`MockConnectivity`].
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    CreateLocalOffer,
    CreateLocalAnswer,
    SetRemoteDescription(SessionDescription),
    AddRemoteCandidate(Candidate),
    SendBytes(Bytes),
    Close,
}

pub struct MockConnectivity {
    events: NegotiationSender,
    calls: Mutex<Vec<MockCall>>,
    remote_set: AtomicBool,
    /// Candidates that reached us before any remote description
    premature: Mutex<Vec<Candidate>>,
    offer_body: Mutex<String>,
    answer_body: Mutex<String>,
    reject_descriptions: AtomicBool,
    reject_candidates: AtomicBool,
    fail_local_descriptions: AtomicBool,
    closed: AtomicBool,
    /// While set, `set_remote_description` waits for a permit on it
    description_gate: Mutex<Option<Arc<Notify>>>,
}

impl MockConnectivity {
    pub fn new(events: NegotiationSender) -> Arc<Self> {
        Arc::new(Self {
            events,
            calls: Mutex::new(Vec::new()),
            remote_set: AtomicBool::new(false),
            premature: Mutex::new(Vec::new()),
            offer_body: Mutex::new("mock-offer".to_string()),
            answer_body: Mutex::new("mock-answer".to_string()),
            reject_descriptions: AtomicBool::new(false),
            reject_candidates: AtomicBool::new(false),
            fail_local_descriptions: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            description_gate: Mutex::new(None),
        })
    }

    pub fn set_offer_body(&self, body: &str) {
        *self.offer_body.lock() = body.to_string();
    }

    pub fn set_answer_body(&self, body: &str) {
        *self.answer_body.lock() = body.to_string();
    }

    pub fn reject_descriptions(&self, reject: bool) {
        self.reject_descriptions.store(reject, Ordering::SeqCst);
    }

    pub fn reject_candidates(&self, reject: bool) {
        self.reject_candidates.store(reject, Ordering::SeqCst);
    }

    /// Hold every following `set_remote_description` until the returned
    /// handle is notified, once per call.
    pub fn hold_remote_descriptions(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.description_gate.lock() = Some(gate.clone());
        gate
    }

    pub fn fail_local_descriptions(&self, fail: bool) {
        self.fail_local_descriptions.store(fail, Ordering::SeqCst);
    }

    /// Raise an event the way a real stack would from its own task.
    pub fn emit(&self, event: NegotiationEvent) {
        let _ = self.events.send(event);
    }

    pub fn open_channel(&self) {
        self.emit(NegotiationEvent::ChannelState(ChannelState::Open));
    }

    pub fn discover_candidate(&self, candidate: Candidate) {
        self.emit(NegotiationEvent::LocalCandidate(candidate));
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    pub fn forwarded_candidates(&self) -> Vec<Candidate> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                MockCall::AddRemoteCandidate(c) => Some(c.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn sent(&self) -> Vec<Bytes> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                MockCall::SendBytes(b) => Some(b.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn premature_candidates(&self) -> Vec<Candidate> {
        self.premature.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn record(&self, call: MockCall) {
        self.calls.lock().push(call);
    }

    fn check_open(&self) -> Result<(), CapabilityError> {
        if self.is_closed() {
            Err(CapabilityError::Released)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Connectivity for MockConnectivity {
    async fn create_local_offer(&self) -> Result<SessionDescription, CapabilityError> {
        self.check_open()?;
        self.record(MockCall::CreateLocalOffer);
        if self.fail_local_descriptions.load(Ordering::SeqCst) {
            return Err(CapabilityError::Setup("offer generation failed".into()));
        }
        Ok(SessionDescription::offer(self.offer_body.lock().clone()))
    }

    async fn create_local_answer(&self) -> Result<SessionDescription, CapabilityError> {
        self.check_open()?;
        self.record(MockCall::CreateLocalAnswer);
        if self.fail_local_descriptions.load(Ordering::SeqCst) {
            return Err(CapabilityError::Setup("answer generation failed".into()));
        }
        if !self.remote_set.load(Ordering::SeqCst) {
            return Err(CapabilityError::Description("no remote offer".into()));
        }
        Ok(SessionDescription::answer(self.answer_body.lock().clone()))
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), CapabilityError> {
        self.check_open()?;
        self.record(MockCall::SetRemoteDescription(desc.clone()));
        let gate = self.description_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.reject_descriptions.load(Ordering::SeqCst) {
            return Err(CapabilityError::Description(format!(
                "cannot parse {:?} description",
                desc.kind
            )));
        }
        self.remote_set.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn add_remote_candidate(&self, candidate: Candidate) -> Result<(), CapabilityError> {
        self.check_open()?;
        self.record(MockCall::AddRemoteCandidate(candidate.clone()));
        if !self.remote_set.load(Ordering::SeqCst) {
            self.premature.lock().push(candidate);
            return Err(CapabilityError::Candidate("remote description not set".into()));
        }
        if self.reject_candidates.load(Ordering::SeqCst) {
            return Err(CapabilityError::Candidate(candidate.candidate));
        }
        Ok(())
    }

    async fn send_bytes(&self, data: Bytes) -> Result<(), CapabilityError> {
        self.check_open()?;
        self.record(MockCall::SendBytes(data));
        Ok(())
    }

    async fn close(&self) {
        self.record(MockCall::Close);
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Factory handing out [`MockConnectivity`] handles and remembering them.
#[derive(Default)]
pub struct MockConnectivityFactory {
    created: Mutex<Vec<Arc<MockConnectivity>>>,
    fail: AtomicBool,
}

impl MockConnectivityFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every following `create` fail.
    pub fn fail_creation(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn last(&self) -> Option<Arc<MockConnectivity>> {
        self.created.lock().last().cloned()
    }
}

#[async_trait]
impl ConnectivityFactory for MockConnectivityFactory {
    async fn create(
        &self,
        _role: Role,
        events: NegotiationSender,
    ) -> Result<Arc<dyn Connectivity>, CapabilityError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CapabilityError::Setup("peer connection factory unavailable".into()));
        }
        let handle = MockConnectivity::new(events);
        self.created.lock().push(handle.clone());
        Ok(handle)
    }
}
