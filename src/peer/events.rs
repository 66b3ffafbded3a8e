//! Event vocabulary between the capability, the session and its owner.
//!
//! The capability pushes [`NegotiationEvent`]s into one ordered channel that
//! the session drains; the session pushes [`SessionEvent`]s to whoever owns
//! it (usually the relay bridge first, then the application).

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::NegotiationError;
use crate::peer::types::{Candidate, ChannelState, SessionDescription};

/// Raised by the connectivity capability from its own tasks.
#[derive(Debug, Clone, PartialEq)]
pub enum NegotiationEvent {
    LocalCandidate(Candidate),
    ChannelState(ChannelState),
    Message(Bytes),
    /// The capability can no longer be used.
    Failed(String),
}

/// Raised by the session toward its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    LocalDescriptionReady(SessionDescription),
    LocalCandidateDiscovered(Candidate),
    Ready,
    Message(Bytes),
    Closed(CloseReason),
}

/// Why a session reached `Closed`.
#[derive(Debug, Clone, PartialEq)]
pub enum CloseReason {
    /// `close()` was called by the owner.
    Requested,
    /// The remote side closed the data channel.
    ChannelClosed,
    /// A remote description or candidate was rejected.
    Negotiation(NegotiationError),
    /// The capability reported a fatal fault.
    CapabilityFailed(String),
}

pub type NegotiationSender = mpsc::UnboundedSender<NegotiationEvent>;
pub type NegotiationReceiver = mpsc::UnboundedReceiver<NegotiationEvent>;
pub type SessionEvents = mpsc::UnboundedReceiver<SessionEvent>;
