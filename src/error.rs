//! Error types shared by the codec, the session coordinator and the relays.

use thiserror::Error;

use crate::peer::types::SessionState;

/// Failure to turn a relay payload into a signaling [`Message`](crate::signaling::Message).
///
/// Always recoverable: the bridge logs it and drops the payload.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("payload is not a JSON object: {0}")]
    NotJson(String),
    #[error("unknown or malformed signaling message of type {kind:?}")]
    UnknownOrMalformed { kind: String },
}

/// Errors surfaced by [`PeerSession`](crate::peer::session::PeerSession).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NegotiationError {
    #[error("{op} is not valid in state {state:?}")]
    InvalidState {
        op: &'static str,
        state: SessionState,
    },
    #[error("remote description rejected: {0}")]
    InvalidDescription(String),
    #[error("remote candidate rejected: {0}")]
    InvalidCandidate(String),
    #[error("data channel is not open")]
    NotReady,
    #[error("send failed: {0}")]
    SendFailed(String),
    #[error("connectivity capability failed: {0}")]
    Capability(String),
    #[error("session closed")]
    Closed,
}

/// Errors reported by a connectivity capability implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("setup failed: {0}")]
    Setup(String),
    #[error("description rejected: {0}")]
    Description(String),
    #[error("candidate rejected: {0}")]
    Candidate(String),
    #[error("send failed: {0}")]
    Send(String),
    #[error("capability released")]
    Released,
}

/// Errors from relay transport operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Send failed: {0}")]
    SendFailed(String),
    #[error("Not connected")]
    NotConnected,
    #[error("Disconnected")]
    Disconnected,
}
