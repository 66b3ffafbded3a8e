use serde::{Deserialize, Serialize};

/// Which side of the negotiation this peer plays
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Offerer,
    Answerer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Offerer => "offerer",
            Role::Answerer => "answerer",
        }
    }
}

/// Kind of a session description
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Answer,
}

/// SDP blob together with its kind; the body is never inspected
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    pub kind: SdpKind,
    pub body: String,
}

impl SessionDescription {
    pub fn offer(body: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            body: body.into(),
        }
    }

    pub fn answer(body: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            body: body.into(),
        }
    }
}

/// ICE candidate trickled by either side
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Candidate {
    pub candidate: String,
    pub media_id: String,
    pub media_line_index: u16,
}

impl Candidate {
    pub fn new(candidate: impl Into<String>, media_id: impl Into<String>, media_line_index: u16) -> Self {
        Self {
            candidate: candidate.into(),
            media_id: media_id.into(),
            media_line_index,
        }
    }
}

/// Negotiation progress of a [`PeerSession`](super::session::PeerSession)
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    OfferCreated,
    AnswerCreated,
    RemoteDescriptionSet,
    Open,
    Closed,
}

/// Data channel state reported by the capability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Open,
    Closed,
}

/// ICE server entry, as accepted on the command line
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub id: String,
    pub r#type: String, // 'stun' or 'turn'
    pub url: String,
    pub username: Option<String>,
    pub credential: Option<String>,
}
