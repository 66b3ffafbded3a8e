//! Wire codec for relay payloads.
//!
//! One JSON object per message:
//!
//! ```text
//! {"type":"offer","sdp":"..."}
//! {"type":"answer","sdp":"..."}
//! {"type":"ice","candidate":"...","sdpMid":"0","sdpMLineIndex":0}
//! ```

use serde::Deserialize;
use serde_json::json;

use crate::error::DecodeError;
use crate::peer::types::{Candidate, SdpKind, SessionDescription};

/// A decoded signaling message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Offer { sdp: String },
    Answer { sdp: String },
    Candidate(Candidate),
}

impl Message {
    pub fn type_tag(&self) -> &'static str {
        match self {
            Message::Offer { .. } => "offer",
            Message::Answer { .. } => "answer",
            Message::Candidate(_) => "ice",
        }
    }
}

impl From<SessionDescription> for Message {
    fn from(desc: SessionDescription) -> Self {
        match desc.kind {
            SdpKind::Offer => Message::Offer { sdp: desc.body },
            SdpKind::Answer => Message::Answer { sdp: desc.body },
        }
    }
}

impl From<Candidate> for Message {
    fn from(candidate: Candidate) -> Self {
        Message::Candidate(candidate)
    }
}

/// Every field any message type may carry; which ones are required depends
/// on `type`.
#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    sdp: Option<String>,
    #[serde(default)]
    candidate: Option<String>,
    #[serde(rename = "sdpMid", default)]
    sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex", default)]
    sdp_mline_index: Option<u16>,
}

fn required(field: Option<String>) -> Option<String> {
    field.filter(|s| !s.is_empty())
}

pub fn decode(raw: &[u8]) -> Result<Message, DecodeError> {
    let value: serde_json::Value =
        serde_json::from_slice(raw).map_err(|e| DecodeError::NotJson(e.to_string()))?;
    if !value.is_object() {
        return Err(DecodeError::NotJson(format!("expected an object, got {value}")));
    }

    let kind = value
        .get("type")
        .and_then(|t| t.as_str())
        .unwrap_or_default()
        .to_string();
    let malformed = || DecodeError::UnknownOrMalformed { kind: kind.clone() };

    let env: Envelope = serde_json::from_value(value).map_err(|_| malformed())?;

    match env.kind.as_deref() {
        Some("offer") => Ok(Message::Offer {
            sdp: required(env.sdp).ok_or_else(malformed)?,
        }),
        Some("answer") => Ok(Message::Answer {
            sdp: required(env.sdp).ok_or_else(malformed)?,
        }),
        Some("ice") => Ok(Message::Candidate(Candidate {
            candidate: required(env.candidate).ok_or_else(malformed)?,
            media_id: required(env.sdp_mid).ok_or_else(malformed)?,
            media_line_index: env.sdp_mline_index.ok_or_else(malformed)?,
        })),
        _ => Err(malformed()),
    }
}

pub fn encode(msg: &Message) -> Vec<u8> {
    let value = match msg {
        Message::Offer { sdp } => json!({ "type": "offer", "sdp": sdp }),
        Message::Answer { sdp } => json!({ "type": "answer", "sdp": sdp }),
        Message::Candidate(c) => json!({
            "type": "ice",
            "candidate": c.candidate,
            "sdpMid": c.media_id,
            "sdpMLineIndex": c.media_line_index,
        }),
    };
    value.to_string().into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_each_message_type() {
        assert_eq!(
            decode(br#"{"type":"offer","sdp":"sdp-O"}"#).unwrap(),
            Message::Offer { sdp: "sdp-O".into() }
        );
        assert_eq!(
            decode(br#"{"type":"answer","sdp":"sdp-A"}"#).unwrap(),
            Message::Answer { sdp: "sdp-A".into() }
        );
        assert_eq!(
            decode(br#"{"type":"ice","candidate":"c1","sdpMid":"0","sdpMLineIndex":0}"#).unwrap(),
            Message::Candidate(Candidate::new("c1", "0", 0))
        );
    }

    #[test]
    fn offer_encodes_to_wire_shape() {
        let raw = encode(&Message::Offer { sdp: "sdp-O".into() });
        let value: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(value, json!({"type": "offer", "sdp": "sdp-O"}));
    }

    #[test]
    fn candidate_encodes_camel_case_fields() {
        let raw = encode(&Message::Candidate(Candidate::new(
            "candidate:1 1 udp 2130706431 10.0.0.2 50000 typ host",
            "data",
            3,
        )));
        let value: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(value["type"], "ice");
        assert_eq!(value["sdpMid"], "data");
        assert_eq!(value["sdpMLineIndex"], 3);
    }

    #[test]
    fn round_trips() {
        let messages = [
            Message::Offer { sdp: "v=0\r\no=- 1 2 IN IP4 127.0.0.1\r\n".into() },
            Message::Answer { sdp: "sdp with \"quotes\" and unicode é".into() },
            Message::Candidate(Candidate::new("c", "0", 0)),
            Message::Candidate(Candidate::new("c", "audio", u16::MAX)),
        ];
        for m in messages {
            assert_eq!(decode(&encode(&m)).unwrap(), m);
        }
    }

    #[test]
    fn missing_sdp_mid_is_malformed() {
        let err = decode(br#"{"type":"ice","candidate":"c"}"#).unwrap_err();
        assert_eq!(err, DecodeError::UnknownOrMalformed { kind: "ice".into() });
    }

    #[test]
    fn unknown_type_carries_raw_tag() {
        let err = decode(br#"{"type":"bye"}"#).unwrap_err();
        assert_eq!(err, DecodeError::UnknownOrMalformed { kind: "bye".into() });

        let err = decode(br#"{"sdp":"x"}"#).unwrap_err();
        assert_eq!(err, DecodeError::UnknownOrMalformed { kind: String::new() });
    }

    #[test]
    fn empty_required_fields_are_malformed() {
        assert!(decode(br#"{"type":"offer","sdp":""}"#).is_err());
        assert!(decode(br#"{"type":"ice","candidate":"c","sdpMid":"","sdpMLineIndex":0}"#).is_err());
    }

    #[test]
    fn wrong_field_types_are_malformed() {
        let err = decode(br#"{"type":"ice","candidate":"c","sdpMid":"0","sdpMLineIndex":-1}"#)
            .unwrap_err();
        assert_eq!(err, DecodeError::UnknownOrMalformed { kind: "ice".into() });
    }

    #[test]
    fn non_json_is_rejected() {
        assert!(matches!(decode(b"Hello from server."), Err(DecodeError::NotJson(_))));
        assert!(matches!(decode(b"[1,2]"), Err(DecodeError::NotJson(_))));
    }
}
