use crate::peer::types::Candidate;
use tracing::{debug, warn};
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};

/// Media id used when the stack leaves it blank; a data-channel-only SDP has
/// a single bundled section with mid "0".
pub const DEFAULT_MEDIA_ID: &str = "0";

/// Remote candidate → форма, которую принимает RTCPeerConnection
pub fn to_rtc_init(candidate: Candidate) -> RTCIceCandidateInit {
    RTCIceCandidateInit {
        candidate: candidate.candidate,
        sdp_mid: Some(candidate.media_id),
        sdp_mline_index: Some(candidate.media_line_index),
        username_fragment: None,
    }
}

/// Локальный кандидат от стека → наш Candidate
pub fn from_rtc(cand: &RTCIceCandidate) -> Option<Candidate> {
    match cand.to_json() {
        Ok(init) => Some(from_init(init)),
        Err(e) => {
            warn!("Failed to serialize local ICE candidate: {e}");
            None
        }
    }
}

pub fn from_init(init: RTCIceCandidateInit) -> Candidate {
    let media_id = init
        .sdp_mid
        .filter(|mid| !mid.is_empty())
        .unwrap_or_else(|| DEFAULT_MEDIA_ID.to_string());
    Candidate {
        candidate: init.candidate,
        media_id,
        media_line_index: init.sdp_mline_index.unwrap_or(0),
    }
}

/// Counts of gathered candidates per type
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CandidateSummary {
    pub host: usize,
    pub srflx: usize,
    pub relay: usize,
}

pub fn analyze_candidates(candidates: &[Candidate]) -> CandidateSummary {
    let mut summary = CandidateSummary::default();

    for candidate in candidates {
        if candidate.candidate.contains("typ host") {
            summary.host += 1;
        } else if candidate.candidate.contains("typ srflx") {
            summary.srflx += 1;
        } else if candidate.candidate.contains("typ relay") {
            summary.relay += 1;
        }
    }

    debug!(
        "Candidate analysis: {} host, {} srflx, {} relay",
        summary.host, summary.srflx, summary.relay
    );

    if summary.relay == 0 {
        warn!("No TURN relay candidates found! Connection through NAT may fail.");
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_mid_falls_back_to_default() {
        let c = from_init(RTCIceCandidateInit {
            candidate: "candidate:1 1 udp 1 10.0.0.1 4000 typ host".into(),
            sdp_mid: Some(String::new()),
            sdp_mline_index: None,
            username_fragment: None,
        });
        assert_eq!(c.media_id, DEFAULT_MEDIA_ID);
        assert_eq!(c.media_line_index, 0);
    }

    #[test]
    fn conversion_keeps_fields() {
        let c = Candidate::new("candidate:2 1 udp 1 1.2.3.4 5000 typ srflx", "data", 1);
        let init = to_rtc_init(c.clone());
        assert_eq!(init.sdp_mid.as_deref(), Some("data"));
        assert_eq!(from_init(init), c);
    }

    #[test]
    fn candidates_are_classified_by_type() {
        let gathered = [
            Candidate::new("candidate:1 1 udp 1 10.0.0.1 4000 typ host", "0", 0),
            Candidate::new("candidate:2 1 udp 1 1.2.3.4 5000 typ srflx raddr 0.0.0.0", "0", 0),
            Candidate::new("candidate:3 1 udp 1 5.6.7.8 6000 typ relay", "0", 0),
            Candidate::new("candidate:4 1 udp 1 10.0.0.2 4001 typ host", "0", 0),
        ];
        assert_eq!(
            analyze_candidates(&gathered),
            CandidateSummary {
                host: 2,
                srflx: 1,
                relay: 1
            }
        );
    }
}
