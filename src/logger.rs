use crate::peer::types::Candidate;
use once_cell::sync::OnceCell;
use tracing::debug;
use tracing_subscriber::{fmt::time::ChronoLocal, EnvFilter};
use webrtc::peer_connection::RTCPeerConnection;

static INIT: OnceCell<()> = OnceCell::new();

/// Timestamp layout for every log line
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Filter used when `RUST_LOG` is not set
pub fn default_filter() -> &'static str {
    if crate::config::LOGGING_ENABLED && crate::config::dev::ENABLE_LOGGING {
        "rtclink=debug,rtclink_lib=debug,webrtc=warn"
    } else {
        "warn"
    }
}

/// Install the global subscriber. Later calls are no-ops.
///
/// Logs go to stderr; stdout belongs to the chat.
pub fn init() {
    INIT.get_or_init(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter()));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init();
    });
}

/// Печать ICE-candidate при появлении (Trickle-ICE)
pub fn dump_candidate(label: &str, cand: &Candidate) {
    debug!(
        "Trickle {label}: candidate={} sdp_mid={} sdp_mline_index={}",
        cand.candidate, cand.media_id, cand.media_line_index
    );
}

/// Быстрый снимок getStats → выбранная пара
pub async fn dump_selected_pair(pc: &RTCPeerConnection, moment: &str) {
    let stats = pc.get_stats().await;
    for (_, v) in stats.reports {
        if let webrtc::stats::StatsReportType::CandidatePair(pair) = v {
            if pair.nominated {
                debug!(
                    "STATS {moment}: {}:{}  type: {:?}  bytes={}/{} state={:?}",
                    pair.local_candidate_id,
                    pair.remote_candidate_id,
                    pair.stats_type,
                    pair.bytes_sent,
                    pair.bytes_received,
                    pair.state
                );
            }
        }
    }
}
