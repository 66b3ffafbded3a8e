//! WebRTC-backed connectivity capability
//!
//! Wraps one `RTCPeerConnection` and its data channel. The offerer opens the
//! channel itself; the answerer adopts the one the remote announces.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::data_channel::{data_channel_init::RTCDataChannelInit, RTCDataChannel};
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::policy::bundle_policy::RTCBundlePolicy;
use webrtc::peer_connection::policy::rtcp_mux_policy::RTCRtcpMuxPolicy;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;

use crate::config::PeerConfig;
use crate::error::CapabilityError;
use crate::peer::capability::{Connectivity, ConnectivityFactory};
use crate::peer::data_channel::{attach_dc, DataChannelSlot};
use crate::peer::events::{NegotiationEvent, NegotiationSender};
use crate::peer::ice::{analyze_candidates, from_rtc, to_rtc_init};
use crate::peer::types::{Candidate, ChannelState, Role, SdpKind, SessionDescription};

pub struct WebRtcConnectivity {
    pc: Arc<RTCPeerConnection>,
    data_channel: DataChannelSlot,
}

/// Hands out one [`WebRtcConnectivity`] per session.
#[derive(Debug, Clone, Default)]
pub struct WebRtcConnectivityFactory {
    config: PeerConfig,
}

impl WebRtcConnectivityFactory {
    pub fn new(config: PeerConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ConnectivityFactory for WebRtcConnectivityFactory {
    async fn create(
        &self,
        role: Role,
        events: NegotiationSender,
    ) -> Result<Arc<dyn Connectivity>, CapabilityError> {
        let connectivity = new_peer(role, &self.config, events).await?;
        Ok(Arc::new(connectivity))
    }
}

/// Создает конфигурацию для peer connection
fn rtc_config(config: &PeerConfig) -> RTCConfiguration {
    RTCConfiguration {
        ice_servers: config.rtc_ice_servers(),
        ice_candidate_pool_size: 10,
        bundle_policy: RTCBundlePolicy::MaxBundle,
        rtcp_mux_policy: RTCRtcpMuxPolicy::Require,
        ..Default::default()
    }
}

/// создаём Peer; offerer сам делает data-channel
pub async fn new_peer(
    role: Role,
    config: &PeerConfig,
    events: NegotiationSender,
) -> Result<WebRtcConnectivity, CapabilityError> {
    config
        .validate()
        .map_err(|e| CapabilityError::Setup(e.to_string()))?;

    let api = APIBuilder::new().build();
    let pc = Arc::new(
        api.new_peer_connection(rtc_config(config))
            .await
            .map_err(|e| CapabilityError::Setup(e.to_string()))?,
    );
    let slot: DataChannelSlot = Arc::new(Mutex::new(None));
    let gathered: Arc<Mutex<Vec<Candidate>>> = Arc::new(Mutex::new(Vec::new()));

    pc.on_ice_candidate(Box::new({
        let events = events.clone();
        move |cand: Option<RTCIceCandidate>| {
            match cand.as_ref() {
                Some(c) => {
                    if let Some(candidate) = from_rtc(c) {
                        gathered.lock().push(candidate.clone());
                        let _ = events.send(NegotiationEvent::LocalCandidate(candidate));
                    }
                }
                None => {
                    // cand == None означает конец сбора
                    debug!("ICE candidate gathering completed (null candidate received)");
                    analyze_candidates(&gathered.lock());
                }
            }
            Box::pin(async {})
        }
    }));

    pc.on_ice_gathering_state_change(Box::new(move |state| {
        debug!("ICE gathering state changed to: {:?}", state);
        Box::pin(async {})
    }));

    pc.on_peer_connection_state_change(Box::new({
        let events = events.clone();
        move |st: RTCPeerConnectionState| {
            debug!("Peer connection state changed to: {:?}", st);
            match st {
                RTCPeerConnectionState::Connected => info!("Peer connection connected"),
                RTCPeerConnectionState::Disconnected => {
                    warn!("Peer connection disconnected, waiting for ICE to recover")
                }
                RTCPeerConnectionState::Failed => {
                    let _ = events.send(NegotiationEvent::Failed(
                        "peer connection failed".to_string(),
                    ));
                }
                RTCPeerConnectionState::Closed => {
                    let _ = events.send(NegotiationEvent::ChannelState(ChannelState::Closed));
                }
                _ => {}
            }
            Box::pin(async {})
        }
    }));

    match role {
        Role::Offerer => {
            let init = RTCDataChannelInit {
                ordered: Some(config.ordered),
                ..Default::default()
            };
            let dc = pc
                .create_data_channel(&config.data_channel_label, Some(init))
                .await
                .map_err(|e| CapabilityError::Setup(e.to_string()))?;
            attach_dc(&dc, &slot, &events, Arc::downgrade(&pc));
        }
        Role::Answerer => {
            let slot = slot.clone();
            let weak_pc = Arc::downgrade(&pc);
            pc.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
                attach_dc(&dc, &slot, &events, weak_pc.clone());
                Box::pin(async {})
            }));
        }
    }

    info!(role = role.as_str(), "peer connection created");
    Ok(WebRtcConnectivity {
        pc,
        data_channel: slot,
    })
}

impl WebRtcConnectivity {
    async fn apply_local(&self, desc: RTCSessionDescription) -> Result<String, CapabilityError> {
        let sdp = desc.sdp.clone();
        self.pc
            .set_local_description(desc)
            .await
            .map_err(|e| CapabilityError::Setup(e.to_string()))?;
        Ok(sdp)
    }
}

#[async_trait]
impl Connectivity for WebRtcConnectivity {
    async fn create_local_offer(&self) -> Result<SessionDescription, CapabilityError> {
        let offer = self
            .pc
            .create_offer(None)
            .await
            .map_err(|e| CapabilityError::Setup(e.to_string()))?;
        // НЕ ждем ICE gathering: кандидаты уйдут через trickle
        Ok(SessionDescription::offer(self.apply_local(offer).await?))
    }

    async fn create_local_answer(&self) -> Result<SessionDescription, CapabilityError> {
        let answer = self
            .pc
            .create_answer(None)
            .await
            .map_err(|e| CapabilityError::Setup(e.to_string()))?;
        Ok(SessionDescription::answer(self.apply_local(answer).await?))
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), CapabilityError> {
        let remote = match desc.kind {
            SdpKind::Offer => RTCSessionDescription::offer(desc.body),
            SdpKind::Answer => RTCSessionDescription::answer(desc.body),
        }
        .map_err(|e| CapabilityError::Description(e.to_string()))?;

        self.pc
            .set_remote_description(remote)
            .await
            .map_err(|e| CapabilityError::Description(e.to_string()))
    }

    async fn add_remote_candidate(&self, candidate: Candidate) -> Result<(), CapabilityError> {
        self.pc
            .add_ice_candidate(to_rtc_init(candidate))
            .await
            .map_err(|e| CapabilityError::Candidate(e.to_string()))
    }

    async fn send_bytes(&self, data: Bytes) -> Result<(), CapabilityError> {
        let dc = self
            .data_channel
            .lock()
            .clone()
            .ok_or_else(|| CapabilityError::Send("no data channel".to_string()))?;
        dc.send(&data)
            .await
            .map(|_| ())
            .map_err(|e| CapabilityError::Send(e.to_string()))
    }

    async fn close(&self) {
        // извлекаем data channel и освобождаем мьютекс
        let dc = self.data_channel.lock().take();
        if let Some(dc) = dc {
            let _ = dc.close().await;
        }
        if let Err(e) = self.pc.close().await {
            warn!("Failed to close peer connection: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::session::PeerSession;
    use crate::peer::types::SessionState;

    #[tokio::test]
    async fn offerer_produces_a_real_offer() {
        let factory = WebRtcConnectivityFactory::new(PeerConfig {
            ice_servers: Vec::new(),
            ..Default::default()
        });
        let (session, mut events) = PeerSession::new(Role::Offerer, &factory).await.unwrap();
        session.create_offer().await.unwrap();
        assert_eq!(session.state(), SessionState::OfferCreated);

        match events.recv().await {
            Some(crate::peer::events::SessionEvent::LocalDescriptionReady(desc)) => {
                assert_eq!(desc.kind, SdpKind::Offer);
                assert!(desc.body.starts_with("v=0"));
                assert!(desc.body.contains("webrtc-datachannel"));
            }
            other => panic!("unexpected event {other:?}"),
        }
        session.close().await;
    }

    #[tokio::test]
    async fn garbage_remote_offer_closes_the_answerer() {
        let factory = WebRtcConnectivityFactory::new(PeerConfig {
            ice_servers: Vec::new(),
            ..Default::default()
        });
        let (session, _events) = PeerSession::new(Role::Answerer, &factory).await.unwrap();
        let err = session
            .create_answer(SessionDescription::offer("not an sdp"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::NegotiationError::InvalidDescription(_)
        ));
        assert_eq!(session.state(), SessionState::Closed);
    }
}
