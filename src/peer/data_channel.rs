use crate::logger::dump_selected_pair;
use crate::peer::events::{NegotiationEvent, NegotiationSender};
use crate::peer::types::ChannelState;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};
use webrtc::data_channel::{data_channel_message::DataChannelMessage, RTCDataChannel};
use webrtc::peer_connection::RTCPeerConnection;

/// Slot holding the single data channel of a connection
pub type DataChannelSlot = Arc<Mutex<Option<Arc<RTCDataChannel>>>>;

/// общий обработчик data-channel
///
/// Stores the channel in `slot` and turns its callbacks into
/// [`NegotiationEvent`]s. A second channel announced by the remote is ignored.
pub fn attach_dc(
    dc: &Arc<RTCDataChannel>,
    slot: &DataChannelSlot,
    events: &NegotiationSender,
    pc: Weak<RTCPeerConnection>,
) {
    {
        let mut current = slot.lock();
        if current.is_some() {
            warn!(label = dc.label(), "ignoring additional data channel");
            return;
        }
        *current = Some(dc.clone());
    }
    debug!(label = dc.label(), "attach_dc called");

    dc.on_open(Box::new({
        let events = events.clone();
        move || {
            info!("Data channel opened");
            let _ = events.send(NegotiationEvent::ChannelState(ChannelState::Open));
            Box::pin(async move {
                if let Some(pc) = pc.upgrade() {
                    dump_selected_pair(&pc, "OPEN").await;
                }
            })
        }
    }));

    dc.on_message(Box::new({
        let events = events.clone();
        move |msg: DataChannelMessage| {
            debug!("Received message, length: {}", msg.data.len());
            let _ = events.send(NegotiationEvent::Message(msg.data));
            Box::pin(async {})
        }
    }));

    dc.on_error(Box::new(|err: webrtc::Error| {
        warn!("Data channel error: {err}");
        Box::pin(async {})
    }));

    dc.on_close(Box::new({
        let events = events.clone();
        move || {
            info!("Data channel closed");
            let _ = events.send(NegotiationEvent::ChannelState(ChannelState::Closed));
            Box::pin(async {})
        }
    }));
}
