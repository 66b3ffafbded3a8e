pub mod capability;
pub mod connection;
pub mod data_channel;
pub mod events;
pub mod ice;
pub mod mock;
pub mod session;
pub mod state;
pub mod types;

pub use capability::{Connectivity, ConnectivityFactory};
pub use connection::{WebRtcConnectivity, WebRtcConnectivityFactory};
pub use events::{CloseReason, NegotiationEvent, SessionEvent, SessionEvents};
pub use session::PeerSession;
pub use types::{Candidate, ChannelState, Role, SdpKind, ServerConfig, SessionDescription, SessionState};
