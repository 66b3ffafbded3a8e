pub mod bridge;
pub mod commands;
pub mod config;
pub mod error;
pub mod logger;
pub mod peer;
pub mod relay;
pub mod signaling;
pub mod utils;

pub use bridge::{BridgeOutcome, RelayBridge};
pub use error::{CapabilityError, DecodeError, NegotiationError, TransportError};
pub use peer::{CloseReason, PeerSession, Role, SessionEvent, SessionState};

/// Entry point for the `rtclink` binary.
pub async fn run(cli: commands::cli::Cli) -> anyhow::Result<()> {
    logger::init();
    commands::execute(cli).await
}
