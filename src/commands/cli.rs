use clap::{Args, Parser, Subcommand};

use crate::config::{
    default_ice_servers, server_from_url, PeerConfig, DEFAULT_RELAY_LISTEN, DEFAULT_RELAY_URL,
};

#[derive(Parser, Debug)]
#[command(
    name = "rtclink",
    version,
    about = "Peer-to-peer WebRTC data channel negotiated over a relay"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the WebSocket relay both peers connect to
    Relay {
        #[arg(long, default_value = DEFAULT_RELAY_LISTEN)]
        listen: String,
    },
    /// Create the offer and chat once the answerer connects
    Offer {
        #[command(flatten)]
        peer: PeerArgs,
    },
    /// Wait for an offer, answer it, then chat
    Answer {
        #[command(flatten)]
        peer: PeerArgs,

        /// Send every received text back to the sender
        #[arg(long)]
        echo: bool,
    },
}

#[derive(Args, Debug, Clone)]
pub struct PeerArgs {
    /// Relay WebSocket URL
    #[arg(long, env = "RTCLINK_RELAY", default_value = DEFAULT_RELAY_URL)]
    pub relay: String,

    /// STUN or TURN server URL; repeat for more. Defaults to public STUN.
    #[arg(long = "ice", value_name = "URL")]
    pub ice: Vec<String>,

    #[arg(long, requires = "ice_credential")]
    pub ice_username: Option<String>,

    #[arg(long, requires = "ice_username")]
    pub ice_credential: Option<String>,

    /// Keep the relay open after the data channel opens, for late candidates
    #[arg(long)]
    pub keep_relay: bool,
}

impl PeerArgs {
    pub fn peer_config(&self) -> PeerConfig {
        let ice_servers = if self.ice.is_empty() {
            default_ice_servers()
        } else {
            self.ice
                .iter()
                .enumerate()
                .map(|(i, url)| {
                    server_from_url(i, url, self.ice_username.clone(), self.ice_credential.clone())
                })
                .collect()
        };
        PeerConfig {
            ice_servers,
            ..Default::default()
        }
    }
}
