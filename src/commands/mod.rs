pub mod chat;
pub mod cli;

use anyhow::{bail, Context, Result};
use tracing::info;

use crate::bridge::{BridgeOutcome, RelayBridge};
use crate::config::BridgeConfig;
use crate::peer::connection::WebRtcConnectivityFactory;
use crate::peer::session::PeerSession;
use crate::peer::types::Role;
use crate::relay::{RelayServer, RelayTransport, WebSocketRelay};
use chat::{chat, closed_result};
use cli::{Cli, Command, PeerArgs};

pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Relay { listen } => serve_relay(&listen).await,
        Command::Offer { peer } => connect_peer(Role::Offerer, &peer, false).await,
        Command::Answer { peer, echo } => connect_peer(Role::Answerer, &peer, echo).await,
    }
}

async fn serve_relay(listen: &str) -> Result<()> {
    let server = RelayServer::bind(listen)
        .await
        .with_context(|| format!("binding relay on {listen}"))?;
    tokio::select! {
        res = server.serve() => res.context("relay server stopped")?,
        _ = tokio::signal::ctrl_c() => info!("relay shutting down"),
    }
    Ok(())
}

/// Negotiate over the relay, then chat over the data channel.
async fn connect_peer(role: Role, args: &PeerArgs, echo: bool) -> Result<()> {
    let config = args.peer_config();
    config.validate()?;

    let factory = WebRtcConnectivityFactory::new(config);
    let (session, events) = PeerSession::new(role, &factory)
        .await
        .context("creating peer connection")?;

    let mut relay = WebSocketRelay::new();
    relay
        .connect(&args.relay)
        .await
        .with_context(|| format!("connecting to relay {}", args.relay))?;
    println!("{} connected to relay {}, negotiating...", role.as_str(), args.relay);

    let mut bridge = RelayBridge::new(
        session.clone(),
        relay,
        BridgeConfig {
            close_relay_on_ready: !args.keep_relay,
        },
    );

    match bridge.run(events).await {
        Ok(BridgeOutcome::Ready(events)) => {
            let kept = if bridge.relay_connected() {
                Some(bridge)
            } else {
                None
            };
            chat(session, events, echo, kept).await
        }
        Ok(BridgeOutcome::Closed(reason)) => closed_result(reason),
        Ok(BridgeOutcome::RelayClosed) => {
            session.close().await;
            bail!("relay closed before the peer connected")
        }
        Err(e) => {
            session.close().await;
            Err(e).context("relay failed during negotiation")
        }
    }
}
