// Конфигурация приложения
// Логирование по умолчанию можно отключить только в режиме разработки;
// RUST_LOG всегда имеет приоритет.

use crate::peer::types::ServerConfig;
use crate::utils::add_ice_url_scheme;
use thiserror::Error;
use webrtc::ice_transport::ice_server::RTCIceServer;

#[cfg(debug_assertions)]
pub const LOGGING_ENABLED: bool = true; // В режиме отладки логирование включено

#[cfg(not(debug_assertions))]
pub const LOGGING_ENABLED: bool = false; // В продакшене только предупреждения

#[cfg(debug_assertions)]
pub mod dev {
    // Для отключения debug-логирования в режиме разработки
    // измените эту константу на false
    pub const ENABLE_LOGGING: bool = true;
}

#[cfg(not(debug_assertions))]
pub mod dev {
    pub const ENABLE_LOGGING: bool = false;
}

/// Relay the CLI connects to when none is given
pub const DEFAULT_RELAY_URL: &str = "ws://localhost:8888";

/// Address the relay server listens on by default
pub const DEFAULT_RELAY_LISTEN: &str = "0.0.0.0:8888";

pub const DATA_CHANNEL_LABEL: &str = "rtclink-data";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("ICE server URL cannot be empty")]
    EmptyUrl,
    #[error("TURN server {0} requires username and credential")]
    MissingTurnCredentials(String),
}

/// Settings for one peer connection
#[derive(Debug, Clone)]
pub struct PeerConfig {
    pub ice_servers: Vec<ServerConfig>,
    pub data_channel_label: String,
    pub ordered: bool,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            ice_servers: default_ice_servers(),
            data_channel_label: DATA_CHANNEL_LABEL.to_string(),
            ordered: true,
        }
    }
}

impl PeerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for server in &self.ice_servers {
            if server.url.is_empty() {
                return Err(ConfigError::EmptyUrl);
            }
            if server.r#type == "turn" && (server.username.is_none() || server.credential.is_none()) {
                return Err(ConfigError::MissingTurnCredentials(server.url.clone()));
            }
        }
        Ok(())
    }

    /// ICE servers in the shape the WebRTC stack expects
    pub fn rtc_ice_servers(&self) -> Vec<RTCIceServer> {
        self.ice_servers
            .iter()
            .map(|config| RTCIceServer {
                urls: vec![add_ice_url_scheme(config)],
                username: config.username.clone().unwrap_or_default(),
                credential: config.credential.clone().unwrap_or_default(),
            })
            .collect()
    }
}

/// Дефолтные STUN серверы
pub fn default_ice_servers() -> Vec<ServerConfig> {
    vec![
        ServerConfig {
            id: "default-stun".into(),
            r#type: "stun".into(),
            url: "stun:stun.l.google.com:19302".into(),
            username: None,
            credential: None,
        },
        ServerConfig {
            id: "default-stun-1".into(),
            r#type: "stun".into(),
            url: "stun:stun1.l.google.com:19302".into(),
            username: None,
            credential: None,
        },
    ]
}

/// Builds a server entry from a bare URL given on the command line; the
/// type is taken from the scheme and defaults to STUN.
pub fn server_from_url(
    index: usize,
    url: &str,
    username: Option<String>,
    credential: Option<String>,
) -> ServerConfig {
    let kind = if url.starts_with("turn:") || url.starts_with("turns:") {
        "turn"
    } else {
        "stun"
    };
    ServerConfig {
        id: format!("cli-{index}"),
        r#type: kind.into(),
        url: url.to_string(),
        username: if kind == "turn" { username } else { None },
        credential: if kind == "turn" { credential } else { None },
    }
}

/// Relay bridge behavior
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Close the relay connection as soon as the data channel is open
    pub close_relay_on_ready: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            close_relay_on_ready: true,
        }
    }
}
