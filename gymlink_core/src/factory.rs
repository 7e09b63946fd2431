//! Maps the configured `server_type` tag to a pre-wired server.

use crate::config::ServerConfig;
use crate::error::ConfigError;
use crate::handle::Capabilities;
use crate::server::GymServer;
use tracing::info;

/// Server variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerKind {
    /// Grid worlds; exposes `dynamics`
    FrozenLake,

    /// Control tasks; `make` honours request overrides
    CartPole,

    /// Vectorized pixel games
    Atari,
}

impl ServerKind {
    pub fn all() -> Vec<ServerKind> {
        vec![ServerKind::FrozenLake, ServerKind::CartPole, ServerKind::Atari]
    }

    /// Canonical configuration tag.
    pub fn name(&self) -> &'static str {
        match self {
            ServerKind::FrozenLake => "FrozenLake",
            ServerKind::CartPole => "CartPole",
            ServerKind::Atari => "Atari",
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        match self {
            ServerKind::FrozenLake => Capabilities::new(true, false),
            ServerKind::CartPole => Capabilities::new(false, true),
            ServerKind::Atari => Capabilities::new(false, false),
        }
    }
}

impl std::fmt::Display for ServerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ServerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "frozenlake" | "frozen_lake" => Ok(ServerKind::FrozenLake),
            "cartpole" | "cart_pole" => Ok(ServerKind::CartPole),
            "atari" | "atarilunarlander" | "atari_lunar_lander" => Ok(ServerKind::Atari),
            _ => Err(format!("Unknown server type: {}", s)),
        }
    }
}

/// Builds servers from configuration. Performs no I/O.
pub struct ServerFactory;

impl ServerFactory {
    pub fn build(config: &ServerConfig) -> Result<GymServer, ConfigError> {
        let tag = config
            .server_type
            .as_deref()
            .ok_or_else(|| ConfigError::MissingField("server_type".to_string()))?;
        let kind: ServerKind = tag
            .parse()
            .map_err(|_| ConfigError::UnknownServerType(tag.to_string()))?;
        config.validate()?;

        info!("Building {} server", kind);
        Ok(GymServer::new(kind, config.clone()))
    }
}
