//! Server configuration, loaded once at startup.
//!
//! ```json
//! {"server_type": "FrozenLake", "env": {"name": "FrozenLake-v0", "copies": 1, "seed": 0, "max_copies": 64}}
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server variant tag (see `ServerKind`)
    #[serde(default)]
    pub server_type: Option<String>,

    #[serde(default)]
    pub env: EnvConfig,
}

/// The environment the server creates on `make`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvConfig {
    /// Registered simulation id
    #[serde(default)]
    pub name: String,

    /// Number of instances; more than one yields a vectorized env
    #[serde(default = "default_copies")]
    pub copies: i64,

    /// Base seed for every instance
    #[serde(default)]
    pub seed: u64,

    /// Upper bound on copies, including `num_envs` make overrides
    #[serde(default = "default_max_copies")]
    pub max_copies: i64,
}

/// Default bound on vectorized copies.
pub const DEFAULT_MAX_COPIES: i64 = 64;

fn default_copies() -> i64 {
    1
}

fn default_max_copies() -> i64 {
    DEFAULT_MAX_COPIES
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            copies: default_copies(),
            seed: 0,
            max_copies: default_max_copies(),
        }
    }
}

impl ServerConfig {
    /// Creates a configuration for `server_type` serving `copies` of `name`.
    pub fn new(server_type: &str, name: &str, copies: i64) -> Self {
        Self {
            server_type: Some(server_type.to_string()),
            env: EnvConfig {
                name: name.to_string(),
                copies,
                seed: 0,
                max_copies: default_max_copies(),
            },
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.env.seed = seed;
        self
    }

    /// Parses and validates a JSON document.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Checks the `env` section. The server type is checked by the factory.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.env.name.trim().is_empty() {
            return Err(ConfigError::MissingField("env.name".to_string()));
        }
        if self.env.max_copies < 1 {
            return Err(ConfigError::InvalidValue {
                field: "env.max_copies".to_string(),
                message: format!("must be at least 1, got {}", self.env.max_copies),
            });
        }
        if self.env.copies < 1 || self.env.copies > self.env.max_copies {
            return Err(ConfigError::InvalidValue {
                field: "env.copies".to_string(),
                message: format!(
                    "must be between 1 and {}, got {}",
                    self.env.max_copies, self.env.copies
                ),
            });
        }
        Ok(())
    }
}
