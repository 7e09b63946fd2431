//! Error types for the gymlink server core.
//!
//! Per-request errors (`HandleError`, `RequestError`) are converted into
//! response envelopes at the dispatch boundary. Startup errors
//! (`ConfigError`) and transport failures (`ServerError`) are fatal.

use gymlink_env::{Method, TransportError};
use thiserror::Error;

/// Failures raised by a simulation while resetting or stepping.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Invalid action {action} for action space {space}")]
    InvalidAction { action: String, space: String },

    #[error("Cannot call step() before calling reset()")]
    ResetRequired,

    #[error("State {state} / action {action} is outside the transition table")]
    StateOutOfRange { state: u64, action: u64 },

    #[error("Expected {expected} actions, got {got}")]
    BatchMismatch { expected: usize, got: usize },

    #[error("Simulation failed: {0}")]
    Failed(String),
}

/// Errors reported by the environment handle.
#[derive(Debug, Error)]
pub enum HandleError {
    #[error("Environment not initialized")]
    Uninitialized,

    #[error("Construction failed: {0}")]
    Construction(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Simulation error: {0}")]
    Simulation(#[from] SimulationError),
}

/// Errors decoding a request before it reaches the handle.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    #[error("Malformed request: {0}")]
    Malformed(String),

    #[error("Invalid parameters for {method}: {message}")]
    InvalidParams { method: Method, message: String },
}

/// Configuration errors (fatal at startup).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Unknown server type: {0}")]
    UnknownServerType(String),
}

/// Errors that terminate the serve loop.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}
