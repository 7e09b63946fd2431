//! Error types for the gymlink transport layer.

use thiserror::Error;

/// Errors that can occur while moving messages across the transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Socket-level send/receive failure
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The peer end of the channel has gone away
    #[error("Channel closed: {0}")]
    Closed(String),

    /// Message serialization/deserialization failed
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Transport backend was not compiled into this build
    #[error("Transport unavailable: {0}")]
    Unavailable(String),
}

impl TransportError {
    /// Creates a network error.
    pub fn network(msg: impl Into<String>) -> Self {
        Self::NetworkError(msg.into())
    }

    /// Creates a closed-channel error.
    pub fn closed(endpoint: impl std::fmt::Display) -> Self {
        Self::Closed(endpoint.to_string())
    }

    /// Returns true if the failure means no further messages can flow.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::SerializationError(_))
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}
