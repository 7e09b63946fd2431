//! gymlink Transport Abstraction Layer
//!
//! This crate provides the "Sans-IO" boundary between the environment
//! server and whatever carries its messages:
//! - **Transport**: blocking `send()` / `receive()` over one connection
//! - **Messages**: the request schema and the closed set of response envelopes
//!
//! The server core only ever talks to the `Transport` trait, so the same
//! dispatch loop runs over a ZeroMQ socket in production and over an
//! in-memory channel pair in tests.
//!
//! # Example
//!
//! ```ignore
//! use gymlink_env::{ChannelTransport, Transport, HANDSHAKE};
//!
//! let (mut server, mut client) = ChannelTransport::pair();
//! server.send(HANDSHAKE.as_bytes())?;
//! client.send_json(&serde_json::json!({"method": "info", "param": {}}))?;
//! ```

mod channel_impl;
mod error;
mod messages;
mod transport;

pub use channel_impl::{ChannelTransport, DEFAULT_POLL_INTERVAL};
pub use error::TransportError;
pub use messages::{
    ActionPayload, Done, DynamicsMessage, DynamicsParams, ErrorMessage, InfoMessage, MakeMessage,
    MakeParams, Method, Observation, Request, ResetMessage, Response, Reward, SpaceSize,
    StepMessage, StepParams,
};
pub use transport::{Transport, HANDSHAKE};
