//! Transport abstraction between the environment server and its driver.

use crate::error::TransportError;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Fixed text the server sends immediately after connecting.
pub const HANDSHAKE: &str = "Connection established";

/// Point-to-point, ordered, request/response message channel.
///
/// # Implementations
///
/// - **Production**: ZeroMQ PAIR socket (`gymlink_core::ZmqTransport`)
/// - **In-process**: crossbeam channel pair (`ChannelTransport`)
///
/// # Message Flow
///
/// ```text
/// Driver                    Transport                   Server
///   |                           |                          |
///   |                           |<------- handshake -------|
///   |-- request --------------->|                          |
///   |                           |-------- receive() ------>|
///   |                           |<------- send(reply) -----|
///   |<-- reply -----------------|                          |
/// ```
pub trait Transport: Send {
    /// Sends one complete message.
    ///
    /// # Returns
    /// * `Ok(())` - Message handed to the channel
    /// * `Err(TransportError)` - The channel can no longer deliver messages
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError>;

    /// Waits for the next message.
    ///
    /// # Returns
    /// * `Ok(Some(bytes))` - A message arrived
    /// * `Ok(None)` - The poll interval elapsed without a message
    /// * `Err(TransportError)` - The channel failed or was closed
    ///
    /// # Blocking
    /// Blocks for at most one poll interval so callers can observe
    /// shutdown requests between messages.
    fn receive(&mut self) -> Result<Option<Vec<u8>>, TransportError>;

    /// Human-readable description of the connected endpoint.
    fn endpoint(&self) -> String;

    /// Serializes `value` as JSON and sends it.
    fn send_json<T: Serialize>(&mut self, value: &T) -> Result<(), TransportError>
    where
        Self: Sized,
    {
        let bytes = serde_json::to_vec(value)?;
        self.send(&bytes)
    }

    /// Sends [`HANDSHAKE`] as a JSON string.
    fn send_handshake(&mut self) -> Result<(), TransportError>
    where
        Self: Sized,
    {
        self.send_json(&HANDSHAKE)
    }

    /// Receives a message and decodes it from JSON.
    fn receive_json<T: DeserializeOwned>(&mut self) -> Result<Option<T>, TransportError>
    where
        Self: Sized,
    {
        match self.receive()? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        (**self).send(payload)
    }

    fn receive(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        (**self).receive()
    }

    fn endpoint(&self) -> String {
        (**self).endpoint()
    }
}
