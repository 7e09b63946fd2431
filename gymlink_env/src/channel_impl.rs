//! In-process implementation of `Transport` using crossbeam channels.

use crate::error::TransportError;
use crate::transport::Transport;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

/// Default receive poll interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// One end of an in-memory duplex channel.
///
/// Used to drive the server from the same process (tests, embedding)
/// without opening a socket. Messages are delivered in send order.
pub struct ChannelTransport {
    /// Label used in logs
    name: String,

    /// Outgoing messages to the peer
    tx: Sender<Vec<u8>>,

    /// Incoming messages from the peer
    rx: Receiver<Vec<u8>>,

    /// Maximum time a single `receive` blocks
    poll_interval: Duration,
}

impl ChannelTransport {
    /// Creates a connected pair: `(server_end, client_end)`.
    pub fn pair() -> (Self, Self) {
        let (to_client, from_server) = channel::unbounded();
        let (to_server, from_client) = channel::unbounded();

        let server = Self {
            name: "channel:server".to_string(),
            tx: to_client,
            rx: from_client,
            poll_interval: DEFAULT_POLL_INTERVAL,
        };
        let client = Self {
            name: "channel:client".to_string(),
            tx: to_server,
            rx: from_server,
            poll_interval: DEFAULT_POLL_INTERVAL,
        };

        (server, client)
    }

    /// Sets the receive poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Blocks until a message arrives or the peer disconnects.
    pub fn receive_blocking(&mut self) -> Result<Vec<u8>, TransportError> {
        self.rx.recv().map_err(|_| TransportError::closed(&self.name))
    }
}

impl Transport for ChannelTransport {
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        self.tx
            .send(payload.to_vec())
            .map_err(|_| TransportError::closed(&self.name))
    }

    fn receive(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        match self.rx.recv_timeout(self.poll_interval) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(TransportError::closed(&self.name)),
        }
    }

    fn endpoint(&self) -> String {
        self.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pair_delivers_in_order() {
        let (mut server, mut client) = ChannelTransport::pair();

        client.send(b"first").unwrap();
        client.send(b"second").unwrap();

        assert_eq!(server.receive().unwrap().unwrap(), b"first".to_vec());
        assert_eq!(server.receive().unwrap().unwrap(), b"second".to_vec());
    }

    #[test]
    fn test_receive_times_out_without_message() {
        let (server, _client) = ChannelTransport::pair();
        let mut server = server.with_poll_interval(Duration::from_millis(5));

        assert!(server.receive().unwrap().is_none());
    }

    #[test]
    fn test_receive_fails_after_peer_drop() {
        let (mut server, client) = ChannelTransport::pair();
        drop(client);

        let err = server.receive().unwrap_err();
        assert!(matches!(err, TransportError::Closed(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_json_helpers() {
        let (mut server, mut client) = ChannelTransport::pair();

        client.send_json(&json!({"method": "info", "param": {}})).unwrap();
        let value: serde_json::Value = server.receive_json().unwrap().unwrap();

        assert_eq!(value["method"], "info");
    }

    #[test]
    fn test_handshake_is_json_string() {
        let (mut server, mut client) = ChannelTransport::pair();
        server.send_handshake().unwrap();

        let greeting: String = client.receive_json().unwrap().unwrap();
        assert_eq!(greeting, crate::HANDSHAKE);
    }
}
