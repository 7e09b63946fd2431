//! ZeroMQ transport for the production server.
//!
//! The server connects a PAIR socket to the driver's bound endpoint and
//! exchanges one JSON document per message. Receives time out after the
//! poll interval so the serve loop can observe interrupts.

#[cfg(feature = "zmq")]
use gymlink_env::Transport;
use gymlink_env::{TransportError, DEFAULT_POLL_INTERVAL};
use std::time::Duration;

/// Port the driver binds by default.
pub const DEFAULT_PORT: u16 = 10201;

/// `tcp://127.0.0.1:<port>`
pub fn tcp_endpoint(port: u16) -> String {
    format!("tcp://127.0.0.1:{}", port)
}

#[cfg_attr(not(feature = "zmq"), allow(dead_code))]
fn poll_millis(poll_interval: Duration) -> i32 {
    poll_interval.as_millis().clamp(1, i32::MAX as u128) as i32
}

/// PAIR socket connected to the driver.
#[cfg(feature = "zmq")]
pub struct ZmqTransport {
    socket: zmq::Socket,
    _context: zmq::Context,
    endpoint: String,
}

#[cfg(feature = "zmq")]
impl ZmqTransport {
    /// Connects to `endpoint` with the default poll interval.
    pub fn connect(endpoint: &str) -> Result<Self, TransportError> {
        Self::connect_with_poll(endpoint, DEFAULT_POLL_INTERVAL)
    }

    /// Connects to `endpoint`; `receive` waits at most `poll_interval`.
    pub fn connect_with_poll(endpoint: &str, poll_interval: Duration) -> Result<Self, TransportError> {
        let context = zmq::Context::new();

        let socket = context
            .socket(zmq::PAIR)
            .map_err(|e| TransportError::network(e.to_string()))?;
        socket
            .set_rcvtimeo(poll_millis(poll_interval))
            .map_err(|e| TransportError::network(e.to_string()))?;
        // Don't block process exit on unsent replies
        socket
            .set_linger(0)
            .map_err(|e| TransportError::network(e.to_string()))?;
        socket
            .connect(endpoint)
            .map_err(|e| TransportError::network(format!("{}: {}", endpoint, e)))?;

        Ok(Self {
            socket,
            _context: context,
            endpoint: endpoint.to_string(),
        })
    }
}

#[cfg(feature = "zmq")]
impl Transport for ZmqTransport {
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        self.socket
            .send(payload, 0)
            .map_err(|e| TransportError::network(e.to_string()))
    }

    fn receive(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        match self.socket.recv_bytes(0) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(zmq::Error::EAGAIN) => Ok(None),
            Err(zmq::Error::ETERM) => Err(TransportError::closed("context terminated")),
            Err(e) => Err(TransportError::network(e.to_string())),
        }
    }

    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }
}

// ============================================================================
// NON-ZMQ FALLBACK (when the zmq feature is disabled)
// ============================================================================

/// Placeholder that refuses to connect when ZeroMQ is not compiled in.
///
/// No value of this type can be built: both constructors return
/// `TransportError::Unavailable`, so it does not implement `Transport`.
#[cfg(not(feature = "zmq"))]
pub struct ZmqTransport {
    _unconstructible: (),
}

#[cfg(not(feature = "zmq"))]
impl ZmqTransport {
    pub fn connect(endpoint: &str) -> Result<Self, TransportError> {
        Self::connect_with_poll(endpoint, DEFAULT_POLL_INTERVAL)
    }

    pub fn connect_with_poll(endpoint: &str, _poll_interval: Duration) -> Result<Self, TransportError> {
        Err(TransportError::Unavailable(format!(
            "cannot connect to {}: built without the `zmq` feature",
            endpoint
        )))
    }
}
