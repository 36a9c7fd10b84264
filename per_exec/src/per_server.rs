//! # Perception Server
//!
//! Publishes the cone observation stream over a PUB socket.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    net::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions},
    per::PerMsg,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Perception server
pub struct PerServer {
    socket: MonitoredSocket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PerServerError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Could not send the message: {0}")]
    SendError(zmq::Error),

    #[error("Could not serialize the message: {0}")]
    SerializationError(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl PerServer {
    /// Create a new instance of the perception server, bound to the given
    /// endpoint.
    ///
    /// This function will not block until a client connects.
    pub fn new(ctx: &zmq::Context, endpoint: &str) -> Result<Self, PerServerError> {
        // Create the socket options
        let socket_options = SocketOptions {
            block_on_first_connect: false,
            bind: true,
            connect_timeout: 1000,
            heartbeat_ivl: 500,
            heartbeat_ttl: 1000,
            heartbeat_timeout: 1000,
            linger: 1,
            recv_timeout: 10,
            send_timeout: 10,
            ..Default::default()
        };

        // Bind the socket
        let socket = MonitoredSocket::new(ctx, zmq::PUB, socket_options, endpoint)
            .map_err(PerServerError::SocketError)?;

        // Create self
        Ok(Self { socket })
    }

    /// Publish one message on the observation stream.
    pub fn publish(&self, msg: &PerMsg) -> Result<(), PerServerError> {
        let msg_str = msg.to_json().map_err(PerServerError::SerializationError)?;

        self.socket
            .send(&msg_str, 0)
            .map_err(PerServerError::SendError)
    }
}
