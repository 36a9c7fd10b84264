//! # Perception Client
//!
//! Subscribes to the cone observation stream published by `per_exec`.
//!
//! The client follows the reactive-batch model: [`PerClient::wait_batch`]
//! blocks until at least one observation is available, then drains every
//! queued message so the caller always computes on a complete batch, never
//! on a partially-delivered one.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::warn;

use comms_if::{
    net::{zmq, MonitoredSocket, MonitoredSocketError, NetParams, SocketOptions},
    per::{ConeObs, PerMsg},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Perception client
pub struct PerClient {
    socket: MonitoredSocket,
}

/// One drained batch of observations.
#[derive(Debug, Clone, Default)]
pub struct ObsBatch {
    pub cones: Vec<ConeObs>,

    /// True if the stream's end marker was part of this batch.
    pub end_of_stream: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PerClientError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Could not recieve a message from the server: {0}")]
    RecvError(zmq::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl PerClient {
    /// Create a new instance of the perception client.
    ///
    /// This function will not block until the server connects.
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, PerClientError> {
        // Create the socket options. The receive timeout is infinite since
        // the batch loop is designed to block until data arrives.
        let socket_options = SocketOptions {
            block_on_first_connect: false,
            connect_timeout: 1000,
            heartbeat_ivl: 500,
            heartbeat_ttl: 1000,
            heartbeat_timeout: 1000,
            linger: 1,
            recv_timeout: -1,
            send_timeout: 10,
            ..Default::default()
        };

        // Connect the socket
        let socket = MonitoredSocket::new(ctx, zmq::SUB, socket_options, &params.per_endpoint)
            .map_err(PerClientError::SocketError)?;

        // Create self
        Ok(Self { socket })
    }

    /// Check if the client is connected to the server
    pub fn is_connected(&self) -> bool {
        self.socket.connected()
    }

    /// Block until at least one observation is available, then drain every
    /// queued message into a single batch.
    pub fn wait_batch(&self) -> Result<ObsBatch, PerClientError> {
        let mut batch = ObsBatch::default();

        // Block for the first message of the batch
        let first = match self.socket.recv_string(0) {
            Ok(Ok(s)) => s,
            Ok(Err(_)) => {
                warn!("Non UTF-8 message from the perception server");
                return Ok(batch);
            }
            Err(e) => return Err(PerClientError::RecvError(e)),
        };
        self.handle_message(&first, &mut batch);

        // Drain everything else that is already queued
        loop {
            match self.socket.recv_string(zmq::DONTWAIT) {
                Ok(Ok(s)) => self.handle_message(&s, &mut batch),
                Ok(Err(_)) => warn!("Non UTF-8 message from the perception server"),
                Err(zmq::Error::EAGAIN) => break,
                Err(e) => return Err(PerClientError::RecvError(e)),
            }
        }

        Ok(batch)
    }

    /// Parse one message into the batch. Malformed messages are dropped
    /// with a warning, the stream itself stays usable.
    fn handle_message(&self, msg: &str, batch: &mut ObsBatch) {
        match PerMsg::from_json(msg) {
            Ok(PerMsg::Cone(obs)) => batch.cones.push(obs),
            Ok(PerMsg::EndOfStream) => batch.end_of_stream = true,
            Err(e) => warn!("Could not parse perception message: {}", e),
        }
    }
}
