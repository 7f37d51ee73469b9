//! Gateway error types.

use std::io;

use lightify_protocol::{CommandCode, ProtocolError};
use thiserror::Error;

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors that can occur while talking to a gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// IO error on the gateway socket.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Encoding, decoding or status error.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// No answer within the configured timeout.
    #[error("Timed out waiting for {operation}")]
    Timeout { operation: String },

    /// The gateway closed the connection while a request was pending.
    #[error("Gateway connection closed")]
    ConnectionClosed,

    /// The pending-request table is full.
    #[error("Too many pending requests (max: {max})")]
    TooManyPending { max: usize },

    /// A response decoded to a variant the command never produces.
    #[error("Unexpected response to {command}")]
    UnexpectedResponse { command: CommandCode },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl GatewayError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// Returns true if the gateway asked for a device enumeration before the
    /// next request.
    pub fn is_resync_required(&self) -> bool {
        matches!(self, Self::Protocol(e) if e.is_resync_required())
    }
}
