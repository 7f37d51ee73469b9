//! Client error types.

use lightify_gateway::GatewayError;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Gateway connection or protocol error.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Output could not be rendered.
    #[error("output error: {0}")]
    Output(String),

    /// The gateway answered, but not with what the command needed.
    #[error("{0}")]
    Unavailable(String),
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Output(err.to_string())
    }
}
