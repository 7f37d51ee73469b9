//! Protocol error types.

use thiserror::Error;

use crate::codec::{CommandCode, PacketType};
use crate::status::Status;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while encoding or decoding gateway messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Encoded message would not fit the 16-bit length prefix.
    #[error("message too long: {length} bytes (max: {max})")]
    MessageTooLong { length: usize, max: usize },

    /// Fewer bytes available than the frame declares or the field needs.
    #[error("short buffer: need {needed} bytes, got {available}")]
    ShortBuffer { needed: usize, available: usize },

    /// Packet type or command byte is not part of the known catalogue.
    #[error("malformed header: unknown {field} 0x{value:02X}")]
    MalformedHeader { field: &'static str, value: u8 },

    /// Well-formed response carrying a non-OK status.
    #[error("{command} rejected by gateway: {status}")]
    ProtocolStatus { status: Status, command: CommandCode },

    /// Response belongs to a different command than the one awaiting it.
    #[error("expected a {expected} response, got {actual}")]
    UnexpectedCommand {
        expected: CommandCode,
        actual: CommandCode,
    },

    /// A request arrived where a response was expected, or the reverse.
    #[error("unexpected {0} frame")]
    WrongDirection(PacketType),

    /// Request header lacks the address its command requires.
    #[error("{0} request requires an address")]
    MissingAddress(CommandCode),

    /// Header carries an address where the frame layout has no slot for it.
    #[error("{0} frame cannot carry this address")]
    UnexpectedAddress(CommandCode),
}

impl ProtocolError {
    /// Creates a short buffer error.
    pub fn short(needed: usize, available: usize) -> Self {
        Self::ShortBuffer { needed, available }
    }

    /// Returns true if the byte stream can no longer be trusted and the
    /// connection should be resynchronised.
    pub fn is_desync(&self) -> bool {
        matches!(
            self,
            Self::ShortBuffer { .. } | Self::MalformedHeader { .. } | Self::WrongDirection(_)
        )
    }

    /// Returns true if the gateway demands an enumerate-devices request next.
    pub fn is_resync_required(&self) -> bool {
        matches!(
            self,
            Self::ProtocolStatus {
                status: Status::ResyncRequired,
                ..
            }
        )
    }
}
