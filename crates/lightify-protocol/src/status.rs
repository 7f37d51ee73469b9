//! Response status codes.

use std::fmt;

/// Status byte carried by every gateway response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Ok,
    /// The request payload was rejected.
    IncorrectParameters,
    /// A group address was used with a unicast-only command, or the reverse.
    WrongType,
    /// The gateway requires the next request to enumerate devices.
    ResyncRequired,
    /// The gateway does not know the command.
    UnknownCommand,
    /// Any other value, preserved for diagnostics.
    Unknown(u8),
}

impl Status {
    /// Decodes a status byte. Never fails.
    pub const fn from_byte(byte: u8) -> Self {
        match byte {
            0x00 => Self::Ok,
            0x01 => Self::IncorrectParameters,
            0x15 => Self::WrongType,
            0x16 => Self::ResyncRequired,
            0xFF => Self::UnknownCommand,
            other => Self::Unknown(other),
        }
    }

    /// Returns the wire byte.
    pub const fn to_byte(self) -> u8 {
        match self {
            Self::Ok => 0x00,
            Self::IncorrectParameters => 0x01,
            Self::WrongType => 0x15,
            Self::ResyncRequired => 0x16,
            Self::UnknownCommand => 0xFF,
            Self::Unknown(raw) => raw,
        }
    }

    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Returns a human-readable description.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::IncorrectParameters => "incorrect parameters",
            Self::WrongType => "wrong address type",
            Self::ResyncRequired => "resync required",
            Self::UnknownCommand => "unknown command",
            Self::Unknown(_) => "unknown status",
        }
    }
}

impl From<u8> for Status {
    fn from(byte: u8) -> Self {
        Self::from_byte(byte)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02X})", self.description(), self.to_byte())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes() {
        assert_eq!(Status::from_byte(0x00), Status::Ok);
        assert_eq!(Status::from_byte(0x01), Status::IncorrectParameters);
        assert_eq!(Status::from_byte(0x15), Status::WrongType);
        assert_eq!(Status::from_byte(0x16), Status::ResyncRequired);
        assert_eq!(Status::from_byte(0xFF), Status::UnknownCommand);
    }

    #[test]
    fn unknown_code_keeps_raw_value() {
        let status = Status::from_byte(0x99);
        assert_eq!(status, Status::Unknown(0x99));
        assert_eq!(status.to_byte(), 0x99);
        assert!(!status.is_ok());
        assert_eq!(status.to_string(), "unknown status (0x99)");
    }

    #[test]
    fn every_byte_roundtrips() {
        for byte in 0..=u8::MAX {
            assert_eq!(Status::from_byte(byte).to_byte(), byte);
        }
    }
}
