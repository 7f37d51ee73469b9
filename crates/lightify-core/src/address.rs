//! Device and group addresses.
//!
//! Every paired device is identified by an 8-byte hardware address. Groups
//! reuse the same slot: the gateway-assigned group number sits in the two low
//! bytes and the remaining six bytes are zero.
//!
//! On the wire the address is little-endian. The textual form prints the
//! most significant byte first, matching the label on the device:
//!
//! ```text
//! wire:  9C 8D 0C 00 00 26 18 84
//! text:  84:18:26:00:00:0C:8D:9C
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Length of an encoded address in bytes.
pub const ADDRESS_LEN: usize = 8;

/// Error returned when parsing an address from its textual form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressParseError {
    /// The text does not have exactly eight colon-separated parts.
    #[error("expected 8 colon-separated bytes, got {0}")]
    WrongLength(usize),

    /// One of the parts is not a one or two digit hex byte.
    #[error("invalid hex byte '{0}'")]
    InvalidByte(String),
}

/// An 8-byte device or group address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    /// Creates an address from bytes in wire order.
    pub const fn from_bytes(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// Creates an address from the first eight bytes of a slice.
    ///
    /// Returns `None` if the slice is shorter than eight bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let raw: [u8; ADDRESS_LEN] = bytes.get(..ADDRESS_LEN)?.try_into().ok()?;
        Some(Self(raw))
    }

    /// Creates the address of a group from its gateway-assigned number.
    pub const fn group(number: u16) -> Self {
        let n = number.to_le_bytes();
        Self([n[0], n[1], 0, 0, 0, 0, 0, 0])
    }

    /// Returns the raw bytes in wire order.
    pub const fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// Returns the address as the little-endian integer it is on the wire.
    pub const fn to_u64(&self) -> u64 {
        u64::from_le_bytes(self.0)
    }

    /// Returns true if this address targets a single physical device.
    ///
    /// Group addresses only use the two low bytes.
    pub fn is_unicast(&self) -> bool {
        self.0[2..].iter().any(|b| *b != 0)
    }

    /// Returns the group number if this is a group address.
    pub fn group_number(&self) -> Option<u16> {
        (!self.is_unicast()).then(|| u16::from_le_bytes([self.0[0], self.0[1]]))
    }
}

impl From<[u8; ADDRESS_LEN]> for Address {
    fn from(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().rev().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        if parts.len() != ADDRESS_LEN {
            return Err(AddressParseError::WrongLength(parts.len()));
        }

        let mut bytes = [0u8; ADDRESS_LEN];
        // Text is most significant first, wire order is the reverse.
        for (slot, part) in bytes.iter_mut().rev().zip(&parts) {
            if part.is_empty() || part.len() > 2 {
                return Err(AddressParseError::InvalidByte(part.to_string()));
            }
            *slot = u8::from_str_radix(part, 16)
                .map_err(|_| AddressParseError::InvalidByte(part.to_string()))?;
        }
        Ok(Self(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
