//! Decoded light state.
//!
//! A [`DeviceSnapshot`] is produced fresh from every decoded response and
//! replaced wholesale on the next scan. It has no identity of its own; callers
//! pair it with the [`Address`](crate::Address) it was reported for.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when parsing a color from `#RRGGBB` or `#RRGGBBAA`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid color '{0}', expected #RRGGBB or #RRGGBBAA")]
pub struct ColorParseError(pub String);

/// An RGBA color as sent to and reported by the gateway.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    /// Creates a color from its four channels.
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Creates a fully opaque color.
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, u8::MAX)
    }

    /// Returns the channels in wire order.
    pub const fn to_bytes(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Creates a color from channels in wire order.
    pub const fn from_bytes(bytes: [u8; 4]) -> Self {
        Self::new(bytes[0], bytes[1], bytes[2], bytes[3])
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
    }
}

impl FromStr for Rgba {
    type Err = ColorParseError;

    /// Parses `#RRGGBB` (opaque) or `#RRGGBBAA`; the `#` is optional.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        let invalid = || ColorParseError(s.to_string());
        if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
            return Err(invalid());
        }

        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
        let alpha = if hex.len() == 8 { channel(6)? } else { u8::MAX };
        Ok(Self::new(channel(0)?, channel(2)?, channel(4)?, alpha))
    }
}

/// State of a single light as last reported by the gateway.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    /// Whether the gateway can currently reach the device.
    pub reachable: bool,
    /// Whether the light is switched on.
    pub power: bool,
    /// Brightness, 0-255.
    pub luminance: u8,
    /// Color temperature in Kelvin.
    pub temperature: u16,
    /// Current color.
    pub color: Rgba,
    /// Seconds since the gateway last heard from the device.
    pub seen_secs: u32,
    /// Whether the device is still joining the network.
    pub joining: bool,
}

impl DeviceSnapshot {
    /// Returns true if the light is reachable and switched on.
    pub fn is_lit(&self) -> bool {
        self.reachable && self.power
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgba_wire_order() {
        let color = Rgba::new(1, 2, 3, 4);
        assert_eq!(color.to_bytes(), [1, 2, 3, 4]);
        assert_eq!(Rgba::from_bytes([1, 2, 3, 4]), color);
    }

    #[test]
    fn rgba_display() {
        assert_eq!(Rgba::opaque(0xFF, 0x80, 0x00).to_string(), "#FF8000FF");
        assert_eq!(Rgba::default().to_string(), "#00000000");
    }

    #[test]
    fn rgba_parse() {
        assert_eq!("#FF8000".parse::<Rgba>(), Ok(Rgba::opaque(0xFF, 0x80, 0x00)));
        assert_eq!("0a0b0c0d".parse::<Rgba>(), Ok(Rgba::new(10, 11, 12, 13)));
        assert_eq!(
            "#FF80".parse::<Rgba>(),
            Err(ColorParseError("#FF80".to_string()))
        );
        assert!("#GG0000".parse::<Rgba>().is_err());
        assert!("#ÿÿÿ".parse::<Rgba>().is_err());
    }

    #[test]
    fn snapshot_is_lit() {
        let mut snapshot = DeviceSnapshot {
            reachable: true,
            power: true,
            ..Default::default()
        };
        assert!(snapshot.is_lit());

        snapshot.reachable = false;
        assert!(!snapshot.is_lit());
    }

    #[test]
    fn snapshot_serde() {
        let snapshot = DeviceSnapshot {
            reachable: true,
            power: false,
            luminance: 255,
            temperature: 2700,
            color: Rgba::opaque(10, 20, 30),
            seen_secs: 12,
            joining: false,
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains(r#""temperature":2700"#));

        let parsed: DeviceSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, snapshot);
    }
}
