//! Command catalogue.
//!
//! [`Command`] is the closed set of requests the gateway understands. Each
//! variant knows its header, how to encode its request payload and how to
//! decode the matching [`Response`]. The reverse direction (decoding requests,
//! encoding responses) is provided for gateway simulators.
//!
//! Response payload layouts, after the shared header:
//!
//! ```text
//! list devices   count u16, then count x 50-byte device records
//! list groups    count u16, then count x (number u16, name [u8; 16])
//! device info    u16, address, reachability u8, then state if reachability == 0
//! set *          u16, address
//! firmware       version [u8; 4]
//! wifi           count u8, then count x 54-byte profiles
//! ```

use std::fmt;
use std::net::Ipv4Addr;

use bytes::BufMut;
use lightify_core::{Address, DeviceSnapshot, Rgba};
use serde::{Serialize, Serializer};

use crate::codec::{self, CommandCode, Header, PacketType, PayloadCursor, put_fixed_str, put_name};
use crate::error::{ProtocolError, ProtocolResult};
use crate::status::Status;

/// Flag byte sent with both enumeration requests.
pub const LIST_FLAG: u8 = 0x01;

/// Encoded size of one device record in a device list.
pub const DEVICE_RECORD_LEN: usize = 50;

/// Encoded size of one group record in a group list.
pub const GROUP_RECORD_LEN: usize = 18;

/// Mode byte of a Wi-Fi configuration request: read, never write.
pub const WIFI_READ: u8 = 0x00;

/// Width of the SSID slot in a Wi-Fi profile.
pub const SSID_LEN: usize = 32;

/// Encoded size of one Wi-Fi profile.
pub const WIFI_PROFILE_LEN: usize = SSID_LEN + 6 + 4 + 3 * 4;

/// Four-byte firmware version, rendered as hex.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FirmwareVersion(pub [u8; 4]);

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.0;
        write!(f, "{:02X}{:02X}{:02X}{:02X}", a, b, c, d)
    }
}

impl Serialize for FirmwareVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Hardware address of a Wi-Fi access point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Bssid(pub [u8; 6]);

impl fmt::Display for Bssid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}

impl Serialize for Bssid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One stored network of the gateway's Wi-Fi configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WifiProfile {
    pub ssid: String,
    pub bssid: Bssid,
    pub channel: u32,
    pub ip: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub netmask: Ipv4Addr,
}

impl WifiProfile {
    fn decode(cursor: &mut PayloadCursor<'_>) -> ProtocolResult<Self> {
        Ok(Self {
            ssid: cursor.read_fixed_str(SSID_LEN)?,
            bssid: Bssid(cursor.read_array()?),
            channel: cursor.read_u32()?,
            ip: Ipv4Addr::from(cursor.read_array::<4>()?),
            gateway: Ipv4Addr::from(cursor.read_array::<4>()?),
            netmask: Ipv4Addr::from(cursor.read_array::<4>()?),
        })
    }

    fn encode(&self, buffer: &mut Vec<u8>) {
        put_fixed_str(buffer, &self.ssid, SSID_LEN);
        buffer.put_slice(&self.bssid.0);
        buffer.put_u32_le(self.channel);
        buffer.put_slice(&self.ip.octets());
        buffer.put_slice(&self.gateway.octets());
        buffer.put_slice(&self.netmask.octets());
    }
}

/// One entry of a device enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceRecord {
    pub address: Address,
    pub device_type: u8,
    pub firmware: FirmwareVersion,
    pub name: String,
    pub snapshot: DeviceSnapshot,
}

impl DeviceRecord {
    fn decode(cursor: &mut PayloadCursor<'_>) -> ProtocolResult<Self> {
        cursor.skip(2)?;
        let address = cursor.read_address()?;
        let device_type = cursor.read_u8()?;
        let firmware = FirmwareVersion(cursor.read_array()?);
        let reachable = cursor.read_u8()? != 0;
        // group membership
        cursor.skip(2)?;
        let power = cursor.read_u8()? != 0;
        let luminance = cursor.read_u8()?;
        let temperature = cursor.read_u16()?;
        let color = Rgba::from_bytes(cursor.read_array()?);
        let name = cursor.read_name()?;
        let seen_secs = cursor.read_u32()?;
        let joining = cursor.read_u32()? != 0;

        Ok(Self {
            address,
            device_type,
            firmware,
            name,
            snapshot: DeviceSnapshot {
                reachable,
                power,
                luminance,
                temperature,
                color,
                seen_secs,
                joining,
            },
        })
    }

    fn encode(&self, buffer: &mut Vec<u8>) {
        let state = &self.snapshot;
        buffer.put_u16_le(0);
        buffer.put_slice(self.address.as_bytes());
        buffer.put_u8(self.device_type);
        buffer.put_slice(&self.firmware.0);
        buffer.put_u8(u8::from(state.reachable));
        buffer.put_u16_le(0);
        buffer.put_u8(u8::from(state.power));
        buffer.put_u8(state.luminance);
        buffer.put_u16_le(state.temperature);
        buffer.put_slice(&state.color.to_bytes());
        put_name(buffer, &self.name);
        buffer.put_u32_le(state.seen_secs);
        buffer.put_u32_le(u32::from(state.joining));
    }
}

/// One entry of a group enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupRecord {
    pub number: u16,
    pub name: String,
}

impl GroupRecord {
    pub fn new(number: u16, name: impl Into<String>) -> Self {
        Self {
            number,
            name: name.into(),
        }
    }

    /// Returns the address used to target this group.
    pub fn address(&self) -> Address {
        Address::group(self.number)
    }

    fn decode(cursor: &mut PayloadCursor<'_>) -> ProtocolResult<Self> {
        let number = cursor.read_u16()?;
        let name = cursor.read_name()?;
        Ok(Self { number, name })
    }

    fn encode(&self, buffer: &mut Vec<u8>) {
        buffer.put_u16_le(self.number);
        put_name(buffer, &self.name);
    }
}

/// Answer to a device info poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceInfo {
    /// The device reported its current state.
    Fresh {
        address: Address,
        snapshot: DeviceSnapshot,
    },
    /// The device is momentarily busy. `reachability` is the raw non-zero
    /// byte the gateway sent.
    Busy { address: Address, reachability: u8 },
}

/// What the caller should do with a device info answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoOutcome {
    /// Fresh state to publish.
    Updated(DeviceSnapshot),
    /// Busy, and the device is still considered online: poll again.
    Retry,
    /// Busy and already offline: wait for the next full enumeration.
    GiveUp,
}

impl DeviceInfo {
    pub fn address(&self) -> Address {
        match self {
            Self::Fresh { address, .. } | Self::Busy { address, .. } => *address,
        }
    }

    pub fn snapshot(&self) -> Option<&DeviceSnapshot> {
        match self {
            Self::Fresh { snapshot, .. } => Some(snapshot),
            Self::Busy { .. } => None,
        }
    }

    /// Applies the busy-retry policy.
    ///
    /// A busy device is only worth polling again while `still_online` holds
    /// for it; once it is offline the gateway will not push fresh state until
    /// the device shows up in a full enumeration.
    pub fn outcome<F>(&self, still_online: F) -> InfoOutcome
    where
        F: FnOnce(&Address) -> bool,
    {
        match self {
            Self::Fresh { snapshot, .. } => InfoOutcome::Updated(*snapshot),
            Self::Busy { address, .. } if still_online(address) => InfoOutcome::Retry,
            Self::Busy { .. } => InfoOutcome::GiveUp,
        }
    }

    fn decode(cursor: &mut PayloadCursor<'_>) -> ProtocolResult<Self> {
        cursor.skip(2)?;
        let address = cursor.read_address()?;
        let reachability = cursor.read_u8()?;
        if reachability != 0 {
            return Ok(Self::Busy {
                address,
                reachability,
            });
        }

        cursor.skip(1)?;
        let power = cursor.read_u8()? != 0;
        let luminance = cursor.read_u8()?;
        let temperature = cursor.read_u16()?;
        let color = Rgba::from_bytes(cursor.read_array()?);
        cursor.skip(3)?;

        Ok(Self::Fresh {
            address,
            snapshot: DeviceSnapshot {
                reachable: true,
                power,
                luminance,
                temperature,
                color,
                seen_secs: 0,
                joining: false,
            },
        })
    }

    fn encode(&self, buffer: &mut Vec<u8>) {
        buffer.put_u16_le(0);
        buffer.put_slice(self.address().as_bytes());
        match self {
            Self::Busy { reachability, .. } => buffer.put_u8(*reachability),
            Self::Fresh { snapshot, .. } => {
                buffer.put_u8(0);
                buffer.put_u8(0);
                buffer.put_u8(u8::from(snapshot.power));
                buffer.put_u8(snapshot.luminance);
                buffer.put_u16_le(snapshot.temperature);
                buffer.put_slice(&snapshot.color.to_bytes());
                buffer.put_bytes(0, 3);
            }
        }
    }
}

/// Decoded response payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Devices(Vec<DeviceRecord>),
    Groups(Vec<GroupRecord>),
    DeviceInfo(DeviceInfo),
    /// Acknowledgement of a set command, echoing the target.
    Ack { address: Address },
    SceneActivated,
    Firmware(FirmwareVersion),
    Wifi(Vec<WifiProfile>),
}

impl Response {
    /// Decodes any response frame, dispatching on its command byte.
    ///
    /// # Errors
    ///
    /// Codec errors, `WrongDirection` for a request frame, and
    /// `ProtocolStatus` for a non-OK status.
    pub fn decode(frame: &[u8]) -> ProtocolResult<(Header, Response)> {
        Self::decode_checked(frame, None)
    }

    fn decode_checked(
        frame: &[u8],
        expected: Option<CommandCode>,
    ) -> ProtocolResult<(Header, Response)> {
        let (header, mut cursor) = codec::decode(frame)?;
        if !header.packet_type.is_response() {
            return Err(ProtocolError::WrongDirection(header.packet_type));
        }
        if let Some(expected) = expected
            && expected != header.command
        {
            return Err(ProtocolError::UnexpectedCommand {
                expected,
                actual: header.command,
            });
        }
        let status = header.status.unwrap_or(Status::Ok);
        if !status.is_ok() {
            return Err(ProtocolError::ProtocolStatus {
                status,
                command: header.command,
            });
        }

        let response = Self::decode_payload(header.command, &mut cursor)?;
        Ok((header, response))
    }

    fn decode_payload(command: CommandCode, cursor: &mut PayloadCursor<'_>) -> ProtocolResult<Self> {
        match command {
            CommandCode::ListDevices => {
                let count = usize::from(cursor.read_u16()?);
                let mut devices =
                    Vec::with_capacity(count.min(cursor.remaining().len() / DEVICE_RECORD_LEN));
                for _ in 0..count {
                    devices.push(DeviceRecord::decode(cursor)?);
                }
                Ok(Self::Devices(devices))
            }
            CommandCode::ListGroups => {
                let count = usize::from(cursor.read_u16()?);
                let mut groups =
                    Vec::with_capacity(count.min(cursor.remaining().len() / GROUP_RECORD_LEN));
                for _ in 0..count {
                    groups.push(GroupRecord::decode(cursor)?);
                }
                Ok(Self::Groups(groups))
            }
            CommandCode::DeviceInfo => DeviceInfo::decode(cursor).map(Self::DeviceInfo),
            CommandCode::SetLuminance
            | CommandCode::SetPower
            | CommandCode::SetTemperature
            | CommandCode::SetColor => {
                cursor.skip(2)?;
                Ok(Self::Ack {
                    address: cursor.read_address()?,
                })
            }
            CommandCode::ActivateScene => Ok(Self::SceneActivated),
            CommandCode::GatewayFirmware => Ok(Self::Firmware(FirmwareVersion(cursor.read_array()?))),
            CommandCode::WifiConfiguration => {
                let count = usize::from(cursor.read_u8()?);
                let mut profiles = Vec::with_capacity(count);
                for _ in 0..count {
                    profiles.push(WifiProfile::decode(cursor)?);
                }
                Ok(Self::Wifi(profiles))
            }
        }
    }

    fn encode_payload(&self, buffer: &mut Vec<u8>) {
        match self {
            Self::Devices(devices) => {
                buffer.put_u16_le(devices.len() as u16);
                for device in devices {
                    device.encode(buffer);
                }
            }
            Self::Groups(groups) => {
                buffer.put_u16_le(groups.len() as u16);
                for group in groups {
                    group.encode(buffer);
                }
            }
            Self::DeviceInfo(info) => info.encode(buffer),
            Self::Ack { address } => {
                buffer.put_u16_le(0);
                buffer.put_slice(address.as_bytes());
            }
            Self::SceneActivated => {}
            Self::Firmware(version) => buffer.put_slice(&version.0),
            Self::Wifi(profiles) => {
                let count = profiles.len().min(usize::from(u8::MAX));
                buffer.put_u8(count as u8);
                for profile in &profiles[..count] {
                    profile.encode(buffer);
                }
            }
        }
    }
}

/// A request to the gateway.
///
/// Transition times are in tenths of a second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ListDevices,
    ListGroups,
    DeviceInfo {
        address: Address,
    },
    SetPower {
        target: Address,
        on: bool,
    },
    SetLuminance {
        target: Address,
        luminance: u8,
        transition: u16,
    },
    SetTemperature {
        target: Address,
        kelvin: u16,
        transition: u16,
    },
    SetColor {
        target: Address,
        color: Rgba,
        transition: u16,
    },
    ActivateScene {
        scene: u8,
    },
    GatewayFirmware,
    WifiConfiguration,
}

impl Command {
    /// Creates a SetPower command.
    pub fn set_power(target: Address, on: bool) -> Self {
        Self::SetPower { target, on }
    }

    /// Creates a SetLuminance command.
    pub fn set_luminance(target: Address, luminance: u8, transition: u16) -> Self {
        Self::SetLuminance {
            target,
            luminance,
            transition,
        }
    }

    /// Creates a SetTemperature command.
    pub fn set_temperature(target: Address, kelvin: u16, transition: u16) -> Self {
        Self::SetTemperature {
            target,
            kelvin,
            transition,
        }
    }

    /// Creates a SetColor command.
    pub fn set_color(target: Address, color: Rgba, transition: u16) -> Self {
        Self::SetColor {
            target,
            color,
            transition,
        }
    }

    pub fn code(&self) -> CommandCode {
        match self {
            Self::ListDevices => CommandCode::ListDevices,
            Self::ListGroups => CommandCode::ListGroups,
            Self::DeviceInfo { .. } => CommandCode::DeviceInfo,
            Self::SetPower { .. } => CommandCode::SetPower,
            Self::SetLuminance { .. } => CommandCode::SetLuminance,
            Self::SetTemperature { .. } => CommandCode::SetTemperature,
            Self::SetColor { .. } => CommandCode::SetColor,
            Self::ActivateScene { .. } => CommandCode::ActivateScene,
            Self::GatewayFirmware => CommandCode::GatewayFirmware,
            Self::WifiConfiguration => CommandCode::WifiConfiguration,
        }
    }

    /// Returns the address carried in the request header, if any.
    pub fn target(&self) -> Option<Address> {
        match self {
            Self::DeviceInfo { address } => Some(*address),
            Self::SetPower { target, .. }
            | Self::SetLuminance { target, .. }
            | Self::SetTemperature { target, .. }
            | Self::SetColor { target, .. } => Some(*target),
            Self::ListDevices
            | Self::ListGroups
            | Self::ActivateScene { .. }
            | Self::GatewayFirmware
            | Self::WifiConfiguration => None,
        }
    }

    pub fn packet_type(&self) -> PacketType {
        match (self, self.target()) {
            (Self::ActivateScene { .. }, _) => PacketType::GroupRequest,
            (_, Some(target)) if !target.is_unicast() => PacketType::GroupRequest,
            _ => PacketType::UnicastRequest,
        }
    }

    /// Returns true for the periodic background polls, which log quietly.
    pub fn is_poll(&self) -> bool {
        matches!(
            self,
            Self::ListDevices | Self::ListGroups | Self::DeviceInfo { .. }
        )
    }

    pub fn header(&self, sequence: u32) -> Header {
        Header::request(self.packet_type(), self.code(), sequence, self.target())
    }

    /// Appends the request payload.
    pub fn encode_payload(&self, buffer: &mut Vec<u8>) {
        match self {
            Self::ListDevices | Self::ListGroups => buffer.put_u8(LIST_FLAG),
            Self::DeviceInfo { .. } | Self::GatewayFirmware => {}
            Self::SetPower { on, .. } => buffer.put_u8(u8::from(*on)),
            Self::SetLuminance {
                luminance,
                transition,
                ..
            } => {
                buffer.put_u8(*luminance);
                buffer.put_u16_le(*transition);
            }
            Self::SetTemperature {
                kelvin, transition, ..
            } => {
                buffer.put_u16_le(*kelvin);
                buffer.put_u16_le(*transition);
            }
            Self::SetColor {
                color, transition, ..
            } => {
                buffer.put_slice(&color.to_bytes());
                buffer.put_u16_le(*transition);
            }
            Self::ActivateScene { scene } => buffer.put_u8(*scene),
            Self::WifiConfiguration => buffer.put_u8(WIFI_READ),
        }
    }

    /// Encodes the complete request frame.
    pub fn encode(&self, sequence: u32) -> ProtocolResult<Vec<u8>> {
        let mut payload = Vec::new();
        self.encode_payload(&mut payload);
        codec::encode(&self.header(sequence), &payload)
    }

    /// Decodes a response frame to this command.
    ///
    /// # Errors
    ///
    /// Codec errors, `UnexpectedCommand` if the frame answers another command,
    /// and `ProtocolStatus` for a non-OK status.
    pub fn decode_response(&self, frame: &[u8]) -> ProtocolResult<Response> {
        Response::decode_checked(frame, Some(self.code())).map(|(_, response)| response)
    }

    /// Decodes a request frame, returning its sequence number and command.
    pub fn decode(frame: &[u8]) -> ProtocolResult<(u32, Command)> {
        let (header, mut cursor) = codec::decode(frame)?;
        if header.packet_type.is_response() {
            return Err(ProtocolError::WrongDirection(header.packet_type));
        }
        let target = || {
            header
                .address
                .ok_or(ProtocolError::MissingAddress(header.command))
        };

        let command = match header.command {
            CommandCode::ListDevices => {
                cursor.read_u8()?;
                Self::ListDevices
            }
            CommandCode::ListGroups => {
                cursor.read_u8()?;
                Self::ListGroups
            }
            CommandCode::DeviceInfo => Self::DeviceInfo { address: target()? },
            CommandCode::SetPower => Self::SetPower {
                target: target()?,
                on: cursor.read_u8()? != 0,
            },
            CommandCode::SetLuminance => Self::SetLuminance {
                target: target()?,
                luminance: cursor.read_u8()?,
                transition: cursor.read_u16()?,
            },
            CommandCode::SetTemperature => Self::SetTemperature {
                target: target()?,
                kelvin: cursor.read_u16()?,
                transition: cursor.read_u16()?,
            },
            CommandCode::SetColor => Self::SetColor {
                target: target()?,
                color: Rgba::from_bytes(cursor.read_array()?),
                transition: cursor.read_u16()?,
            },
            CommandCode::ActivateScene => Self::ActivateScene {
                scene: cursor.read_u8()?,
            },
            CommandCode::GatewayFirmware => Self::GatewayFirmware,
            CommandCode::WifiConfiguration => {
                cursor.read_u8()?;
                Self::WifiConfiguration
            }
        };
        Ok((header.sequence, command))
    }

    /// Encodes a successful response to this command.
    pub fn encode_response(&self, sequence: u32, response: &Response) -> ProtocolResult<Vec<u8>> {
        let mut payload = Vec::new();
        response.encode_payload(&mut payload);
        let header = Header::response(
            self.packet_type().response(),
            self.code(),
            sequence,
            Status::Ok,
        );
        codec::encode(&header, &payload)
    }

    /// Encodes a payload-less failure response to this command.
    pub fn encode_failure(&self, sequence: u32, status: Status) -> ProtocolResult<Vec<u8>> {
        let header = Header::response(self.packet_type().response(), self.code(), sequence, status);
        codec::encode(&header, &[])
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())?;
        if let Some(target) = self.target() {
            write!(f, " {}", target)?;
        }
        match self {
            Self::SetPower { on, .. } => write!(f, " {}", if *on { "on" } else { "off" }),
            Self::SetLuminance { luminance, .. } => write!(f, " {}", luminance),
            Self::SetTemperature { kelvin, .. } => write!(f, " {}K", kelvin),
            Self::SetColor { color, .. } => write!(f, " {}", color),
            Self::ActivateScene { scene } => write!(f, " {}", scene),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BULB: Address = Address::from_bytes([0x9C, 0x8D, 0x0C, 0x00, 0x00, 0x26, 0x18, 0x84]);
    const LAMP: Address = Address::from_bytes([0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88]);

    fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }

    fn all_commands() -> Vec<Command> {
        vec![
            Command::ListDevices,
            Command::ListGroups,
            Command::DeviceInfo { address: BULB },
            Command::set_power(BULB, true),
            Command::set_power(Address::group(1), false),
            Command::set_luminance(BULB, 0, 0),
            Command::set_luminance(Address::group(4), 255, u16::MAX),
            Command::set_temperature(BULB, 0, 10),
            Command::set_temperature(BULB, u16::MAX, 0),
            Command::set_color(BULB, Rgba::new(0, 0, 0, 0), 5),
            Command::set_color(Address::group(9), Rgba::new(255, 255, 255, 255), 5),
            Command::ActivateScene { scene: 3 },
            Command::GatewayFirmware,
            Command::WifiConfiguration,
        ]
    }

    fn record(address: Address, name: &str) -> DeviceRecord {
        DeviceRecord {
            address,
            device_type: 10,
            firmware: FirmwareVersion([0x01, 0x02, 0x03, 0xAB]),
            name: name.to_string(),
            snapshot: DeviceSnapshot {
                reachable: true,
                power: true,
                luminance: 255,
                temperature: 65535,
                color: Rgba::new(255, 0, 128, 255),
                seen_secs: 3,
                joining: false,
            },
        }
    }

    #[test]
    fn every_request_roundtrips() {
        for (i, command) in all_commands().into_iter().enumerate() {
            let sequence = 1000 + i as u32;
            let frame = command.encode(sequence).unwrap();
            assert_eq!(
                Command::decode(&frame).unwrap(),
                (sequence, command),
                "{}",
                command
            );
        }
    }

    #[test]
    fn request_headers() {
        assert_eq!(
            Command::set_power(BULB, true).packet_type(),
            PacketType::UnicastRequest
        );
        assert_eq!(
            Command::set_power(Address::group(2), true).packet_type(),
            PacketType::GroupRequest
        );
        assert_eq!(
            Command::ActivateScene { scene: 1 }.packet_type(),
            PacketType::GroupRequest
        );
        assert_eq!(Command::ListDevices.header(5).address, None);
        assert_eq!(Command::DeviceInfo { address: BULB }.header(5).address, Some(BULB));
    }

    #[test]
    fn set_luminance_layout() {
        let frame = Command::set_luminance(BULB, 0x80, 0x0102).encode(9).unwrap();
        insta::assert_snapshot!(hex(&frame), @"11000031090000009c8d0c0000261884800201");
    }

    #[test]
    fn list_devices_layout() {
        let frame = Command::ListDevices.encode(1).unwrap();
        insta::assert_snapshot!(hex(&frame), @"070000130100000001");
    }

    #[test]
    fn poll_classification() {
        assert!(Command::ListDevices.is_poll());
        assert!(Command::ListGroups.is_poll());
        assert!(Command::DeviceInfo { address: BULB }.is_poll());
        assert!(!Command::set_power(BULB, true).is_poll());
        assert!(!Command::GatewayFirmware.is_poll());
    }

    #[test]
    fn device_list_roundtrip() {
        let devices = vec![record(BULB, "Desk"), record(LAMP, "Sixteen chars!!!")];
        let response = Response::Devices(devices.clone());
        let frame = Command::ListDevices.encode_response(77, &response).unwrap();

        // header + count + two records
        assert_eq!(frame.len(), 9 + 2 + 2 * DEVICE_RECORD_LEN);
        assert_eq!(Command::ListDevices.decode_response(&frame).unwrap(), response);
    }

    #[test]
    fn device_record_boundaries() {
        let mut low = record(BULB, "");
        low.snapshot = DeviceSnapshot {
            joining: true,
            ..DeviceSnapshot::default()
        };
        let response = Response::Devices(vec![low]);
        let frame = Command::ListDevices.encode_response(1, &response).unwrap();
        assert_eq!(Command::ListDevices.decode_response(&frame).unwrap(), response);
    }

    #[test]
    fn group_list_layout() {
        let response = Response::Groups(vec![GroupRecord::new(3, "Kitchen")]);
        let frame = Command::ListGroups.encode_response(1, &response).unwrap();
        insta::assert_snapshot!(
            hex(&frame),
            @"1b00011e0100000000010003004b69746368656e000000000000000000"
        );
        assert_eq!(Command::ListGroups.decode_response(&frame).unwrap(), response);
    }

    #[test]
    fn group_record_address() {
        let group = GroupRecord::new(12, "Hall");
        assert_eq!(group.address(), Address::group(12));
    }

    #[test]
    fn empty_lists() {
        for (command, response) in [
            (Command::ListDevices, Response::Devices(Vec::new())),
            (Command::ListGroups, Response::Groups(Vec::new())),
        ] {
            let frame = command.encode_response(1, &response).unwrap();
            assert_eq!(command.decode_response(&frame).unwrap(), response);
        }
    }

    #[test]
    fn truncated_device_list_is_short_buffer() {
        let response = Response::Devices(vec![record(BULB, "Desk")]);
        let mut frame = Command::ListDevices.encode_response(1, &response).unwrap();
        frame.truncate(frame.len() - 4);
        // Fix up the prefix so only the record itself is short.
        let body = (frame.len() - 2) as u16;
        frame[..2].copy_from_slice(&body.to_le_bytes());

        assert!(matches!(
            Command::ListDevices.decode_response(&frame),
            Err(ProtocolError::ShortBuffer { .. })
        ));
    }

    #[test]
    fn fresh_device_info() {
        let command = Command::DeviceInfo { address: BULB };
        let snapshot = DeviceSnapshot {
            reachable: true,
            power: true,
            luminance: 200,
            temperature: 2700,
            color: Rgba::new(1, 2, 3, 4),
            seen_secs: 0,
            joining: false,
        };
        let info = DeviceInfo::Fresh {
            address: BULB,
            snapshot,
        };
        let frame = command.encode_response(5, &Response::DeviceInfo(info)).unwrap();
        assert_eq!(frame.len(), 9 + 2 + 8 + 13);

        let decoded = command.decode_response(&frame).unwrap();
        assert_eq!(decoded, Response::DeviceInfo(info));
        assert_eq!(info.outcome(|_| false), InfoOutcome::Updated(snapshot));
    }

    #[test]
    fn device_info_boundaries() {
        let command = Command::DeviceInfo { address: BULB };
        for (luminance, temperature, channel) in [(0, 0, 0), (255, u16::MAX, 255)] {
            let snapshot = DeviceSnapshot {
                reachable: true,
                power: luminance != 0,
                luminance,
                temperature,
                color: Rgba::new(channel, channel, channel, channel),
                seen_secs: 0,
                joining: false,
            };
            let response = Response::DeviceInfo(DeviceInfo::Fresh {
                address: BULB,
                snapshot,
            });
            let frame = command.encode_response(u32::MAX, &response).unwrap();
            assert_eq!(command.decode_response(&frame).unwrap(), response);
        }
    }

    #[test]
    fn busy_device_info_is_retryable() {
        let command = Command::DeviceInfo { address: BULB };
        let info = DeviceInfo::Busy {
            address: BULB,
            reachability: 1,
        };
        let frame = command.encode_response(5, &Response::DeviceInfo(info)).unwrap();

        let Response::DeviceInfo(decoded) = command.decode_response(&frame).unwrap() else {
            panic!("expected device info");
        };
        assert_eq!(decoded, info);
        assert_eq!(decoded.snapshot(), None);
        assert_eq!(decoded.outcome(|address| *address == BULB), InfoOutcome::Retry);
        assert_eq!(decoded.outcome(|_| false), InfoOutcome::GiveUp);
    }

    #[test]
    fn set_commands_ack_with_address() {
        for command in [
            Command::set_power(LAMP, true),
            Command::set_luminance(LAMP, 10, 0),
            Command::set_temperature(LAMP, 4000, 0),
            Command::set_color(LAMP, Rgba::opaque(1, 2, 3), 0),
        ] {
            let response = Response::Ack { address: LAMP };
            let frame = command.encode_response(8, &response).unwrap();
            assert_eq!(command.decode_response(&frame).unwrap(), response);
        }
    }

    #[test]
    fn group_set_commands_ack_as_group_response() {
        let group = Address::group(u16::MAX);
        for command in [
            Command::set_power(group, false),
            Command::set_luminance(group, 0, 0),
            Command::set_luminance(group, 255, u16::MAX),
            Command::set_temperature(group, 0, 0),
            Command::set_temperature(group, u16::MAX, u16::MAX),
            Command::set_color(group, Rgba::new(0, 0, 0, 0), 0),
            Command::set_color(group, Rgba::new(255, 255, 255, 255), u16::MAX),
        ] {
            let response = Response::Ack { address: group };
            let frame = command.encode_response(1, &response).unwrap();
            assert_eq!(frame[2], PacketType::GroupResponse.to_byte());
            assert_eq!(command.decode_response(&frame).unwrap(), response, "{}", command);
        }
    }

    #[test]
    fn scene_and_firmware() {
        let scene = Command::ActivateScene { scene: 2 };
        let frame = scene.encode_response(1, &Response::SceneActivated).unwrap();
        assert_eq!(scene.decode_response(&frame).unwrap(), Response::SceneActivated);

        let version = FirmwareVersion([0x01, 0x02, 0x6F, 0x0A]);
        let frame = Command::GatewayFirmware
            .encode_response(2, &Response::Firmware(version))
            .unwrap();
        assert_eq!(
            Command::GatewayFirmware.decode_response(&frame).unwrap(),
            Response::Firmware(version)
        );
        assert_eq!(version.to_string(), "01026F0A");
    }

    fn profile(ssid: &str) -> WifiProfile {
        WifiProfile {
            ssid: ssid.to_string(),
            bssid: Bssid([0x00, 0x1A, 0x2B, 0x3C, 0x4D, 0xFF]),
            channel: 11,
            ip: Ipv4Addr::new(192, 168, 1, 20),
            gateway: Ipv4Addr::new(192, 168, 1, 1),
            netmask: Ipv4Addr::new(255, 255, 255, 0),
        }
    }

    #[test]
    fn wifi_request_layout() {
        let frame = Command::WifiConfiguration.encode(2).unwrap();
        insta::assert_snapshot!(hex(&frame), @"070000e30200000000");
        assert!(!Command::WifiConfiguration.is_poll());
    }

    #[test]
    fn wifi_configuration_roundtrip() {
        let response = Response::Wifi(vec![
            profile("HomeNet"),
            profile("A very long network name that is cut"),
        ]);
        let frame = Command::WifiConfiguration
            .encode_response(4, &response)
            .unwrap();
        assert_eq!(frame.len(), 9 + 1 + 2 * WIFI_PROFILE_LEN);

        let Response::Wifi(profiles) = Command::WifiConfiguration.decode_response(&frame).unwrap()
        else {
            panic!("expected wifi profiles");
        };
        assert_eq!(profiles[0], profile("HomeNet"));
        assert_eq!(profiles[1].ssid, "A very long network name that is");
        assert_eq!(profiles[1].bssid.to_string(), "00:1A:2B:3C:4D:FF");
    }

    #[test]
    fn empty_wifi_configuration() {
        let response = Response::Wifi(Vec::new());
        let frame = Command::WifiConfiguration
            .encode_response(1, &response)
            .unwrap();
        assert_eq!(
            Command::WifiConfiguration.decode_response(&frame).unwrap(),
            response
        );
    }

    #[test]
    fn wifi_profile_serializes_for_output() {
        let json = serde_json::to_value(profile("HomeNet")).unwrap();
        assert_eq!(json["bssid"], "00:1A:2B:3C:4D:FF");
        assert_eq!(json["ip"], "192.168.1.20");
    }

    #[test]
    fn resync_status_surfaces_as_error() {
        let command = Command::set_power(BULB, true);
        let frame = command.encode_failure(3, Status::from_byte(0x16)).unwrap();
        assert_eq!(
            command.decode_response(&frame),
            Err(ProtocolError::ProtocolStatus {
                status: Status::ResyncRequired,
                command: CommandCode::SetPower,
            })
        );
    }

    #[test]
    fn unknown_status_keeps_raw_value() {
        let command = Command::GatewayFirmware;
        let frame = command.encode_failure(3, Status::from_byte(0x99)).unwrap();
        let error = command.decode_response(&frame).unwrap_err();
        assert_eq!(
            error,
            ProtocolError::ProtocolStatus {
                status: Status::Unknown(0x99),
                command: CommandCode::GatewayFirmware,
            }
        );
    }

    #[test]
    fn response_to_other_command_is_rejected() {
        let frame = Command::ListGroups
            .encode_response(1, &Response::Groups(Vec::new()))
            .unwrap();
        assert_eq!(
            Command::ListDevices.decode_response(&frame),
            Err(ProtocolError::UnexpectedCommand {
                expected: CommandCode::ListDevices,
                actual: CommandCode::ListGroups,
            })
        );
    }

    #[test]
    fn request_is_not_a_response() {
        let frame = Command::ListDevices.encode(1).unwrap();
        assert_eq!(
            Response::decode(&frame),
            Err(ProtocolError::WrongDirection(PacketType::UnicastRequest))
        );

        let reply = Command::ListDevices
            .encode_response(1, &Response::Devices(Vec::new()))
            .unwrap();
        assert_eq!(
            Command::decode(&reply),
            Err(ProtocolError::WrongDirection(PacketType::UnicastResponse))
        );
    }

    #[test]
    fn display() {
        assert_eq!(
            Command::set_power(BULB, false).to_string(),
            "set power 84:18:26:00:00:0C:8D:9C off"
        );
        assert_eq!(Command::ListGroups.to_string(), "list groups");
        assert_eq!(
            Command::set_temperature(Address::group(1), 2700, 0).to_string(),
            "set temperature 00:00:00:00:00:00:00:01 2700K"
        );
    }

    #[test]
    fn device_record_serializes_for_output() {
        let json = serde_json::to_value(record(BULB, "Desk")).unwrap();
        assert_eq!(json["address"], "84:18:26:00:00:0C:8D:9C");
        assert_eq!(json["firmware"], "010203AB");
        assert_eq!(json["snapshot"]["luminance"], 255);
    }
}
