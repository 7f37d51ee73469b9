//! Binary framing for gateway messages.
//!
//! Every message starts with a little-endian length prefix that counts the
//! bytes following it. Requests may carry a target address; responses carry a
//! status byte at the same offset instead:
//!
//! ```text
//! request:  | len u16 | type u8 | cmd u8 | seq u32 | address [u8; 8] (opt) | payload |
//! response: | len u16 | type u8 | cmd u8 | seq u32 | status u8             | payload |
//! ```
//!
//! All multi-byte integers are little-endian.

use std::fmt;

use bytes::{Buf, BufMut};
use lightify_core::{ADDRESS_LEN, Address};

use crate::error::{ProtocolError, ProtocolResult};
use crate::status::Status;

/// Size of the length prefix.
pub const LENGTH_PREFIX_LEN: usize = 2;

/// Offset of the sequence number within a frame.
pub const SEQUENCE_OFFSET: usize = 4;

/// Smallest possible frame: prefix, packet type, command and sequence.
pub const MIN_FRAME_LEN: usize = SEQUENCE_OFFSET + 4;

/// Largest value the length prefix can hold.
pub const MAX_BODY_LEN: usize = u16::MAX as usize;

/// Width of every name field.
pub const NAME_LEN: usize = 16;

/// Direction and addressing mode of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    UnicastRequest = 0x00,
    UnicastResponse = 0x01,
    GroupRequest = 0x02,
    GroupResponse = 0x03,
}

impl PacketType {
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::UnicastRequest),
            0x01 => Some(Self::UnicastResponse),
            0x02 => Some(Self::GroupRequest),
            0x03 => Some(Self::GroupResponse),
            _ => None,
        }
    }

    pub const fn to_byte(self) -> u8 {
        self as u8
    }

    pub const fn is_response(self) -> bool {
        self.to_byte() & 0x01 != 0
    }

    pub const fn is_group(self) -> bool {
        self.to_byte() & 0x02 != 0
    }

    /// Returns the response type matching this request type.
    pub const fn response(self) -> Self {
        match self {
            Self::UnicastRequest | Self::UnicastResponse => Self::UnicastResponse,
            Self::GroupRequest | Self::GroupResponse => Self::GroupResponse,
        }
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::UnicastRequest => "unicast request",
            Self::UnicastResponse => "unicast response",
            Self::GroupRequest => "group request",
            Self::GroupResponse => "group response",
        })
    }
}

/// Command byte of the gateway protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum CommandCode {
    ListDevices = 0x13,
    ListGroups = 0x1E,
    SetLuminance = 0x31,
    SetPower = 0x32,
    SetTemperature = 0x33,
    SetColor = 0x36,
    ActivateScene = 0x52,
    DeviceInfo = 0x68,
    GatewayFirmware = 0x6F,
    WifiConfiguration = 0xE3,
}

impl CommandCode {
    /// Every command the codec understands.
    pub const ALL: [CommandCode; 10] = [
        Self::ListDevices,
        Self::ListGroups,
        Self::SetLuminance,
        Self::SetPower,
        Self::SetTemperature,
        Self::SetColor,
        Self::ActivateScene,
        Self::DeviceInfo,
        Self::GatewayFirmware,
        Self::WifiConfiguration,
    ];

    pub fn from_byte(byte: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|code| code.to_byte() == byte)
    }

    pub const fn to_byte(self) -> u8 {
        self as u8
    }

    /// Returns true if requests for this command carry a target address in
    /// the header.
    pub const fn carries_address(self) -> bool {
        matches!(
            self,
            Self::SetLuminance
                | Self::SetPower
                | Self::SetTemperature
                | Self::SetColor
                | Self::DeviceInfo
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ListDevices => "list devices",
            Self::ListGroups => "list groups",
            Self::SetLuminance => "set luminance",
            Self::SetPower => "set power",
            Self::SetTemperature => "set temperature",
            Self::SetColor => "set color",
            Self::ActivateScene => "activate scene",
            Self::DeviceInfo => "device info",
            Self::GatewayFirmware => "gateway firmware",
            Self::WifiConfiguration => "wifi configuration",
        }
    }
}

impl fmt::Display for CommandCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decoded frame header.
///
/// `status` is only present on responses and `address` only on requests
/// whose command carries one. The encoder ignores a status on a request and
/// rejects an address where it does not belong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub packet_type: PacketType,
    pub command: CommandCode,
    pub sequence: u32,
    pub status: Option<Status>,
    pub address: Option<Address>,
}

impl Header {
    /// Creates a request header.
    pub fn request(
        packet_type: PacketType,
        command: CommandCode,
        sequence: u32,
        address: Option<Address>,
    ) -> Self {
        Self {
            packet_type,
            command,
            sequence,
            status: None,
            address,
        }
    }

    /// Creates a response header.
    pub fn response(
        packet_type: PacketType,
        command: CommandCode,
        sequence: u32,
        status: Status,
    ) -> Self {
        Self {
            packet_type,
            command,
            sequence,
            status: Some(status),
            address: None,
        }
    }

    /// Returns the encoded header size including the length prefix.
    pub fn encoded_len(&self) -> usize {
        let tail = if self.packet_type.is_response() {
            1
        } else if self.command.carries_address() {
            ADDRESS_LEN
        } else {
            0
        };
        MIN_FRAME_LEN + tail
    }
}

/// Encodes a header and payload into a complete frame.
///
/// # Errors
///
/// `MessageTooLong` if the frame would not fit the length prefix,
/// `MissingAddress` for a request whose command needs an address but has
/// none, and `UnexpectedAddress` for an address on any other header.
pub fn encode(header: &Header, payload: &[u8]) -> ProtocolResult<Vec<u8>> {
    let is_response = header.packet_type.is_response();
    let wants_address = !is_response && header.command.carries_address();
    match (wants_address, header.address.is_some()) {
        (true, false) => return Err(ProtocolError::MissingAddress(header.command)),
        (false, true) => return Err(ProtocolError::UnexpectedAddress(header.command)),
        _ => {}
    }

    let total = header.encoded_len() + payload.len();
    let body = total - LENGTH_PREFIX_LEN;
    if body > MAX_BODY_LEN {
        return Err(ProtocolError::MessageTooLong {
            length: body,
            max: MAX_BODY_LEN,
        });
    }

    let mut buffer = Vec::with_capacity(total);
    buffer.put_u16_le(body as u16);
    buffer.put_u8(header.packet_type.to_byte());
    buffer.put_u8(header.command.to_byte());
    buffer.put_u32_le(header.sequence);
    if is_response {
        buffer.put_u8(header.status.unwrap_or(Status::Ok).to_byte());
    } else if let Some(address) = header.address {
        buffer.put_slice(address.as_bytes());
    }
    buffer.put_slice(payload);
    Ok(buffer)
}

/// Returns the total frame length (prefix included) declared by the first
/// two bytes of `data`.
pub fn frame_len(data: &[u8]) -> ProtocolResult<usize> {
    let mut prefix = data
        .get(..LENGTH_PREFIX_LEN)
        .ok_or_else(|| ProtocolError::short(LENGTH_PREFIX_LEN, data.len()))?;
    Ok(LENGTH_PREFIX_LEN + prefix.get_u16_le() as usize)
}

/// Decodes the header of one complete frame.
///
/// Bytes past the declared length are ignored. The returned cursor is
/// positioned at the first payload byte.
pub fn decode(data: &[u8]) -> ProtocolResult<(Header, PayloadCursor<'_>)> {
    let declared = frame_len(data)?;
    if data.len() < declared {
        return Err(ProtocolError::short(declared, data.len()));
    }

    let mut cursor = PayloadCursor::new(&data[..declared], LENGTH_PREFIX_LEN);
    let type_byte = cursor.read_u8()?;
    let packet_type = PacketType::from_byte(type_byte).ok_or(ProtocolError::MalformedHeader {
        field: "packet type",
        value: type_byte,
    })?;
    let command_byte = cursor.read_u8()?;
    let command = CommandCode::from_byte(command_byte).ok_or(ProtocolError::MalformedHeader {
        field: "command",
        value: command_byte,
    })?;
    let sequence = cursor.read_u32()?;

    let header = if packet_type.is_response() {
        let status = Status::from_byte(cursor.read_u8()?);
        Header::response(packet_type, command, sequence, status)
    } else {
        let address = if command.carries_address() {
            Some(cursor.read_address()?)
        } else {
            None
        };
        Header::request(packet_type, command, sequence, address)
    };

    Ok((header, cursor))
}

/// Rewrites the sequence number of an already encoded frame in place.
pub fn restamp_sequence(frame: &mut [u8], sequence: u32) -> ProtocolResult<()> {
    let available = frame.len();
    let slot = frame
        .get_mut(SEQUENCE_OFFSET..MIN_FRAME_LEN)
        .ok_or(ProtocolError::short(MIN_FRAME_LEN, available))?;
    slot.copy_from_slice(&sequence.to_le_bytes());
    Ok(())
}

/// Writes a name into a fixed 16-byte, zero-padded slot.
///
/// Longer names are cut at the last character boundary that fits.
pub fn put_name(buffer: &mut Vec<u8>, name: &str) {
    put_fixed_str(buffer, name, NAME_LEN);
}

/// Writes `text` into a zero-padded slot of `width` bytes.
pub fn put_fixed_str(buffer: &mut Vec<u8>, text: &str, width: usize) {
    let mut end = text.len().min(width);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    buffer.put_slice(&text.as_bytes()[..end]);
    buffer.put_bytes(0, width - end);
}

/// Bounds-checked reader over a frame.
///
/// Errors report absolute frame offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadCursor<'a> {
    frame: &'a [u8],
    position: usize,
}

impl<'a> PayloadCursor<'a> {
    /// Creates a cursor over `frame` starting at `position`.
    pub fn new(frame: &'a [u8], position: usize) -> Self {
        Self { frame, position }
    }

    /// Returns the absolute offset of the next byte.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Returns the unread bytes.
    pub fn remaining(&self) -> &'a [u8] {
        &self.frame[self.position.min(self.frame.len())..]
    }

    pub fn is_empty(&self) -> bool {
        self.remaining().is_empty()
    }

    fn take(&mut self, n: usize) -> ProtocolResult<&'a [u8]> {
        let end = self.position + n;
        let bytes = self
            .frame
            .get(self.position..end)
            .ok_or(ProtocolError::short(end, self.frame.len()))?;
        self.position = end;
        Ok(bytes)
    }

    pub fn skip(&mut self, n: usize) -> ProtocolResult<()> {
        self.take(n).map(|_| ())
    }

    pub fn read_u8(&mut self) -> ProtocolResult<u8> {
        Ok(self.take(1)?.get_u8())
    }

    pub fn read_u16(&mut self) -> ProtocolResult<u16> {
        Ok(self.take(2)?.get_u16_le())
    }

    pub fn read_u32(&mut self) -> ProtocolResult<u32> {
        Ok(self.take(4)?.get_u32_le())
    }

    pub fn read_array<const N: usize>(&mut self) -> ProtocolResult<[u8; N]> {
        let mut out = [0u8; N];
        self.take(N)?.copy_to_slice(&mut out);
        Ok(out)
    }

    pub fn read_address(&mut self) -> ProtocolResult<Address> {
        self.read_array::<ADDRESS_LEN>().map(Address::from_bytes)
    }

    /// Reads a fixed 16-byte name, stopping at the first NUL and trimming
    /// trailing padding.
    pub fn read_name(&mut self) -> ProtocolResult<String> {
        self.read_fixed_str(NAME_LEN)
    }

    /// Reads a zero-padded text slot of `width` bytes.
    pub fn read_fixed_str(&mut self, width: usize) -> ProtocolResult<String> {
        let raw = self.take(width)?;
        let end = raw.iter().position(|b| *b == 0).unwrap_or(width);
        Ok(String::from_utf8_lossy(&raw[..end]).trim_end().to_string())
    }
}
