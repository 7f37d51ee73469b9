//! Wire codec and message catalogue for the Lightify gateway protocol.
//!
//! # Protocol Overview
//!
//! Every message is a little-endian, length-prefixed binary frame:
//!
//! ```text
//! u16  length of everything that follows
//! u8   packet type (unicast/group, request/response)
//! u8   command
//! u32  sequence number
//! u8   status            (responses only)
//! [u8; 8] address        (requests for addressed commands only)
//! ...  payload
//! ```
//!
//! # Example
//!
//! ```rust
//! use lightify_protocol::{Command, Response};
//!
//! let frame = Command::ListGroups.encode(1).unwrap();
//! assert_eq!(frame.len(), 9);
//!
//! let reply = Command::ListGroups
//!     .encode_response(1, &Response::Groups(Vec::new()))
//!     .unwrap();
//! assert_eq!(
//!     Command::ListGroups.decode_response(&reply).unwrap(),
//!     Response::Groups(Vec::new())
//! );
//! ```

pub mod codec;
mod error;
mod message;
mod sequence;
mod status;

pub use codec::{CommandCode, Header, PacketType, PayloadCursor};
pub use error::{ProtocolError, ProtocolResult};
pub use message::{
    Bssid, Command, DEVICE_RECORD_LEN, DeviceInfo, DeviceRecord, FirmwareVersion,
    GROUP_RECORD_LEN, GroupRecord, InfoOutcome, LIST_FLAG, Response, SSID_LEN, WIFI_PROFILE_LEN,
    WIFI_READ, WifiProfile,
};
pub use sequence::{is_reply_to, peek_sequence};
pub use status::Status;

/// TCP port the gateway listens on.
pub const DEFAULT_PORT: u16 = 4000;
