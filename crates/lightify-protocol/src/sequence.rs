//! Request/response correlation by sequence number.
//!
//! The transport owns the counter and the pending table; this module only
//! reads the sequence field of a raw frame so a reader loop can route it
//! before paying for a full decode.

use bytes::Buf;

use crate::codec::{MIN_FRAME_LEN, SEQUENCE_OFFSET};
use crate::error::{ProtocolError, ProtocolResult};

/// Reads the sequence number from bytes 4..8 of a raw frame.
///
/// # Errors
///
/// `ShortBuffer` if the frame is shorter than the fixed header.
pub fn peek_sequence(frame: &[u8]) -> ProtocolResult<u32> {
    let mut slot = frame
        .get(SEQUENCE_OFFSET..MIN_FRAME_LEN)
        .ok_or_else(|| ProtocolError::short(MIN_FRAME_LEN, frame.len()))?;
    Ok(slot.get_u32_le())
}

/// Returns true if `frame` carries exactly `sequence`.
pub fn is_reply_to(frame: &[u8], sequence: u32) -> bool {
    peek_sequence(frame).is_ok_and(|found| found == sequence)
}
