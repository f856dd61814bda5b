// MIT License - Copyright (c) 2021 TJForc
// TPI frame codec

//! Wire framing for the TPI protocol.
//!
//! ```text
//! CCC DATA... XX \r\n
//! ```
//!
//! `CCC` is a 3-digit command code, `DATA` is ASCII whose length is implied
//! by the command, `XX` is the checksum and the frame ends with CR/LF. There
//! is no length field; framing relies on the CR/LF delimiter alone.

use bytes::{BufMut, Bytes, BytesMut};

use crate::constants::CRLF;

/// A single frame received from the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// 3-character command code (shorter only for malformed lines)
    pub code: String,
    /// Data payload with the checksum stripped
    pub data: String,
    /// Checksum as received (not validated)
    pub checksum: String,
}

impl Frame {
    /// Whether the received checksum matches the one computed over
    /// code and data.
    pub fn checksum_matches(&self) -> bool {
        self.checksum.eq_ignore_ascii_case(&checksum(&self.code, &self.data))
    }
}

/// Compute the checksum for a command and its data.
///
/// Sum of the byte values of every character, masked to 8 bits, rendered as
/// two uppercase hex digits.
pub fn checksum(code: &str, data: &str) -> String {
    let sum = code
        .bytes()
        .chain(data.bytes())
        .fold(0u8, |acc, b| acc.wrapping_add(b));
    format!("{:02X}", sum)
}

/// Encode a command and its data into a complete frame.
pub fn encode(code: &str, data: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(code.len() + data.len() + 4);
    buf.put_slice(code.as_bytes());
    buf.put_slice(data.as_bytes());
    buf.put_slice(checksum(code, data).as_bytes());
    buf.put_slice(CRLF);
    buf.freeze()
}

/// Split the next complete frame off the front of `buffer`.
///
/// Returns `None` (leaving the buffer untouched) if no CR/LF has arrived yet.
pub fn decode_next(buffer: &mut BytesMut) -> Option<Frame> {
    let idx = buffer.windows(2).position(|w| w == CRLF)?;
    let line = buffer.split_to(idx + 2);
    let line = &line[..idx];

    let code_end = line.len().min(3);
    let checksum_start = line.len().saturating_sub(2).max(code_end);

    Some(Frame {
        code: String::from_utf8_lossy(&line[..code_end]).into_owned(),
        data: String::from_utf8_lossy(&line[code_end..checksum_start]).into_owned(),
        checksum: String::from_utf8_lossy(&line[checksum_start..]).into_owned(),
    })
}
