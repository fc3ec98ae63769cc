//! Request Frame Decoder
//!
//! Clients send every command as an array of bulk strings:
//!
//! ```text
//! *<N>\r\n
//! $<L1>\r\n<L1 bytes>\r\n
//! ...
//! $<LN>\r\n<LN bytes>\r\n
//! ```
//!
//! The decoder is incremental. Given whatever bytes have arrived so far it
//! returns one of:
//! - `Ok(Some((frame, consumed)))` - a complete frame, `consumed` bytes used
//! - `Ok(None)` - the frame is incomplete, read more from the socket
//! - `Err(DecodeError)` - the bytes can never form a valid frame
//!
//! Any error is fatal for the connection: there is no resynchronisation
//! after a malformed frame.

use crate::protocol::types::{prefix, Frame, CRLF};
use bytes::Bytes;
use thiserror::Error;

/// Errors produced while decoding a request frame.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DecodeError {
    /// The frame did not start with `*`
    #[error("expected '*' at start of frame, got {0:#04x}")]
    MissingArrayPrefix(u8),

    /// An element did not start with `$`
    #[error("expected '$' at start of element, got {0:#04x}")]
    MissingBulkPrefix(u8),

    /// A count or length line was not a decimal integer
    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    #[error("invalid element count: {0}")]
    InvalidCount(i64),

    #[error("invalid bulk length: {0}")]
    InvalidBulkLength(i64),

    /// The element body was not followed by CRLF
    #[error("bulk string missing trailing CRLF")]
    MissingCrlf,

    #[error("bulk string too large: {size} bytes (max: {max})")]
    BulkTooLarge { size: usize, max: usize },
}

pub type DecodeResult<T> = Result<T, DecodeError>;

/// Maximum size for a single bulk string (512 MB)
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Incremental decoder for request frames.
///
/// # Example
///
/// ```
/// use snapkv::protocol::FrameDecoder;
///
/// let decoder = FrameDecoder::new();
/// let (frame, consumed) = decoder
///     .decode(b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n")
///     .unwrap()
///     .unwrap();
/// assert_eq!(frame.len(), 2);
/// assert_eq!(consumed, 23);
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameDecoder;

impl FrameDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Attempts to decode one frame from the start of `buf`.
    pub fn decode(&self, buf: &[u8]) -> DecodeResult<Option<(Frame, usize)>> {
        if buf.is_empty() {
            return Ok(None);
        }

        if buf[0] != prefix::ARRAY {
            return Err(DecodeError::MissingArrayPrefix(buf[0]));
        }

        let (count, mut consumed) = match read_length_line(buf)? {
            Some(line) => line,
            None => return Ok(None),
        };

        if count < 0 {
            return Err(DecodeError::InvalidCount(count));
        }

        let mut args = Vec::with_capacity((count as usize).min(64));

        for _ in 0..count {
            match self.decode_bulk(&buf[consumed..])? {
                Some((data, element_consumed)) => {
                    args.push(data);
                    consumed += element_consumed;
                }
                None => return Ok(None),
            }
        }

        Ok(Some((Frame::new(args), consumed)))
    }

    /// Decodes one `$<L>\r\n<data>\r\n` element.
    fn decode_bulk(&self, buf: &[u8]) -> DecodeResult<Option<(Bytes, usize)>> {
        if buf.is_empty() {
            return Ok(None);
        }

        if buf[0] != prefix::BULK_STRING {
            return Err(DecodeError::MissingBulkPrefix(buf[0]));
        }

        let (length, data_start) = match read_length_line(buf)? {
            Some(line) => line,
            None => return Ok(None),
        };

        if length < 0 {
            return Err(DecodeError::InvalidBulkLength(length));
        }

        let length = length as usize;
        if length > MAX_BULK_SIZE {
            return Err(DecodeError::BulkTooLarge {
                size: length,
                max: MAX_BULK_SIZE,
            });
        }

        let total_needed = data_start + length + 2;
        if buf.len() < total_needed {
            return Ok(None);
        }

        if &buf[data_start + length..total_needed] != CRLF {
            return Err(DecodeError::MissingCrlf);
        }

        let data = Bytes::copy_from_slice(&buf[data_start..data_start + length]);
        Ok(Some((data, total_needed)))
    }
}

/// Reads the integer between the one-byte prefix and the first CRLF.
///
/// Returns the value and the number of bytes up to and including the CRLF.
fn read_length_line(buf: &[u8]) -> DecodeResult<Option<(i64, usize)>> {
    let end = match find_crlf(&buf[1..]) {
        Some(pos) => pos,
        None => return Ok(None),
    };

    let line = &buf[1..1 + end];
    let value = std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| DecodeError::InvalidInteger(String::from_utf8_lossy(line).into_owned()))?;

    Ok(Some((value, 1 + end + 2)))
}

/// Finds the position of CRLF in the buffer.
#[inline]
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == CRLF)
}
