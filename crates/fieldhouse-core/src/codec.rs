//! Field Record Wire Format
//!
//! This module implements the fixed-layout binary header and footer that
//! frame every field record.
//!
//! ## Record Layout
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │ Header (12 bytes)                             │
//! │ - size: i32    (bytes of body+footer, plus 4) │
//! │ - time: f32    (snapshot time, 7 decimals)    │
//! │ - length: i32  (element count of the body)    │
//! ├───────────────────────────────────────────────┤
//! │ Body (length × f32)                           │
//! ├───────────────────────────────────────────────┤
//! │ Footer (4 bytes)                              │
//! │ - length: i32  (redundant element count)      │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! All integers and floats are little-endian, fixed explicitly so the
//! format reads the same on every platform.
//!
//! ## The Size Invariant
//!
//! A header's `size` field reports the byte span of the record *excluding*
//! the header's own `size` and `time` fields:
//!
//! ```text
//! size == HEADER_SIZE + 4 * length + FOOTER_SIZE - 8
//! ```
//!
//! A header violating this invariant is structural corruption and fails to
//! construct; it is never silently coerced. The redundant footer length is
//! the format's only other integrity check; there is no checksum.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{Error, Result};

/// Byte size of a field header
pub const HEADER_SIZE: usize = 12;

/// Byte size of a field footer
pub const FOOTER_SIZE: usize = 4;

/// Total record size for a body of `length` elements
pub fn field_size(length: usize) -> usize {
    HEADER_SIZE + 4 * length + FOOTER_SIZE
}

/// Round a snapshot time to 7 decimals for stable equality and ordering
pub fn round_time(time: f32) -> f32 {
    ((f64::from(time) * 1e7).round() / 1e7) as f32
}

/// A field header
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Header {
    size: i32,
    time: f32,
    length: i32,
}

impl Header {
    /// Create a header, validating the size invariant
    pub fn new(size: i32, time: f32, length: i32) -> Result<Self> {
        if length < 0 {
            return Err(Error::InvalidHeader { size, length });
        }

        let expected = field_size(length as usize) as i64 - 8;
        if i64::from(size) != expected {
            return Err(Error::InvalidHeader { size, length });
        }

        Ok(Self {
            size,
            time: round_time(time),
            length,
        })
    }

    /// Build the header for a body of `length` elements (writer side)
    pub fn for_body(time: f32, length: usize) -> Self {
        Self {
            size: (4 * length + 8) as i32,
            time: round_time(time),
            length: length as i32,
        }
    }

    /// Parse a header from the leading bytes of a field record
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(Error::TruncatedField {
                needed: HEADER_SIZE,
                got: data.len(),
            });
        }

        let mut cursor = &data[..HEADER_SIZE];
        let size = cursor.get_i32_le();
        let time = cursor.get_f32_le();
        let length = cursor.get_i32_le();

        Header::new(size, time, length)
    }

    /// Encode the header, byte-exact inverse of `from_bytes`
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE);
        buf.put_i32_le(self.size);
        buf.put_f32_le(self.time);
        buf.put_i32_le(self.length);

        let mut bytes = [0u8; HEADER_SIZE];
        bytes.copy_from_slice(&buf);
        bytes
    }

    /// Snapshot time, rounded to 7 decimals
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Element count of the body
    pub fn body_length(&self) -> usize {
        self.length as usize
    }

    /// Raw `size` field as stored on disk
    pub fn size(&self) -> i32 {
        self.size
    }

    /// Total byte span of header + body + footer
    pub fn field_size(&self) -> usize {
        field_size(self.length as usize)
    }
}

/// A field footer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footer {
    length: i32,
}

impl Footer {
    pub fn new(length: usize) -> Self {
        Self {
            length: length as i32,
        }
    }

    /// Parse a footer from the trailing bytes of a field record
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < FOOTER_SIZE {
            return Err(Error::TruncatedField {
                needed: FOOTER_SIZE,
                got: data.len(),
            });
        }

        let mut cursor = &data[..FOOTER_SIZE];
        Ok(Self {
            length: cursor.get_i32_le(),
        })
    }

    pub fn to_bytes(&self) -> [u8; FOOTER_SIZE] {
        self.length.to_le_bytes()
    }

    /// Element count as stored in the footer
    pub fn body_length(&self) -> i32 {
        self.length
    }
}
