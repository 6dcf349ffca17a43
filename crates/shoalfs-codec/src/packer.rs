//! Binary packing and unpacking utilities.
//!
//! The packer accumulates bytes with an optional size ceiling; writes past
//! the ceiling latch an error instead of panicking, so a whole record can be
//! packed and the error checked once at the end. Output-buffer bounds in the
//! metadata server (the caller-sized stat list) rely on that latch.

use thiserror::Error;

use crate::MAX_STRING_LEN;

/// Errors that can occur during packing.
#[derive(Debug, Error)]
pub enum PackError {
    /// The string exceeds the maximum allowed length.
    #[error("string too long: {len} bytes exceeds max {max}")]
    StringTooLong { len: usize, max: usize },

    /// The packer would exceed its maximum size.
    #[error("packer overflow: need {needed} bytes but max is {max}")]
    Overflow { needed: usize, max: usize },
}

/// Errors that can occur during unpacking.
#[derive(Debug, Error)]
pub enum UnpackError {
    /// Not enough bytes remaining to unpack the requested type.
    #[error("insufficient bytes: need {needed} but only {remaining} remaining")]
    InsufficientBytes { needed: usize, remaining: usize },

    /// Invalid UTF-8 string.
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

/// A packer for serializing data to bytes.
///
/// All multi-byte integers are written in big-endian order.
///
/// # Examples
///
/// ```
/// use shoalfs_codec::Packer;
///
/// let mut packer = Packer::new(1024);
/// packer.pack_int(42);
/// packer.pack_str("hello");
///
/// let bytes = packer.into_bytes();
/// ```
#[derive(Debug)]
pub struct Packer {
    bytes: Vec<u8>,
    max_size: usize,
    error: Option<PackError>,
}

impl Packer {
    /// Creates a new packer with the given initial capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
            max_size: usize::MAX,
            error: None,
        }
    }

    /// Creates a new packer with a maximum size limit.
    #[must_use]
    pub fn with_max_size(capacity: usize, max_size: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity.min(max_size)),
            max_size,
            error: None,
        }
    }

    /// Returns true if an error has occurred.
    #[must_use]
    pub fn errored(&self) -> bool {
        self.error.is_some()
    }

    /// Returns the error if one occurred.
    #[must_use]
    pub fn error(&self) -> Option<&PackError> {
        self.error.as_ref()
    }

    /// Takes the error, leaving None in its place.
    pub fn take_error(&mut self) -> Option<PackError> {
        self.error.take()
    }

    /// Returns the current length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if the packer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns a reference to the packed bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes the packer and returns the packed bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Ensures there's room for additional bytes.
    fn expand(&mut self, additional: usize) {
        if self.error.is_some() {
            return;
        }

        let new_len = self.bytes.len().saturating_add(additional);
        if new_len > self.max_size {
            self.error = Some(PackError::Overflow {
                needed: new_len,
                max: self.max_size,
            });
        }
    }

    /// Packs a single byte.
    pub fn pack_byte(&mut self, val: u8) {
        self.expand(1);
        if self.error.is_none() {
            self.bytes.push(val);
        }
    }

    /// Packs a u16 (2 bytes, big-endian).
    pub fn pack_short(&mut self, val: u16) {
        self.expand(2);
        if self.error.is_none() {
            self.bytes.extend_from_slice(&val.to_be_bytes());
        }
    }

    /// Packs a u32 (4 bytes, big-endian).
    pub fn pack_int(&mut self, val: u32) {
        self.expand(4);
        if self.error.is_none() {
            self.bytes.extend_from_slice(&val.to_be_bytes());
        }
    }

    /// Packs a u64 (8 bytes, big-endian).
    pub fn pack_long(&mut self, val: u64) {
        self.expand(8);
        if self.error.is_none() {
            self.bytes.extend_from_slice(&val.to_be_bytes());
        }
    }

    /// Packs a string (2-byte length prefix + UTF-8 bytes).
    pub fn pack_str(&mut self, val: &str) {
        let len = val.len();
        if len > MAX_STRING_LEN {
            self.error = Some(PackError::StringTooLong {
                len,
                max: MAX_STRING_LEN,
            });
            return;
        }

        self.pack_short(len as u16);
        if self.error.is_none() {
            self.expand(len);
            if self.error.is_none() {
                self.bytes.extend_from_slice(val.as_bytes());
            }
        }
    }

    /// Packs fixed-size bytes (no length prefix).
    pub fn pack_fixed_bytes(&mut self, val: &[u8]) {
        self.expand(val.len());
        if self.error.is_none() {
            self.bytes.extend_from_slice(val);
        }
    }
}

impl Default for Packer {
    fn default() -> Self {
        Self::new(256)
    }
}

/// An unpacker for deserializing data from bytes.
///
/// All multi-byte integers are read in big-endian order.
///
/// # Examples
///
/// ```
/// use shoalfs_codec::Unpacker;
///
/// let bytes = [0, 0, 0, 42]; // Big-endian u32
/// let mut unpacker = Unpacker::new(&bytes);
/// let value = unpacker.unpack_int().unwrap();
/// assert_eq!(value, 42);
/// ```
#[derive(Debug)]
pub struct Unpacker<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Unpacker<'a> {
    /// Creates a new unpacker from a byte slice.
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    /// Returns the number of remaining bytes.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.offset)
    }

    /// Returns the current offset.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Returns true if all bytes have been consumed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Checks that there are enough bytes remaining.
    fn check_space(&self, needed: usize) -> Result<(), UnpackError> {
        let remaining = self.remaining();
        if remaining < needed {
            return Err(UnpackError::InsufficientBytes { needed, remaining });
        }
        Ok(())
    }

    /// Unpacks a single byte.
    pub fn unpack_byte(&mut self) -> Result<u8, UnpackError> {
        self.check_space(1)?;
        let val = self.bytes[self.offset];
        self.offset += 1;
        Ok(val)
    }

    /// Unpacks a u16 (2 bytes, big-endian).
    pub fn unpack_short(&mut self) -> Result<u16, UnpackError> {
        self.check_space(2)?;
        let val = u16::from_be_bytes([self.bytes[self.offset], self.bytes[self.offset + 1]]);
        self.offset += 2;
        Ok(val)
    }

    /// Unpacks a u32 (4 bytes, big-endian).
    pub fn unpack_int(&mut self) -> Result<u32, UnpackError> {
        self.check_space(4)?;
        let val = u32::from_be_bytes([
            self.bytes[self.offset],
            self.bytes[self.offset + 1],
            self.bytes[self.offset + 2],
            self.bytes[self.offset + 3],
        ]);
        self.offset += 4;
        Ok(val)
    }

    /// Unpacks a u64 (8 bytes, big-endian).
    pub fn unpack_long(&mut self) -> Result<u64, UnpackError> {
        self.check_space(8)?;
        let val = u64::from_be_bytes([
            self.bytes[self.offset],
            self.bytes[self.offset + 1],
            self.bytes[self.offset + 2],
            self.bytes[self.offset + 3],
            self.bytes[self.offset + 4],
            self.bytes[self.offset + 5],
            self.bytes[self.offset + 6],
            self.bytes[self.offset + 7],
        ]);
        self.offset += 8;
        Ok(val)
    }

    /// Unpacks a string (2-byte length prefix + UTF-8 bytes).
    pub fn unpack_string(&mut self) -> Result<String, UnpackError> {
        let len = self.unpack_short()? as usize;
        self.check_space(len)?;
        let bytes = self.bytes[self.offset..self.offset + len].to_vec();
        self.offset += len;
        Ok(String::from_utf8(bytes)?)
    }

    /// Unpacks fixed-size bytes (no length prefix).
    pub fn unpack_fixed_bytes<const N: usize>(&mut self) -> Result<[u8; N], UnpackError> {
        self.check_space(N)?;
        let mut arr = [0u8; N];
        arr.copy_from_slice(&self.bytes[self.offset..self.offset + N]);
        self.offset += N;
        Ok(arr)
    }

    /// Returns the remaining bytes without consuming them.
    #[must_use]
    pub fn peek_remaining(&self) -> &[u8] {
        &self.bytes[self.offset..]
    }
}
