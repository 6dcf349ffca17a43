//! Binary serialization for shoalfs on-disk records and wire structures.
//!
//! Everything the metadata server persists or emits is packed byte-for-byte
//! in big-endian order, never through a native in-memory representation, so
//! a store written on one architecture reads identically on any other.
//!
//! # Wire format
//!
//! - `u8`: 1 byte
//! - `u16`: 2 bytes, big-endian
//! - `u32`: 4 bytes, big-endian
//! - `u64`: 8 bytes, big-endian
//! - `String`: 2-byte length prefix (u16) + UTF-8 bytes
//! - Fixed arrays: elements only (no length prefix)

mod packer;

pub use packer::{PackError, Packer, UnpackError, Unpacker};

/// Maximum string length (u16::MAX = 65535).
pub const MAX_STRING_LEN: usize = u16::MAX as usize;
