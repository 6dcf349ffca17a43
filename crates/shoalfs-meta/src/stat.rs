//! The stat wire record.
//!
//! Listdir and stat emit packed records into a caller-sized buffer:
//!
//! ```text
//! stat_len(2) mode_and_type(2) block_sz(4) mtime(8) atime(8) length(8)
//! man_repl(1) uid(4) gid(4) name(2-byte length prefix + bytes)
//! ```
//!
//! All integers big-endian; `stat_len` covers the whole record including
//! itself. A record is atomic: it is either appended whole or the call
//! fails with `NameTooLong`, leaving the caller to retry with more room.

use shoalfs_codec::{Packer, Unpacker};

use crate::error::MetaError;
use crate::node::NodePayload;

/// Packed size of the fixed header, excluding the name.
const STAT_FIXED_LEN: usize = 2 + 2 + 4 + 8 + 8 + 8 + 1 + 4 + 4;

/// Appends one stat record for `payload` under `name` to `out`.
///
/// `out` carries the caller's capacity ceiling; a record that does not fit
/// fails the whole call with [`MetaError::NameTooLong`].
pub(crate) fn append_stat(
    out: &mut Packer,
    name: &str,
    payload: &NodePayload,
    man_repl: u8,
) -> Result<(), MetaError> {
    let stat_len = STAT_FIXED_LEN + 2 + name.len();
    if stat_len > u16::MAX as usize {
        return Err(MetaError::NameTooLong);
    }
    out.pack_short(stat_len as u16);
    out.pack_short(payload.mode_and_type);
    out.pack_int(0); // block size: not sized yet
    out.pack_long(payload.mtime);
    out.pack_long(payload.atime);
    out.pack_long(payload.length);
    out.pack_byte(man_repl);
    out.pack_int(payload.uid);
    out.pack_int(payload.gid);
    out.pack_str(name);
    if let Some(err) = out.take_error() {
        return Err(err.into());
    }
    Ok(())
}

/// A decoded stat record, as consumed by clients and tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatRecord {
    /// IS_DIR flag plus permission bits.
    pub mode_and_type: u16,
    /// Block size; currently always 0.
    pub block_sz: u32,
    /// Modification time.
    pub mtime: u64,
    /// Access time.
    pub atime: u64,
    /// File length.
    pub length: u64,
    /// Mandated replication level.
    pub man_repl: u8,
    /// Owner uid.
    pub uid: u32,
    /// Owning gid.
    pub gid: u32,
    /// Entry name; empty for the root.
    pub name: String,
}

impl StatRecord {
    /// Returns whether the entry is a directory.
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.mode_and_type & crate::node::MODE_IS_DIR != 0
    }

    /// Returns the permission bits without the type flag.
    #[must_use]
    pub fn mode(&self) -> u16 {
        self.mode_and_type & !crate::node::MODE_IS_DIR
    }

    /// Decodes every record in a packed stat buffer.
    pub fn decode_all(data: &[u8]) -> Result<Vec<Self>, MetaError> {
        let mut unpacker = Unpacker::new(data);
        let mut records = Vec::new();
        while !unpacker.is_empty() {
            let start = unpacker.offset();
            let stat_len = unpacker.unpack_short()? as usize;
            let record = Self {
                mode_and_type: unpacker.unpack_short()?,
                block_sz: unpacker.unpack_int()?,
                mtime: unpacker.unpack_long()?,
                atime: unpacker.unpack_long()?,
                length: unpacker.unpack_long()?,
                man_repl: unpacker.unpack_byte()?,
                uid: unpacker.unpack_int()?,
                gid: unpacker.unpack_int()?,
                name: unpacker.unpack_string()?,
            };
            if unpacker.offset() - start != stat_len {
                return Err(MetaError::Io(format!(
                    "stat record claims {stat_len} bytes, consumed {}",
                    unpacker.offset() - start
                )));
            }
            records.push(record);
        }
        Ok(records)
    }
}
