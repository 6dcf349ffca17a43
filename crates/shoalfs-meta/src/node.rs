//! Metadata nodes: the on-disk representation of files and directories.

use shoalfs_codec::{Packer, Unpacker};

use crate::error::MetaError;

/// High bit of `mode_and_type`: set for directories.
pub const MODE_IS_DIR: u16 = 0x8000;

/// Execute permission bit (per class).
pub const PERM_EXEC: u16 = 0o1;
/// Write permission bit (per class).
pub const PERM_WRITE: u16 = 0o2;
/// Read permission bit (per class).
pub const PERM_READ: u16 = 0o4;

/// Packed length of a node payload on disk.
pub const NODE_PAYLOAD_LEN: usize = 34;

/// The payload of a node record: everything the store knows about one file
/// or directory besides its name and children.
///
/// On disk this is a packed, big-endian record:
/// `mtime(8) atime(8) length(8) uid(4) gid(4) mode_and_type(2)`.
/// Directories carry `length = 0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePayload {
    /// Modification time, seconds since the epoch.
    pub mtime: u64,
    /// Access time, seconds since the epoch.
    pub atime: u64,
    /// File length in bytes; 0 for directories.
    pub length: u64,
    /// Owner uid.
    pub uid: u32,
    /// Owning gid.
    pub gid: u32,
    /// IS_DIR flag in the high bit, POSIX rwx bits in the low 9.
    pub mode_and_type: u16,
}

impl NodePayload {
    /// Returns whether this node is a directory.
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.mode_and_type & MODE_IS_DIR != 0
    }

    /// Returns the permission bits without the type flag.
    #[must_use]
    pub fn mode(&self) -> u16 {
        self.mode_and_type & !MODE_IS_DIR
    }

    /// Packs the payload into its on-disk form.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut packer = Packer::new(NODE_PAYLOAD_LEN);
        packer.pack_long(self.mtime);
        packer.pack_long(self.atime);
        packer.pack_long(self.length);
        packer.pack_int(self.uid);
        packer.pack_int(self.gid);
        packer.pack_short(self.mode_and_type);
        packer.into_bytes()
    }

    /// Decodes a payload from its on-disk form.
    pub fn decode(value: &[u8]) -> Result<Self, MetaError> {
        if value.len() != NODE_PAYLOAD_LEN {
            return Err(MetaError::Io(format!(
                "node payload has length {}, expected {NODE_PAYLOAD_LEN}",
                value.len()
            )));
        }
        let mut unpacker = Unpacker::new(value);
        Ok(Self {
            mtime: unpacker.unpack_long()?,
            atime: unpacker.unpack_long()?,
            length: unpacker.unpack_long()?,
            uid: unpacker.unpack_int()?,
            gid: unpacker.unpack_int()?,
            mode_and_type: unpacker.unpack_short()?,
        })
    }
}

/// A metadata node: the pairing of a node id with its payload.
#[derive(Debug, Clone)]
pub struct Node {
    /// Node id.
    pub nid: u64,
    /// Decoded record payload.
    pub payload: NodePayload,
}
