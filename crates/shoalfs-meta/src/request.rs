//! The tagged request and response types of the metadata store.
//!
//! Worker threads hand [`MetaRequest`] values to
//! [`MetaStore::do_operation`](crate::MetaStore::do_operation); each
//! operation carries its own payload and maps to one [`MetaResponse`]
//! shape on success.

/// One chunk of a file: its starting offset and chunk id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkInfo {
    /// Byte offset at which the chunk starts.
    pub start: u64,
    /// Chunk id.
    pub cid: u64,
}

/// A metadata operation and its payload.
///
/// Timestamps are supplied by the caller (the RPC layer stamps request
/// arrival time), not read from the server clock, so replays and tests are
/// deterministic. `None` times on [`MetaOp::Utimes`] mean "do not change".
#[derive(Debug, Clone)]
pub enum MetaOp {
    /// Create a file.
    Creat {
        /// Absolute path of the new file.
        path: String,
        /// Permission bits for the new file.
        mode: u16,
        /// Creation time; becomes both mtime and atime.
        ctime: u64,
    },
    /// Open a file for reading, updating its atime.
    Open {
        /// Absolute path of the file.
        path: String,
        /// New access time.
        atime: u64,
    },
    /// Create a directory and any missing ancestors.
    Mkdirs {
        /// Absolute path of the directory.
        path: String,
        /// Permission bits for each directory created.
        mode: u16,
        /// Creation time; becomes both mtime and atime.
        ctime: u64,
    },
    /// List a directory as packed stat records.
    Listdir {
        /// Absolute path of the directory.
        path: String,
        /// Output buffer capacity in bytes; the listing fails with
        /// `NameTooLong` if a record will not fit.
        out_cap: u32,
    },
    /// Stat one path as a packed stat record.
    Stat {
        /// Absolute path.
        path: String,
        /// Output buffer capacity in bytes.
        out_cap: u32,
    },
    /// Change permission bits. The type flag is preserved.
    Chmod {
        /// Absolute path.
        path: String,
        /// New permission bits.
        mode: u16,
    },
    /// Change owner and/or group.
    Chown {
        /// Absolute path.
        path: String,
        /// New owner's name, if changing.
        new_user: Option<String>,
        /// New group's name, if changing.
        new_group: Option<String>,
    },
    /// Change access and/or modification times.
    Utimes {
        /// Absolute path.
        path: String,
        /// New access time, or `None` to leave unchanged.
        atime: Option<u64>,
        /// New modification time, or `None` to leave unchanged.
        mtime: Option<u64>,
    },
    /// Remove a directory entry; recursive when `rmr` is set.
    Rmdir {
        /// Absolute path.
        path: String,
        /// Remove a whole subtree instead of failing on children.
        rmr: bool,
    },
    /// Find the chunks covering a byte range of a file.
    Chunkfind {
        /// Absolute path of the file.
        path: String,
        /// Start of the byte range.
        start: u64,
        /// End of the byte range (inclusive).
        end: u64,
        /// Maximum number of chunks to return.
        max_cinfos: usize,
    },
    /// Allocate a new chunk at the end of a file.
    Chunkalloc {
        /// Node id of the file (chunk allocation addresses nodes directly).
        nid: u64,
        /// Byte offset of the new chunk; must lie past every existing one.
        off: u64,
    },
    /// Soft-delete a subtree (reserved).
    SequesterTree {
        /// Absolute path.
        path: String,
    },
    /// Enumerate sequestered trees (reserved).
    FindSequestered,
    /// Reap sequestered trees past the grace period (reserved).
    DestroySequestered,
    /// Rename an entry (reserved).
    Rename {
        /// Absolute source path.
        src: String,
        /// Absolute destination path.
        dst: String,
    },
}

impl MetaOp {
    /// Returns the operation name for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Creat { .. } => "creat",
            Self::Open { .. } => "open",
            Self::Mkdirs { .. } => "mkdirs",
            Self::Listdir { .. } => "listdir",
            Self::Stat { .. } => "stat",
            Self::Chmod { .. } => "chmod",
            Self::Chown { .. } => "chown",
            Self::Utimes { .. } => "utimes",
            Self::Rmdir { .. } => "rmdir",
            Self::Chunkfind { .. } => "chunkfind",
            Self::Chunkalloc { .. } => "chunkalloc",
            Self::SequesterTree { .. } => "sequester_tree",
            Self::FindSequestered => "find_sequestered",
            Self::DestroySequestered => "destroy_sequestered",
            Self::Rename { .. } => "rename",
        }
    }

    /// Returns the path this operation resolves, if it is path-based.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Creat { path, .. }
            | Self::Open { path, .. }
            | Self::Mkdirs { path, .. }
            | Self::Listdir { path, .. }
            | Self::Stat { path, .. }
            | Self::Chmod { path, .. }
            | Self::Chown { path, .. }
            | Self::Utimes { path, .. }
            | Self::Rmdir { path, .. }
            | Self::Chunkfind { path, .. }
            | Self::SequesterTree { path } => Some(path),
            Self::Rename { src, .. } => Some(src),
            Self::Chunkalloc { .. } | Self::FindSequestered | Self::DestroySequestered => None,
        }
    }
}

/// A request to the metadata store.
#[derive(Debug, Clone)]
pub struct MetaRequest {
    /// Name of the requesting user; resolved through the user directory.
    pub user_name: String,
    /// The operation to perform.
    pub op: MetaOp,
}

impl MetaRequest {
    /// Creates a request on behalf of `user_name`.
    #[must_use]
    pub fn new(user_name: impl Into<String>, op: MetaOp) -> Self {
        Self {
            user_name: user_name.into(),
            op,
        }
    }
}

/// The successful result of a metadata operation.
#[derive(Debug, Clone)]
pub enum MetaResponse {
    /// The operation completed and returns nothing further.
    Done,
    /// A node id (creat, open).
    Nid(u64),
    /// Packed stat records (listdir, stat); see
    /// [`StatRecord`](crate::StatRecord) for the wire shape.
    Stats(Vec<u8>),
    /// Chunks covering the requested range, in ascending offset order.
    Chunks(Vec<ChunkInfo>),
    /// A freshly allocated chunk and its replica set.
    ChunkAlloc {
        /// The new chunk id.
        cid: u64,
        /// OSDs hosting the chunk.
        oids: Vec<crate::replica::Oid>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_op_names() {
        let op = MetaOp::Creat {
            path: "/f".into(),
            mode: 0o644,
            ctime: 0,
        };
        assert_eq!(op.name(), "creat");
        assert_eq!(MetaOp::FindSequestered.name(), "find_sequestered");
    }

    #[test]
    fn test_op_paths() {
        let op = MetaOp::Rmdir {
            path: "/a".into(),
            rmr: false,
        };
        assert_eq!(op.path(), Some("/a"));

        let op = MetaOp::Rename {
            src: "/a".into(),
            dst: "/b".into(),
        };
        assert_eq!(op.path(), Some("/a"));

        assert_eq!(MetaOp::Chunkalloc { nid: 1, off: 0 }.path(), None);
    }
}
