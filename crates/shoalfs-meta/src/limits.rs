//! Fixed limits of the metadata server.

/// Maximum length of a full path, in bytes.
pub const PATH_MAX: usize = 4096;

/// Maximum length of a single path component, in bytes (exclusive bound:
/// components must be strictly shorter).
pub const PCOMP_MAX: usize = 256;

/// Highest usable node identifier. The upper byte of the id space is
/// reserved for future per-MDS partitioning and must not be repurposed.
pub const NID_MAX: u64 = 0xffff_ffff_ffff_0000;

/// Highest usable chunk identifier. Same reservation as [`NID_MAX`].
pub const CID_MAX: u64 = 0xffff_ffff_ffff_0000;

/// The node id of the root directory.
pub const ROOT_NID: u64 = 0;

/// Maximum number of replicas a chunk may carry.
pub const MAX_REPLICAS: usize = 7;

/// The superuser's uid. Permission checks do not apply to the superuser.
pub const SUPERUSER_UID: u32 = 0;

/// The superuser's primary gid.
pub const SUPERUSER_GID: u32 = 0;
