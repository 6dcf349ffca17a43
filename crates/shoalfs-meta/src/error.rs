//! Metadata store error types.
//!
//! Operations fail with POSIX-flavored errors; the RPC layer above the
//! store turns them into negative errno values via [`MetaError::errno`].

use shoalfs_codec::{PackError, UnpackError};
use shoalfs_db::DatabaseError;
use thiserror::Error;

/// Errors returned by metadata store operations.
#[derive(Debug, Error)]
pub enum MetaError {
    /// A path component does not exist.
    #[error("no such file or directory")]
    NotFound,

    /// The creation target already exists.
    #[error("file exists")]
    Exists,

    /// A directory was expected but a file was found.
    #[error("not a directory")]
    NotDir,

    /// A file was expected but a directory was found.
    #[error("is a directory")]
    IsDir,

    /// The caller lacks permission for the operation.
    #[error("permission denied")]
    PermissionDenied,

    /// Non-recursive removal of a non-empty directory.
    #[error("directory not empty")]
    NotEmpty,

    /// A path, component, or output record exceeds its bound.
    #[error("name too long")]
    NameTooLong,

    /// A malformed argument or on-disk record.
    #[error("invalid argument: {0}")]
    Invalid(String),

    /// The storage engine failed or returned a malformed value.
    #[error("I/O error: {0}")]
    Io(String),

    /// The operation is recognized but reserved.
    #[error("operation not supported")]
    NotSupported,

    /// User or group lookup failed.
    #[error("unknown user or group: {0}")]
    UnknownUser(String),

    /// The node or chunk identifier space is exhausted.
    #[error("identifier space exhausted")]
    IdExhausted,
}

impl MetaError {
    /// Returns the negative POSIX errno for this error, for the wire layer.
    #[must_use]
    pub const fn errno(&self) -> i32 {
        match self {
            Self::NotFound => -2,           // ENOENT
            Self::Exists => -17,            // EEXIST
            Self::NotDir => -20,            // ENOTDIR
            Self::IsDir => -21,             // EISDIR
            Self::PermissionDenied => -1,   // EPERM
            Self::NotEmpty => -39,          // ENOTEMPTY
            Self::NameTooLong => -36,       // ENAMETOOLONG
            Self::Invalid(_) => -22,        // EINVAL
            Self::Io(_) => -5,              // EIO
            Self::NotSupported => -95,      // EOPNOTSUPP
            Self::UnknownUser(_) => -87,    // EUSERS
            Self::IdExhausted => -75,       // EOVERFLOW
        }
    }
}

impl From<DatabaseError> for MetaError {
    fn from(err: DatabaseError) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<UnpackError> for MetaError {
    fn from(err: UnpackError) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<PackError> for MetaError {
    fn from(err: PackError) -> Self {
        match err {
            // the caller's output buffer cannot hold one more record
            PackError::Overflow { .. } | PackError::StringTooLong { .. } => Self::NameTooLong,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_values() {
        assert_eq!(MetaError::NotFound.errno(), -2);
        assert_eq!(MetaError::Exists.errno(), -17);
        assert_eq!(MetaError::PermissionDenied.errno(), -1);
        assert_eq!(MetaError::NotEmpty.errno(), -39);
        assert_eq!(MetaError::IdExhausted.errno(), -75);
    }

    #[test]
    fn test_pack_error_maps_to_name_too_long() {
        let err: MetaError = PackError::Overflow { needed: 10, max: 5 }.into();
        assert!(matches!(err, MetaError::NameTooLong));
    }

    #[test]
    fn test_database_error_maps_to_io() {
        let err: MetaError = DatabaseError::Closed.into();
        assert!(matches!(err, MetaError::Io(_)));
    }
}
