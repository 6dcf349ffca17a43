//! POSIX-style access checks against a request-bound user identity.

use tracing::debug;

use crate::error::MetaError;
use crate::node::{NodePayload, MODE_IS_DIR};
use crate::user::User;

/// Checks `payload` against the caller for `want_perm` (one or more of the
/// rwx bits) and an expected node type.
///
/// The type gate runs first: `Some(true)` demands a directory (`NotDir`
/// otherwise), `Some(false)` demands a file (`IsDir` otherwise), `None`
/// accepts either. When `check_perms` is cleared (the superuser path) the
/// bit test is skipped entirely. Otherwise the world bits are consulted
/// first, then the owner bits if the caller owns the node, then the group
/// bits if the caller belongs to the node's group.
pub(crate) fn mode_check(
    payload: &NodePayload,
    user: &User,
    check_perms: bool,
    want_perm: u16,
    want_dir: Option<bool>,
) -> Result<(), MetaError> {
    match want_dir {
        Some(true) if !payload.is_dir() => return Err(MetaError::NotDir),
        Some(false) if payload.is_dir() => return Err(MetaError::IsDir),
        _ => {}
    }
    if !check_perms {
        return Ok(());
    }
    let mode = payload.mode_and_type & !MODE_IS_DIR;
    if want_perm & mode != 0 {
        // world
        return Ok(());
    }
    if payload.uid == user.uid && (want_perm << 6) & mode != 0 {
        // owner
        return Ok(());
    }
    if user.in_gid(payload.gid) && (want_perm << 3) & mode != 0 {
        // group
        return Ok(());
    }
    debug!(
        "permission denied: want={want_perm:02o} mode={mode:04o} uid={}",
        user.uid
    );
    Err(MetaError::PermissionDenied)
}
