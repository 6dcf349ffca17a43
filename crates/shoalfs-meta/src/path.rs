//! Path canonicalization and splitting.
//!
//! The resolver walks a canonical component list rather than mutating a
//! byte buffer in place; the observable contract is unchanged: a leading
//! `/` is required, doubled slashes collapse, `.` disappears, `..` pops
//! one component and may not escape the root, and a trailing `/` is
//! normalized away. The root path `/` yields zero components.

use crate::error::MetaError;
use crate::limits::{PATH_MAX, PCOMP_MAX};

/// Canonicalizes `path` into its component list.
///
/// Component order is root-outward; every returned component is non-empty,
/// free of `/`, and strictly shorter than [`PCOMP_MAX`].
pub fn canonicalize(path: &str) -> Result<Vec<&str>, MetaError> {
    if path.len() >= PATH_MAX {
        return Err(MetaError::NameTooLong);
    }
    if !path.starts_with('/') {
        return Err(MetaError::Invalid(format!(
            "path {path:?} is not absolute"
        )));
    }
    let mut comps: Vec<&str> = Vec::new();
    for comp in path.split('/') {
        match comp {
            "" | "." => continue,
            ".." => {
                if comps.pop().is_none() {
                    return Err(MetaError::Invalid(format!(
                        "path {path:?} escapes the root"
                    )));
                }
            }
            comp => {
                if comp.len() >= PCOMP_MAX {
                    return Err(MetaError::NameTooLong);
                }
                comps.push(comp);
            }
        }
    }
    Ok(comps)
}
