//! The user directory seam.
//!
//! Requests arrive carrying a user *name*; the store resolves it through
//! [`UserData`] into a uid, primary gid, and supplementary groups. The
//! directory itself is an external collaborator (a real deployment wires in
//! an LDAP- or config-backed implementation); [`UserRegistry`] is the
//! in-memory implementation used by tests and single-node tools.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::limits::{SUPERUSER_GID, SUPERUSER_UID};

/// A resolved user identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Login name.
    pub name: String,
    /// User id.
    pub uid: u32,
    /// Primary group id.
    pub gid: u32,
    /// Supplementary group ids.
    pub groups: Vec<u32>,
}

impl User {
    /// Returns whether the user belongs to `gid`, either as the primary
    /// group or a supplementary one.
    #[must_use]
    pub fn in_gid(&self, gid: u32) -> bool {
        self.gid == gid || self.groups.contains(&gid)
    }
}

/// A resolved group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    /// Group name.
    pub name: String,
    /// Group id.
    pub gid: u32,
}

/// Name-to-identity resolution consumed by the metadata store.
pub trait UserData: Send + Sync {
    /// Resolves a user name. `None` if unknown.
    fn lookup_user(&self, name: &str) -> Option<Arc<User>>;

    /// Resolves a group name. `None` if unknown.
    fn lookup_group(&self, name: &str) -> Option<Group>;
}

/// The superuser's login name.
pub const SUPERUSER_NAME: &str = "root";

#[derive(Debug, Default)]
struct RegistryInner {
    users: HashMap<String, Arc<User>>,
    groups: HashMap<String, Group>,
}

/// An in-memory user directory.
///
/// Created with the superuser already present.
#[derive(Debug)]
pub struct UserRegistry {
    inner: RwLock<RegistryInner>,
}

impl Default for UserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl UserRegistry {
    /// Creates a registry containing only the superuser.
    #[must_use]
    pub fn new() -> Self {
        let registry = Self {
            inner: RwLock::new(RegistryInner::default()),
        };
        registry.add_user(SUPERUSER_NAME, SUPERUSER_UID, SUPERUSER_GID, &[]);
        registry
    }

    /// Adds (or replaces) a user.
    pub fn add_user(&self, name: &str, uid: u32, gid: u32, groups: &[u32]) {
        let user = Arc::new(User {
            name: name.to_string(),
            uid,
            gid,
            groups: groups.to_vec(),
        });
        self.inner.write().users.insert(name.to_string(), user);
    }

    /// Adds (or replaces) a group.
    pub fn add_group(&self, name: &str, gid: u32) {
        let group = Group {
            name: name.to_string(),
            gid,
        };
        self.inner.write().groups.insert(name.to_string(), group);
    }
}

impl UserData for UserRegistry {
    fn lookup_user(&self, name: &str) -> Option<Arc<User>> {
        self.inner.read().users.get(name).cloned()
    }

    fn lookup_group(&self, name: &str) -> Option<Group> {
        self.inner.read().groups.get(name).cloned()
    }
}
