//! The replica placement seam.
//!
//! Chunk allocation asks an external placement policy for a set of
//! object-storage daemons to host the new chunk. The store only validates
//! the result; choosing *which* OSDs is not its business.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::MetaError;

/// An object-storage daemon identifier.
pub type Oid = u32;

/// Replica placement policy consumed by chunk allocation.
pub trait ReplicaAssigner: Send + Sync {
    /// Picks `count` OSDs to host a new chunk. Implementations may return
    /// fewer when the cluster is short, but never zero and never more than
    /// [`crate::limits::MAX_REPLICAS`].
    fn assign_replicas(&self, count: u32) -> Result<Vec<Oid>, MetaError>;
}

/// Round-robin assignment over a fixed OSD set.
///
/// Suitable for tests and single-rack deployments; a real cluster wires in
/// a topology-aware policy.
#[derive(Debug)]
pub struct StaticAssigner {
    oids: Vec<Oid>,
    next: AtomicUsize,
}

impl StaticAssigner {
    /// Creates an assigner over the given OSD set.
    #[must_use]
    pub fn new(oids: Vec<Oid>) -> Self {
        Self {
            oids,
            next: AtomicUsize::new(0),
        }
    }
}

impl ReplicaAssigner for StaticAssigner {
    fn assign_replicas(&self, count: u32) -> Result<Vec<Oid>, MetaError> {
        if self.oids.is_empty() {
            return Err(MetaError::Io("no object-storage daemons registered".into()));
        }
        let count = (count as usize).min(self.oids.len());
        let start = self.next.fetch_add(count, Ordering::Relaxed);
        Ok((0..count)
            .map(|i| self.oids[(start + i) % self.oids.len()])
            .collect())
    }
}
