//! The shoalfs metadata store.
//!
//! The metadata server owns the hierarchical namespace of the filesystem:
//! files, directories, permissions, timestamps, and the mapping from files
//! to the chunks and replica locations that live on the object-storage
//! daemons. This crate is its core. It translates path-based filesystem
//! operations into transactional read/modify/write sequences against an
//! ordered key/value store, enforces POSIX-style access control, and
//! allocates monotonically increasing node and chunk identifiers.
//!
//! The storage scheme packs four key families (plus a version record) into
//! one flat sorted key space; see [`keys`] for the layout. Multi-key updates
//! go through a single atomic batch, so a crash at any point leaves the
//! previous consistent state behind.
//!
//! Entry point: [`MetaStore::open`], then [`MetaStore::do_operation`] with a
//! [`MetaRequest`].

mod config;
mod dump;
mod error;
mod ids;
pub mod keys;
pub mod limits;
mod node;
mod path;
mod perm;
mod replica;
mod request;
mod stat;
mod store;
mod user;

pub use config::{ConfigError, MetaConfig};
pub use error::MetaError;
pub use node::{Node, NodePayload, MODE_IS_DIR, PERM_EXEC, PERM_READ, PERM_WRITE};
pub use replica::{Oid, ReplicaAssigner, StaticAssigner};
pub use request::{ChunkInfo, MetaOp, MetaRequest, MetaResponse};
pub use stat::StatRecord;
pub use store::MetaStore;
pub use user::{Group, User, UserData, UserRegistry};
