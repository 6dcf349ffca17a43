//! Ordered key/value storage abstraction for the shoalfs metadata server.
//!
//! The metadata store encodes a hierarchical namespace into a flat, sorted
//! byte-key space, so the engine underneath must be an *ordered* store: it
//! has to support point reads and writes, atomic multi-key batches, forward
//! iteration from any key, and "greatest key below a bound" lookups.
//!
//! Two implementations are provided:
//!
//! - **MemDb**: in-memory, `BTreeMap`-backed; used by tests and tools.
//! - **RocksDb**: persistent, behind the `rocksdb` feature; synchronous
//!   writes, no compression.
//!
//! # Example
//!
//! ```
//! use shoalfs_db::{MemDb, KeyValueReader, KeyValueWriter};
//!
//! let db = MemDb::new();
//! db.put(b"key", b"value").unwrap();
//! assert_eq!(db.get(b"key").unwrap(), Some(b"value".to_vec()));
//! ```

mod error;
mod memdb;
#[cfg(feature = "rocksdb")]
mod rocksdb;

pub use error::{DatabaseError, Result};
pub use memdb::MemDb;
#[cfg(feature = "rocksdb")]
pub use rocksdb::{RocksDb, RocksDbConfig};

/// A key-value reader over an ordered store.
pub trait KeyValueReader: Send + Sync {
    /// Returns whether the key exists in the database.
    fn has(&self, key: &[u8]) -> Result<bool>;

    /// Gets the value for the given key.
    /// Returns `Ok(None)` if the key does not exist.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Gets the greatest entry whose key is strictly below `bound`.
    /// Returns `Ok(None)` if no key sorts before `bound`.
    fn get_lt(&self, bound: &[u8]) -> Result<Option<(Vec<u8>, Vec<u8>)>>;
}

/// A key-value writer.
pub trait KeyValueWriter: Send + Sync {
    /// Sets the value for the given key.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;
}

/// A key-value deleter.
pub trait KeyValueDeleter: Send + Sync {
    /// Deletes the value for the given key.
    fn delete(&self, key: &[u8]) -> Result<()>;
}

/// Iterator creation interface.
pub trait Iteratee: Send + Sync {
    /// Creates an iterator over all key-value pairs, in key order.
    fn new_iterator(&self) -> Box<dyn DbIterator>;

    /// Creates an iterator starting at the given key (inclusive).
    fn new_iterator_with_start(&self, start: &[u8]) -> Box<dyn DbIterator>;

    /// Creates an iterator over keys with the given prefix.
    fn new_iterator_with_prefix(&self, prefix: &[u8]) -> Box<dyn DbIterator>;

    /// Creates an iterator starting at the given key, restricted to the
    /// given prefix.
    fn new_iterator_with_start_and_prefix(&self, start: &[u8], prefix: &[u8]) -> Box<dyn DbIterator>;
}

/// Batch creation interface.
pub trait Batcher: Send + Sync {
    /// Creates a new batch for atomic writes.
    fn new_batch(&self) -> Box<dyn Batch>;
}

/// The main database interface combining all capabilities.
pub trait Database:
    KeyValueReader + KeyValueWriter + KeyValueDeleter + Batcher + Iteratee
{
    /// Closes the database. Further operations return [`DatabaseError::Closed`].
    fn close(&self) -> Result<()>;

    /// Returns whether the database is closed.
    fn is_closed(&self) -> bool;
}

/// A batch of write operations to be applied atomically.
pub trait Batch: KeyValueWriter + KeyValueDeleter + Send + Sync {
    /// Returns the size of the batch in bytes.
    fn size(&self) -> usize;

    /// Writes the batch to the database. A batch may be written once;
    /// writing it again returns [`DatabaseError::BatchAlreadyWritten`].
    fn write(&mut self) -> Result<()>;

    /// Resets the batch for reuse.
    fn reset(&mut self);
}

/// An iterator over key-value pairs in ascending key order.
pub trait DbIterator: Send {
    /// Moves to the next key-value pair.
    /// Returns `false` when there are no more pairs.
    fn next(&mut self) -> bool;

    /// Returns any accumulated error.
    fn error(&self) -> Option<&DatabaseError>;

    /// Returns the current key.
    /// Only valid after `next()` returns `true`.
    fn key(&self) -> &[u8];

    /// Returns the current value.
    /// Only valid after `next()` returns `true`.
    fn value(&self) -> &[u8];

    /// Releases resources held by the iterator.
    fn release(&mut self);
}
