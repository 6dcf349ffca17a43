//! RocksDB-backed persistent database implementation.
//!
//! Enable with the `rocksdb` feature flag. Tuned for a metadata workload:
//! writes are synchronous (durable on return), compression is disabled, and
//! the block cache size comes from the store configuration.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rocksdb::{
    BlockBasedOptions, Cache, DBCompressionType, Direction, IteratorMode, Options, WriteBatch,
    WriteOptions, DB,
};

use crate::{
    Batch, Batcher, Database, DatabaseError, DbIterator, Iteratee, KeyValueDeleter,
    KeyValueReader, KeyValueWriter, Result,
};

/// Default LRU block cache size (64 MB).
const DEFAULT_CACHE_SIZE: usize = 64 * 1024 * 1024;

/// Configuration for RocksDB.
#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    /// Path to the database directory.
    pub path: std::path::PathBuf,
    /// LRU block cache size in bytes.
    pub cache_size: usize,
    /// Whether to create the database if it doesn't exist.
    pub create_if_missing: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            path: std::path::PathBuf::from("./db"),
            cache_size: DEFAULT_CACHE_SIZE,
            create_if_missing: true,
        }
    }
}

impl RocksDbConfig {
    /// Creates a new configuration with the given path.
    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Builds RocksDB options from this configuration.
    fn build_options(&self) -> Options {
        let mut opts = Options::default();
        opts.create_if_missing(self.create_if_missing);
        opts.set_compression_type(DBCompressionType::None);
        let mut block_opts = BlockBasedOptions::default();
        block_opts.set_block_cache(&Cache::new_lru_cache(self.cache_size));
        opts.set_block_based_table_factory(&block_opts);
        opts
    }
}

/// Write options for every mutation: the metadata layer depends on
/// key writes being durable before identifiers are handed out.
fn sync_write_opts() -> WriteOptions {
    let mut opts = WriteOptions::default();
    opts.set_sync(true);
    opts
}

/// A RocksDB-backed database.
pub struct RocksDb {
    /// The underlying RocksDB instance.
    db: Arc<DB>,
    /// Whether the database is closed.
    closed: AtomicBool,
    /// Path to the database.
    path: std::path::PathBuf,
}

impl RocksDb {
    /// Opens a RocksDB database with the given configuration.
    pub fn open(config: RocksDbConfig) -> Result<Self> {
        let opts = config.build_options();
        let db = DB::open(&opts, &config.path)
            .map_err(|e| DatabaseError::Io(format!("failed to open rocksdb: {}", e)))?;

        Ok(Self {
            db: Arc::new(db),
            closed: AtomicBool::new(false),
            path: config.path,
        })
    }

    /// Opens a RocksDB database at the given path with default settings.
    pub fn open_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open(RocksDbConfig::with_path(path))
    }

    /// Returns the database path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn check_closed(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(DatabaseError::Closed)
        } else {
            Ok(())
        }
    }
}

impl KeyValueReader for RocksDb {
    fn has(&self, key: &[u8]) -> Result<bool> {
        self.check_closed()?;
        let result = self
            .db
            .get_pinned(key)
            .map_err(|e| DatabaseError::Io(e.to_string()))?;
        Ok(result.is_some())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.check_closed()?;
        self.db
            .get(key)
            .map_err(|e| DatabaseError::Io(e.to_string()))
    }

    fn get_lt(&self, bound: &[u8]) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        self.check_closed()?;
        let mut iter = self.db.raw_iterator();
        // seek_for_prev lands on the greatest key <= bound; step once more
        // if it landed on the bound itself.
        iter.seek_for_prev(bound);
        if iter.valid() && iter.key() == Some(bound) {
            iter.prev();
        }
        if !iter.valid() {
            iter.status()
                .map_err(|e| DatabaseError::Io(e.to_string()))?;
            return Ok(None);
        }
        match (iter.key(), iter.value()) {
            (Some(k), Some(v)) => Ok(Some((k.to_vec(), v.to_vec()))),
            _ => Ok(None),
        }
    }
}

impl KeyValueWriter for RocksDb {
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.check_closed()?;
        self.db
            .put_opt(key, value, &sync_write_opts())
            .map_err(|e| DatabaseError::Io(e.to_string()))
    }
}

impl KeyValueDeleter for RocksDb {
    fn delete(&self, key: &[u8]) -> Result<()> {
        self.check_closed()?;
        self.db
            .delete_opt(key, &sync_write_opts())
            .map_err(|e| DatabaseError::Io(e.to_string()))
    }
}

impl Iteratee for RocksDb {
    fn new_iterator(&self) -> Box<dyn DbIterator> {
        Box::new(RocksDbIterator::new(self.db.clone(), None, None))
    }

    fn new_iterator_with_start(&self, start: &[u8]) -> Box<dyn DbIterator> {
        Box::new(RocksDbIterator::new(
            self.db.clone(),
            Some(start.to_vec()),
            None,
        ))
    }

    fn new_iterator_with_prefix(&self, prefix: &[u8]) -> Box<dyn DbIterator> {
        Box::new(RocksDbIterator::new(
            self.db.clone(),
            None,
            Some(prefix.to_vec()),
        ))
    }

    fn new_iterator_with_start_and_prefix(&self, start: &[u8], prefix: &[u8]) -> Box<dyn DbIterator> {
        Box::new(RocksDbIterator::new(
            self.db.clone(),
            Some(start.to_vec()),
            Some(prefix.to_vec()),
        ))
    }
}

impl Batcher for RocksDb {
    fn new_batch(&self) -> Box<dyn Batch> {
        Box::new(RocksDbBatch::new(self.db.clone()))
    }
}

impl Database for RocksDb {
    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(()); // Already closed
        }
        // RocksDB handles cleanup on drop
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// A batch of writes for RocksDB.
///
/// Stores operations in a list and builds the WriteBatch when writing
/// to maintain thread safety (WriteBatch is not Sync).
pub struct RocksDbBatch {
    /// The underlying database.
    db: Arc<DB>,
    /// Accumulated operations.
    ops: RwLock<Vec<BatchOp>>,
    /// Whether the batch has been written.
    written: AtomicBool,
}

#[derive(Clone)]
enum BatchOp {
    Put(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
}

impl RocksDbBatch {
    fn new(db: Arc<DB>) -> Self {
        Self {
            db,
            ops: RwLock::new(Vec::new()),
            written: AtomicBool::new(false),
        }
    }
}

impl KeyValueWriter for RocksDbBatch {
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.ops
            .write()
            .push(BatchOp::Put(key.to_vec(), value.to_vec()));
        Ok(())
    }
}

impl KeyValueDeleter for RocksDbBatch {
    fn delete(&self, key: &[u8]) -> Result<()> {
        self.ops.write().push(BatchOp::Delete(key.to_vec()));
        Ok(())
    }
}

impl Batch for RocksDbBatch {
    fn size(&self) -> usize {
        self.ops
            .read()
            .iter()
            .map(|op| match op {
                BatchOp::Put(key, value) => key.len() + value.len(),
                BatchOp::Delete(key) => key.len(),
            })
            .sum()
    }

    fn write(&mut self) -> Result<()> {
        if self.written.swap(true, Ordering::AcqRel) {
            return Err(DatabaseError::BatchAlreadyWritten);
        }
        let mut batch = WriteBatch::default();
        for op in self.ops.read().iter() {
            match op {
                BatchOp::Put(key, value) => batch.put(key, value),
                BatchOp::Delete(key) => batch.delete(key),
            }
        }
        self.db
            .write_opt(batch, &sync_write_opts())
            .map_err(|e| DatabaseError::Io(e.to_string()))?;
        Ok(())
    }

    fn reset(&mut self) {
        self.ops.write().clear();
        self.written.store(false, Ordering::Release);
    }
}

/// An iterator over RocksDB.
///
/// This implementation loads the matching range into memory to avoid
/// lifetime issues with RocksDB's iterator API. Scans in the metadata
/// store are bounded by a single key-family prefix, which keeps the
/// loaded range small.
pub struct RocksDbIterator {
    /// Loaded key-value pairs.
    data: Vec<(Vec<u8>, Vec<u8>)>,
    /// Current position in data.
    position: usize,
    /// Error state.
    error: Option<DatabaseError>,
}

impl RocksDbIterator {
    fn new(db: Arc<DB>, start: Option<Vec<u8>>, prefix: Option<Vec<u8>>) -> Self {
        let mut data = Vec::new();
        let mut error = None;

        let effective_start = match (&start, &prefix) {
            (Some(s), Some(p)) => Some(if s.as_slice() > p.as_slice() { s } else { p }),
            (Some(s), None) => Some(s),
            (None, Some(p)) => Some(p),
            (None, None) => None,
        };
        let mode = match effective_start {
            Some(key) => IteratorMode::From(key, Direction::Forward),
            None => IteratorMode::Start,
        };

        let iter = db.iterator(mode);
        for item in iter {
            match item {
                Ok((key, value)) => {
                    if let Some(ref p) = prefix {
                        if !key.starts_with(p) {
                            break; // Past prefix range
                        }
                    }
                    data.push((key.to_vec(), value.to_vec()));
                }
                Err(e) => {
                    error = Some(DatabaseError::Io(e.to_string()));
                    break;
                }
            }
        }

        Self {
            data,
            position: 0,
            error,
        }
    }
}

impl DbIterator for RocksDbIterator {
    fn next(&mut self) -> bool {
        if self.position < self.data.len() {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn error(&self) -> Option<&DatabaseError> {
        self.error.as_ref()
    }

    fn key(&self) -> &[u8] {
        if self.position > 0 && self.position <= self.data.len() {
            &self.data[self.position - 1].0
        } else {
            &[]
        }
    }

    fn value(&self) -> &[u8] {
        if self.position > 0 && self.position <= self.data.len() {
            &self.data[self.position - 1].1
        } else {
            &[]
        }
    }

    fn release(&mut self) {
        self.data.clear();
    }
}
