//! The metadata store: bootstrap, path resolution, and operation handlers.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use shoalfs_codec::{Packer, Unpacker};
use shoalfs_db::{
    Batch, Batcher, Database, DbIterator, Iteratee, KeyValueDeleter, KeyValueReader,
    KeyValueWriter,
};

use crate::config::MetaConfig;
use crate::error::MetaError;
use crate::ids::IdAllocator;
use crate::keys;
use crate::limits::{
    CID_MAX, MAX_REPLICAS, NID_MAX, PCOMP_MAX, ROOT_NID, SUPERUSER_GID, SUPERUSER_UID,
};
use crate::node::{Node, NodePayload, MODE_IS_DIR, PERM_EXEC, PERM_READ, PERM_WRITE};
use crate::path;
use crate::perm::mode_check;
use crate::replica::ReplicaAssigner;
use crate::request::{ChunkInfo, MetaOp, MetaRequest, MetaResponse};
use crate::stat::append_stat;
use crate::user::{User, UserData};

/// Magic bytes leading the version record.
pub(crate) const VERSION_MAGIC: &[u8; 4] = b"Fish";
/// Current schema version. Unknown versions are refused, never migrated.
pub(crate) const CUR_VERSION: u32 = 1;
/// Packed length of the version record.
pub(crate) const VERSION_BODY_LEN: usize = 8;

/// Mode of the root directory at bootstrap.
const ROOT_INIT_MODE: u16 = 0o755 | MODE_IS_DIR;

/// Stripe count of the per-node lock table.
const NODE_LOCK_STRIPES: usize = 64;

/// Encodes the version record body.
pub(crate) fn encode_version(version: u32) -> Vec<u8> {
    let mut packer = Packer::new(VERSION_BODY_LEN);
    packer.pack_fixed_bytes(VERSION_MAGIC);
    packer.pack_int(version);
    packer.into_bytes()
}

/// Parses the version record body.
pub(crate) fn parse_version(value: &[u8]) -> Result<u32, MetaError> {
    if value.len() != VERSION_BODY_LEN {
        return Err(MetaError::Invalid(format!(
            "version record has length {}, expected {VERSION_BODY_LEN}",
            value.len()
        )));
    }
    if &value[..VERSION_MAGIC.len()] != VERSION_MAGIC {
        return Err(MetaError::Invalid(format!(
            "bad version magic {:02x?}",
            &value[..VERSION_MAGIC.len()]
        )));
    }
    let mut unpacker = Unpacker::new(&value[VERSION_MAGIC.len()..]);
    Ok(unpacker.unpack_int()?)
}

/// A striped lock table keyed by node id.
///
/// Single-node read/modify/write updates (open's atime, chmod, chown,
/// utimes) serialize through the stripe for their nid, so an open never
/// loses a concurrent chmod on the same node.
struct NodeLocks {
    stripes: Box<[Mutex<()>]>,
}

impl NodeLocks {
    fn new(stripes: usize) -> Self {
        Self {
            stripes: (0..stripes).map(|_| Mutex::new(())).collect(),
        }
    }

    fn lock(&self, nid: u64) -> MutexGuard<'_, ()> {
        self.stripes[nid as usize % self.stripes.len()].lock()
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// The metadata store.
///
/// One instance owns the ordered key/value store holding the whole
/// namespace and is shared across worker threads; every request enters
/// through [`MetaStore::do_operation`].
pub struct MetaStore {
    db: Arc<dyn Database>,
    udata: Arc<dyn UserData>,
    replicas: Arc<dyn ReplicaAssigner>,
    next_nid: IdAllocator,
    next_cid: IdAllocator,
    min_repl: u32,
    man_repl: u32,
    node_locks: NodeLocks,
}

impl MetaStore {
    /// Opens a metadata store over `db`, bootstrapping a fresh namespace
    /// when the store is empty and recovering identifiers otherwise.
    pub fn open(
        db: Arc<dyn Database>,
        config: &MetaConfig,
        udata: Arc<dyn UserData>,
        replicas: Arc<dyn ReplicaAssigner>,
    ) -> Result<Self, MetaError> {
        let store = Self {
            db,
            udata,
            replicas,
            next_nid: IdAllocator::new(NID_MAX),
            next_cid: IdAllocator::new(CID_MAX),
            min_repl: config.min_repl(),
            man_repl: config.man_repl(),
            node_locks: NodeLocks::new(NODE_LOCK_STRIPES),
        };
        if store.is_empty()? {
            store.bootstrap()?;
        } else {
            store.load()?;
        }
        Ok(store)
    }

    /// Opens a RocksDB-backed metadata store at the configured path.
    #[cfg(feature = "rocksdb")]
    pub fn open_rocksdb(
        config: &MetaConfig,
        udata: Arc<dyn UserData>,
        replicas: Arc<dyn ReplicaAssigner>,
    ) -> Result<Self, MetaError> {
        let db = shoalfs_db::RocksDb::open(shoalfs_db::RocksDbConfig {
            path: config.path.clone(),
            cache_size: config.cache_size,
            create_if_missing: config.create_if_missing,
        })?;
        Self::open(Arc::new(db), config, udata, replicas)
    }

    /// Closes the underlying store. In-flight operations run to
    /// completion; later ones fail.
    pub fn close(&self) -> Result<(), MetaError> {
        info!("shutting down metadata store");
        self.db.close()?;
        Ok(())
    }

    /// The next node id that would be allocated.
    #[must_use]
    pub fn next_nid(&self) -> u64 {
        self.next_nid.current()
    }

    /// The next chunk id that would be allocated.
    #[must_use]
    pub fn next_cid(&self) -> u64 {
        self.next_cid.current()
    }

    pub(crate) fn db(&self) -> &dyn Database {
        &*self.db
    }

    fn is_empty(&self) -> Result<bool, MetaError> {
        let mut iter = self.db.new_iterator();
        let empty = !iter.next();
        iter.release();
        if let Some(err) = iter.error() {
            return Err(err.clone().into());
        }
        Ok(empty)
    }

    /// Sets up a brand-new store: version record plus root directory, in
    /// one atomic batch.
    fn bootstrap(&self) -> Result<(), MetaError> {
        info!("setting up new metadata store");
        let now = unix_now();
        let root = NodePayload {
            mtime: now,
            atime: now,
            length: 0,
            uid: SUPERUSER_UID,
            gid: SUPERUSER_GID,
            mode_and_type: ROOT_INIT_MODE,
        };
        let mut batch = self.db.new_batch();
        batch.put(&keys::version_key(), &encode_version(CUR_VERSION))?;
        batch.put(&keys::node_key(ROOT_NID), &root.encode())?;
        batch.write()?;
        self.next_nid.reset(ROOT_NID + 1);
        self.next_cid.reset(1);
        Ok(())
    }

    /// Attaches to an existing store: verifies the schema version and
    /// recovers the identifier counters from the tail of each key range.
    fn load(&self) -> Result<(), MetaError> {
        let value = self
            .db
            .get(&keys::version_key())?
            .ok_or_else(|| MetaError::Invalid("missing version record".into()))?;
        let version = parse_version(&value)?;
        if version != CUR_VERSION {
            return Err(MetaError::Invalid(format!(
                "unsupported store version {version}, expected {CUR_VERSION}"
            )));
        }

        let next_nid = match self.db.get_lt(&keys::node_key(NID_MAX))? {
            Some((key, _)) => match keys::decode_node_key(&key) {
                Some(nid) => nid + 1,
                None => {
                    return Err(MetaError::Invalid(
                        "no node records in a non-empty store".into(),
                    ))
                }
            },
            None => {
                return Err(MetaError::Invalid(
                    "no node records in a non-empty store".into(),
                ))
            }
        };
        // chunk keys may be absent entirely on a store that never
        // allocated one
        let next_cid = match self.db.get_lt(&keys::chunk_key(CID_MAX))? {
            Some((key, _)) => keys::decode_chunk_key(&key).map_or(1, |cid| cid + 1),
            None => 1,
        };
        self.next_nid.reset(next_nid);
        self.next_cid.reset(next_cid);
        info!(next_nid, next_cid, "using existing metadata store");
        Ok(())
    }

    fn fetch_node(&self, nid: u64) -> Result<Node, MetaError> {
        let value = self
            .db
            .get(&keys::node_key(nid))?
            .ok_or(MetaError::NotFound)?;
        let payload = NodePayload::decode(&value)?;
        Ok(Node { nid, payload })
    }

    fn put_node(&self, node: &Node) -> Result<(), MetaError> {
        self.db
            .put(&keys::node_key(node.nid), &node.payload.encode())?;
        Ok(())
    }

    /// Looks up `name` under `pnode`, demanding traversal rights on the
    /// parent first.
    fn fetch_child(
        &self,
        pnode: &Node,
        name: &str,
        user: &User,
        check: bool,
    ) -> Result<Node, MetaError> {
        mode_check(&pnode.payload, user, check, PERM_EXEC, Some(true))?;
        let value = self
            .db
            .get(&keys::child_key(pnode.nid, name.as_bytes()))?
            .ok_or(MetaError::NotFound)?;
        let cnid = keys::decode_id_value(&value).ok_or_else(|| {
            MetaError::Io(format!(
                "child entry {name:?} under nid {:#x} has malformed value",
                pnode.nid
            ))
        })?;
        self.fetch_node(cnid)
    }

    /// Creates one node under `pnode`: directory entry and node record go
    /// down in a single atomic batch.
    fn make_node(
        &self,
        pnode: &Node,
        name: &str,
        mode_and_type: u16,
        ctime: u64,
        uid: u32,
        gid: u32,
    ) -> Result<Node, MetaError> {
        let nid = self.next_nid.next()?;
        let payload = NodePayload {
            mtime: ctime,
            atime: ctime,
            length: 0,
            uid,
            gid,
            mode_and_type,
        };
        let mut batch = self.db.new_batch();
        batch.put(
            &keys::child_key(pnode.nid, name.as_bytes()),
            &nid.to_be_bytes(),
        )?;
        batch.put(&keys::node_key(nid), &payload.encode())?;
        batch.write()?;
        Ok(Node { nid, payload })
    }

    /// Runs one metadata operation on behalf of the named user.
    pub fn do_operation(&self, req: &MetaRequest) -> Result<MetaResponse, MetaError> {
        let user = self
            .udata
            .lookup_user(&req.user_name)
            .ok_or_else(|| MetaError::UnknownUser(req.user_name.clone()))?;
        let result = match &req.op {
            MetaOp::Chunkalloc { nid, off } => self.do_chunkalloc(*nid, *off, &user),
            MetaOp::FindSequestered | MetaOp::DestroySequestered => Err(MetaError::NotSupported),
            op => match op.path() {
                Some(path) => self.path_operation(op, path, &user),
                None => Err(MetaError::NotSupported),
            },
        };
        match &result {
            Ok(_) => debug!(op = req.op.name(), user = %req.user_name, "operation complete"),
            Err(err) => {
                debug!(op = req.op.name(), user = %req.user_name, error = %err, "operation failed");
            }
        }
        result
    }

    /// The path-based pipeline: canonicalize, walk component by component
    /// with traversal checks, then dispatch on the operation.
    fn path_operation(
        &self,
        op: &MetaOp,
        full_path: &str,
        user: &User,
    ) -> Result<MetaResponse, MetaError> {
        // The superuser can do anything.
        let mut check = user.uid != SUPERUSER_UID;
        let comps = path::canonicalize(full_path)?;
        let npc = comps.len();

        let mut cnode = self.fetch_node(ROOT_NID).map_err(|err| match err {
            MetaError::NotFound => MetaError::Io("root node missing".into()),
            other => other,
        })?;
        let mut pnode: Option<Node> = None;

        for (cpc, &comp) in comps.iter().enumerate() {
            let parent = cnode;
            match self.fetch_child(&parent, comp, user, check) {
                Ok(child) => {
                    pnode = Some(parent);
                    cnode = child;
                }
                Err(MetaError::NotFound) => match op {
                    MetaOp::Creat { mode, ctime, .. } if cpc == npc - 1 => {
                        return self.do_creat(&parent, comp, *mode, *ctime, user, check);
                    }
                    MetaOp::Mkdirs { mode, ctime, .. } => {
                        let child = self.do_mkdir(&parent, comp, *mode, *ctime, user, check)?;
                        // Once mkdirs has created a directory itself, the
                        // rest of the walk runs unchecked: the requested
                        // mode may not include exec for the caller.
                        check = false;
                        pnode = Some(parent);
                        cnode = child;
                    }
                    _ => return Err(MetaError::NotFound),
                },
                Err(err) => return Err(err),
            }
        }

        let last_name = comps.last().copied().unwrap_or("");
        match op {
            MetaOp::Creat { .. } => Err(MetaError::Exists),
            MetaOp::Open { atime, .. } => self.do_open(&cnode, *atime, user, check),
            MetaOp::Mkdirs { .. } => Ok(MetaResponse::Done),
            MetaOp::Listdir { out_cap, .. } => self.do_listdir(&cnode, *out_cap, user, check),
            MetaOp::Stat { out_cap, .. } => {
                self.do_stat(pnode.as_ref(), last_name, &cnode, *out_cap, user, check)
            }
            MetaOp::Chmod { mode, .. } => self.do_chmod(&cnode, *mode),
            MetaOp::Chown {
                new_user,
                new_group,
                ..
            } => self.do_chown(&cnode, new_user.as_deref(), new_group.as_deref(), user, check),
            MetaOp::Utimes { atime, mtime, .. } => self.do_utimes(&cnode, *atime, *mtime),
            MetaOp::Rmdir { rmr, .. } => {
                self.do_rmdir(pnode.as_ref(), last_name, &cnode, *rmr, user, check)
            }
            MetaOp::Chunkfind {
                start,
                end,
                max_cinfos,
                ..
            } => self.do_chunkfind(&cnode, *start, *end, *max_cinfos, user, check),
            MetaOp::SequesterTree { .. } | MetaOp::Rename { .. } => Err(MetaError::NotSupported),
            MetaOp::Chunkalloc { .. }
            | MetaOp::FindSequestered
            | MetaOp::DestroySequestered => Err(MetaError::NotSupported),
        }
    }

    fn do_creat(
        &self,
        pnode: &Node,
        name: &str,
        mode: u16,
        ctime: u64,
        user: &User,
        check: bool,
    ) -> Result<MetaResponse, MetaError> {
        mode_check(&pnode.payload, user, check, PERM_WRITE, Some(true))?;
        let node = self.make_node(pnode, name, mode & !MODE_IS_DIR, ctime, user.uid, user.gid)?;
        Ok(MetaResponse::Nid(node.nid))
    }

    fn do_mkdir(
        &self,
        pnode: &Node,
        name: &str,
        mode: u16,
        ctime: u64,
        user: &User,
        check: bool,
    ) -> Result<Node, MetaError> {
        mode_check(&pnode.payload, user, check, PERM_WRITE, Some(true))?;
        self.make_node(pnode, name, mode | MODE_IS_DIR, ctime, user.uid, user.gid)
    }

    fn do_open(
        &self,
        node: &Node,
        atime: u64,
        user: &User,
        check: bool,
    ) -> Result<MetaResponse, MetaError> {
        mode_check(&node.payload, user, check, PERM_READ, Some(false))?;
        let _guard = self.node_locks.lock(node.nid);
        let mut fresh = self.fetch_node(node.nid)?;
        fresh.payload.atime = atime;
        self.put_node(&fresh)?;
        Ok(MetaResponse::Nid(node.nid))
    }

    fn do_listdir(
        &self,
        dnode: &Node,
        out_cap: u32,
        user: &User,
        check: bool,
    ) -> Result<MetaResponse, MetaError> {
        mode_check(&dnode.payload, user, check, PERM_READ, Some(true))?;
        let mut out = Packer::with_max_size(256, out_cap as usize);
        let prefix = keys::child_scan_prefix(dnode.nid);
        let mut iter = self.db.new_iterator_with_prefix(&prefix);
        while iter.next() {
            let (_, name_bytes) = keys::decode_child_key(iter.key()).ok_or_else(|| {
                MetaError::Io(format!(
                    "malformed child key under nid {:#x}",
                    dnode.nid
                ))
            })?;
            if name_bytes.len() >= PCOMP_MAX {
                return Err(MetaError::NameTooLong);
            }
            let name = std::str::from_utf8(name_bytes)
                .map_err(|_| MetaError::Io("child entry has non-UTF-8 name".into()))?;
            let cnid = keys::decode_id_value(iter.value()).ok_or_else(|| {
                MetaError::Io(format!(
                    "child entry {name:?} under nid {:#x} has malformed value",
                    dnode.nid
                ))
            })?;
            match self.fetch_node(cnid) {
                Ok(child) => {
                    append_stat(&mut out, name, &child.payload, self.man_repl as u8)?;
                }
                // lost a race against a concurrent delete; skip the entry
                Err(MetaError::NotFound) => continue,
                Err(err) => return Err(err),
            }
        }
        iter.release();
        if let Some(err) = iter.error() {
            return Err(err.clone().into());
        }
        Ok(MetaResponse::Stats(out.into_bytes()))
    }

    fn do_stat(
        &self,
        pnode: Option<&Node>,
        name: &str,
        cnode: &Node,
        out_cap: u32,
        user: &User,
        check: bool,
    ) -> Result<MetaResponse, MetaError> {
        // Stat needs read permission on the parent directory. The root has
        // no parent, and refusing to stat the root would help nobody.
        if let Some(pnode) = pnode {
            mode_check(&pnode.payload, user, check, PERM_READ, Some(true))?;
        }
        let mut out = Packer::with_max_size(128, out_cap as usize);
        append_stat(&mut out, name, &cnode.payload, self.man_repl as u8)?;
        Ok(MetaResponse::Stats(out.into_bytes()))
    }

    fn do_chmod(&self, node: &Node, mode: u16) -> Result<MetaResponse, MetaError> {
        let _guard = self.node_locks.lock(node.nid);
        let mut fresh = self.fetch_node(node.nid)?;
        // a chmod can never flip a node between file and directory
        let dir_flag = fresh.payload.mode_and_type & MODE_IS_DIR;
        fresh.payload.mode_and_type = (mode & !MODE_IS_DIR) | dir_flag;
        self.put_node(&fresh)?;
        Ok(MetaResponse::Done)
    }

    fn do_chown(
        &self,
        node: &Node,
        new_user: Option<&str>,
        new_group: Option<&str>,
        user: &User,
        check: bool,
    ) -> Result<MetaResponse, MetaError> {
        let new_uid = match new_user {
            Some(name) => Some(
                self.udata
                    .lookup_user(name)
                    .ok_or_else(|| MetaError::UnknownUser(name.to_string()))?
                    .uid,
            ),
            None => None,
        };
        let new_gid = match new_group {
            Some(name) => Some(
                self.udata
                    .lookup_group(name)
                    .ok_or_else(|| MetaError::UnknownUser(name.to_string()))?
                    .gid,
            ),
            None => None,
        };
        if check {
            if new_uid.is_some() {
                // only the superuser may change ownership, and the
                // superuser walks in with checks cleared
                return Err(MetaError::PermissionDenied);
            }
            if let Some(gid) = new_gid {
                // chgrp needs ownership plus membership in the new group
                if node.payload.uid != user.uid || !user.in_gid(gid) {
                    return Err(MetaError::PermissionDenied);
                }
            }
        }
        let _guard = self.node_locks.lock(node.nid);
        let mut fresh = self.fetch_node(node.nid)?;
        if let Some(uid) = new_uid {
            fresh.payload.uid = uid;
        }
        if let Some(gid) = new_gid {
            fresh.payload.gid = gid;
        }
        self.put_node(&fresh)?;
        Ok(MetaResponse::Done)
    }

    fn do_utimes(
        &self,
        node: &Node,
        atime: Option<u64>,
        mtime: Option<u64>,
    ) -> Result<MetaResponse, MetaError> {
        let _guard = self.node_locks.lock(node.nid);
        let mut fresh = self.fetch_node(node.nid)?;
        if let Some(atime) = atime {
            fresh.payload.atime = atime;
        }
        if let Some(mtime) = mtime {
            fresh.payload.mtime = mtime;
        }
        self.put_node(&fresh)?;
        Ok(MetaResponse::Done)
    }

    fn do_rmdir(
        &self,
        pnode: Option<&Node>,
        name: &str,
        cnode: &Node,
        rmr: bool,
        user: &User,
        check: bool,
    ) -> Result<MetaResponse, MetaError> {
        // the root itself cannot be removed
        let Some(pnode) = pnode else {
            return Err(MetaError::PermissionDenied);
        };
        mode_check(&pnode.payload, user, check, PERM_WRITE, Some(true))?;
        let mut batch = self.db.new_batch();
        self.remove_tree(&*batch, pnode.nid, name.as_bytes(), cnode, rmr, user, check)?;
        batch.write()?;
        Ok(MetaResponse::Done)
    }

    /// Collects the removal of `node` (and, when `rmr` is set, its whole
    /// subtree) into `batch`. Write permission is demanded on every node
    /// removed. Chunk records are left behind for the reserved
    /// sequestered-unlink lifecycle; node ids are never reused, so they
    /// cannot collide with later files.
    fn remove_tree(
        &self,
        batch: &dyn Batch,
        pnid: u64,
        name: &[u8],
        node: &Node,
        rmr: bool,
        user: &User,
        check: bool,
    ) -> Result<(), MetaError> {
        let prefix = keys::child_scan_prefix(node.nid);
        let mut iter = self.db.new_iterator_with_prefix(&prefix);
        let mut children: Vec<(Vec<u8>, u64)> = Vec::new();
        while iter.next() {
            let (_, child_name) = keys::decode_child_key(iter.key()).ok_or_else(|| {
                MetaError::Io(format!("malformed child key under nid {:#x}", node.nid))
            })?;
            if child_name.len() >= PCOMP_MAX {
                return Err(MetaError::Io(format!(
                    "child entry under nid {:#x} has oversized name",
                    node.nid
                )));
            }
            let cnid = keys::decode_id_value(iter.value()).ok_or_else(|| {
                MetaError::Io(format!(
                    "child entry under nid {:#x} has malformed value",
                    node.nid
                ))
            })?;
            if !rmr {
                return Err(MetaError::NotEmpty);
            }
            children.push((child_name.to_vec(), cnid));
        }
        iter.release();
        if let Some(err) = iter.error() {
            return Err(err.clone().into());
        }
        for (child_name, cnid) in children {
            let child = self.fetch_node(cnid)?;
            mode_check(&child.payload, user, check, PERM_WRITE, None)?;
            self.remove_tree(batch, node.nid, &child_name, &child, rmr, user, check)?;
        }
        batch.delete(&keys::child_key(pnid, name))?;
        batch.delete(&keys::node_key(node.nid))?;
        Ok(())
    }

    fn do_chunkfind(
        &self,
        cnode: &Node,
        start: u64,
        end: u64,
        max_cinfos: usize,
        user: &User,
        check: bool,
    ) -> Result<MetaResponse, MetaError> {
        mode_check(&cnode.payload, user, check, PERM_READ, Some(false))?;
        let chunks = self.chunkfind_impl(cnode.nid, start, end, max_cinfos)?;
        Ok(MetaResponse::Chunks(chunks))
    }

    /// Finds the chunks of file `nid` covering `[start, end]`: the chunk
    /// with the greatest offset at or below `start` (it may span into the
    /// range), then every chunk with offset in `(start, end]`, ascending.
    ///
    /// Offsets are big-endian in the key, so "the chunk covering `start`"
    /// is exactly the greatest chunk key strictly below the key for
    /// `start + 1`; the rest is one forward scan under the file's key
    /// head. When no chunk sits at or below `start`, the result is empty.
    fn chunkfind_impl(
        &self,
        nid: u64,
        start: u64,
        end: u64,
        max_cinfos: usize,
    ) -> Result<Vec<ChunkInfo>, MetaError> {
        let mut out = Vec::new();
        if max_cinfos == 0 {
            return Ok(out);
        }
        let prefix = keys::file_scan_prefix(nid);
        let probe = keys::file_key(nid, start.saturating_add(1));
        let Some((cover_key, cover_value)) = self.db.get_lt(&probe)? else {
            return Ok(out);
        };
        if !cover_key.starts_with(&prefix) {
            // no chunk entries at or below start
            return Ok(out);
        }
        let (_, base) = keys::decode_file_key(&cover_key)
            .ok_or_else(|| MetaError::Io(format!("malformed chunk key for nid {nid:#x}")))?;
        let cid = keys::decode_id_value(&cover_value).ok_or_else(|| {
            MetaError::Io(format!("chunk entry for nid {nid:#x} has malformed value"))
        })?;
        out.push(ChunkInfo { start: base, cid });
        if out.len() >= max_cinfos {
            return Ok(out);
        }

        let mut iter = self
            .db
            .new_iterator_with_start_and_prefix(&cover_key, &prefix);
        let mut at_cover = true;
        while iter.next() {
            if at_cover {
                at_cover = false;
                if iter.key() == cover_key.as_slice() {
                    continue;
                }
            }
            let (_, offset) = keys::decode_file_key(iter.key())
                .ok_or_else(|| MetaError::Io(format!("malformed chunk key for nid {nid:#x}")))?;
            if offset > end {
                break;
            }
            let cid = keys::decode_id_value(iter.value()).ok_or_else(|| {
                MetaError::Io(format!("chunk entry for nid {nid:#x} has malformed value"))
            })?;
            out.push(ChunkInfo { start: offset, cid });
            if out.len() >= max_cinfos {
                break;
            }
        }
        iter.release();
        if let Some(err) = iter.error() {
            return Err(err.clone().into());
        }
        Ok(out)
    }

    /// Allocates a chunk of file `nid` at `off`. Chunks are append-only:
    /// any existing chunk at or past `off` rejects the call.
    fn do_chunkalloc(&self, nid: u64, off: u64, user: &User) -> Result<MetaResponse, MetaError> {
        let check = user.uid != SUPERUSER_UID;
        let node = self.fetch_node(nid)?;
        mode_check(&node.payload, user, check, PERM_WRITE, Some(false))?;

        let mut iter = self
            .db
            .new_iterator_with_start_and_prefix(&keys::file_key(nid, off), &keys::file_scan_prefix(nid));
        let occupied = iter.next();
        iter.release();
        if occupied {
            return Err(MetaError::Invalid(format!(
                "chunk at offset {off} of file {nid:#x} would not be append-only"
            )));
        }

        let cid = self.next_cid.next()?;
        let oids = self.replicas.assign_replicas(self.man_repl)?;
        if oids.is_empty() || oids.len() > MAX_REPLICAS {
            return Err(MetaError::Io(format!(
                "replica assigner returned {} OSDs",
                oids.len()
            )));
        }
        if oids.len() < self.min_repl as usize {
            warn!(
                cid,
                assigned = oids.len(),
                min_repl = self.min_repl,
                "chunk allocated below minimum replication"
            );
        }
        let mut replica_set = Packer::new(oids.len() * 4);
        for oid in &oids {
            replica_set.pack_int(*oid);
        }
        let mut batch = self.db.new_batch();
        batch.put(&keys::file_key(nid, off), &cid.to_be_bytes())?;
        batch.put(&keys::chunk_key(cid), replica_set.bytes())?;
        batch.write()?;
        Ok(MetaResponse::ChunkAlloc { cid, oids })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replica::StaticAssigner;
    use crate::user::UserRegistry;
    use shoalfs_db::MemDb;

    fn open_store(db: &MemDb) -> MetaStore {
        let registry = Arc::new(UserRegistry::new());
        let assigner = Arc::new(StaticAssigner::new(vec![10, 20, 30]));
        MetaStore::open(
            Arc::new(db.clone()),
            &MetaConfig::with_path("unused"),
            registry,
            assigner,
        )
        .unwrap()
    }

    #[test]
    fn test_version_roundtrip() {
        let body = encode_version(CUR_VERSION);
        assert_eq!(body.len(), VERSION_BODY_LEN);
        assert_eq!(&body[..4], b"Fish");
        assert_eq!(parse_version(&body).unwrap(), CUR_VERSION);
    }

    #[test]
    fn test_parse_version_rejects_garbage() {
        assert!(matches!(
            parse_version(b"Fish"),
            Err(MetaError::Invalid(_))
        ));
        assert!(matches!(
            parse_version(b"Carp\x00\x00\x00\x01"),
            Err(MetaError::Invalid(_))
        ));
    }

    #[test]
    fn test_bootstrap_writes_root_and_version() {
        let db = MemDb::new();
        let store = open_store(&db);
        assert_eq!(store.next_nid(), 1);
        assert_eq!(store.next_cid(), 1);

        let root = store.fetch_node(ROOT_NID).unwrap();
        assert!(root.payload.is_dir());
        assert_eq!(root.payload.mode(), 0o755);
        assert_eq!(root.payload.uid, SUPERUSER_UID);

        let version = db.get(&keys::version_key()).unwrap().unwrap();
        assert_eq!(parse_version(&version).unwrap(), CUR_VERSION);
    }

    #[test]
    fn test_load_rejects_bad_version() {
        let db = MemDb::new();
        open_store(&db);
        db.put(&keys::version_key(), &encode_version(99)).unwrap();

        let result = MetaStore::open(
            Arc::new(db.clone()),
            &MetaConfig::with_path("unused"),
            Arc::new(UserRegistry::new()),
            Arc::new(StaticAssigner::new(vec![1])),
        );
        assert!(matches!(result, Err(MetaError::Invalid(_))));
    }

    #[test]
    fn test_load_rejects_missing_version() {
        let db = MemDb::new();
        open_store(&db);
        db.delete(&keys::version_key()).unwrap();

        let result = MetaStore::open(
            Arc::new(db.clone()),
            &MetaConfig::with_path("unused"),
            Arc::new(UserRegistry::new()),
            Arc::new(StaticAssigner::new(vec![1])),
        );
        assert!(matches!(result, Err(MetaError::Invalid(_))));
    }

    #[test]
    fn test_node_locks_stripe() {
        let locks = NodeLocks::new(4);
        let guard = locks.lock(1);
        // a different stripe is independently lockable
        let other = locks.lock(2);
        drop(other);
        drop(guard);
        // same stripe again after release
        let _again = locks.lock(1);
    }
}
