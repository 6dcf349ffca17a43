//! Offline store inspection.
//!
//! Walks every record in key order and renders one human-readable line per
//! record. Meant for operators poking at a store with `shoalctl dump`; the
//! scan never mutates anything, and a malformed record fails the dump
//! without touching the store.

use std::io::Write;

use shoalfs_db::{DbIterator, Iteratee};

use crate::error::MetaError;
use crate::keys;
use crate::node::NodePayload;
use crate::store::{parse_version, MetaStore};

impl MetaStore {
    /// Dumps every record in the store to `out`, one line per record.
    pub fn dump<W: Write>(&self, out: &mut W) -> Result<(), MetaError> {
        let mut iter = self.db().new_iterator();
        while iter.next() {
            let key = iter.key();
            let value = iter.value();
            let Some(&discriminator) = key.first() else {
                return Err(MetaError::Io("zero-length key in store".into()));
            };
            match discriminator {
                keys::PREFIX_CHILD => dump_child(out, key, value)?,
                keys::PREFIX_FILE => dump_file(out, key, value)?,
                keys::PREFIX_CHUNK => dump_chunk(out, key, value)?,
                keys::PREFIX_NODE => dump_node(out, key, value)?,
                keys::PREFIX_UNLINK => dump_unlink(out, key, value)?,
                keys::PREFIX_VERSION => {
                    if key.len() != 1 {
                        return Err(MetaError::Invalid(format!(
                            "version key has length {}",
                            key.len()
                        )));
                    }
                    let version = parse_version(value)?;
                    writeln!(out, "VERSION({version})").map_err(io_err)?;
                }
                other => {
                    return Err(MetaError::Io(format!(
                        "key of unknown type {:?}",
                        other as char
                    )));
                }
            }
        }
        iter.release();
        if let Some(err) = iter.error() {
            return Err(err.clone().into());
        }
        Ok(())
    }
}

fn io_err(err: std::io::Error) -> MetaError {
    MetaError::Io(err.to_string())
}

fn dump_child<W: Write>(out: &mut W, key: &[u8], value: &[u8]) -> Result<(), MetaError> {
    let (pnid, name_bytes) = keys::decode_child_key(key)
        .ok_or_else(|| MetaError::Invalid(format!("malformed 'c' key of length {}", key.len())))?;
    let cnid = keys::decode_id_value(value).ok_or_else(|| {
        MetaError::Invalid(format!("child entry has value of length {}", value.len()))
    })?;
    let name = String::from_utf8_lossy(name_bytes);
    writeln!(out, "CHILD({pnid:#x}, {name}) => {cnid:#x}").map_err(io_err)
}

fn dump_file<W: Write>(out: &mut W, key: &[u8], value: &[u8]) -> Result<(), MetaError> {
    let (nid, offset) = keys::decode_file_key(key)
        .ok_or_else(|| MetaError::Invalid(format!("malformed 'f' key of length {}", key.len())))?;
    let cid = keys::decode_id_value(value).ok_or_else(|| {
        MetaError::Invalid(format!("file entry has value of length {}", value.len()))
    })?;
    writeln!(out, "FILE({nid:#x}, {offset:#x}) => {cid:#x}").map_err(io_err)
}

fn dump_chunk<W: Write>(out: &mut W, key: &[u8], value: &[u8]) -> Result<(), MetaError> {
    let cid = keys::decode_chunk_key(key)
        .ok_or_else(|| MetaError::Invalid(format!("malformed 'h' key of length {}", key.len())))?;
    if value.is_empty() || value.len() % 4 != 0 {
        return Err(MetaError::Invalid(format!(
            "replica set for chunk {cid:#x} has length {}",
            value.len()
        )));
    }
    let oids: Vec<String> = value
        .chunks_exact(4)
        .map(|bytes| {
            let oid = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            format!("{oid:x}")
        })
        .collect();
    writeln!(out, "CHUNK({cid:#x}) => [ {} ]", oids.join(", ")).map_err(io_err)
}

fn dump_node<W: Write>(out: &mut W, key: &[u8], value: &[u8]) -> Result<(), MetaError> {
    let nid = keys::decode_node_key(key)
        .ok_or_else(|| MetaError::Invalid(format!("malformed 'n' key of length {}", key.len())))?;
    if value.len() != crate::node::NODE_PAYLOAD_LEN {
        return Err(MetaError::Invalid(format!(
            "node {nid:#x} has payload of length {}",
            value.len()
        )));
    }
    let payload = NodePayload::decode(value)?;
    writeln!(
        out,
        "NODE({nid:#x}) => {{ ty={}, mode={:04o}, mtime={}, atime={}, length={}, uid={}, gid={} }}",
        if payload.is_dir() { "DIR" } else { "FILE" },
        payload.mode(),
        payload.mtime,
        payload.atime,
        payload.length,
        payload.uid,
        payload.gid,
    )
    .map_err(io_err)
}

fn dump_unlink<W: Write>(out: &mut W, key: &[u8], value: &[u8]) -> Result<(), MetaError> {
    let unlink_time = keys::decode_unlink_key(key)
        .ok_or_else(|| MetaError::Invalid(format!("malformed 'u' key of length {}", key.len())))?;
    let cid = keys::decode_id_value(value).ok_or_else(|| {
        MetaError::Invalid(format!("unlink entry has value of length {}", value.len()))
    })?;
    writeln!(out, "UNLINK({unlink_time}) => {cid:#x}").map_err(io_err)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use shoalfs_db::{KeyValueWriter, MemDb};

    use super::*;
    use crate::config::MetaConfig;
    use crate::replica::StaticAssigner;
    use crate::request::{MetaOp, MetaRequest};
    use crate::user::UserRegistry;

    fn open_store(db: &MemDb) -> MetaStore {
        MetaStore::open(
            Arc::new(db.clone()),
            &MetaConfig::with_path("unused"),
            Arc::new(UserRegistry::new()),
            Arc::new(StaticAssigner::new(vec![0x7b, 0x1c8])),
        )
        .unwrap()
    }

    fn dump_to_string(store: &MetaStore) -> String {
        let mut out = Vec::new();
        store.dump(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_dump_fresh_store() {
        let db = MemDb::new();
        let store = open_store(&db);
        let text = dump_to_string(&store);
        assert!(text.contains("VERSION(1)"));
        assert!(text.contains("NODE(0x0) => { ty=DIR, mode=0755"));
    }

    #[test]
    fn test_dump_full_tree() {
        let db = MemDb::new();
        let store = open_store(&db);

        store
            .do_operation(&MetaRequest::new(
                "root",
                MetaOp::Mkdirs {
                    path: "/data".into(),
                    mode: 0o755,
                    ctime: 1000,
                },
            ))
            .unwrap();
        let nid = match store
            .do_operation(&MetaRequest::new(
                "root",
                MetaOp::Creat {
                    path: "/data/blob".into(),
                    mode: 0o644,
                    ctime: 1000,
                },
            ))
            .unwrap()
        {
            crate::request::MetaResponse::Nid(nid) => nid,
            other => panic!("unexpected response {other:?}"),
        };
        store
            .do_operation(&MetaRequest::new(
                "root",
                MetaOp::Chunkalloc { nid, off: 0 },
            ))
            .unwrap();

        let text = dump_to_string(&store);
        assert!(text.contains("CHILD(0x0, data) => 0x1"));
        assert!(text.contains("CHILD(0x1, blob) => 0x2"));
        assert!(text.contains("FILE(0x2, 0x0) => 0x1"));
        assert!(text.contains("CHUNK(0x1) => [ 7b, 1c8 ]"));
    }

    #[test]
    fn test_dump_rejects_unknown_discriminator() {
        let db = MemDb::new();
        let store = open_store(&db);
        db.put(b"z-unknown", b"x").unwrap();

        let mut out = Vec::new();
        assert!(matches!(
            store.dump(&mut out),
            Err(MetaError::Io(_))
        ));
    }

    #[test]
    fn test_dump_rejects_malformed_record() {
        let db = MemDb::new();
        let store = open_store(&db);
        db.put(&crate::keys::chunk_key(5), b"abc").unwrap();

        let mut out = Vec::new();
        assert!(matches!(
            store.dump(&mut out),
            Err(MetaError::Invalid(_))
        ));
    }
}
