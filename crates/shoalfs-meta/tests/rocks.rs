//! On-disk round-trips through the RocksDB backend.
#![cfg(feature = "rocksdb")]

use std::sync::Arc;

use shoalfs_meta::{
    MetaConfig, MetaError, MetaOp, MetaRequest, MetaResponse, MetaStore, StaticAssigner,
    UserRegistry,
};
use tempfile::tempdir;

fn open_store(config: &MetaConfig) -> Result<MetaStore, MetaError> {
    MetaStore::open_rocksdb(
        config,
        Arc::new(UserRegistry::new()),
        Arc::new(StaticAssigner::new(vec![1, 2, 3])),
    )
}

#[test]
fn namespace_and_counters_survive_reopen() {
    let dir = tempdir().unwrap();
    let config = MetaConfig::with_path(dir.path());

    let nid = {
        let store = open_store(&config).unwrap();
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
            MetaResponse::Nid(nid) => nid,
            other => panic!("unexpected creat response {other:?}"),
        };
        store
            .do_operation(&MetaRequest::new(
                "root",
                MetaOp::Chunkalloc { nid, off: 0 },
            ))
            .unwrap();
        store.close().unwrap();
        nid
    };

    let store = open_store(&config).unwrap();
    assert_eq!(store.next_nid(), nid + 1);
    assert_eq!(store.next_cid(), 2);

    match store
        .do_operation(&MetaRequest::new(
            "root",
            MetaOp::Chunkfind {
                path: "/data/blob".into(),
                start: 0,
                end: u64::MAX,
                max_cinfos: 8,
            },
        ))
        .unwrap()
    {
        MetaResponse::Chunks(chunks) => {
            assert_eq!(chunks.len(), 1);
            assert_eq!(chunks[0].start, 0);
            assert_eq!(chunks[0].cid, 1);
        }
        other => panic!("unexpected chunkfind response {other:?}"),
    }
}

#[test]
fn opening_a_missing_store_without_create_fails() {
    let dir = tempdir().unwrap();
    let mut config = MetaConfig::with_path(dir.path().join("absent"));
    config.create_if_missing = false;

    assert!(matches!(open_store(&config), Err(MetaError::Io(_))));
}
