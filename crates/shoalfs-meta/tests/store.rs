//! End-to-end tests driving the metadata store through its public
//! `do_operation` surface over an in-memory database.

use std::sync::Arc;

use shoalfs_db::{Iteratee, MemDb};
use shoalfs_meta::{
    ChunkInfo, MetaConfig, MetaError, MetaOp, MetaRequest, MetaResponse, MetaStore,
    StatRecord, StaticAssigner, UserRegistry,
};

/// Registry with the superuser, an unprivileged user `u1` (uid 1001,
/// gid 100, also in gid 200), a second user `u2`, and two groups.
fn registry() -> Arc<UserRegistry> {
    let registry = UserRegistry::new();
    registry.add_user("u1", 1001, 100, &[200]);
    registry.add_user("u2", 1002, 100, &[]);
    registry.add_group("g2", 200);
    registry.add_group("g3", 300);
    Arc::new(registry)
}

fn open_store(db: &MemDb) -> MetaStore {
    MetaStore::open(
        Arc::new(db.clone()),
        &MetaConfig::with_path("unused"),
        registry(),
        Arc::new(StaticAssigner::new(vec![1, 2, 3, 4])),
    )
    .unwrap()
}

fn run(store: &MetaStore, user: &str, op: MetaOp) -> Result<MetaResponse, MetaError> {
    store.do_operation(&MetaRequest::new(user, op))
}

fn mkdirs(store: &MetaStore, user: &str, path: &str, mode: u16) -> Result<MetaResponse, MetaError> {
    run(
        store,
        user,
        MetaOp::Mkdirs {
            path: path.into(),
            mode,
            ctime: 1000,
        },
    )
}

fn creat(store: &MetaStore, user: &str, path: &str, mode: u16) -> Result<u64, MetaError> {
    match run(
        store,
        user,
        MetaOp::Creat {
            path: path.into(),
            mode,
            ctime: 1000,
        },
    )? {
        MetaResponse::Nid(nid) => Ok(nid),
        other => panic!("unexpected creat response {other:?}"),
    }
}

fn stat(store: &MetaStore, user: &str, path: &str) -> Result<StatRecord, MetaError> {
    match run(
        store,
        user,
        MetaOp::Stat {
            path: path.into(),
            out_cap: 4096,
        },
    )? {
        MetaResponse::Stats(data) => {
            let mut records = StatRecord::decode_all(&data)?;
            assert_eq!(records.len(), 1);
            Ok(records.remove(0))
        }
        other => panic!("unexpected stat response {other:?}"),
    }
}

fn listdir(store: &MetaStore, user: &str, path: &str) -> Result<Vec<StatRecord>, MetaError> {
    match run(
        store,
        user,
        MetaOp::Listdir {
            path: path.into(),
            out_cap: 1 << 16,
        },
    )? {
        MetaResponse::Stats(data) => Ok(StatRecord::decode_all(&data)?),
        other => panic!("unexpected listdir response {other:?}"),
    }
}

fn chunkalloc(store: &MetaStore, user: &str, nid: u64, off: u64) -> Result<u64, MetaError> {
    match run(store, user, MetaOp::Chunkalloc { nid, off })? {
        MetaResponse::ChunkAlloc { cid, oids } => {
            assert!(!oids.is_empty());
            Ok(cid)
        }
        other => panic!("unexpected chunkalloc response {other:?}"),
    }
}

fn chunkfind(
    store: &MetaStore,
    user: &str,
    path: &str,
    start: u64,
    end: u64,
) -> Result<Vec<ChunkInfo>, MetaError> {
    match run(
        store,
        user,
        MetaOp::Chunkfind {
            path: path.into(),
            start,
            end,
            max_cinfos: 64,
        },
    )? {
        MetaResponse::Chunks(chunks) => Ok(chunks),
        other => panic!("unexpected chunkfind response {other:?}"),
    }
}

#[test]
fn fresh_bootstrap_mkdirs_listdir() {
    let db = MemDb::new();
    let store = open_store(&db);

    mkdirs(&store, "root", "/a/b/c", 0o755).unwrap();

    let entries = listdir(&store, "root", "/a").unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "b");
    assert!(entries[0].is_dir());
    assert_eq!(entries[0].mode(), 0o755);
}

#[test]
fn permission_denied_until_chown() {
    let db = MemDb::new();
    let store = open_store(&db);

    mkdirs(&store, "root", "/d", 0o700).unwrap();

    // /d is owned by root with mode 0700; u1 cannot reach into it
    assert!(matches!(
        creat(&store, "u1", "/d/f", 0o644),
        Err(MetaError::PermissionDenied)
    ));

    run(
        &store,
        "root",
        MetaOp::Chown {
            path: "/d".into(),
            new_user: Some("u1".into()),
            new_group: None,
        },
    )
    .unwrap();

    let nid = creat(&store, "u1", "/d/f", 0o644).unwrap();
    assert!(nid > 0);

    match run(
        &store,
        "u1",
        MetaOp::Open {
            path: "/d/f".into(),
            atime: 2000,
        },
    )
    .unwrap()
    {
        MetaResponse::Nid(opened) => assert_eq!(opened, nid),
        other => panic!("unexpected open response {other:?}"),
    }
}

#[test]
fn chunk_allocation_is_append_only() {
    let db = MemDb::new();
    let store = open_store(&db);

    let nid = creat(&store, "root", "/f", 0o644).unwrap();

    let cid1 = chunkalloc(&store, "root", nid, 0).unwrap();
    let cid2 = chunkalloc(&store, "root", nid, 4_194_304).unwrap();
    assert_ne!(cid1, cid2);

    // allocating behind the end of the file is rejected
    assert!(matches!(
        chunkalloc(&store, "root", nid, 1_048_576),
        Err(MetaError::Invalid(_))
    ));
    // duplicate offsets are rejected too
    assert!(matches!(
        chunkalloc(&store, "root", nid, 4_194_304),
        Err(MetaError::Invalid(_))
    ));

    let chunks = chunkfind(&store, "root", "/f", 0, 10_000_000).unwrap();
    assert_eq!(
        chunks,
        vec![
            ChunkInfo {
                start: 0,
                cid: cid1
            },
            ChunkInfo {
                start: 4_194_304,
                cid: cid2
            },
        ]
    );
}

#[test]
fn chunkfind_window_edges() {
    let db = MemDb::new();
    let store = open_store(&db);

    let nid = creat(&store, "root", "/f", 0o644).unwrap();
    let cid1 = chunkalloc(&store, "root", nid, 0).unwrap();
    let cid2 = chunkalloc(&store, "root", nid, 100).unwrap();

    // a window inside the first chunk returns only the cover chunk
    let chunks = chunkfind(&store, "root", "/f", 10, 20).unwrap();
    assert_eq!(chunks, vec![ChunkInfo { start: 0, cid: cid1 }]);

    // a window past every chunk still returns the covering one
    let chunks = chunkfind(&store, "root", "/f", 500, 900).unwrap();
    assert_eq!(
        chunks,
        vec![ChunkInfo {
            start: 100,
            cid: cid2
        }]
    );

    // chunks strictly after the window never appear without a cover
    let other = creat(&store, "root", "/g", 0o644).unwrap();
    chunkalloc(&store, "root", other, 1000).unwrap();
    assert_eq!(chunkfind(&store, "root", "/g", 0, 500).unwrap(), vec![]);

    // an empty file has no chunks at all
    creat(&store, "root", "/h", 0o644).unwrap();
    assert_eq!(chunkfind(&store, "root", "/h", 0, u64::MAX).unwrap(), vec![]);
}

#[test]
fn recursive_rmdir_removes_the_subtree() {
    let db = MemDb::new();
    let store = open_store(&db);

    mkdirs(&store, "root", "/a/b/c", 0o755).unwrap();
    creat(&store, "root", "/a/b/c/f", 0o644).unwrap();

    assert!(matches!(
        run(
            &store,
            "root",
            MetaOp::Rmdir {
                path: "/a".into(),
                rmr: false
            }
        ),
        Err(MetaError::NotEmpty)
    ));

    run(
        &store,
        "root",
        MetaOp::Rmdir {
            path: "/a".into(),
            rmr: true,
        },
    )
    .unwrap();

    assert!(matches!(
        stat(&store, "root", "/a"),
        Err(MetaError::NotFound)
    ));

    // nothing of the subtree survives: one node record (the root) and no
    // child entries
    let mut node_keys = 0;
    let mut child_keys = 0;
    let mut iter = db.new_iterator();
    while iter.next() {
        match iter.key().first() {
            Some(&b'n') => node_keys += 1,
            Some(&b'c') => child_keys += 1,
            _ => {}
        }
    }
    iter.release();
    assert_eq!(node_keys, 1);
    assert_eq!(child_keys, 0);

    // the namespace survives a reopen in the same state
    drop(store);
    let store = open_store(&db);
    assert!(matches!(
        stat(&store, "root", "/a"),
        Err(MetaError::NotFound)
    ));
}

#[test]
fn rmdir_of_empty_dir_without_rmr() {
    let db = MemDb::new();
    let store = open_store(&db);

    mkdirs(&store, "root", "/e", 0o755).unwrap();
    run(
        &store,
        "root",
        MetaOp::Rmdir {
            path: "/e".into(),
            rmr: false,
        },
    )
    .unwrap();
    assert!(matches!(
        stat(&store, "root", "/e"),
        Err(MetaError::NotFound)
    ));
}

#[test]
fn rmdir_of_root_is_denied() {
    let db = MemDb::new();
    let store = open_store(&db);

    assert!(matches!(
        run(
            &store,
            "root",
            MetaOp::Rmdir {
                path: "/".into(),
                rmr: true
            }
        ),
        Err(MetaError::PermissionDenied)
    ));
}

#[test]
fn counters_recover_across_reopen() {
    let db = MemDb::new();
    let store = open_store(&db);

    let mut last_nid = 0;
    for i in 0..10 {
        last_nid = creat(&store, "root", &format!("/f{i}"), 0o644).unwrap();
    }
    assert_eq!(last_nid, 10);
    let cid = chunkalloc(&store, "root", last_nid, 0).unwrap();
    drop(store);

    let store = open_store(&db);
    assert_eq!(store.next_nid(), last_nid + 1);
    assert_eq!(store.next_cid(), cid + 1);

    // and a fresh creat does not collide
    let nid = creat(&store, "root", "/f10", 0o644).unwrap();
    assert_eq!(nid, last_nid + 1);
}

#[test]
fn chown_restrictions() {
    let db = MemDb::new();
    let store = open_store(&db);

    mkdirs(&store, "root", "/x", 0o755).unwrap();
    run(
        &store,
        "root",
        MetaOp::Chown {
            path: "/x".into(),
            new_user: Some("u1".into()),
            new_group: None,
        },
    )
    .unwrap();

    // owner may move the node into a group they belong to
    run(
        &store,
        "u1",
        MetaOp::Chown {
            path: "/x".into(),
            new_user: None,
            new_group: Some("g2".into()),
        },
    )
    .unwrap();
    assert_eq!(stat(&store, "root", "/x").unwrap().gid, 200);

    // but not into a group they do not belong to
    assert!(matches!(
        run(
            &store,
            "u1",
            MetaOp::Chown {
                path: "/x".into(),
                new_user: None,
                new_group: Some("g3".into()),
            },
        ),
        Err(MetaError::PermissionDenied)
    ));

    // and never hand ownership to someone else
    assert!(matches!(
        run(
            &store,
            "u1",
            MetaOp::Chown {
                path: "/x".into(),
                new_user: Some("u2".into()),
                new_group: None,
            },
        ),
        Err(MetaError::PermissionDenied)
    ));
}

#[test]
fn open_updates_atime_and_stat_reflects_creation() {
    let db = MemDb::new();
    let store = open_store(&db);

    creat(&store, "root", "/t", 0o644).unwrap();
    let record = stat(&store, "root", "/t").unwrap();
    assert_eq!(record.mtime, 1000);
    assert_eq!(record.atime, 1000);
    assert_eq!(record.uid, 0);
    assert_eq!(record.gid, 0);
    assert_eq!(record.mode(), 0o644);
    assert!(!record.is_dir());

    run(
        &store,
        "root",
        MetaOp::Open {
            path: "/t".into(),
            atime: 2000,
        },
    )
    .unwrap();

    let record = stat(&store, "root", "/t").unwrap();
    assert_eq!(record.atime, 2000);
    assert_eq!(record.mtime, 1000);
}

#[test]
fn utimes_changes_only_what_it_is_given() {
    let db = MemDb::new();
    let store = open_store(&db);

    creat(&store, "root", "/t", 0o644).unwrap();
    run(
        &store,
        "root",
        MetaOp::Utimes {
            path: "/t".into(),
            atime: None,
            mtime: Some(5000),
        },
    )
    .unwrap();

    let record = stat(&store, "root", "/t").unwrap();
    assert_eq!(record.mtime, 5000);
    assert_eq!(record.atime, 1000);
}

#[test]
fn chmod_preserves_the_type_flag() {
    let db = MemDb::new();
    let store = open_store(&db);

    mkdirs(&store, "root", "/a", 0o755).unwrap();
    run(
        &store,
        "root",
        MetaOp::Chmod {
            path: "/a".into(),
            mode: 0o700,
        },
    )
    .unwrap();

    let record = stat(&store, "root", "/a").unwrap();
    assert!(record.is_dir());
    assert_eq!(record.mode(), 0o700);
}

#[test]
fn mkdirs_mode_may_exclude_exec_for_the_caller() {
    let db = MemDb::new();
    let store = open_store(&db);

    mkdirs(&store, "root", "/w", 0o777).unwrap();

    // After creating /w/a itself, mkdirs keeps walking without permission
    // checks, so a mode with no exec bit still works.
    mkdirs(&store, "u1", "/w/a/b", 0o200).unwrap();

    let record = stat(&store, "root", "/w/a").unwrap();
    assert!(record.is_dir());
    assert_eq!(record.mode(), 0o200);

    // outside of that walk, the created directory really is opaque to u1
    assert!(matches!(
        listdir(&store, "u1", "/w/a"),
        Err(MetaError::PermissionDenied)
    ));
}

#[test]
fn stat_of_the_root() {
    let db = MemDb::new();
    let store = open_store(&db);

    let record = stat(&store, "u1", "/").unwrap();
    assert!(record.is_dir());
    assert_eq!(record.name, "");
    assert_eq!(record.mode(), 0o755);
}

#[test]
fn listdir_fails_when_the_buffer_is_too_small() {
    let db = MemDb::new();
    let store = open_store(&db);

    mkdirs(&store, "root", "/a/child-with-a-name", 0o755).unwrap();
    let result = run(
        &store,
        "root",
        MetaOp::Listdir {
            path: "/a".into(),
            out_cap: 16,
        },
    );
    assert!(matches!(result, Err(MetaError::NameTooLong)));
}

#[test]
fn type_mismatches() {
    let db = MemDb::new();
    let store = open_store(&db);

    creat(&store, "root", "/f", 0o644).unwrap();
    mkdirs(&store, "root", "/d", 0o755).unwrap();

    assert!(matches!(
        listdir(&store, "root", "/f"),
        Err(MetaError::NotDir)
    ));
    assert!(matches!(
        run(
            &store,
            "root",
            MetaOp::Open {
                path: "/d".into(),
                atime: 0
            }
        ),
        Err(MetaError::IsDir)
    ));
    // walking through a file as if it were a directory
    assert!(matches!(
        creat(&store, "root", "/f/x", 0o644),
        Err(MetaError::NotDir)
    ));
}

#[test]
fn creat_errors() {
    let db = MemDb::new();
    let store = open_store(&db);

    creat(&store, "root", "/f", 0o644).unwrap();
    assert!(matches!(
        creat(&store, "root", "/f", 0o644),
        Err(MetaError::Exists)
    ));
    assert!(matches!(
        creat(&store, "root", "/missing/f", 0o644),
        Err(MetaError::NotFound)
    ));
}

#[test]
fn unknown_user_is_rejected() {
    let db = MemDb::new();
    let store = open_store(&db);

    assert!(matches!(
        stat(&store, "nobody", "/"),
        Err(MetaError::UnknownUser(_))
    ));
}

#[test]
fn reserved_operations_are_refused() {
    let db = MemDb::new();
    let store = open_store(&db);

    mkdirs(&store, "root", "/a", 0o755).unwrap();
    assert!(matches!(
        run(
            &store,
            "root",
            MetaOp::Rename {
                src: "/a".into(),
                dst: "/b".into()
            }
        ),
        Err(MetaError::NotSupported)
    ));
    assert!(matches!(
        run(
            &store,
            "root",
            MetaOp::SequesterTree { path: "/a".into() }
        ),
        Err(MetaError::NotSupported)
    ));
    assert!(matches!(
        run(&store, "root", MetaOp::FindSequestered),
        Err(MetaError::NotSupported)
    ));
    assert!(matches!(
        run(&store, "root", MetaOp::DestroySequestered),
        Err(MetaError::NotSupported)
    ));
}

#[test]
fn listdir_of_a_big_directory() {
    let db = MemDb::new();
    let store = open_store(&db);

    mkdirs(&store, "root", "/big", 0o755).unwrap();
    for i in 0..100 {
        creat(&store, "root", &format!("/big/file{i:03}"), 0o644).unwrap();
    }

    let entries = listdir(&store, "root", "/big").unwrap();
    assert_eq!(entries.len(), 100);
    // child keys sort by name under the shared parent prefix
    assert_eq!(entries[0].name, "file000");
    assert_eq!(entries[99].name, "file099");
}

#[test]
fn paths_are_canonicalized_before_the_walk() {
    let db = MemDb::new();
    let store = open_store(&db);

    mkdirs(&store, "root", "/a/b", 0o755).unwrap();
    assert!(stat(&store, "root", "/a//b/").is_ok());
    assert!(stat(&store, "root", "/a/./b").is_ok());
    assert!(stat(&store, "root", "/a/b/../b").is_ok());
    assert!(matches!(
        stat(&store, "root", "/../a"),
        Err(MetaError::Invalid(_))
    ));
    assert!(matches!(
        stat(&store, "root", "a/b"),
        Err(MetaError::Invalid(_))
    ));
}
