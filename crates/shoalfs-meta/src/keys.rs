//! Key encoding for the metadata store.
//!
//! The whole namespace lives in one flat sorted key space. The first byte
//! of every key picks the family:
//!
//! ```text
//! v                                   => "Fish" magic + be32 version
//! n <nid:8>                           => node payload
//! c <parent-nid:8> <child-name>       => child nid (8 bytes)
//! f <nid:8> <offset:8>                => chunk id (8 bytes)
//! h <cid:8>                           => packed array of be32 OSD ids
//! u <unlink-time:8>                   => chunk id (reserved)
//! ```
//!
//! All ids are big-endian so lexicographic key order matches numeric order;
//! directory listing and chunk-range lookup are a single seek plus a
//! forward scan under the shared `prefix + nid` head. Child names are
//! appended verbatim, which is safe because a component can never contain
//! `/` and empty names are rejected by path canonicalization.

/// Discriminator byte for the version record.
pub const PREFIX_VERSION: u8 = b'v';
/// Discriminator byte for node records.
pub const PREFIX_NODE: u8 = b'n';
/// Discriminator byte for directory child entries.
pub const PREFIX_CHILD: u8 = b'c';
/// Discriminator byte for file chunk entries.
pub const PREFIX_FILE: u8 = b'f';
/// Discriminator byte for chunk replica sets.
pub const PREFIX_CHUNK: u8 = b'h';
/// Discriminator byte for the sequestered-unlink queue (reserved).
pub const PREFIX_UNLINK: u8 = b'u';

/// Length of a node key: discriminator + nid.
pub const NODE_KEY_LEN: usize = 9;
/// Length of the fixed head of a child key: discriminator + parent nid.
pub const CHILD_KEY_PREFIX_LEN: usize = 9;
/// Length of a file chunk key: discriminator + nid + offset.
pub const FILE_KEY_LEN: usize = 17;
/// Length of a chunk replica-set key: discriminator + cid.
pub const CHUNK_KEY_LEN: usize = 9;

/// The version record key.
#[must_use]
pub fn version_key() -> [u8; 1] {
    [PREFIX_VERSION]
}

/// Key of the node record for `nid`.
#[must_use]
pub fn node_key(nid: u64) -> [u8; NODE_KEY_LEN] {
    let mut key = [0u8; NODE_KEY_LEN];
    key[0] = PREFIX_NODE;
    key[1..].copy_from_slice(&nid.to_be_bytes());
    key
}

/// Key of the directory entry `name` under parent `pnid`.
#[must_use]
pub fn child_key(pnid: u64, name: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(CHILD_KEY_PREFIX_LEN + name.len());
    key.push(PREFIX_CHILD);
    key.extend_from_slice(&pnid.to_be_bytes());
    key.extend_from_slice(name);
    key
}

/// Shared head of every child entry under parent `pnid`; seed for a
/// directory scan.
#[must_use]
pub fn child_scan_prefix(pnid: u64) -> [u8; CHILD_KEY_PREFIX_LEN] {
    let mut key = [0u8; CHILD_KEY_PREFIX_LEN];
    key[0] = PREFIX_CHILD;
    key[1..].copy_from_slice(&pnid.to_be_bytes());
    key
}

/// Key of the chunk entry of file `nid` starting at `offset`.
#[must_use]
pub fn file_key(nid: u64, offset: u64) -> [u8; FILE_KEY_LEN] {
    let mut key = [0u8; FILE_KEY_LEN];
    key[0] = PREFIX_FILE;
    key[1..9].copy_from_slice(&nid.to_be_bytes());
    key[9..].copy_from_slice(&offset.to_be_bytes());
    key
}

/// Shared head of every chunk entry of file `nid`.
#[must_use]
pub fn file_scan_prefix(nid: u64) -> [u8; CHILD_KEY_PREFIX_LEN] {
    let mut key = [0u8; CHILD_KEY_PREFIX_LEN];
    key[0] = PREFIX_FILE;
    key[1..].copy_from_slice(&nid.to_be_bytes());
    key
}

/// Key of the replica-set record for chunk `cid`.
#[must_use]
pub fn chunk_key(cid: u64) -> [u8; CHUNK_KEY_LEN] {
    let mut key = [0u8; CHUNK_KEY_LEN];
    key[0] = PREFIX_CHUNK;
    key[1..].copy_from_slice(&cid.to_be_bytes());
    key
}

/// Key of the sequestered-unlink queue entry for `unlink_time` (reserved).
#[must_use]
pub fn unlink_key(unlink_time: u64) -> [u8; CHUNK_KEY_LEN] {
    let mut key = [0u8; CHUNK_KEY_LEN];
    key[0] = PREFIX_UNLINK;
    key[1..].copy_from_slice(&unlink_time.to_be_bytes());
    key
}

/// Decodes a node key; `None` if the shape is wrong.
#[must_use]
pub fn decode_node_key(key: &[u8]) -> Option<u64> {
    if key.len() != NODE_KEY_LEN || key[0] != PREFIX_NODE {
        return None;
    }
    Some(u64::from_be_bytes(key[1..].try_into().ok()?))
}

/// Decodes a child key into `(parent nid, name bytes)`; `None` if the
/// shape is wrong. Names are returned as raw bytes; child entries always
/// carry at least one name byte.
#[must_use]
pub fn decode_child_key(key: &[u8]) -> Option<(u64, &[u8])> {
    if key.len() <= CHILD_KEY_PREFIX_LEN || key[0] != PREFIX_CHILD {
        return None;
    }
    let pnid = u64::from_be_bytes(key[1..CHILD_KEY_PREFIX_LEN].try_into().ok()?);
    Some((pnid, &key[CHILD_KEY_PREFIX_LEN..]))
}

/// Decodes a file chunk key into `(nid, offset)`; `None` if the shape is
/// wrong.
#[must_use]
pub fn decode_file_key(key: &[u8]) -> Option<(u64, u64)> {
    if key.len() != FILE_KEY_LEN || key[0] != PREFIX_FILE {
        return None;
    }
    let nid = u64::from_be_bytes(key[1..9].try_into().ok()?);
    let offset = u64::from_be_bytes(key[9..].try_into().ok()?);
    Some((nid, offset))
}

/// Decodes a chunk replica-set key; `None` if the shape is wrong.
#[must_use]
pub fn decode_chunk_key(key: &[u8]) -> Option<u64> {
    if key.len() != CHUNK_KEY_LEN || key[0] != PREFIX_CHUNK {
        return None;
    }
    Some(u64::from_be_bytes(key[1..].try_into().ok()?))
}

/// Decodes a sequestered-unlink queue key; `None` if the shape is wrong.
#[must_use]
pub fn decode_unlink_key(key: &[u8]) -> Option<u64> {
    if key.len() != CHUNK_KEY_LEN || key[0] != PREFIX_UNLINK {
        return None;
    }
    Some(u64::from_be_bytes(key[1..].try_into().ok()?))
}

/// Decodes an 8-byte big-endian id value (child nid or chunk cid); `None`
/// if the length is wrong.
#[must_use]
pub fn decode_id_value(value: &[u8]) -> Option<u64> {
    Some(u64::from_be_bytes(value.try_into().ok()?))
}
