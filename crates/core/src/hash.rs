//! Stable hashing used for partition routing and replication db identity.
//!
//! Both hashes use `xxh3_64`: stable across platforms and process restarts,
//! which is the property the router and replicator manager need (§4.5
//! "stable cross-platform hash", GLOSSARY "DB hash").

use crate::key::PartitionId;
use xxhash_rust::xxh3::xxh3_64;

/// Stable 64-bit identifier for a `(database, table, partition)` tuple.
///
/// RPC calls reference a replication DB by this hash (GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct DbHash(pub i64);

/// Stable 64-bit identifier for a node, used to key the iterator cache and
/// to identify a follower to the leader's pull-request handler (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct NodeHash(pub i64);

fn xxh3_i64(data: &[u8]) -> i64 {
    xxh3_64(data) as i64
}

/// Compute the stable hash of a primary-key tuple, used by the router to
/// pick a partition id (§4.5 step 1).
pub fn stable_hash64(primary_keys: &[String]) -> u64 {
    let mut buf = Vec::with_capacity(primary_keys.iter().map(|k| k.len() + 1).sum());
    for key in primary_keys {
        buf.extend_from_slice(key.as_bytes());
        buf.push(0); // separator so ["ab","c"] != ["a","bc"]
    }
    xxh3_64(&buf)
}

/// Compute the db hash for a `(database, table, partition_id)` tuple.
pub fn db_hash(database: &str, table: &str, partition_id: PartitionId) -> DbHash {
    let mut buf = Vec::with_capacity(database.len() + table.len() + 5);
    buf.extend_from_slice(database.as_bytes());
    buf.push(0);
    buf.extend_from_slice(table.as_bytes());
    buf.push(0);
    buf.extend_from_slice(&partition_id.0.to_le_bytes());
    DbHash(xxh3_i64(&buf))
}
