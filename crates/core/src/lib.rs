//! Shared types for Laser: errors, logical keys, value kinds and limits.
//!
//! This crate has no storage or networking logic. Everything here is a pure
//! data type shared by the codec, engine, replication, rpc and router
//! crates so none of them need to depend on each other just to pass a
//! `LogicalKey` or a `Status` around.

#![warn(missing_docs)]

pub mod error;
pub mod hash;
pub mod key;
pub mod limits;
pub mod value;

pub use error::{Error, Result};
pub use hash::{stable_hash64, DbHash, NodeHash};
pub use key::{LogicalKey, PartitionId};
pub use limits::Limits;
pub use value::{Value, ValueKind};

/// Replication role of a partition instance.
///
/// Exactly one role holds at any moment for a given `(database, table,
/// partition)` instance; transitions between them are serialized by the
/// control plane (§3 Invariants).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Role {
    /// Accepts writes, serves reads, serves the log-tailing RPC to followers.
    Leader,
    /// Rejects writes, serves reads, pulls from the leader's log.
    Follower,
}

impl Role {
    /// Whether this role may accept writes.
    pub fn accepts_writes(self) -> bool {
        matches!(self, Role::Leader)
    }
}

/// Stable identity of one partition instance (§3 "Partition identity").
///
/// `version` is opaque to Laser; the control plane stamps it on promotion
/// and it changes only when the partition is rebuilt from a bulk snapshot.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PartitionIdentity {
    /// Logical database name.
    pub database: String,
    /// Logical table name.
    pub table: String,
    /// Partition number within the table.
    pub partition_id: PartitionId,
    /// Current replication role.
    pub role: Role,
    /// Opaque data-generation tag, changes on bulk rebuild.
    pub version: String,
}

impl PartitionIdentity {
    /// Compute this partition's stable 64-bit db hash (§4.5, GLOSSARY).
    pub fn db_hash(&self) -> DbHash {
        hash::db_hash(&self.database, &self.table, self.partition_id)
    }
}
