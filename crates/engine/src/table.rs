//! Per-table schema knobs the engine needs to decode keys and apply TTL.

use crate::wal::DurabilityMode;

/// Fixed per-table shape the engine needs at decode time: how many
/// primary-key components a logical key carries (§3; a length-prefixed
/// key stream can't otherwise distinguish a primary-key component from
/// the entry-kind marker that follows it).
#[derive(Debug, Clone)]
pub struct TableSchema {
    /// Number of primary-key components every key in this table has.
    pub primary_key_arity: usize,
    /// Default TTL applied when a write doesn't specify one; `None` means
    /// keys never expire unless given an explicit per-key TTL.
    pub default_ttl_ms: Option<u64>,
    /// Durability mode for this table's partitions.
    pub durability: DurabilityMode,
    /// WAL segment rollover size in bytes.
    pub wal_segment_bytes: u64,
}

impl TableSchema {
    /// A single-component primary key, no default TTL, batched durability —
    /// the common case for plain KV tables.
    pub fn simple() -> Self {
        TableSchema {
            primary_key_arity: 1,
            default_ttl_ms: None,
            durability: DurabilityMode::default(),
            wal_segment_bytes: 64 << 20,
        }
    }
}
