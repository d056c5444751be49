//! The write-batch wire/WAL representation (§3 ADD).
//!
//! Every committed write, whether a single `set` or a multi-field `hmset`,
//! is normalized into a `WriteBatchRecord` before it touches the WAL or the
//! in-memory map. This is the "single write-batch abstraction" the engine
//! uses internally and the unit the replication layer ships to followers.

use serde::{Deserialize, Serialize};

/// One physical mutation against the encoded key/value namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncodedOp {
    /// Write `value` at `key`, replacing any existing value.
    Put { key: Vec<u8>, value: Vec<u8> },
    /// Remove `key`, a no-op if absent.
    Delete { key: Vec<u8> },
}

/// A committed batch: the unit replayed from the WAL and shipped to
/// followers during log tailing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteBatchRecord {
    /// Strictly increasing per partition; assigned on commit.
    pub seq_no: u64,
    /// Leader wall-clock milliseconds at commit time, preserved verbatim
    /// through replication so followers can measure lag independent of
    /// network delay.
    pub leader_ms: i64,
    /// The mutations this batch applies, in order.
    pub ops: Vec<EncodedOp>,
}

impl WriteBatchRecord {
    /// Serialize with `bincode`, the wire/WAL framing this module documents.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Inverse of [`WriteBatchRecord::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_bincode() {
        let record = WriteBatchRecord {
            seq_no: 7,
            leader_ms: 1_700_000_000_000,
            ops: vec![
                EncodedOp::Put { key: b"k1".to_vec(), value: b"v1".to_vec() },
                EncodedOp::Delete { key: b"k2".to_vec() },
            ],
        };
        let bytes = record.to_bytes().unwrap();
        let decoded = WriteBatchRecord::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, record);
    }
}
