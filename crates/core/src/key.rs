//! Logical key type (§3 Data Model).
//!
//! A logical key is `(database, table, primary_keys[], column_keys[])`.
//! Primary keys determine partition placement; column keys further qualify
//! a collection sub-entry (a hash field, a set member, ...). The codec
//! crate is what turns this into bytes; this module only carries the
//! logical shape and validates it the way the wire layer would.

use serde::{Deserialize, Serialize};

/// Partition number within a table, `hash mod table.partition_number` (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartitionId(pub u32);

/// A logical key: `(database, table, primary_keys[], column_keys[])`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogicalKey {
    /// Logical database name.
    pub database: String,
    /// Logical table name.
    pub table: String,
    /// Primary key components; determine partition placement (§3).
    pub primary_keys: Vec<String>,
    /// Column key components; qualify a collection sub-entry. Empty for
    /// plain string/counter keys.
    pub column_keys: Vec<String>,
}

impl LogicalKey {
    /// Build a key with no column-key qualification (raw string/counter).
    pub fn new(database: impl Into<String>, table: impl Into<String>, primary_keys: Vec<String>) -> Self {
        LogicalKey {
            database: database.into(),
            table: table.into(),
            primary_keys,
            column_keys: Vec::new(),
        }
    }

    /// Build a key qualified with column keys (a collection sub-entry).
    pub fn with_column_keys(
        database: impl Into<String>,
        table: impl Into<String>,
        primary_keys: Vec<String>,
        column_keys: Vec<String>,
    ) -> Self {
        LogicalKey {
            database: database.into(),
            table: table.into(),
            primary_keys,
            column_keys,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_structural() {
        let a = LogicalKey::new("db", "t", vec!["k".into()]);
        let b = LogicalKey::new("db", "t", vec!["k".into()]);
        assert_eq!(a, b);
    }

    #[test]
    fn column_keys_distinguish_otherwise_equal_keys() {
        let a = LogicalKey::new("db", "t", vec!["k".into()]);
        let b = LogicalKey::with_column_keys("db", "t", vec!["k".into()], vec!["f1".into()]);
        assert_ne!(a, b);
    }
}
