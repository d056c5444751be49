//! Size limits enforced by the engine and wire decoding.
//!
//! Violations return `Error::InvalidArgument`. These are per-table
//! defaults; `TableEngineOptions` (see `laser-router`) can override them.

/// Size limits for keys, values and collections.
#[derive(Debug, Clone)]
pub struct Limits {
    /// Maximum key length in bytes.
    pub max_key_bytes: usize,
    /// Maximum raw-string / hash-field / set-member / list-slot value length.
    pub max_value_bytes: usize,
    /// Maximum number of live members in a hash/set/list/zset.
    pub max_collection_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_key_bytes: 1024,
            max_value_bytes: 16 * 1024 * 1024,
            max_collection_size: 1_000_000,
        }
    }
}
