//! Logical value types (§1, §3).
//!
//! `Value` is the materialized, in-memory shape of a logical key's value —
//! what `get`/`hgetall`/`lrange`/`zrangeByScore` hand back to a caller.
//! It is distinct from the codec's on-disk entry encoding (one physical
//! entry per hash field / set member / list slot / zset member, see
//! `laser-codec`): `Value::Hash`/`Set`/`List`/`ZSet` are assembled by the
//! engine from those entries before being returned.

use std::collections::{BTreeMap, VecDeque};

/// Discriminant for `Value`, used where only the kind (not the payload)
/// matters — e.g. rejecting a `hset` against a key that holds a `Str`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Raw string.
    Str,
    /// 64-bit atomic counter.
    Counter,
    /// Field -> string map.
    Hash,
    /// Set of string members.
    Set,
    /// Ordered list of strings.
    List,
    /// Member -> f64 score map, ordered by score.
    ZSet,
}

/// A materialized logical value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Raw byte string.
    Str(Vec<u8>),
    /// 64-bit atomic counter.
    Counter(i64),
    /// Field -> value hash.
    Hash(BTreeMap<String, Vec<u8>>),
    /// Set of members, deduplicated.
    Set(std::collections::BTreeSet<Vec<u8>>),
    /// Ordered list, front to back.
    List(VecDeque<Vec<u8>>),
    /// Sorted set: member -> score. Iteration order is by score then member
    /// (matches the codec's score-indexed byte order, §4.1).
    ZSet(Vec<(Vec<u8>, f64)>),
}

impl Value {
    /// This value's kind discriminant.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Str(_) => ValueKind::Str,
            Value::Counter(_) => ValueKind::Counter,
            Value::Hash(_) => ValueKind::Hash,
            Value::Set(_) => ValueKind::Set,
            Value::List(_) => ValueKind::List,
            Value::ZSet(_) => ValueKind::ZSet,
        }
    }
}

impl ValueKind {
    /// The codec `value_tag` byte for this kind (§4.1 ADD, `SPEC_FULL.md`).
    pub fn tag(self) -> u8 {
        match self {
            ValueKind::Str => 0,
            ValueKind::Counter => 1,
            ValueKind::Hash => 2,
            ValueKind::Set => 3,
            ValueKind::List => 4,
            ValueKind::ZSet => 5,
        }
    }

    /// Recover a kind from its codec tag byte.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(ValueKind::Str),
            1 => Some(ValueKind::Counter),
            2 => Some(ValueKind::Hash),
            3 => Some(ValueKind::Set),
            4 => Some(ValueKind::List),
            5 => Some(ValueKind::ZSet),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_round_trips_for_every_kind() {
        for kind in [
            ValueKind::Str,
            ValueKind::Counter,
            ValueKind::Hash,
            ValueKind::Set,
            ValueKind::List,
            ValueKind::ZSet,
        ] {
            assert_eq!(ValueKind::from_tag(kind.tag()), Some(kind));
        }
    }
}
