//! Key encoding: `collection_tag | primary_keys | entry_kind? | column_keys?`.
//!
//! See `SPEC_FULL.md` §4.1 for the full layout rationale. `prefix()` is the
//! byte-range start every sub-entry of a collection shares; `decode_key`
//! is total on anything `encode_head_key`/`encode_entry_key` produced,
//! given the primary-key arity the caller's table was defined with (a
//! length-prefixed stream can't otherwise tell a primary-key component
//! from the entry-kind marker that follows it).

use byteorder::{BigEndian, WriteBytesExt};
use thiserror::Error;

/// Which logical collection kind a row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionTag {
    /// Raw string or counter: a single value, no head/entry split.
    RawOrCounter,
    /// Hash: field -> value.
    Hash,
    /// Set: deduplicated members.
    Set,
    /// List: ordered slots addressed by index.
    List,
    /// Sorted set: member -> score, entries ordered by score.
    ZSet,
}

impl CollectionTag {
    fn to_byte(self) -> u8 {
        match self {
            CollectionTag::RawOrCounter => 0,
            CollectionTag::Hash => 1,
            CollectionTag::Set => 2,
            CollectionTag::List => 3,
            CollectionTag::ZSet => 4,
        }
    }

    fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(CollectionTag::RawOrCounter),
            1 => Some(CollectionTag::Hash),
            2 => Some(CollectionTag::Set),
            3 => Some(CollectionTag::List),
            4 => Some(CollectionTag::ZSet),
            _ => None,
        }
    }
}

/// Whether a collection row is the metadata head or a live sub-entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Collection metadata (size, or list front/back indices).
    Head,
    /// A live sub-entry: a hash field, set member, list slot or zset entry.
    Entry,
}

/// A decoded key, the inverse of `encode_head_key`/`encode_entry_key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedKey {
    /// Collection kind this row belongs to.
    pub collection: CollectionTag,
    /// Primary key components.
    pub primary_keys: Vec<Vec<u8>>,
    /// `None` for `RawOrCounter` rows (no head/entry split).
    pub entry: Option<EntryKind>,
    /// Column key components; empty unless `entry == Some(Entry)`.
    pub column_keys: Vec<Vec<u8>>,
}

/// Errors returned while decoding a key previously produced by this module.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    /// Buffer ended before a length-prefixed field could be read.
    #[error("truncated key")]
    Truncated,
    /// The leading byte isn't a known `CollectionTag`.
    #[error("unknown collection tag: {0}")]
    UnknownCollectionTag(u8),
    /// The entry-kind byte isn't 0 (head) or 1 (entry).
    #[error("unknown entry kind: {0}")]
    UnknownEntryKind(u8),
}

fn write_component(buf: &mut Vec<u8>, component: &[u8]) {
    buf.write_u16::<BigEndian>(component.len() as u16)
        .expect("writing to a Vec<u8> cannot fail");
    buf.extend_from_slice(component);
}

fn read_component(buf: &[u8], offset: &mut usize) -> Result<Vec<u8>, KeyError> {
    if buf.len() < *offset + 2 {
        return Err(KeyError::Truncated);
    }
    let len = u16::from_be_bytes([buf[*offset], buf[*offset + 1]]) as usize;
    *offset += 2;
    if buf.len() < *offset + len {
        return Err(KeyError::Truncated);
    }
    let value = buf[*offset..*offset + len].to_vec();
    *offset += len;
    Ok(value)
}

/// The shared byte prefix of a collection's head row and every live
/// sub-entry: `collection_tag | encode(primary_keys)`.
///
/// A byte-range scan starting at this prefix (up to the next prefix in
/// lexicographic order) yields exactly this collection's rows, which is
/// §4.1's prefix contract.
pub fn prefix(collection: CollectionTag, primary_keys: &[impl AsRef<[u8]>]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(1 + primary_keys.iter().map(|k| k.as_ref().len() + 2).sum::<usize>());
    buf.push(collection.to_byte());
    for component in primary_keys {
        write_component(&mut buf, component.as_ref());
    }
    buf
}

/// Encode the raw-string/counter row key (`CollectionTag::RawOrCounter`).
pub fn encode_raw_key(primary_keys: &[impl AsRef<[u8]>]) -> Vec<u8> {
    prefix(CollectionTag::RawOrCounter, primary_keys)
}

/// Encode a collection's metadata-head row key.
pub fn encode_head_key(collection: CollectionTag, primary_keys: &[impl AsRef<[u8]>]) -> Vec<u8> {
    debug_assert!(collection != CollectionTag::RawOrCounter, "raw keys have no head row");
    let mut buf = prefix(collection, primary_keys);
    buf.push(0); // EntryKind::Head
    buf
}

/// Encode a collection sub-entry row key (hash field, set member, list slot
/// by index, or zset score-indexed entry).
pub fn encode_entry_key(
    collection: CollectionTag,
    primary_keys: &[impl AsRef<[u8]>],
    column_keys: &[impl AsRef<[u8]>],
) -> Vec<u8> {
    debug_assert!(collection != CollectionTag::RawOrCounter, "raw keys have no sub-entries");
    let mut buf = prefix(collection, primary_keys);
    buf.push(1); // EntryKind::Entry
    for component in column_keys {
        write_component(&mut buf, component.as_ref());
    }
    buf
}

/// Decode a key, given how many primary-key components it was encoded
/// with (fixed per table, since a length-prefixed component stream can't
/// otherwise be told apart from the entry-kind marker that follows it).
pub fn decode_key(bytes: &[u8], primary_key_arity: usize) -> Result<DecodedKey, KeyError> {
    if bytes.is_empty() {
        return Err(KeyError::Truncated);
    }
    let collection = CollectionTag::from_byte(bytes[0]).ok_or(KeyError::UnknownCollectionTag(bytes[0]))?;
    let mut offset = 1;
    let mut primary_keys = Vec::with_capacity(primary_key_arity);
    for _ in 0..primary_key_arity {
        primary_keys.push(read_component(bytes, &mut offset)?);
    }

    if collection == CollectionTag::RawOrCounter {
        return Ok(DecodedKey {
            collection,
            primary_keys,
            entry: None,
            column_keys: Vec::new(),
        });
    }

    if bytes.len() <= offset {
        return Err(KeyError::Truncated);
    }
    let entry = match bytes[offset] {
        0 => EntryKind::Head,
        1 => EntryKind::Entry,
        other => return Err(KeyError::UnknownEntryKind(other)),
    };
    offset += 1;

    let mut column_keys = Vec::new();
    if entry == EntryKind::Entry {
        while offset < bytes.len() {
            column_keys.push(read_component(bytes, &mut offset)?);
        }
    }

    Ok(DecodedKey {
        collection,
        primary_keys,
        entry: Some(entry),
        column_keys,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_key_round_trips() {
        let pk = vec![b"user:1".to_vec()];
        let encoded = encode_raw_key(&pk);
        let decoded = decode_key(&encoded, 1).unwrap();
        assert_eq!(decoded.collection, CollectionTag::RawOrCounter);
        assert_eq!(decoded.primary_keys, pk);
        assert_eq!(decoded.entry, None);
    }

    #[test]
    fn hash_head_and_field_share_prefix() {
        let pk = vec![b"user:1".to_vec()];
        let head = encode_head_key(CollectionTag::Hash, &pk);
        let field = encode_entry_key(CollectionTag::Hash, &pk, &[b"name".to_vec()]);
        let p = prefix(CollectionTag::Hash, &pk);
        assert!(head.starts_with(&p));
        assert!(field.starts_with(&p));
    }

    #[test]
    fn unrelated_key_does_not_share_prefix() {
        let pk_a = vec![b"user:1".to_vec()];
        let pk_b = vec![b"user:2".to_vec()];
        let field_a = encode_entry_key(CollectionTag::Hash, &pk_a, &[b"name".to_vec()]);
        let p_b = prefix(CollectionTag::Hash, &pk_b);
        assert!(!field_a.starts_with(&p_b));
    }

    #[test]
    fn different_collection_same_primary_key_does_not_collide() {
        let pk = vec![b"k".to_vec()];
        let hash_head = encode_head_key(CollectionTag::Hash, &pk);
        let set_head = encode_head_key(CollectionTag::Set, &pk);
        assert_ne!(hash_head[0], set_head[0]);
    }

    #[test]
    fn decode_head_round_trip() {
        let pk = vec![b"k".to_vec()];
        let head = encode_head_key(CollectionTag::ZSet, &pk);
        let decoded = decode_key(&head, 1).unwrap();
        assert_eq!(decoded.entry, Some(EntryKind::Head));
        assert!(decoded.column_keys.is_empty());
    }

    #[test]
    fn decode_entry_round_trip_multi_column() {
        let pk = vec![b"k".to_vec()];
        let entry = encode_entry_key(CollectionTag::List, &pk, &[b"\x00\x00\x00\x00\x00\x00\x00\x02".to_vec()]);
        let decoded = decode_key(&entry, 1).unwrap();
        assert_eq!(decoded.entry, Some(EntryKind::Entry));
        assert_eq!(decoded.column_keys.len(), 1);
    }

    #[test]
    fn truncated_buffer_errors() {
        assert_eq!(decode_key(&[], 1), Err(KeyError::Truncated));
        assert_eq!(decode_key(&[0, 0, 5, b'a'], 1), Err(KeyError::Truncated));
    }

    #[test]
    fn multi_component_primary_key_round_trips() {
        let pk = vec![b"db".to_vec(), b"shard-7".to_vec()];
        let head = encode_head_key(CollectionTag::Set, &pk);
        let decoded = decode_key(&head, 2).unwrap();
        assert_eq!(decoded.primary_keys, pk);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::collection::vec as pvec;
    use proptest::prelude::*;

    fn collection_tag() -> impl Strategy<Value = CollectionTag> {
        prop_oneof![
            Just(CollectionTag::RawOrCounter),
            Just(CollectionTag::Hash),
            Just(CollectionTag::Set),
            Just(CollectionTag::List),
            Just(CollectionTag::ZSet),
        ]
    }

    proptest! {
        #[test]
        fn raw_key_round_trips_arbitrary_primary_keys(pk in pvec(pvec(any::<u8>(), 0..16), 1..4)) {
            let arity = pk.len();
            let encoded = encode_raw_key(&pk);
            let decoded = decode_key(&encoded, arity).unwrap();
            prop_assert_eq!(decoded.collection, CollectionTag::RawOrCounter);
            prop_assert_eq!(decoded.primary_keys, pk);
            prop_assert_eq!(decoded.entry, None);
        }

        #[test]
        fn head_key_round_trips_arbitrary_collection_and_keys(
            collection in collection_tag().prop_filter("head rows need a collection", |c| *c != CollectionTag::RawOrCounter),
            pk in pvec(pvec(any::<u8>(), 0..16), 1..4),
        ) {
            let arity = pk.len();
            let encoded = encode_head_key(collection, &pk);
            let decoded = decode_key(&encoded, arity).unwrap();
            prop_assert_eq!(decoded.collection, collection);
            prop_assert_eq!(decoded.primary_keys, pk);
            prop_assert_eq!(decoded.entry, Some(EntryKind::Head));
            prop_assert!(decoded.column_keys.is_empty());
        }

        #[test]
        fn entry_key_round_trips_arbitrary_columns(
            collection in collection_tag().prop_filter("entries need a collection", |c| *c != CollectionTag::RawOrCounter),
            pk in pvec(pvec(any::<u8>(), 0..16), 1..4),
            columns in pvec(pvec(any::<u8>(), 0..16), 0..4),
        ) {
            let arity = pk.len();
            let encoded = encode_entry_key(collection, &pk, &columns);
            let decoded = decode_key(&encoded, arity).unwrap();
            prop_assert_eq!(decoded.collection, collection);
            prop_assert_eq!(decoded.primary_keys, pk);
            prop_assert_eq!(decoded.entry, Some(EntryKind::Entry));
            prop_assert_eq!(decoded.column_keys, columns);
        }
    }
}
