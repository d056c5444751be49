//! Value encoding: `value_tag:u8 | expire_ms:u64(LE) | payload`.
//!
//! `encode_value` is self-describing (§4.1): a reader recovers the value
//! variant from the payload alone via `value_tag`, without consulting the
//! key. TTL travels with every row that can expire independently: the
//! raw-string/counter row and each collection's head row. Sub-entry rows
//! (hash fields, set members, list slots, zset entries) have no TTL of
//! their own — they expire when their collection's head does.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;

/// Errors decoding a value payload.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValueError {
    /// Buffer too short to contain a tag and expiry.
    #[error("truncated value")]
    Truncated,
    /// The leading byte isn't a known `ValueTag`.
    #[error("unknown value tag: {0}")]
    UnknownTag(u8),
}

/// Discriminant stored as the first byte of every encoded value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueTag {
    /// Raw string payload.
    RawString,
    /// 64-bit counter payload.
    Counter,
    /// Hash/Set/ZSet metadata head: a live-member count.
    CollectionSize,
    /// List metadata head: front index, back index, length.
    ListHead,
    /// Hash field or list slot payload (arbitrary bytes).
    Bytes,
    /// Set member presence marker (no payload beyond tag+expiry).
    Presence,
    /// Sorted-set score-indexed entry payload: the member's score.
    Score,
}

impl ValueTag {
    fn to_byte(self) -> u8 {
        match self {
            ValueTag::RawString => 0,
            ValueTag::Counter => 1,
            ValueTag::CollectionSize => 2,
            ValueTag::ListHead => 3,
            ValueTag::Bytes => 4,
            ValueTag::Presence => 5,
            ValueTag::Score => 6,
        }
    }

    fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(ValueTag::RawString),
            1 => Some(ValueTag::Counter),
            2 => Some(ValueTag::CollectionSize),
            3 => Some(ValueTag::ListHead),
            4 => Some(ValueTag::Bytes),
            5 => Some(ValueTag::Presence),
            6 => Some(ValueTag::Score),
            _ => None,
        }
    }
}

fn header(tag: ValueTag, expire_ms: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(9);
    buf.push(tag.to_byte());
    buf.write_u64::<LittleEndian>(expire_ms).expect("Vec<u8> writes cannot fail");
    buf
}

fn split_header(bytes: &[u8]) -> Result<(ValueTag, u64, &[u8]), ValueError> {
    if bytes.len() < 9 {
        return Err(ValueError::Truncated);
    }
    let tag = ValueTag::from_byte(bytes[0]).ok_or(ValueError::UnknownTag(bytes[0]))?;
    let mut expiry_bytes = &bytes[1..9];
    let expire_ms = expiry_bytes.read_u64::<LittleEndian>().expect("slice is exactly 8 bytes");
    Ok((tag, expire_ms, &bytes[9..]))
}

/// Encode a raw-string row (`expire_ms == 0` means no TTL, §4.1).
pub fn encode_raw_string(value: &[u8], expire_ms: u64) -> Vec<u8> {
    let mut buf = header(ValueTag::RawString, expire_ms);
    buf.extend_from_slice(value);
    buf
}

/// Decode a raw-string row, returning `(value, expire_ms)`.
pub fn decode_raw_string(bytes: &[u8]) -> Result<(Vec<u8>, u64), ValueError> {
    let (tag, expire_ms, payload) = split_header(bytes)?;
    if tag != ValueTag::RawString {
        return Err(ValueError::UnknownTag(tag.to_byte()));
    }
    Ok((payload.to_vec(), expire_ms))
}

/// Encode a counter row.
pub fn encode_counter(value: i64, expire_ms: u64) -> Vec<u8> {
    let mut buf = header(ValueTag::Counter, expire_ms);
    buf.write_i64::<LittleEndian>(value).expect("Vec<u8> writes cannot fail");
    buf
}

/// Decode a counter row, returning `(value, expire_ms)`.
pub fn decode_counter(bytes: &[u8]) -> Result<(i64, u64), ValueError> {
    let (tag, expire_ms, mut payload) = split_header(bytes)?;
    if tag != ValueTag::Counter {
        return Err(ValueError::UnknownTag(tag.to_byte()));
    }
    let value = payload.read_i64::<LittleEndian>().map_err(|_| ValueError::Truncated)?;
    Ok((value, expire_ms))
}

/// Encode a hash/set/zset metadata head (live-member count).
pub fn encode_collection_size(size: u64, expire_ms: u64) -> Vec<u8> {
    let mut buf = header(ValueTag::CollectionSize, expire_ms);
    buf.write_u64::<LittleEndian>(size).expect("Vec<u8> writes cannot fail");
    buf
}

/// Decode a hash/set/zset metadata head, returning `(size, expire_ms)`.
pub fn decode_collection_size(bytes: &[u8]) -> Result<(u64, u64), ValueError> {
    let (tag, expire_ms, mut payload) = split_header(bytes)?;
    if tag != ValueTag::CollectionSize {
        return Err(ValueError::UnknownTag(tag.to_byte()));
    }
    let size = payload.read_u64::<LittleEndian>().map_err(|_| ValueError::Truncated)?;
    Ok((size, expire_ms))
}

/// Encode a list metadata head (front index, back index, length).
pub fn encode_list_head(front: u64, back: u64, len: u64, expire_ms: u64) -> Vec<u8> {
    let mut buf = header(ValueTag::ListHead, expire_ms);
    buf.write_u64::<LittleEndian>(front).expect("Vec<u8> writes cannot fail");
    buf.write_u64::<LittleEndian>(back).expect("Vec<u8> writes cannot fail");
    buf.write_u64::<LittleEndian>(len).expect("Vec<u8> writes cannot fail");
    buf
}

/// Decode a list metadata head, returning `(front, back, len, expire_ms)`.
pub fn decode_list_head(bytes: &[u8]) -> Result<(u64, u64, u64, u64), ValueError> {
    let (tag, expire_ms, mut payload) = split_header(bytes)?;
    if tag != ValueTag::ListHead {
        return Err(ValueError::UnknownTag(tag.to_byte()));
    }
    let front = payload.read_u64::<LittleEndian>().map_err(|_| ValueError::Truncated)?;
    let back = payload.read_u64::<LittleEndian>().map_err(|_| ValueError::Truncated)?;
    let len = payload.read_u64::<LittleEndian>().map_err(|_| ValueError::Truncated)?;
    Ok((front, back, len, expire_ms))
}

/// Encode a hash field or list slot payload. Sub-entries carry no TTL of
/// their own (it's tracked on the collection head), so `expire_ms` is
/// always `0` here.
pub fn encode_bytes(value: &[u8]) -> Vec<u8> {
    let mut buf = header(ValueTag::Bytes, 0);
    buf.extend_from_slice(value);
    buf
}

/// Decode a hash field or list slot payload.
pub fn decode_bytes(bytes: &[u8]) -> Result<Vec<u8>, ValueError> {
    let (tag, _expire_ms, payload) = split_header(bytes)?;
    if tag != ValueTag::Bytes {
        return Err(ValueError::UnknownTag(tag.to_byte()));
    }
    Ok(payload.to_vec())
}

/// Encode a set-member presence marker.
pub fn encode_presence() -> Vec<u8> {
    header(ValueTag::Presence, 0)
}

/// Encode a sorted-set score-indexed entry payload (the member's score,
/// stored redundantly so a reader needn't re-derive it from the key's
/// order-preserving bytes).
pub fn encode_score(score: f64) -> Vec<u8> {
    let mut buf = header(ValueTag::Score, 0);
    buf.write_f64::<LittleEndian>(score).expect("Vec<u8> writes cannot fail");
    buf
}

/// Decode a sorted-set score-indexed entry payload.
pub fn decode_score(bytes: &[u8]) -> Result<f64, ValueError> {
    let (tag, _expire_ms, mut payload) = split_header(bytes)?;
    if tag != ValueTag::Score {
        return Err(ValueError::UnknownTag(tag.to_byte()));
    }
    payload.read_f64::<LittleEndian>().map_err(|_| ValueError::Truncated)
}

/// `expire_ms > 0 && expire_ms <= now_ms` (§4.1).
pub fn is_expired(expire_ms: u64, now_ms: u64) -> bool {
    expire_ms > 0 && expire_ms <= now_ms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_string_round_trips() {
        let encoded = encode_raw_string(b"hello", 12345);
        let (value, expire_ms) = decode_raw_string(&encoded).unwrap();
        assert_eq!(value, b"hello");
        assert_eq!(expire_ms, 12345);
    }

    #[test]
    fn counter_round_trips_negative() {
        let encoded = encode_counter(-42, 0);
        let (value, expire_ms) = decode_counter(&encoded).unwrap();
        assert_eq!(value, -42);
        assert_eq!(expire_ms, 0);
    }

    #[test]
    fn collection_size_round_trips() {
        let encoded = encode_collection_size(7, 999);
        let (size, expire_ms) = decode_collection_size(&encoded).unwrap();
        assert_eq!(size, 7);
        assert_eq!(expire_ms, 999);
    }

    #[test]
    fn list_head_round_trips() {
        let encoded = encode_list_head(5, 9, 4, 0);
        let (front, back, len, expire_ms) = decode_list_head(&encoded).unwrap();
        assert_eq!((front, back, len, expire_ms), (5, 9, 4, 0));
    }

    #[test]
    fn score_round_trips() {
        let encoded = encode_score(-3.5);
        assert_eq!(decode_score(&encoded).unwrap(), -3.5);
    }

    #[test]
    fn decoding_with_wrong_tag_errors() {
        let encoded = encode_counter(1, 0);
        assert!(decode_raw_string(&encoded).is_err());
    }

    #[test]
    fn expiry_semantics() {
        assert!(!is_expired(0, 1_000)); // 0 means no TTL
        assert!(!is_expired(1_001, 1_000)); // in the future
        assert!(is_expired(1_000, 1_000)); // exactly now counts as expired
        assert!(is_expired(500, 1_000));
    }
}
