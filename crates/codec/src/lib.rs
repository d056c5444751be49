//! Encoded Key/Value Codec (§4.1).
//!
//! Deterministic byte layout for every logical value kind, sharing one
//! physical key-value namespace inside a single partition. See
//! `SPEC_FULL.md` §4.1 for the exact byte layout this module implements.

pub mod key;
pub mod score;
pub mod value;

pub use key::{
    decode_key, encode_entry_key, encode_head_key, encode_raw_key, prefix, CollectionTag, DecodedKey, EntryKind,
    KeyError,
};
pub use score::{decode_order_preserving_score, encode_order_preserving_score};
pub use value::{
    decode_bytes, decode_collection_size, decode_counter, decode_list_head, decode_raw_string, decode_score,
    encode_bytes, encode_collection_size, encode_counter, encode_list_head, encode_presence, encode_raw_string,
    encode_score, is_expired, ValueError, ValueTag,
};
