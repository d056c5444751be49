//! The Partition Engine: a single-writer, multi-reader log-structured KV
//! store offering point ops, TTL, atomic counters, and the four collection
//! types (hash, set, list, sorted set) over one physical byte namespace
//! (§4.2).

use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use laser_codec::{
    decode_bytes, decode_collection_size, decode_counter, decode_key, decode_list_head, decode_order_preserving_score,
    decode_raw_string, decode_score, encode_bytes, encode_collection_size, encode_counter, encode_entry_key,
    encode_head_key, encode_list_head, encode_order_preserving_score, encode_presence, encode_raw_key,
    encode_raw_string, encode_score, is_expired, CollectionTag,
};
use laser_core::error::{Error, Result};
use laser_core::key::PartitionId;
use laser_core::limits::Limits;

use crate::batch::{EncodedOp, WriteBatchRecord};
use crate::table::TableSchema;
use crate::wal::{self, WalError, WalReader, WalWriter};

fn map_wal_error(e: WalError) -> Error {
    match e {
        WalError::Io(io) => Error::IoError(io),
        WalError::ChecksumMismatch => Error::Corruption("wal record checksum mismatch".to_string()),
        WalError::Encoding(err) => Error::Corruption(format!("wal record encoding error: {err}")),
    }
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Options for [`PartitionEngine::setx`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SetxOptions {
    /// Fail with `KeyExists` if the key is already present (and unexpired).
    pub not_exists: bool,
    /// Per-key TTL in milliseconds; `None` falls back to the table default.
    pub ttl_ms: Option<u64>,
}

/// A `[start, stop]` index range for `lrange`, Redis-style: negative
/// indices count from the end, both ends inclusive.
#[derive(Debug, Clone, Copy)]
pub struct ListRange {
    pub start: i64,
    pub stop: i64,
}

/// One sorted-set member/score pair, as returned by `zrangeByScore`.
#[derive(Debug, Clone, PartialEq)]
pub struct ZMember {
    pub member: Vec<u8>,
    pub score: f64,
}

/// List head offsets are biased around this midpoint so `push_front` can
/// run for a long time before underflowing a `u64` column key.
const LIST_INDEX_MID: u64 = u64::MAX / 2;

/// Number of recent committed batches kept in memory for log-tailing
/// (§4.3's pull loop). Batches older than this are still durable in the
/// WAL but are no longer cheaply replayable without a full WAL rescan,
/// which is exactly the condition that triggers bulk transfer.
const RETAINED_LOG_CAPACITY: usize = 4096;

fn prefix_upper_bound(prefix: &[u8]) -> Vec<u8> {
    let mut bound = prefix.to_vec();
    for i in (0..bound.len()).rev() {
        if bound[i] != 0xFF {
            bound[i] += 1;
            bound.truncate(i + 1);
            return bound;
        }
    }
    let mut extended = vec![0xFFu8; prefix.len() + 1];
    extended[prefix.len()] = 0xFF;
    extended
}

/// One isolated log-structured storage instance for a `(table,
/// partition_id)`. Role enforcement (leader vs. follower write
/// acceptance) is the Replication DB's job, not the engine's (§4.3).
pub struct PartitionEngine {
    partition_id: PartitionId,
    schema: TableSchema,
    limits: Limits,
    store: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    wal: parking_lot::Mutex<WalWriter>,
    seq_no: AtomicU64,
    retained_log: RwLock<VecDeque<WriteBatchRecord>>,
}

impl PartitionEngine {
    /// Open (or create) a partition engine backed by a WAL directory,
    /// replaying every committed batch to rebuild the in-memory map.
    pub fn open(partition_id: PartitionId, schema: TableSchema, limits: Limits, wal_dir: impl AsRef<Path>) -> Result<Self> {
        let wal_dir = wal_dir.as_ref();
        let records = WalReader::read_all(wal_dir).map_err(map_wal_error)?;
        let mut store = BTreeMap::new();
        let mut last_seq_no = 0u64;
        for record in &records {
            apply_ops(&mut store, &record.ops);
            last_seq_no = record.seq_no;
        }
        let wal_writer = WalWriter::open(wal_dir, schema.durability, schema.wal_segment_bytes).map_err(map_wal_error)?;

        let retained_log = records
            .into_iter()
            .rev()
            .take(RETAINED_LOG_CAPACITY)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();

        Ok(PartitionEngine {
            partition_id,
            schema,
            limits,
            store: RwLock::new(store),
            wal: parking_lot::Mutex::new(wal_writer),
            seq_no: AtomicU64::new(last_seq_no),
            retained_log: RwLock::new(retained_log),
        })
    }

    /// The partition this engine instance backs.
    pub fn partition_id(&self) -> PartitionId {
        self.partition_id
    }

    /// The last committed sequence number.
    pub fn seq_no(&self) -> u64 {
        self.seq_no.load(Ordering::Acquire)
    }

    fn commit(&self, ops: Vec<EncodedOp>) -> Result<u64> {
        if ops.is_empty() {
            return Ok(self.seq_no());
        }
        let mut store = self.store.write();
        let seq_no = self.seq_no.fetch_add(1, Ordering::AcqRel) + 1;
        let record = WriteBatchRecord { seq_no, leader_ms: now_ms(), ops };
        self.wal.lock().append(&record).map_err(map_wal_error)?;
        apply_ops(&mut store, &record.ops);
        self.push_retained(record);
        Ok(seq_no)
    }

    fn push_retained(&self, record: WriteBatchRecord) {
        let mut log = self.retained_log.write();
        log.push_back(record);
        while log.len() > RETAINED_LOG_CAPACITY {
            log.pop_front();
        }
    }

    /// The oldest sequence number this engine can hand back without a full
    /// WAL rescan. `None` means nothing has been retained yet (a brand new
    /// partition). A puller requesting anything older than this must fall
    /// back to bulk transfer (§4.3 step 3).
    pub fn earliest_retained_seq_no(&self) -> Option<u64> {
        self.retained_log.read().front().map(|r| r.seq_no)
    }

    /// In-order committed batches with `seq_no >= from_seq_no`, capped by
    /// count and serialized-byte size. Returns an empty vec both when there
    /// is nothing new yet and when `from_seq_no` already fell out of
    /// retention — callers distinguish the two with
    /// [`PartitionEngine::earliest_retained_seq_no`].
    pub fn batches_since(&self, from_seq_no: u64, max_count: usize, max_bytes: usize) -> Vec<WriteBatchRecord> {
        let log = self.retained_log.read();
        let mut out = Vec::new();
        let mut bytes = 0usize;
        for record in log.iter().filter(|r| r.seq_no >= from_seq_no) {
            if out.len() >= max_count {
                break;
            }
            let encoded_len = record.to_bytes().map(|b| b.len()).unwrap_or(0);
            if !out.is_empty() && bytes + encoded_len > max_bytes {
                break;
            }
            bytes += encoded_len;
            out.push(record.clone());
        }
        out
    }

    /// Apply a batch pulled from the leader's log during replication. The
    /// caller (the Replication DB's pull loop) must serialize calls and
    /// ensure `record.seq_no` is exactly the next expected one — this
    /// method enforces that strict monotonicity invariant (§3, §8) but
    /// does not itself coordinate concurrent pullers.
    pub fn apply_replicated(&self, record: WriteBatchRecord) -> Result<()> {
        let mut store = self.store.write();
        let expected = self.seq_no.load(Ordering::Acquire) + 1;
        if record.seq_no != expected {
            return Err(Error::InvalidArgument(format!(
                "replicated batch seq_no {} is not the expected next seq_no {}",
                record.seq_no, expected
            )));
        }
        self.wal.lock().append(&record).map_err(map_wal_error)?;
        apply_ops(&mut store, &record.ops);
        self.seq_no.store(record.seq_no, Ordering::Release);
        self.push_retained(record);
        Ok(())
    }

    fn default_ttl_expire_ms(&self, ttl_ms: Option<u64>) -> u64 {
        let ttl = ttl_ms.or(self.schema.default_ttl_ms);
        match ttl {
            Some(ttl) => now_ms() as u64 + ttl,
            None => 0,
        }
    }

    // ------------------------------------------------------------------
    // Point ops (raw string / counter)
    // ------------------------------------------------------------------

    /// `get`: returns `None` if absent or expired (and opportunistically
    /// deletes an expired key, §3 Invariants).
    pub fn get(&self, pk: &[&str]) -> Result<Option<Vec<u8>>> {
        let key = encode_raw_key(pk);
        let expired = {
            let store = self.store.read();
            match store.get(&key) {
                Some(bytes) => {
                    let (value, expire_ms) = decode_raw_string(bytes).map_err(|e| Error::Corruption(e.to_string()))?;
                    if is_expired(expire_ms, now_ms() as u64) {
                        true
                    } else {
                        return Ok(Some(value));
                    }
                }
                None => return Ok(None),
            }
        };
        if expired {
            let _ = self.commit(vec![EncodedOp::Delete { key }]);
        }
        Ok(None)
    }

    /// `exist`.
    pub fn exist(&self, pk: &[&str]) -> Result<bool> {
        Ok(self.get(pk)?.is_some())
    }

    /// `ttl`: remaining milliseconds, or `None` if the key has no TTL or
    /// doesn't exist.
    pub fn ttl(&self, pk: &[&str]) -> Result<Option<u64>> {
        let key = encode_raw_key(pk);
        let store = self.store.read();
        match store.get(&key) {
            Some(bytes) => {
                let (_, expire_ms) = decode_raw_string(bytes).map_err(|e| Error::Corruption(e.to_string()))?;
                if expire_ms == 0 {
                    Ok(None)
                } else {
                    Ok(Some(expire_ms.saturating_sub(now_ms() as u64)))
                }
            }
            None => Ok(None),
        }
    }

    /// `expire`: set a new TTL (relative, milliseconds) on an existing key.
    pub fn expire(&self, pk: &[&str], ttl_ms: u64) -> Result<()> {
        self.expire_at(pk, now_ms() as u64 + ttl_ms)
    }

    /// `expireAt`: set a new TTL as an absolute millisecond timestamp.
    pub fn expire_at(&self, pk: &[&str], at_ms: u64) -> Result<()> {
        let key = encode_raw_key(pk);
        let value = {
            let store = self.store.read();
            let bytes = store.get(&key).ok_or(Error::NotFound)?;
            decode_raw_string(bytes).map_err(|e| Error::Corruption(e.to_string()))?.0
        };
        self.commit(vec![EncodedOp::Put { key, value: encode_raw_string(&value, at_ms) }])?;
        Ok(())
    }

    /// `delkey`.
    pub fn delkey(&self, pk: &[&str]) -> Result<()> {
        let key = encode_raw_key(pk);
        self.commit(vec![EncodedOp::Delete { key }])?;
        Ok(())
    }

    /// `set`.
    pub fn set(&self, pk: &[&str], value: &[u8]) -> Result<()> {
        self.validate_value_size(value)?;
        let key = encode_raw_key(pk);
        let expire_ms = self.default_ttl_expire_ms(None);
        self.commit(vec![EncodedOp::Put { key, value: encode_raw_string(value, expire_ms) }])?;
        Ok(())
    }

    /// `setx`.
    pub fn setx(&self, pk: &[&str], value: &[u8], options: SetxOptions) -> Result<()> {
        self.validate_value_size(value)?;
        let key = encode_raw_key(pk);
        if options.not_exists && self.exist(pk)? {
            return Err(Error::KeyExists);
        }
        let expire_ms = self.default_ttl_expire_ms(options.ttl_ms);
        self.commit(vec![EncodedOp::Put { key, value: encode_raw_string(value, expire_ms) }])?;
        Ok(())
    }

    /// `append`: returns the new length.
    pub fn append(&self, pk: &[&str], value: &[u8]) -> Result<usize> {
        let key = encode_raw_key(pk);
        let (mut current, expire_ms) = {
            let store = self.store.read();
            match store.get(&key) {
                Some(bytes) => decode_raw_string(bytes).map_err(|e| Error::Corruption(e.to_string()))?,
                None => (Vec::new(), 0),
            }
        };
        current.extend_from_slice(value);
        self.validate_value_size(&current)?;
        let new_len = current.len();
        self.commit(vec![EncodedOp::Put { key, value: encode_raw_string(&current, expire_ms) }])?;
        Ok(new_len)
    }

    /// `incrBy`/`decrBy` share this: `step` is negative for `decrBy`.
    pub fn incr_by(&self, pk: &[&str], step: i64) -> Result<i64> {
        let key = encode_raw_key(pk);
        let current = {
            let store = self.store.read();
            match store.get(&key) {
                Some(bytes) => decode_counter(bytes).map_err(|e| Error::Corruption(e.to_string()))?.0,
                None => 0,
            }
        };
        let new_value = current
            .checked_add(step)
            .ok_or_else(|| Error::InvalidArgument("counter overflow".to_string()))?;
        self.commit(vec![EncodedOp::Put { key, value: encode_counter(new_value, 0) }])?;
        Ok(new_value)
    }

    /// `mset`: partial success, one `Result` per input pair (§4.2).
    pub fn mset(&self, pairs: &[(&[&str], &[u8])]) -> Vec<Result<()>> {
        pairs.iter().map(|(pk, value)| self.set(pk, value)).collect()
    }

    /// `mget`: partial success, one `Result` per input key.
    pub fn mget(&self, pks: &[&[&str]]) -> Vec<Result<Option<Vec<u8>>>> {
        pks.iter().map(|pk| self.get(pk)).collect()
    }

    fn validate_value_size(&self, value: &[u8]) -> Result<()> {
        if value.len() > self.limits.max_value_bytes {
            return Err(Error::InvalidArgument(format!(
                "value of {} bytes exceeds max_value_bytes {}",
                value.len(),
                self.limits.max_value_bytes
            )));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Hash ops
    // ------------------------------------------------------------------

    fn collection_size(&self, tag: CollectionTag, pk: &[&str]) -> u64 {
        let head = encode_head_key(tag, pk);
        let store = self.store.read();
        store.get(&head).and_then(|b| decode_collection_size(b).ok()).map(|(size, _)| size).unwrap_or(0)
    }

    /// `hset`: returns `true` if the field was newly created.
    pub fn hset(&self, pk: &[&str], field: &str, value: &[u8]) -> Result<bool> {
        self.validate_value_size(value)?;
        let entry_key = encode_entry_key(CollectionTag::Hash, pk, &[field.as_bytes()]);
        let head_key = encode_head_key(CollectionTag::Hash, pk);
        let mut ops = vec![EncodedOp::Put { key: entry_key.clone(), value: encode_bytes(value) }];
        let is_new = {
            let store = self.store.read();
            !store.contains_key(&entry_key)
        };
        if is_new {
            let size = self.collection_size(CollectionTag::Hash, pk);
            ops.push(EncodedOp::Put { key: head_key, value: encode_collection_size(size + 1, 0) });
        }
        self.commit(ops)?;
        Ok(is_new)
    }

    /// `hget`.
    pub fn hget(&self, pk: &[&str], field: &str) -> Result<Option<Vec<u8>>> {
        let key = encode_entry_key(CollectionTag::Hash, pk, &[field.as_bytes()]);
        let store = self.store.read();
        match store.get(&key) {
            Some(bytes) => Ok(Some(decode_bytes(bytes).map_err(|e| Error::Corruption(e.to_string()))?)),
            None => Ok(None),
        }
    }

    /// `hmset`.
    pub fn hmset(&self, pk: &[&str], fields: &[(&str, &[u8])]) -> Result<()> {
        for (field, value) in fields {
            self.hset(pk, field, value)?;
        }
        Ok(())
    }

    /// `hmget`.
    pub fn hmget(&self, pk: &[&str], fields: &[&str]) -> Result<Vec<Option<Vec<u8>>>> {
        fields.iter().map(|f| self.hget(pk, f)).collect()
    }

    /// `hgetall`.
    pub fn hgetall(&self, pk: &[&str]) -> Result<Vec<(String, Vec<u8>)>> {
        let prefix = encode_entry_key(CollectionTag::Hash, pk, &[] as &[&[u8]]);
        let upper = prefix_upper_bound(&prefix);
        let store = self.store.read();
        let mut out = Vec::new();
        for (key, value) in store.range(prefix.clone()..upper) {
            let decoded = decode_key(key, self.schema.primary_key_arity).map_err(|e| Error::Corruption(e.to_string()))?;
            let field_bytes = decoded.column_keys.into_iter().next().ok_or_else(|| Error::Corruption("hash entry missing field".to_string()))?;
            let field = String::from_utf8(field_bytes).map_err(|e| Error::Corruption(e.to_string()))?;
            out.push((field, decode_bytes(value).map_err(|e| Error::Corruption(e.to_string()))?));
        }
        Ok(out)
    }

    /// `hkeys`.
    pub fn hkeys(&self, pk: &[&str]) -> Result<Vec<String>> {
        Ok(self.hgetall(pk)?.into_iter().map(|(field, _)| field).collect())
    }

    /// `hlen`.
    pub fn hlen(&self, pk: &[&str]) -> u64 {
        self.collection_size(CollectionTag::Hash, pk)
    }

    /// `hexists`.
    pub fn hexists(&self, pk: &[&str], field: &str) -> Result<bool> {
        Ok(self.hget(pk, field)?.is_some())
    }

    /// `hdel`: returns `true` if the field existed.
    pub fn hdel(&self, pk: &[&str], field: &str) -> Result<bool> {
        let entry_key = encode_entry_key(CollectionTag::Hash, pk, &[field.as_bytes()]);
        let existed = { self.store.read().contains_key(&entry_key) };
        if !existed {
            return Ok(false);
        }
        let head_key = encode_head_key(CollectionTag::Hash, pk);
        let size = self.collection_size(CollectionTag::Hash, pk);
        let ops = vec![
            EncodedOp::Delete { key: entry_key },
            EncodedOp::Put { key: head_key, value: encode_collection_size(size.saturating_sub(1), 0) },
        ];
        self.commit(ops)?;
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Set ops
    // ------------------------------------------------------------------

    /// `sadd`: returns `true` if the member was newly added.
    pub fn sadd(&self, pk: &[&str], member: &[u8]) -> Result<bool> {
        let entry_key = encode_entry_key(CollectionTag::Set, pk, &[member]);
        let is_new = { !self.store.read().contains_key(&entry_key) };
        if !is_new {
            return Ok(false);
        }
        let head_key = encode_head_key(CollectionTag::Set, pk);
        let size = self.collection_size(CollectionTag::Set, pk);
        self.commit(vec![
            EncodedOp::Put { key: entry_key, value: encode_presence() },
            EncodedOp::Put { key: head_key, value: encode_collection_size(size + 1, 0) },
        ])?;
        Ok(true)
    }

    /// `sdel`: returns `true` if the member existed.
    pub fn sdel(&self, pk: &[&str], member: &[u8]) -> Result<bool> {
        let entry_key = encode_entry_key(CollectionTag::Set, pk, &[member]);
        let existed = { self.store.read().contains_key(&entry_key) };
        if !existed {
            return Ok(false);
        }
        let head_key = encode_head_key(CollectionTag::Set, pk);
        let size = self.collection_size(CollectionTag::Set, pk);
        self.commit(vec![
            EncodedOp::Delete { key: entry_key },
            EncodedOp::Put { key: head_key, value: encode_collection_size(size.saturating_sub(1), 0) },
        ])?;
        Ok(true)
    }

    /// `hasMember`.
    pub fn has_member(&self, pk: &[&str], member: &[u8]) -> bool {
        let entry_key = encode_entry_key(CollectionTag::Set, pk, &[member]);
        self.store.read().contains_key(&entry_key)
    }

    /// `members`.
    pub fn members(&self, pk: &[&str]) -> Result<Vec<Vec<u8>>> {
        let prefix = encode_entry_key(CollectionTag::Set, pk, &[] as &[&[u8]]);
        let upper = prefix_upper_bound(&prefix);
        let store = self.store.read();
        let mut out = Vec::new();
        for key in store.range(prefix.clone()..upper).map(|(k, _)| k) {
            let decoded = decode_key(key, self.schema.primary_key_arity).map_err(|e| Error::Corruption(e.to_string()))?;
            let member = decoded.column_keys.into_iter().next().ok_or_else(|| Error::Corruption("set entry missing member".to_string()))?;
            out.push(member);
        }
        Ok(out)
    }

    // ------------------------------------------------------------------
    // List ops — front/back indices biased around LIST_INDEX_MID so
    // push_front has headroom without going negative (§4.2: O(1) at ends).
    // ------------------------------------------------------------------

    fn list_head(&self, pk: &[&str]) -> (u64, u64, u64) {
        let head_key = encode_head_key(CollectionTag::List, pk);
        let store = self.store.read();
        store
            .get(&head_key)
            .and_then(|b| decode_list_head(b).ok())
            .map(|(front, back, len, _)| (front, back, len))
            .unwrap_or((LIST_INDEX_MID, LIST_INDEX_MID, 0))
    }

    fn list_slot_key(pk: &[&str], index: u64) -> Vec<u8> {
        encode_entry_key(CollectionTag::List, pk, &[&index.to_be_bytes()])
    }

    /// `pushFront`.
    pub fn push_front(&self, pk: &[&str], value: &[u8]) -> Result<u64> {
        self.validate_value_size(value)?;
        let (front, back, len) = self.list_head(pk);
        let new_front = front - 1;
        let slot_key = Self::list_slot_key(pk, new_front);
        let head_key = encode_head_key(CollectionTag::List, pk);
        self.commit(vec![
            EncodedOp::Put { key: slot_key, value: encode_bytes(value) },
            EncodedOp::Put { key: head_key, value: encode_list_head(new_front, back, len + 1, 0) },
        ])?;
        Ok(len + 1)
    }

    /// `pushBack`.
    pub fn push_back(&self, pk: &[&str], value: &[u8]) -> Result<u64> {
        self.validate_value_size(value)?;
        let (front, back, len) = self.list_head(pk);
        let slot_key = Self::list_slot_key(pk, back);
        let head_key = encode_head_key(CollectionTag::List, pk);
        self.commit(vec![
            EncodedOp::Put { key: slot_key, value: encode_bytes(value) },
            EncodedOp::Put { key: head_key, value: encode_list_head(front, back + 1, len + 1, 0) },
        ])?;
        Ok(len + 1)
    }

    /// `popFront`.
    pub fn pop_front(&self, pk: &[&str]) -> Result<Option<Vec<u8>>> {
        let (front, back, len) = self.list_head(pk);
        if len == 0 {
            return Ok(None);
        }
        let slot_key = Self::list_slot_key(pk, front);
        let value = {
            let store = self.store.read();
            let bytes = store.get(&slot_key).ok_or(Error::NotFound)?;
            decode_bytes(bytes).map_err(|e| Error::Corruption(e.to_string()))?
        };
        let head_key = encode_head_key(CollectionTag::List, pk);
        self.commit(vec![
            EncodedOp::Delete { key: slot_key },
            EncodedOp::Put { key: head_key, value: encode_list_head(front + 1, back, len - 1, 0) },
        ])?;
        Ok(Some(value))
    }

    /// `popBack`.
    pub fn pop_back(&self, pk: &[&str]) -> Result<Option<Vec<u8>>> {
        let (front, back, len) = self.list_head(pk);
        if len == 0 {
            return Ok(None);
        }
        let last_index = back - 1;
        let slot_key = Self::list_slot_key(pk, last_index);
        let value = {
            let store = self.store.read();
            let bytes = store.get(&slot_key).ok_or(Error::NotFound)?;
            decode_bytes(bytes).map_err(|e| Error::Corruption(e.to_string()))?
        };
        let head_key = encode_head_key(CollectionTag::List, pk);
        self.commit(vec![
            EncodedOp::Delete { key: slot_key },
            EncodedOp::Put { key: head_key, value: encode_list_head(front, last_index, len - 1, 0) },
        ])?;
        Ok(Some(value))
    }

    /// `llen`.
    pub fn llen(&self, pk: &[&str]) -> u64 {
        self.list_head(pk).2
    }

    fn normalize_index(len: u64, index: i64) -> Option<u64> {
        let resolved = if index < 0 { len as i64 + index } else { index };
        if resolved < 0 || resolved as u64 >= len {
            None
        } else {
            Some(resolved as u64)
        }
    }

    /// `lindex`: negative indices count from the list's end.
    pub fn lindex(&self, pk: &[&str], index: i64) -> Result<Option<Vec<u8>>> {
        let (front, _, len) = self.list_head(pk);
        let Some(offset) = Self::normalize_index(len, index) else { return Ok(None) };
        let slot_key = Self::list_slot_key(pk, front + offset);
        let store = self.store.read();
        match store.get(&slot_key) {
            Some(bytes) => Ok(Some(decode_bytes(bytes).map_err(|e| Error::Corruption(e.to_string()))?)),
            None => Ok(None),
        }
    }

    /// `lrange`: both ends inclusive, negative indices count from the end.
    pub fn lrange(&self, pk: &[&str], range: ListRange) -> Result<Vec<Vec<u8>>> {
        let (front, _, len) = self.list_head(pk);
        if len == 0 {
            return Ok(Vec::new());
        }
        let start = Self::normalize_index(len, range.start).unwrap_or(0);
        let stop = match Self::normalize_index(len, range.stop) {
            Some(s) => s,
            None if range.stop >= len as i64 => len - 1,
            None => return Ok(Vec::new()),
        };
        if start > stop {
            return Ok(Vec::new());
        }
        let store = self.store.read();
        let mut out = Vec::with_capacity((stop - start + 1) as usize);
        for offset in start..=stop {
            let slot_key = Self::list_slot_key(pk, front + offset);
            if let Some(bytes) = store.get(&slot_key) {
                out.push(decode_bytes(bytes).map_err(|e| Error::Corruption(e.to_string()))?);
            }
        }
        Ok(out)
    }

    // ------------------------------------------------------------------
    // Sorted-set ops
    // ------------------------------------------------------------------

    fn zset_entry_prefix(pk: &[&str]) -> Vec<u8> {
        encode_entry_key(CollectionTag::ZSet, pk, &[] as &[&[u8]])
    }

    fn zset_score_bound(pk: &[&str], score: f64) -> Vec<u8> {
        let mut key = Self::zset_entry_prefix(pk);
        key.extend_from_slice(&[0, 8]); // length prefix of the fixed 8-byte score component
        key.extend_from_slice(&encode_order_preserving_score(score));
        key
    }

    /// Finds an existing member's current score by a bounded scan over the
    /// member's collection — the codec has no member->score index, so
    /// this is O(collection size), matching §4.2's silence on zadd
    /// complexity (only range scans are required to be O(range)).
    fn zset_find_member(&self, pk: &[&str], member: &[u8]) -> Option<(Vec<u8>, f64)> {
        let prefix = Self::zset_entry_prefix(pk);
        let upper = prefix_upper_bound(&prefix);
        let store = self.store.read();
        for (key, value) in store.range(prefix.clone()..upper) {
            let decoded = decode_key(key, self.schema.primary_key_arity).ok()?;
            if decoded.column_keys.len() == 2 && decoded.column_keys[1] == member {
                let score = decode_score(value).ok()?;
                return Some((key.clone(), score));
            }
        }
        None
    }

    /// `zadd`: returns `true` if the member is new.
    pub fn zadd(&self, pk: &[&str], member: &[u8], score: f64) -> Result<bool> {
        let head_key = encode_head_key(CollectionTag::ZSet, pk);
        let existing = self.zset_find_member(pk, member);
        let mut ops = Vec::new();
        let is_new = existing.is_none();
        if let Some((old_key, old_score)) = &existing {
            if *old_score == score {
                return Ok(false); // unchanged, nothing to commit
            }
            ops.push(EncodedOp::Delete { key: old_key.clone() });
        }
        let score_bytes = encode_order_preserving_score(score);
        let entry_key = encode_entry_key(CollectionTag::ZSet, pk, &[&score_bytes[..], member]);
        ops.push(EncodedOp::Put { key: entry_key, value: encode_score(score) });
        if is_new {
            let size = self.collection_size(CollectionTag::ZSet, pk);
            ops.push(EncodedOp::Put { key: head_key, value: encode_collection_size(size + 1, 0) });
        }
        self.commit(ops)?;
        Ok(is_new)
    }

    /// `zrangeByScore`: both bounds inclusive, ordered by score ascending
    /// (the order-preserving score encoding makes byte order and score
    /// order coincide, so the range scan needs no separate sort).
    pub fn zrange_by_score(&self, pk: &[&str], min_score: f64, max_score: f64) -> Result<Vec<ZMember>> {
        let start = Self::zset_score_bound(pk, min_score);
        let end = prefix_upper_bound(&Self::zset_score_bound(pk, max_score));
        let store = self.store.read();
        let mut out = Vec::new();
        for (key, value) in store.range(start..end) {
            let decoded = decode_key(key, self.schema.primary_key_arity).map_err(|e| Error::Corruption(e.to_string()))?;
            let member = decoded.column_keys.into_iter().nth(1).ok_or_else(|| Error::Corruption("zset entry missing member".to_string()))?;
            let score = decode_score(value).map_err(|e| Error::Corruption(e.to_string()))?;
            out.push(ZMember { member, score });
        }
        Ok(out)
    }

    /// `zremRangeByScore`: returns the number of members removed.
    pub fn zrem_range_by_score(&self, pk: &[&str], min_score: f64, max_score: f64) -> Result<u64> {
        let members = self.zrange_by_score(pk, min_score, max_score)?;
        if members.is_empty() {
            return Ok(0);
        }
        let mut ops = Vec::with_capacity(members.len() + 1);
        for member in &members {
            let score_bytes = encode_order_preserving_score(member.score);
            let entry_key = encode_entry_key(CollectionTag::ZSet, pk, &[&score_bytes[..], &member.member]);
            ops.push(EncodedOp::Delete { key: entry_key });
        }
        let head_key = encode_head_key(CollectionTag::ZSet, pk);
        let size = self.collection_size(CollectionTag::ZSet, pk);
        ops.push(EncodedOp::Put { key: head_key, value: encode_collection_size(size.saturating_sub(members.len() as u64), 0) });
        self.commit(ops)?;
        Ok(members.len() as u64)
    }

    // ------------------------------------------------------------------
    // Bulk ops: snapshot ingest, checkpoint, compaction, iteration
    // ------------------------------------------------------------------

    /// `dumpSst`: write an immutable snapshot of the full partition.
    pub fn dump_sst(&self, path: impl AsRef<Path>) -> Result<()> {
        let store = self.store.read();
        let ops: Vec<EncodedOp> =
            store.iter().map(|(k, v)| EncodedOp::Put { key: k.clone(), value: v.clone() }).collect();
        let record = WriteBatchRecord { seq_no: self.seq_no(), leader_ms: now_ms(), ops };
        let bytes = record.to_bytes().map_err(|e| Error::Corruption(e.to_string()))?;
        fs::write(path, bytes)?;
        Ok(())
    }

    /// `ingestBaseSst`: replace this partition's entire content.
    pub fn ingest_base_sst(&self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = fs::read(path)?;
        let record = WriteBatchRecord::from_bytes(&bytes).map_err(|e| Error::Corruption(e.to_string()))?;
        let mut store = self.store.write();
        store.clear();
        apply_ops(&mut store, &record.ops);
        self.seq_no.store(record.seq_no, Ordering::Release);
        Ok(())
    }

    /// `ingestDeltaSst`: merge an overlay onto existing content; on
    /// conflicting keys the overlay wins. `temp_path` stages the overlay
    /// file before it's applied, the same staging idiom checkpoints use
    /// for atomic installs.
    pub fn ingest_delta_sst(&self, path: impl AsRef<Path>, temp_path: impl AsRef<Path>) -> Result<()> {
        fs::copy(&path, &temp_path)?;
        let bytes = fs::read(&temp_path)?;
        let record = WriteBatchRecord::from_bytes(&bytes).map_err(|e| Error::Corruption(e.to_string()))?;
        {
            let mut store = self.store.write();
            apply_ops(&mut store, &record.ops);
        }
        let _ = fs::remove_file(&temp_path);
        Ok(())
    }

    /// `checkpoint`: create a hard-linked snapshot directory.
    pub fn checkpoint(&self, dest: impl AsRef<Path>) -> Result<()> {
        let dest = dest.as_ref();
        fs::create_dir_all(dest)?;
        let wal = self.wal.lock();
        for segment_no in wal::list_segment_numbers(wal.dir())? {
            let source = wal::segment_path(wal.dir(), segment_no);
            let target = dest.join(source.file_name().expect("segment path always has a file name"));
            if !target.exists() {
                fs::hard_link(&source, &target)?;
            }
        }
        Ok(())
    }

    /// `compactRange`: rewrite the WAL to a single record capturing live
    /// state, dropping superseded segments. Safe to call without holding
    /// the write lock across the whole operation — it only locks briefly
    /// to snapshot the map (§4.2: "never hold the write lock").
    pub fn compact_range(&self) -> Result<()> {
        let snapshot: Vec<(Vec<u8>, Vec<u8>)> = {
            let store = self.store.read();
            store.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        };
        let seq_no = self.seq_no();
        self.wal.lock().compact_to(snapshot, seq_no, now_ms()).map_err(map_wal_error)
    }

    /// `iterator`: invoke `callback` with a read-only view of the whole
    /// partition, under the partition's read guard.
    pub fn iterator<F, T>(&self, callback: F) -> T
    where
        F: FnOnce(&BTreeMap<Vec<u8>, Vec<u8>>) -> T,
    {
        let store = self.store.read();
        callback(&store)
    }
}

fn apply_ops(store: &mut BTreeMap<Vec<u8>, Vec<u8>>, ops: &[EncodedOp]) {
    for op in ops {
        match op {
            EncodedOp::Put { key, value } => {
                store.insert(key.clone(), value.clone());
            }
            EncodedOp::Delete { key } => {
                store.remove(key);
            }
        }
    }
}
