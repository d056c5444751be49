//! The Replication DB (§4.3): one Partition Engine plus a role, the
//! leader-side pull-request handler, the iterator cache, and the
//! write-acceptance gate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use laser_core::error::{Error, Result};
use laser_core::hash::DbHash;
use laser_core::{PartitionIdentity, Role};
use laser_engine::{ListRange, PartitionEngine, SetxOptions, ZMember};
use parking_lot::RwLock;
use tokio::sync::Notify;
use tokio::time::timeout;
use tracing::debug;

use crate::iterator_cache::IteratorCache;
use crate::transport::{ReplicateRequest, ReplicateRequestType, ReplicateResponse, UpdateRecord};

/// How long the leader parks a pull request with nothing new to report
/// before answering with an empty update list (§5 "park on a condition
/// variable with a caller-supplied cooperative timeout").
const PARK_TIMEOUT: Duration = Duration::from_millis(500);

/// Idle timeout for a follower's cached tailing position.
const ITERATOR_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// One Partition Engine wrapped with a replication role (§4.3).
pub struct ReplicationDb {
    identity: RwLock<PartitionIdentity>,
    engine: Arc<PartitionEngine>,
    iterator_cache: IteratorCache,
    write_notify: Notify,
    /// Externally-set one-shot toggle (§9 Design Notes, Open Question):
    /// consumed by the next pull-loop iteration via `swap(false, ...)`,
    /// forcing a bulk transfer even though the log could still serve the
    /// follower, then clearing itself.
    force_base_transfer: AtomicBool,
}

impl ReplicationDb {
    pub fn new(identity: PartitionIdentity, engine: Arc<PartitionEngine>) -> Self {
        ReplicationDb {
            identity: RwLock::new(identity),
            engine,
            iterator_cache: IteratorCache::new(ITERATOR_IDLE_TIMEOUT),
            write_notify: Notify::new(),
            force_base_transfer: AtomicBool::new(false),
        }
    }

    pub fn identity(&self) -> PartitionIdentity {
        self.identity.read().clone()
    }

    pub fn role(&self) -> Role {
        self.identity.read().role
    }

    pub fn db_hash(&self) -> DbHash {
        self.identity.read().db_hash()
    }

    pub fn engine(&self) -> &Arc<PartitionEngine> {
        &self.engine
    }

    /// `Leader -> Follower`: stop serving writes, the caller is
    /// responsible for starting the pull loop (§4.3 "Roles and
    /// transitions").
    pub fn demote_to_follower(&self) {
        self.identity.write().role = Role::Follower;
    }

    /// `Follower -> Leader`: clear any cached tailing state (there is
    /// nothing left to tail from) and resume write acceptance. The caller
    /// is responsible for stopping the pull loop task.
    pub fn promote_to_leader(&self) {
        let mut identity = self.identity.write();
        identity.role = Role::Leader;
        drop(identity);
        self.iterator_cache.evict_idle();
    }

    /// Set the data generation tag, e.g. after a bulk-transfer install.
    pub fn set_version(&self, version: impl Into<String>) {
        self.identity.write().version = version.into();
    }

    /// Externally requests the next pull-loop iteration use bulk transfer
    /// regardless of log coverage.
    pub fn request_force_base_transfer(&self) {
        self.force_base_transfer.store(true, Ordering::Release);
    }

    /// Consumed once by the pull loop; clears itself (§9 "one-shot;
    /// cleared after the next successful bulk transfer request is
    /// dispatched" — the pull loop clears it when it *decides* to use
    /// bulk transfer, not only on success, since a failed attempt should
    /// not force an infinite retry loop of forced transfers).
    pub fn take_force_base_transfer(&self) -> bool {
        self.force_base_transfer.swap(false, Ordering::AcqRel)
    }

    fn require_leader(&self) -> Result<()> {
        if self.role().accepts_writes() {
            Ok(())
        } else {
            Err(Error::WriteInFollower)
        }
    }

    fn write_through<T>(&self, op: impl FnOnce(&PartitionEngine) -> Result<T>) -> Result<T> {
        self.require_leader()?;
        let result = op(&self.engine)?;
        self.write_notify.notify_waiters();
        Ok(result)
    }

    // ------------------------------------------------------------------
    // Write ops: role-gated, notify parked pullers on success (§4.3
    // "Write acceptance").
    // ------------------------------------------------------------------

    pub fn set(&self, pk: &[&str], value: &[u8]) -> Result<()> {
        self.write_through(|e| e.set(pk, value))
    }

    pub fn setx(&self, pk: &[&str], value: &[u8], options: SetxOptions) -> Result<()> {
        self.write_through(|e| e.setx(pk, value, options))
    }

    pub fn append(&self, pk: &[&str], value: &[u8]) -> Result<usize> {
        self.write_through(|e| e.append(pk, value))
    }

    pub fn incr_by(&self, pk: &[&str], step: i64) -> Result<i64> {
        self.write_through(|e| e.incr_by(pk, step))
    }

    pub fn delkey(&self, pk: &[&str]) -> Result<()> {
        self.write_through(|e| e.delkey(pk))
    }

    pub fn expire(&self, pk: &[&str], ttl_ms: u64) -> Result<()> {
        self.write_through(|e| e.expire(pk, ttl_ms))
    }

    pub fn expire_at(&self, pk: &[&str], at_ms: u64) -> Result<()> {
        self.write_through(|e| e.expire_at(pk, at_ms))
    }

    pub fn hset(&self, pk: &[&str], field: &str, value: &[u8]) -> Result<bool> {
        self.write_through(|e| e.hset(pk, field, value))
    }

    pub fn hmset(&self, pk: &[&str], fields: &[(&str, &[u8])]) -> Result<()> {
        self.write_through(|e| e.hmset(pk, fields))
    }

    pub fn hdel(&self, pk: &[&str], field: &str) -> Result<bool> {
        self.write_through(|e| e.hdel(pk, field))
    }

    pub fn sadd(&self, pk: &[&str], member: &[u8]) -> Result<bool> {
        self.write_through(|e| e.sadd(pk, member))
    }

    pub fn sdel(&self, pk: &[&str], member: &[u8]) -> Result<bool> {
        self.write_through(|e| e.sdel(pk, member))
    }

    pub fn push_front(&self, pk: &[&str], value: &[u8]) -> Result<u64> {
        self.write_through(|e| e.push_front(pk, value))
    }

    pub fn push_back(&self, pk: &[&str], value: &[u8]) -> Result<u64> {
        self.write_through(|e| e.push_back(pk, value))
    }

    pub fn pop_front(&self, pk: &[&str]) -> Result<Option<Vec<u8>>> {
        self.write_through(|e| e.pop_front(pk))
    }

    pub fn pop_back(&self, pk: &[&str]) -> Result<Option<Vec<u8>>> {
        self.write_through(|e| e.pop_back(pk))
    }

    pub fn zadd(&self, pk: &[&str], member: &[u8], score: f64) -> Result<bool> {
        self.write_through(|e| e.zadd(pk, member, score))
    }

    pub fn zrem_range_by_score(&self, pk: &[&str], min_score: f64, max_score: f64) -> Result<u64> {
        self.write_through(|e| e.zrem_range_by_score(pk, min_score, max_score))
    }

    // ------------------------------------------------------------------
    // Read ops: served from either role (the Dispatcher's read-mode
    // policy decides which role to route to, §4.6).
    // ------------------------------------------------------------------

    pub fn get(&self, pk: &[&str]) -> Result<Option<Vec<u8>>> {
        self.engine.get(pk)
    }

    pub fn exist(&self, pk: &[&str]) -> Result<bool> {
        self.engine.exist(pk)
    }

    pub fn ttl(&self, pk: &[&str]) -> Result<Option<u64>> {
        self.engine.ttl(pk)
    }

    pub fn hget(&self, pk: &[&str], field: &str) -> Result<Option<Vec<u8>>> {
        self.engine.hget(pk, field)
    }

    pub fn hgetall(&self, pk: &[&str]) -> Result<Vec<(String, Vec<u8>)>> {
        self.engine.hgetall(pk)
    }

    pub fn hlen(&self, pk: &[&str]) -> u64 {
        self.engine.hlen(pk)
    }

    pub fn has_member(&self, pk: &[&str], member: &[u8]) -> bool {
        self.engine.has_member(pk, member)
    }

    pub fn members(&self, pk: &[&str]) -> Result<Vec<Vec<u8>>> {
        self.engine.members(pk)
    }

    pub fn llen(&self, pk: &[&str]) -> u64 {
        self.engine.llen(pk)
    }

    pub fn lrange(&self, pk: &[&str], range: ListRange) -> Result<Vec<Vec<u8>>> {
        self.engine.lrange(pk, range)
    }

    pub fn zrange_by_score(&self, pk: &[&str], min_score: f64, max_score: f64) -> Result<Vec<ZMember>> {
        self.engine.zrange_by_score(pk, min_score, max_score)
    }

    // ------------------------------------------------------------------
    // Replication-internal operations
    // ------------------------------------------------------------------

    /// Apply a batch pulled from the leader, preserving its seq_no and
    /// leader timestamp (§4.3 step 4). Notifies anyone parked on this
    /// follower ever becoming a leader downstream (sub-replication isn't
    /// a goal here, but the notify is harmless and keeps the two code
    /// paths symmetric).
    pub fn apply_pulled_batch(&self, record: laser_engine::WriteBatchRecord) -> Result<()> {
        self.engine.apply_replicated(record)
    }

    /// Leader-side handler for an incoming [`ReplicateRequest`] (§4.3
    /// steps 2-3). Parks briefly via [`Notify`] when there is nothing new
    /// yet, so a follower's pull doesn't busy-loop against an idle
    /// leader (§5 "park and notify").
    pub async fn handle_replicate(&self, request: ReplicateRequest) -> Result<ReplicateResponse> {
        if request.request_type == ReplicateRequestType::StatusOnly {
            return Ok(self.status_response());
        }

        let mut response = self.collect_updates(&request)?;
        if response.updates.is_empty() && !response.needs_base_transfer {
            let _ = timeout(PARK_TIMEOUT, self.write_notify.notified()).await;
            response = self.collect_updates(&request)?;
        }

        debug!(
            db_hash = request.db_hash,
            from_seq_no = request.from_seq_no,
            returned = response.updates.len(),
            needs_base_transfer = response.needs_base_transfer,
            seq_no_diff = response.leader_max_seq_no.saturating_sub(request.from_seq_no),
            "replicate request served"
        );
        Ok(response)
    }

    fn status_response(&self) -> ReplicateResponse {
        ReplicateResponse {
            updates: Vec::new(),
            leader_max_seq_no: self.engine.seq_no(),
            needs_base_transfer: false,
            base_version: None,
        }
    }

    fn collect_updates(&self, request: &ReplicateRequest) -> Result<ReplicateResponse> {
        let leader_max_seq_no = self.engine.seq_no();
        let earliest_retained = self.engine.earliest_retained_seq_no();
        let needs_base_transfer = match earliest_retained {
            Some(earliest) => request.from_seq_no < earliest,
            None => request.from_seq_no <= leader_max_seq_no,
        };

        if needs_base_transfer {
            self.iterator_cache.invalidate(request.follower_node_hash);
            return Ok(ReplicateResponse {
                updates: Vec::new(),
                leader_max_seq_no,
                needs_base_transfer: true,
                base_version: Some(self.identity().version),
            });
        }

        let _cache_hit = self.iterator_cache.hit(request.follower_node_hash, request.from_seq_no);
        let batches = self.engine.batches_since(
            request.from_seq_no,
            request.max_batch_count as usize,
            request.max_batch_bytes as usize,
        );
        let next_seq_no = batches.last().map(|b| b.seq_no + 1).unwrap_or(request.from_seq_no);
        self.iterator_cache.record(request.follower_node_hash, next_seq_no);

        let mut updates = Vec::with_capacity(batches.len());
        for batch in &batches {
            updates.push(UpdateRecord::from_batch(batch)?);
        }

        Ok(ReplicateResponse { updates, leader_max_seq_no, needs_base_transfer: false, base_version: None })
    }
}
