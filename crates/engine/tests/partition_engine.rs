//! Scenario coverage for the partition engine: point ops, counters, hash
//! lifecycle, TTL expiry, and the seq_no/collection-size invariants (§8).

use laser_core::key::PartitionId;
use laser_core::limits::Limits;
use laser_core::{PartitionIdentity, Role};
use laser_engine::{DurabilityMode, ListRange, PartitionEngine, SetxOptions, TableSchema};
use tempfile::tempdir;

fn identity() -> PartitionIdentity {
    PartitionIdentity {
        database: "db".to_string(),
        table: "t".to_string(),
        partition_id: PartitionId(0),
        role: Role::Leader,
        version: "v1".to_string(),
    }
}

fn open(dir: &std::path::Path) -> PartitionEngine {
    PartitionEngine::open(PartitionId(0), TableSchema::simple(), Limits::default(), dir).unwrap()
}

#[test]
fn set_and_get_raw_string() {
    let dir = tempdir().unwrap();
    let engine = open(dir.path());
    engine.set(&["user:1"], b"hello").unwrap();
    assert_eq!(engine.get(&["user:1"]).unwrap(), Some(b"hello".to_vec()));
    assert!(engine.exist(&["user:1"]).unwrap());
    assert_eq!(engine.get(&["missing"]).unwrap(), None);
}

#[test]
fn setx_not_exists_rejects_existing_key() {
    let dir = tempdir().unwrap();
    let engine = open(dir.path());
    engine.set(&["k"], b"v1").unwrap();
    let result = engine.setx(&["k"], b"v2", SetxOptions { not_exists: true, ttl_ms: None });
    assert!(result.is_err());
    assert_eq!(engine.get(&["k"]).unwrap(), Some(b"v1".to_vec()));
}

#[test]
fn counter_incr_and_decr() {
    let dir = tempdir().unwrap();
    let engine = open(dir.path());
    assert_eq!(engine.incr_by(&["counter"], 5).unwrap(), 5);
    assert_eq!(engine.incr_by(&["counter"], 3).unwrap(), 8);
    assert_eq!(engine.incr_by(&["counter"], -10).unwrap(), -2);
}

#[test]
fn hash_lifecycle() {
    let dir = tempdir().unwrap();
    let engine = open(dir.path());
    assert!(engine.hset(&["h"], "a", b"1").unwrap());
    assert!(!engine.hset(&["h"], "a", b"2").unwrap()); // overwrite, not new
    assert!(engine.hset(&["h"], "b", b"3").unwrap());
    assert_eq!(engine.hlen(&["h"]), 2);
    assert_eq!(engine.hget(&["h"], "a").unwrap(), Some(b"2".to_vec()));

    let mut all = engine.hgetall(&["h"]).unwrap();
    all.sort();
    assert_eq!(all, vec![("a".to_string(), b"1".to_vec()), ("b".to_string(), b"3".to_vec())]);

    assert!(engine.hdel(&["h"], "a").unwrap());
    assert!(!engine.hdel(&["h"], "a").unwrap()); // already gone
    assert_eq!(engine.hlen(&["h"]), 1);
}

#[test]
fn ttl_expiry_removes_key_on_read() {
    let dir = tempdir().unwrap();
    let engine = open(dir.path());
    engine.set(&["k"], b"v").unwrap();
    engine.expire_at(&["k"], 1).unwrap(); // 1ms since epoch: already expired
    assert_eq!(engine.get(&["k"]).unwrap(), None);
    assert!(!engine.exist(&["k"]).unwrap());
}

#[test]
fn set_membership_and_collection_size_matches_live_members() {
    let dir = tempdir().unwrap();
    let engine = open(dir.path());
    assert!(engine.sadd(&["s"], b"x").unwrap());
    assert!(engine.sadd(&["s"], b"y").unwrap());
    assert!(!engine.sadd(&["s"], b"x").unwrap());
    assert!(engine.has_member(&["s"], b"x"));

    let mut members = engine.members(&["s"]).unwrap();
    members.sort();
    assert_eq!(members, vec![b"x".to_vec(), b"y".to_vec()]);

    assert!(engine.sdel(&["s"], b"x").unwrap());
    assert_eq!(engine.members(&["s"]).unwrap(), vec![b"y".to_vec()]);
}

#[test]
fn list_push_pop_and_range() {
    let dir = tempdir().unwrap();
    let engine = open(dir.path());
    engine.push_back(&["l"], b"1").unwrap();
    engine.push_back(&["l"], b"2").unwrap();
    engine.push_front(&["l"], b"0").unwrap();
    assert_eq!(engine.llen(&["l"]), 3);
    assert_eq!(
        engine.lrange(&["l"], ListRange { start: 0, stop: -1 }).unwrap(),
        vec![b"0".to_vec(), b"1".to_vec(), b"2".to_vec()]
    );
    assert_eq!(engine.pop_front(&["l"]).unwrap(), Some(b"0".to_vec()));
    assert_eq!(engine.pop_back(&["l"]).unwrap(), Some(b"2".to_vec()));
    assert_eq!(engine.llen(&["l"]), 1);
}

#[test]
fn zset_add_and_range_by_score() {
    let dir = tempdir().unwrap();
    let engine = open(dir.path());
    engine.zadd(&["z"], b"a", 3.0).unwrap();
    engine.zadd(&["z"], b"b", 1.0).unwrap();
    engine.zadd(&["z"], b"c", 2.0).unwrap();

    let members = engine.zrange_by_score(&["z"], f64::MIN, f64::MAX).unwrap();
    assert_eq!(
        members.iter().map(|m| m.member.clone()).collect::<Vec<_>>(),
        vec![b"b".to_vec(), b"c".to_vec(), b"a".to_vec()]
    );

    let removed = engine.zrem_range_by_score(&["z"], 1.0, 2.0).unwrap();
    assert_eq!(removed, 2);
    let remaining = engine.zrange_by_score(&["z"], f64::MIN, f64::MAX).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].member, b"a".to_vec());
}

#[test]
fn seq_no_strictly_monotonic_across_commits() {
    let dir = tempdir().unwrap();
    let engine = open(dir.path());
    let start = engine.seq_no();
    engine.set(&["a"], b"1").unwrap();
    engine.set(&["b"], b"2").unwrap();
    engine.incr_by(&["c"], 1).unwrap();
    assert_eq!(engine.seq_no(), start + 3);
}

#[test]
fn wal_replay_restores_state_and_seq_no_after_reopen() {
    let dir = tempdir().unwrap();
    let before_seq = {
        let engine = PartitionEngine::open(
            PartitionId(0),
            TableSchema { durability: DurabilityMode::Strict, ..TableSchema::simple() },
            Limits::default(),
            dir.path(),
        )
        .unwrap();
        engine.set(&["k"], b"v").unwrap();
        engine.hset(&["h"], "f", b"val").unwrap();
        engine.seq_no()
    };

    let reopened = open(dir.path());
    assert_eq!(reopened.seq_no(), before_seq);
    assert_eq!(reopened.get(&["k"]).unwrap(), Some(b"v".to_vec()));
    assert_eq!(reopened.hget(&["h"], "f").unwrap(), Some(b"val".to_vec()));
}

#[test]
fn compact_range_preserves_live_state() {
    let dir = tempdir().unwrap();
    let engine = PartitionEngine::open(
        PartitionId(0),
        TableSchema { durability: DurabilityMode::Strict, ..TableSchema::simple() },
        Limits::default(),
        dir.path(),
    )
    .unwrap();
    for i in 0..20 {
        engine.set(&["k"], format!("v{i}").as_bytes()).unwrap();
    }
    engine.compact_range().unwrap();
    assert_eq!(engine.get(&["k"]).unwrap(), Some(b"v19".to_vec()));

    drop(engine);
    let reopened = open(dir.path());
    assert_eq!(reopened.get(&["k"]).unwrap(), Some(b"v19".to_vec()));
}

#[test]
fn identity_carries_partition_role() {
    let identity = identity();
    assert!(identity.role.accepts_writes());
}
