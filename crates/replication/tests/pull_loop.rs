//! End-to-end coverage for scenarios 5 and 8 of spec.md §8: a follower
//! catching up purely from log tailing, and a write routed to a follower
//! being rejected without touching storage.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use laser_core::error::Result;
use laser_core::hash::NodeHash;
use laser_core::key::PartitionId;
use laser_core::limits::Limits;
use laser_core::{PartitionIdentity, Role};
use laser_engine::{PartitionEngine, TableSchema};
use laser_replication::{
    PullLoop, PullLoopConfig, ReplicateRequest, ReplicateResponse, ReplicateWdtRequest, ReplicateWdtResponse,
    ReplicationDb, ReplicationTransport,
};
use tempfile::tempdir;

fn identity(role: Role) -> PartitionIdentity {
    PartitionIdentity { database: "db".into(), table: "t".into(), partition_id: PartitionId(0), role, version: "v0".into() }
}

fn open_engine(dir: &std::path::Path) -> Arc<PartitionEngine> {
    Arc::new(PartitionEngine::open(PartitionId(0), TableSchema::simple(), Limits::default(), dir).unwrap())
}

struct InProcessTransport {
    leader: Arc<ReplicationDb>,
}

#[async_trait]
impl ReplicationTransport for InProcessTransport {
    async fn replicate(&self, request: ReplicateRequest) -> Result<ReplicateResponse> {
        self.leader.handle_replicate(request).await
    }

    async fn replicate_wdt(&self, _request: ReplicateWdtRequest) -> Result<ReplicateWdtResponse> {
        unimplemented!("not exercised by this test: the leader's log always covers the follower")
    }
}

#[tokio::test]
async fn follower_catches_up_via_log_tail() {
    let leader_dir = tempdir().unwrap();
    let leader_db = Arc::new(ReplicationDb::new(identity(Role::Leader), open_engine(leader_dir.path())));
    for i in 0..50 {
        leader_db.set(&["k"], format!("v{i}").as_bytes()).unwrap();
    }

    let follower_dir = tempdir().unwrap();
    let follower_db = Arc::new(ReplicationDb::new(identity(Role::Follower), open_engine(follower_dir.path())));
    let transport = Arc::new(InProcessTransport { leader: leader_db.clone() });

    let handle = PullLoop::spawn(
        follower_db.clone(),
        transport,
        leader_db.db_hash().0,
        NodeHash(7),
        "follower:0".to_string(),
        PullLoopConfig { poll_interval: Duration::from_millis(10), ..PullLoopConfig::default() },
    );

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while follower_db.engine().seq_no() < leader_db.engine().seq_no() {
        if tokio::time::Instant::now() > deadline {
            panic!("follower did not catch up in time");
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(follower_db.get(&["k"]).unwrap(), Some(b"v49".to_vec()));
    assert_eq!(follower_db.engine().seq_no(), leader_db.engine().seq_no());

    follower_db.promote_to_leader();
    handle.await.unwrap();
}

#[test]
fn write_on_follower_is_rejected_without_touching_storage() {
    let dir = tempdir().unwrap();
    let db = ReplicationDb::new(identity(Role::Follower), open_engine(dir.path()));
    let result = db.set(&["k"], b"v");
    assert!(matches!(result, Err(laser_core::error::Error::WriteInFollower)));
    assert_eq!(db.get(&["k"]).unwrap(), None);
}
