//! # Laser
//!
//! A sharded, replicated key-value store with Redis-like value types (raw
//! strings, counters, hashes, sets, lists, sorted sets).
//!
//! This crate is a facade over the workspace's member crates:
//!
//! | Crate | Responsibility |
//! |-------|----------------|
//! | `laser-core` | shared types: errors, hashing, partition identity |
//! | `laser-codec` | on-disk key/value encoding |
//! | `laser-engine` | per-partition storage engine |
//! | `laser-replication` | leader/follower log replication and bulk transfer |
//! | `laser-rpc` | gRPC wire transport between nodes |
//! | `laser-router` | request routing, traffic admission, config watching |
//!
//! Internal modules are not re-exported wholesale; only the types a process
//! wiring up a node actually needs are re-exported here.

pub use laser_core::error::{Error, Result};
pub use laser_core::hash::{db_hash, stable_hash64, DbHash, NodeHash};
pub use laser_core::{PartitionIdentity, Role};

pub use laser_engine::PartitionEngine;

pub use laser_replication::{
    CheckpointGuard, CheckpointRegistry, PullLoop, PullLoopConfig, ReplicateRequest, ReplicateRequestType,
    ReplicateResponse, ReplicateWdtRequest, ReplicateWdtResponse, ReplicationDb, ReplicationTransport, UpdateRecord,
};

pub use laser_rpc::{ReplicatorManager, ReplicatorServer, RpcReplicationTransport};

pub use laser_router::{
    ClusterAssignment, ConfigWatcher, GroupAssignment, MultiKeyLimit, NodeAssignment, NodeConfig, PartitionRouter,
    RateLimitBand, ReadMode, RoleRequirement, ServiceDispatcher, TableConfigList, TableEngineOptions,
    TrafficRestrictionConfig, DEFAULT_TABLE_KEY,
};

/// The pieces a running node wires together: a router that admits and
/// resolves requests, a replicator manager that lets the RPC layer find
/// locally-hosted partitions by db hash, and the config watcher both of
/// those consult.
pub struct LaserNode {
    pub config: std::sync::Arc<ConfigWatcher>,
    pub router: std::sync::Arc<PartitionRouter>,
    pub dispatcher: ServiceDispatcher,
    pub replicator: std::sync::Arc<ReplicatorManager>,
}

impl LaserNode {
    /// Wires a node's request-handling stack together from an already
    /// published [`ConfigWatcher`]. Hosting a partition still requires a
    /// separate call to [`PartitionRouter::assign`] once its
    /// [`ReplicationDb`] has been opened and registered with the returned
    /// [`ReplicatorManager`].
    pub fn new(config: std::sync::Arc<ConfigWatcher>) -> Self {
        let router = std::sync::Arc::new(PartitionRouter::new(config.clone()));
        let dispatcher = ServiceDispatcher::new(router.clone(), config.clone());
        let replicator = std::sync::Arc::new(ReplicatorManager::new());
        LaserNode { config, router, dispatcher, replicator }
    }
}
