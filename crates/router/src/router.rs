//! Partition Router (§4.5): maps `(database, table, primary_keys)` onto a
//! locally-hosted [`ReplicationDb`] handle.

use std::collections::HashMap;
use std::sync::Arc;

use laser_core::error::{Error, Result};
use laser_core::hash::stable_hash64;
use laser_core::key::PartitionId;
use laser_core::Role;
use laser_replication::ReplicationDb;
use parking_lot::RwLock;

use crate::config::ConfigWatcher;

/// Which role(s) a lookup may be served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleRequirement {
    LeaderOnly,
    FollowerOnly,
    AnyRole,
}

/// Read-mode policy a caller selects per request (§4.6 "Read-mode policy").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    LeaderRead,
    FollowerRead,
    MixedRead,
}

impl From<ReadMode> for RoleRequirement {
    fn from(mode: ReadMode) -> Self {
        match mode {
            ReadMode::LeaderRead => RoleRequirement::LeaderOnly,
            ReadMode::FollowerRead => RoleRequirement::FollowerOnly,
            ReadMode::MixedRead => RoleRequirement::AnyRole,
        }
    }
}

fn satisfies(requirement: RoleRequirement, role: Role) -> bool {
    match requirement {
        RoleRequirement::LeaderOnly => role == Role::Leader,
        RoleRequirement::FollowerOnly => role == Role::Follower,
        RoleRequirement::AnyRole => true,
    }
}

/// Local assignment map plus hashing, resolving a logical key to the
/// partition instance hosted on this node (§4.5).
pub struct PartitionRouter {
    config: Arc<ConfigWatcher>,
    partitions: RwLock<HashMap<(String, String, PartitionId), Arc<ReplicationDb>>>,
}

impl PartitionRouter {
    pub fn new(config: Arc<ConfigWatcher>) -> Self {
        PartitionRouter { config, partitions: RwLock::new(HashMap::new()) }
    }

    /// Record that `db` is now hosted locally for `(database, table, partition_id)`.
    pub fn assign(&self, database: &str, table: &str, partition_id: PartitionId, db: Arc<ReplicationDb>) {
        self.partitions.write().insert((database.to_string(), table.to_string(), partition_id), db);
    }

    /// Drop a partition's local assignment, e.g. after reassignment away
    /// from this node.
    pub fn unassign(&self, database: &str, table: &str, partition_id: PartitionId) {
        self.partitions.write().remove(&(database.to_string(), table.to_string(), partition_id));
    }

    /// `partition_id = hash(primary_keys) mod table.partition_number` (§4.5
    /// steps 1-2), independent of whether the partition is hosted locally.
    pub fn partition_for(&self, database: &str, table: &str, primary_keys: &[String]) -> PartitionId {
        let partition_number = self.config.partition_number(database, table).max(1);
        let hash = stable_hash64(primary_keys);
        PartitionId((hash % partition_number as u64) as u32)
    }

    /// Resolve `(database, table, primary_keys)` to a locally-hosted
    /// partition whose role satisfies `requirement` (§4.5 step 3).
    pub fn resolve(
        &self,
        database: &str,
        table: &str,
        primary_keys: &[String],
        requirement: RoleRequirement,
    ) -> Result<Arc<ReplicationDb>> {
        let partition_id = self.partition_for(database, table, primary_keys);
        let partitions = self.partitions.read();
        let db = partitions
            .get(&(database.to_string(), table.to_string(), partition_id))
            .ok_or(Error::NotExistsPartition)?;
        if !satisfies(requirement, db.role()) {
            return Err(Error::NotExistsPartition);
        }
        Ok(db.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NodeConfig, TableConfigList, TableEngineOptions, TrafficRestrictionConfig, DEFAULT_TABLE_KEY};
    use laser_core::limits::Limits;
    use laser_core::PartitionIdentity;
    use laser_engine::{PartitionEngine, TableSchema};
    use std::collections::HashMap as Map;
    use tempfile::tempdir;

    fn watcher(partition_number: u32) -> Arc<ConfigWatcher> {
        let mut tables = Map::new();
        tables.insert(DEFAULT_TABLE_KEY.to_string(), TableEngineOptions { partition_number, ..Default::default() });
        Arc::new(
            ConfigWatcher::new(
                NodeConfig {
                    version: 1,
                    block_cache_gb: 1,
                    write_buffer_gb: 1,
                    shard_bits: 4,
                    high_priority_pool_ratio: 0.1,
                    strict_capacity_limit: false,
                    rate_limit_bands: Vec::new(),
                    default_rate_bytes_per_sec: 0,
                },
                TableConfigList { version: 1, tables },
                TrafficRestrictionConfig::default(),
            )
            .unwrap(),
        )
    }

    fn open_db(partition_id: PartitionId, role: Role) -> Arc<ReplicationDb> {
        let dir = tempdir().unwrap();
        let engine =
            Arc::new(PartitionEngine::open(partition_id, TableSchema::simple(), Limits::default(), dir.path()).unwrap());
        let identity = PartitionIdentity { database: "db".into(), table: "t".into(), partition_id, role, version: "v0".into() };
        Arc::new(ReplicationDb::new(identity, engine))
    }

    #[test]
    fn resolves_hosted_partition_matching_role() {
        let router = PartitionRouter::new(watcher(4));
        let keys = vec!["user".to_string(), "42".to_string()];
        let partition_id = router.partition_for("db", "t", &keys);
        router.assign("db", "t", partition_id, open_db(partition_id, Role::Leader));

        let resolved = router.resolve("db", "t", &keys, RoleRequirement::LeaderOnly).unwrap();
        assert_eq!(resolved.identity().partition_id, partition_id);
    }

    #[test]
    fn unassigned_partition_fails_with_not_exists() {
        let router = PartitionRouter::new(watcher(4));
        let keys = vec!["user".to_string(), "42".to_string()];
        assert!(matches!(router.resolve("db", "t", &keys, RoleRequirement::AnyRole), Err(Error::NotExistsPartition)));
    }

    #[test]
    fn leader_read_never_served_from_follower() {
        let router = PartitionRouter::new(watcher(4));
        let keys = vec!["user".to_string(), "42".to_string()];
        let partition_id = router.partition_for("db", "t", &keys);
        router.assign("db", "t", partition_id, open_db(partition_id, Role::Follower));

        assert!(matches!(router.resolve("db", "t", &keys, RoleRequirement::LeaderOnly), Err(Error::NotExistsPartition)));
        assert!(router.resolve("db", "t", &keys, RoleRequirement::FollowerOnly).is_ok());
    }
}
