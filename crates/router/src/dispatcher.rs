//! Service Dispatcher (§4.6): the top-level per-request handler. Applies
//! traffic-restriction admission, routes each (sub-)key through the
//! [`PartitionRouter`], executes against the partition, and for multi-key
//! APIs returns an outcome vector positionally aligned with the input.

use std::sync::Arc;

use laser_core::error::{Error, Result};
use laser_replication::ReplicationDb;
use rand::Rng;

use crate::config::{ConfigWatcher, MultiKeyLimit};
use crate::router::{PartitionRouter, ReadMode, RoleRequirement};

/// `rand_1_100 <= limit`: admit a percentage-sampled command (§4.6 step 1).
fn sampled(limit_percent: u8) -> bool {
    rand::thread_rng().gen_range(1..=100) <= limit_percent
}

/// Top-level per-request handler.
pub struct ServiceDispatcher {
    router: Arc<PartitionRouter>,
    config: Arc<ConfigWatcher>,
}

impl ServiceDispatcher {
    pub fn new(router: Arc<PartitionRouter>, config: Arc<ConfigWatcher>) -> Self {
        ServiceDispatcher { router, config }
    }

    /// Single-key admission check (§4.6 step 1, `single_operation_limits`).
    fn admit_single(&self, database: &str, table: &str, cmd: &str) -> Result<()> {
        let traffic = self.config.traffic();
        if traffic.is_denied(database, table) {
            return Err(Error::OperationDenied);
        }
        match traffic.single_operation_limit(database, table, cmd) {
            None => Err(Error::OperationDenied),
            Some(limit) if sampled(limit) => Ok(()),
            Some(_) => Err(Error::TrafficRestriction),
        }
    }

    /// Multi-key admission for the whole batch (QPS sampling); for KPS,
    /// admission happens per sub-key after dispatch instead (§4.6 step 1).
    fn admit_multi_qps(&self, database: &str, table: &str, cmd: &str) -> Result<Option<MultiKeyLimit>> {
        let traffic = self.config.traffic();
        if traffic.is_denied(database, table) {
            return Err(Error::OperationDenied);
        }
        let limit = traffic.multiple_operation_limit(database, table, cmd).ok_or(Error::OperationDenied)?;
        if let MultiKeyLimit::Qps(percent) = limit {
            if !sampled(percent) {
                return Err(Error::TrafficRestriction);
            }
        }
        Ok(Some(limit))
    }

    fn resolve(
        &self,
        database: &str,
        table: &str,
        primary_keys: &[String],
        requirement: RoleRequirement,
    ) -> Result<Arc<ReplicationDb>> {
        self.router.resolve(database, table, primary_keys, requirement)
    }

    fn pk_refs(primary_keys: &[String]) -> Vec<&str> {
        primary_keys.iter().map(String::as_str).collect()
    }

    // --------------------------------------------------------------------
    // Single-key ops
    // --------------------------------------------------------------------

    pub fn get(&self, database: &str, table: &str, primary_keys: &[String], read_mode: ReadMode) -> Result<Option<Vec<u8>>> {
        self.admit_single(database, table, "get")?;
        let db = self.resolve(database, table, primary_keys, read_mode.into())?;
        db.get(&Self::pk_refs(primary_keys))
    }

    pub fn set(&self, database: &str, table: &str, primary_keys: &[String], value: &[u8]) -> Result<()> {
        self.admit_single(database, table, "set")?;
        let db = self.resolve(database, table, primary_keys, RoleRequirement::LeaderOnly)?;
        db.set(&Self::pk_refs(primary_keys), value)
    }

    pub fn delkey(&self, database: &str, table: &str, primary_keys: &[String]) -> Result<()> {
        self.admit_single(database, table, "delkey")?;
        let db = self.resolve(database, table, primary_keys, RoleRequirement::LeaderOnly)?;
        db.delkey(&Self::pk_refs(primary_keys))
    }

    pub fn incr_by(&self, database: &str, table: &str, primary_keys: &[String], step: i64) -> Result<i64> {
        self.admit_single(database, table, "incr_by")?;
        let db = self.resolve(database, table, primary_keys, RoleRequirement::LeaderOnly)?;
        db.incr_by(&Self::pk_refs(primary_keys), step)
    }

    pub fn hget(&self, database: &str, table: &str, primary_keys: &[String], field: &str, read_mode: ReadMode) -> Result<Option<Vec<u8>>> {
        self.admit_single(database, table, "hget")?;
        let db = self.resolve(database, table, primary_keys, read_mode.into())?;
        db.hget(&Self::pk_refs(primary_keys), field)
    }

    pub fn hset(&self, database: &str, table: &str, primary_keys: &[String], field: &str, value: &[u8]) -> Result<bool> {
        self.admit_single(database, table, "hset")?;
        let db = self.resolve(database, table, primary_keys, RoleRequirement::LeaderOnly)?;
        db.hset(&Self::pk_refs(primary_keys), field, value)
    }

    pub fn sadd(&self, database: &str, table: &str, primary_keys: &[String], member: &[u8]) -> Result<bool> {
        self.admit_single(database, table, "sadd")?;
        let db = self.resolve(database, table, primary_keys, RoleRequirement::LeaderOnly)?;
        db.sadd(&Self::pk_refs(primary_keys), member)
    }

    pub fn push_back(&self, database: &str, table: &str, primary_keys: &[String], value: &[u8]) -> Result<u64> {
        self.admit_single(database, table, "push_back")?;
        let db = self.resolve(database, table, primary_keys, RoleRequirement::LeaderOnly)?;
        db.push_back(&Self::pk_refs(primary_keys), value)
    }

    // --------------------------------------------------------------------
    // Multi-key ops: each sub-key is independently routed (§4.6 step 2) and
    // may land on a different partition or even fail admission on its own;
    // the response vector stays positionally aligned with the request.
    // --------------------------------------------------------------------

    /// `mget` over independently-keyed rows. KPS limits sample each sub-key
    /// after routing; QPS samples once for the whole call.
    pub fn mget(&self, database: &str, table: &str, key_sets: &[Vec<String>], read_mode: ReadMode) -> Vec<Result<Option<Vec<u8>>>> {
        let admitted = match self.admit_multi_qps(database, table, "mget") {
            Ok(limit) => limit,
            Err(e) => return key_sets.iter().map(|_| Err(clone_err(&e))).collect(),
        };

        key_sets
            .iter()
            .map(|primary_keys| {
                if let Some(MultiKeyLimit::Kps(percent)) = admitted {
                    if !sampled(percent) {
                        return Err(Error::TrafficRestriction);
                    }
                }
                let db = self.resolve(database, table, primary_keys, read_mode.into())?;
                db.get(&Self::pk_refs(primary_keys))
            })
            .collect()
    }

    /// `mset` over independently-keyed rows, same admission rules as [`mget`](Self::mget).
    pub fn mset(&self, database: &str, table: &str, rows: &[(Vec<String>, Vec<u8>)]) -> Vec<Result<()>> {
        let admitted = match self.admit_multi_qps(database, table, "mset") {
            Ok(limit) => limit,
            Err(e) => return rows.iter().map(|_| Err(clone_err(&e))).collect(),
        };

        rows.iter()
            .map(|(primary_keys, value)| {
                if let Some(MultiKeyLimit::Kps(percent)) = admitted {
                    if !sampled(percent) {
                        return Err(Error::TrafficRestriction);
                    }
                }
                let db = self.resolve(database, table, primary_keys, RoleRequirement::LeaderOnly)?;
                db.set(&Self::pk_refs(primary_keys), value)
            })
            .collect()
    }
}

/// `Error` doesn't implement `Clone`; the handful of variants an admission
/// check can produce do, so this covers the cases `admit_multi_qps` returns.
fn clone_err(err: &Error) -> Error {
    match err {
        Error::OperationDenied => Error::OperationDenied,
        Error::TrafficRestriction => Error::TrafficRestriction,
        other => Error::Unknown(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NodeConfig, TableConfigList, TableEngineOptions, TrafficRestrictionConfig, DEFAULT_TABLE_KEY};
    use laser_core::hash::stable_hash64;
    use laser_core::key::PartitionId;
    use laser_core::limits::Limits;
    use laser_core::{PartitionIdentity, Role};
    use laser_engine::{PartitionEngine, TableSchema};
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn dispatcher_with_single_limit(cmd: &str, percent: u8) -> (ServiceDispatcher, Arc<PartitionRouter>) {
        let mut tables = HashMap::new();
        tables.insert(DEFAULT_TABLE_KEY.to_string(), TableEngineOptions { partition_number: 1, ..Default::default() });

        let mut per_cmd = HashMap::new();
        per_cmd.insert(cmd.to_string(), percent);
        let mut single_operation_limits = HashMap::new();
        single_operation_limits.insert(stable_hash64(&["db".to_string(), "t".to_string()]), per_cmd);

        let traffic = TrafficRestrictionConfig { version: 1, deny_all: Vec::new(), single_operation_limits, multiple_operation_limits: HashMap::new() };

        let config = Arc::new(
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
                traffic,
            )
            .unwrap(),
        );
        let router = Arc::new(PartitionRouter::new(config.clone()));
        (ServiceDispatcher::new(router.clone(), config), router)
    }

    fn host_partition_zero(router: &PartitionRouter) {
        let dir = tempdir().unwrap();
        let engine = Arc::new(PartitionEngine::open(PartitionId(0), TableSchema::simple(), Limits::default(), dir.path()).unwrap());
        let identity = PartitionIdentity { database: "db".into(), table: "t".into(), partition_id: PartitionId(0), role: Role::Leader, version: "v0".into() };
        router.assign("db", "t", PartitionId(0), Arc::new(ReplicationDb::new(identity, engine)));
    }

    #[test]
    fn zero_percent_limit_always_rejects() {
        let (dispatcher, router) = dispatcher_with_single_limit("get", 0);
        host_partition_zero(&router);
        let result = dispatcher.get("db", "t", &["k".to_string()], ReadMode::LeaderRead);
        assert!(matches!(result, Err(Error::TrafficRestriction)));
    }

    #[test]
    fn hundred_percent_limit_always_admits_and_routes() {
        let (dispatcher, router) = dispatcher_with_single_limit("set", 100);
        host_partition_zero(&router);
        dispatcher.set("db", "t", &["k".to_string()], b"v").unwrap();
        assert!(matches!(dispatcher.get("db", "t", &["k".to_string()], ReadMode::LeaderRead), Err(Error::OperationDenied)));
    }

    #[test]
    fn unconfigured_command_is_denied() {
        let (dispatcher, router) = dispatcher_with_single_limit("set", 100);
        host_partition_zero(&router);
        let result = dispatcher.get("db", "t", &["k".to_string()], ReadMode::LeaderRead);
        assert!(matches!(result, Err(Error::OperationDenied)));
    }
}
