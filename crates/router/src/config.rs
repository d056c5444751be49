//! Config Watcher (§4.7): the three documents a node holds, each versioned,
//! published atomically, and rebuilt only when a version hash actually
//! changes.

use std::collections::HashMap;
use std::sync::Arc;

use laser_core::error::{Error, Result};
use laser_core::hash::stable_hash64;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

/// One `(begin_hour, end_hour, rate_bytes_per_sec)` band of the I/O rate
/// limiter's 24-hour schedule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateLimitBand {
    pub begin_hour: u8,
    pub end_hour: u8,
    pub rate_bytes_per_sec: u64,
}

fn band_covers(band: &RateLimitBand, hour: u8) -> bool {
    if band.begin_hour <= band.end_hour {
        (band.begin_hour..band.end_hour).contains(&hour)
    } else {
        // Wraps past midnight, e.g. 22..6.
        hour >= band.begin_hour || hour < band.end_hour
    }
}

/// Block cache size, write-buffer size, and I/O rate-limit schedule for the
/// whole node (§4.7 "NodeConfig").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub version: u32,
    pub block_cache_gb: u32,
    pub write_buffer_gb: u32,
    pub shard_bits: u8,
    pub high_priority_pool_ratio: f64,
    pub strict_capacity_limit: bool,
    pub rate_limit_bands: Vec<RateLimitBand>,
    pub default_rate_bytes_per_sec: u64,
}

impl NodeConfig {
    /// The rate limiter's programmed rate at `hour` (0-23); the default
    /// when no band covers it (§4.7 "gaps ... fall back to a default rate").
    pub fn rate_bytes_per_sec_at(&self, hour: u8) -> u64 {
        self.rate_limit_bands
            .iter()
            .find(|band| band_covers(band, hour))
            .map(|band| band.rate_bytes_per_sec)
            .unwrap_or(self.default_rate_bytes_per_sec)
    }
}

/// Per-table storage-engine knobs, plus the routing fact the Partition
/// Router needs (`partition_number`, §4.5 step 2).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableEngineOptions {
    pub partition_number: u32,
    pub db_options: HashMap<String, String>,
    pub column_family_options: HashMap<String, String>,
    pub table_options: HashMap<String, String>,
}

/// The distinguished entry used when a table has no specific config
/// (§4.7 "Requires a distinguished `\"default\"` entry").
pub const DEFAULT_TABLE_KEY: &str = "default";

/// Per-table engine options for every configured table (§4.7 "TableConfigList").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableConfigList {
    pub version: u32,
    pub tables: HashMap<String, TableEngineOptions>,
}

impl TableConfigList {
    /// Checks the `"default"` entry is present; call before publishing.
    pub fn validate(&self) -> Result<()> {
        if !self.tables.contains_key(DEFAULT_TABLE_KEY) {
            return Err(Error::InvalidArgument("TableConfigList missing required \"default\" entry".into()));
        }
        Ok(())
    }

    /// Options for `table`, falling back to the `"default"` entry.
    pub fn options_for(&self, table: &str) -> &TableEngineOptions {
        self.tables.get(table).unwrap_or_else(|| {
            self.tables.get(DEFAULT_TABLE_KEY).expect("validate() must be called before publishing a TableConfigList")
        })
    }
}

/// Admission limit for a multi-key command: sampled once per request (QPS)
/// or once per sub-key after dispatch (KPS), §4.6 step 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiKeyLimit {
    Qps(u8),
    Kps(u8),
}

/// Traffic-governance rules consumed by the Service Dispatcher (§4.6).
///
/// Keyed by the stable hash of `(database, table)` (the "table key" in
/// §4.6 step 1) rather than the tuple itself, reusing the same
/// [`stable_hash64`] the Router uses for primary keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrafficRestrictionConfig {
    pub version: u32,
    pub deny_all: Vec<u64>,
    pub single_operation_limits: HashMap<u64, HashMap<String, u8>>,
    pub multiple_operation_limits: HashMap<u64, HashMap<String, MultiKeyLimit>>,
}

/// Stable lookup key for a `(database, table)` pair, shared by
/// [`TrafficRestrictionConfig`] lookups and the [`PartitionRouter`](crate::router::PartitionRouter).
pub fn table_key(database: &str, table: &str) -> u64 {
    stable_hash64(&[database.to_string(), table.to_string()])
}

impl TrafficRestrictionConfig {
    pub fn is_denied(&self, database: &str, table: &str) -> bool {
        self.deny_all.contains(&table_key(database, table))
    }

    pub fn single_operation_limit(&self, database: &str, table: &str, cmd: &str) -> Option<u8> {
        self.single_operation_limits.get(&table_key(database, table)).and_then(|m| m.get(cmd)).copied()
    }

    pub fn multiple_operation_limit(&self, database: &str, table: &str, cmd: &str) -> Option<MultiKeyLimit> {
        self.multiple_operation_limits.get(&table_key(database, table)).and_then(|m| m.get(cmd)).copied()
    }
}

/// A 64-bit hash of `(config_name, version)`; unchanged hashes suppress a
/// reopen of the options a subscriber built from it (§4.7).
fn version_hash(config_name: &str, version: u32) -> u64 {
    stable_hash64(&[config_name.to_string(), version.to_string()])
}

#[derive(Debug)]
struct WatchedConfig {
    node: Arc<NodeConfig>,
    tables: Arc<TableConfigList>,
    traffic: Arc<TrafficRestrictionConfig>,
    node_hash: u64,
    tables_hash: u64,
    traffic_hash: u64,
}

/// Holds the three documents §4.7 describes, publishing each atomically and
/// suppressing a reopen when an incoming document's version hash matches
/// what's already live.
#[derive(Debug)]
pub struct ConfigWatcher {
    current: RwLock<WatchedConfig>,
}

impl ConfigWatcher {
    pub fn new(node: NodeConfig, tables: TableConfigList, traffic: TrafficRestrictionConfig) -> Result<Self> {
        tables.validate()?;
        let node_hash = version_hash("node", node.version);
        let tables_hash = version_hash("tables", tables.version);
        let traffic_hash = version_hash("traffic", traffic.version);
        Ok(ConfigWatcher {
            current: RwLock::new(WatchedConfig {
                node: Arc::new(node),
                tables: Arc::new(tables),
                traffic: Arc::new(traffic),
                node_hash,
                tables_hash,
                traffic_hash,
            }),
        })
    }

    pub fn node(&self) -> Arc<NodeConfig> {
        self.current.read().node.clone()
    }

    pub fn tables(&self) -> Arc<TableConfigList> {
        self.current.read().tables.clone()
    }

    pub fn traffic(&self) -> Arc<TrafficRestrictionConfig> {
        self.current.read().traffic.clone()
    }

    /// Partition count for `table`, used by the Router (§4.5 step 2).
    pub fn partition_number(&self, database: &str, table: &str) -> u32 {
        let _ = database;
        self.tables().options_for(table).partition_number
    }

    /// Publish a new `NodeConfig`; no-op if its version hash is unchanged.
    pub fn update_node(&self, node: NodeConfig) {
        let hash = version_hash("node", node.version);
        let mut current = self.current.write();
        if hash == current.node_hash {
            return;
        }
        info!(version = node.version, "node config updated");
        current.node = Arc::new(node);
        current.node_hash = hash;
    }

    /// Publish a new `TableConfigList`; no-op if its version hash is unchanged.
    pub fn update_tables(&self, tables: TableConfigList) -> Result<()> {
        tables.validate()?;
        let hash = version_hash("tables", tables.version);
        let mut current = self.current.write();
        if hash == current.tables_hash {
            return Ok(());
        }
        info!(version = tables.version, "table config updated");
        current.tables = Arc::new(tables);
        current.tables_hash = hash;
        Ok(())
    }

    /// Publish a new `TrafficRestrictionConfig`; no-op if its version hash
    /// is unchanged.
    pub fn update_traffic(&self, traffic: TrafficRestrictionConfig) {
        let hash = version_hash("traffic", traffic.version);
        let mut current = self.current.write();
        if hash == current.traffic_hash {
            return;
        }
        info!(version = traffic.version, "traffic restriction config updated");
        current.traffic = Arc::new(traffic);
        current.traffic_hash = hash;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables_with_default(partition_number: u32) -> TableConfigList {
        let mut tables = HashMap::new();
        tables.insert(DEFAULT_TABLE_KEY.to_string(), TableEngineOptions { partition_number, ..Default::default() });
        TableConfigList { version: 1, tables }
    }

    #[test]
    fn rejects_table_config_without_default() {
        let tables = TableConfigList { version: 1, tables: HashMap::new() };
        let err = ConfigWatcher::new(
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
            tables,
            TrafficRestrictionConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn unchanged_version_hash_suppresses_update() {
        let watcher = ConfigWatcher::new(
            NodeConfig {
                version: 1,
                block_cache_gb: 1,
                write_buffer_gb: 1,
                shard_bits: 4,
                high_priority_pool_ratio: 0.1,
                strict_capacity_limit: false,
                rate_limit_bands: Vec::new(),
                default_rate_bytes_per_sec: 100,
            },
            tables_with_default(4),
            TrafficRestrictionConfig::default(),
        )
        .unwrap();

        let before = watcher.tables();
        watcher.update_tables(tables_with_default(4)).unwrap();
        assert!(Arc::ptr_eq(&before, &watcher.tables()), "same version hash must not republish");

        watcher.update_tables(tables_with_default(8)).unwrap();
        assert_eq!(watcher.partition_number("db", "t"), 8);
    }

    #[test]
    fn rate_band_falls_back_to_default_in_gaps() {
        let node = NodeConfig {
            version: 1,
            block_cache_gb: 1,
            write_buffer_gb: 1,
            shard_bits: 4,
            high_priority_pool_ratio: 0.1,
            strict_capacity_limit: false,
            rate_limit_bands: vec![RateLimitBand { begin_hour: 9, end_hour: 17, rate_bytes_per_sec: 1000 }],
            default_rate_bytes_per_sec: 50,
        };
        assert_eq!(node.rate_bytes_per_sec_at(12), 1000);
        assert_eq!(node.rate_bytes_per_sec_at(20), 50);
    }

    #[test]
    fn deny_all_and_single_operation_limit_are_keyed_by_table() {
        let mut single = HashMap::new();
        single.insert("get".to_string(), 50u8);
        let mut limits = HashMap::new();
        limits.insert(table_key("db", "t"), single);
        let traffic = TrafficRestrictionConfig { version: 1, deny_all: Vec::new(), single_operation_limits: limits, multiple_operation_limits: HashMap::new() };

        assert_eq!(traffic.single_operation_limit("db", "t", "get"), Some(50));
        assert_eq!(traffic.single_operation_limit("db", "other", "get"), None);
    }
}
