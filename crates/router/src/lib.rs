//! Partition Router, Service Dispatcher, and Config Watcher (§4.5-4.7): the
//! layer that turns a logical `(database, table, primary_keys)` request
//! into an admitted, routed call against a locally-hosted
//! [`laser_replication::ReplicationDb`].

pub mod assignment;
pub mod config;
pub mod dispatcher;
pub mod router;

pub use assignment::{ClusterAssignment, GroupAssignment, NodeAssignment};
pub use config::{
    ConfigWatcher, MultiKeyLimit, NodeConfig, RateLimitBand, TableConfigList, TableEngineOptions,
    TrafficRestrictionConfig, DEFAULT_TABLE_KEY,
};
pub use dispatcher::ServiceDispatcher;
pub use router::{PartitionRouter, ReadMode, RoleRequirement};
