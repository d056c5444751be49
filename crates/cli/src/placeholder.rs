//! Builds a placeholder config document for `laser-cli config init` (§6,
//! SPEC_FULL.md's "CLI surface (ADD)"): one `"default"`-keyed table entry
//! and an empty traffic-restriction set, enough for a node to boot against.

use std::collections::HashMap;

use laser_router::{
    NodeConfig, RateLimitBand, TableConfigList, TableEngineOptions, TrafficRestrictionConfig, DEFAULT_TABLE_KEY,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct PlaceholderDocument {
    pub node: NodeConfig,
    pub tables: TableConfigList,
    pub traffic: TrafficRestrictionConfig,
}

pub fn placeholder_document() -> PlaceholderDocument {
    let mut tables = HashMap::new();
    tables.insert(DEFAULT_TABLE_KEY.to_string(), TableEngineOptions { partition_number: 16, ..Default::default() });

    PlaceholderDocument {
        node: NodeConfig {
            version: 1,
            block_cache_gb: 4,
            write_buffer_gb: 1,
            shard_bits: 4,
            high_priority_pool_ratio: 0.1,
            strict_capacity_limit: false,
            rate_limit_bands: vec![RateLimitBand { begin_hour: 0, end_hour: 6, rate_bytes_per_sec: 50_000_000 }],
            default_rate_bytes_per_sec: 100_000_000,
        },
        tables: TableConfigList { version: 1, tables },
        traffic: TrafficRestrictionConfig::default(),
    }
}
