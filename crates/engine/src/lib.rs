//! The Partition Engine (§4.2): one isolated log-structured storage
//! instance per `(table, partition_id)`.

pub mod batch;
pub mod engine;
pub mod table;
pub mod wal;

pub use batch::{EncodedOp, WriteBatchRecord};
pub use engine::{ListRange, PartitionEngine, SetxOptions, ZMember};
pub use table::TableSchema;
pub use wal::DurabilityMode;
