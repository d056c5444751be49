//! The Replication DB (§4.3): wraps a Partition Engine with a
//! leader/follower role, the pull-based log-tailing protocol, and the
//! bulk-transfer fallback.

pub mod bulk;
pub mod db;
pub mod iterator_cache;
pub mod pull;
pub mod transport;

pub use bulk::{CheckpointGuard, CheckpointRegistry};
pub use db::ReplicationDb;
pub use iterator_cache::IteratorCache;
pub use pull::{PullLoop, PullLoopConfig};
pub use transport::{
    ReplicateRequest, ReplicateRequestType, ReplicateResponse, ReplicateWdtRequest, ReplicateWdtResponse,
    ReplicationTransport, UpdateRecord,
};
