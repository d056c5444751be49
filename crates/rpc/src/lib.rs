//! Wire transport for the Replication DB (§6): a `tonic` service that
//! answers `Replicate`/`ReplicateWdt` calls against locally-hosted
//! partitions, a client that implements [`laser_replication::ReplicationTransport`]
//! against a remote node, and the [`ReplicatorManager`] that both sides use
//! to find the right [`laser_replication::ReplicationDb`] by db hash (§4.4).

pub mod client;
pub mod manager;
pub mod service;

pub use client::RpcReplicationTransport;
pub use manager::ReplicatorManager;
pub use service::ReplicatorServer;

/// Generated `tonic`/`prost` types and service traits for
/// `laser.replication.v1`.
pub mod pb {
    tonic::include_proto!("laser.replication.v1");
}
