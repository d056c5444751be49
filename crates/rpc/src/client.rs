//! `tonic` client side: implements [`ReplicationTransport`] against a
//! remote node's Replicator service, so a follower's pull loop (in
//! `laser-replication`, which never links `tonic` directly) can reach a
//! leader on another node.

use async_trait::async_trait;
use laser_core::error::{Error, Result};
use laser_replication::{
    ReplicateRequest, ReplicateRequestType, ReplicateResponse, ReplicateWdtRequest, ReplicateWdtResponse,
    ReplicationTransport, UpdateRecord,
};
use tonic::transport::{Channel, Endpoint};
use tonic::Status;

use crate::pb;
use crate::pb::replicator_service_client::ReplicatorServiceClient;

fn from_status(status: Status) -> Error {
    Error::RpcCallError(status.message().to_string())
}

fn request_type_to_wire(request_type: ReplicateRequestType) -> i32 {
    match request_type {
        ReplicateRequestType::LogTail => pb::ReplicateRequestType::LogTail as i32,
        ReplicateRequestType::StatusOnly => pb::ReplicateRequestType::StatusOnly as i32,
    }
}

/// A connected handle to one remote node's Replicator service.
pub struct RpcReplicationTransport {
    client: ReplicatorServiceClient<Channel>,
}

impl RpcReplicationTransport {
    /// Connect to `addr` (e.g. `http://10.0.0.4:7001`), lazily per `tonic`'s
    /// usual connection semantics.
    pub async fn connect(addr: impl Into<String>) -> Result<Self> {
        let endpoint: Endpoint = Endpoint::from_shared(addr.into()).map_err(|e| Error::InvalidArgument(e.to_string()))?;
        let channel = endpoint.connect().await.map_err(|e| Error::RpcCallError(e.to_string()))?;
        Ok(RpcReplicationTransport { client: ReplicatorServiceClient::new(channel) })
    }
}

#[async_trait]
impl ReplicationTransport for RpcReplicationTransport {
    async fn replicate(&self, request: ReplicateRequest) -> Result<ReplicateResponse> {
        let wire = pb::ReplicateRequest {
            db_hash: request.db_hash,
            from_seq_no: request.from_seq_no,
            max_batch_count: request.max_batch_count,
            max_batch_bytes: request.max_batch_bytes,
            follower_node_hash: request.follower_node_hash,
            follower_service_addr: request.follower_service_addr,
            r#type: request_type_to_wire(request.request_type),
        };

        let mut client = self.client.clone();
        let response = client.replicate(wire).await.map_err(from_status)?.into_inner();
        if response.status != pb::ReplicateStatus::Ok as i32 {
            return Err(Error::RpcCallError(response.error_message));
        }

        Ok(ReplicateResponse {
            updates: response
                .updates
                .into_iter()
                .map(|u| UpdateRecord { seq_no: u.seq_no, write_batch_bytes: u.write_batch_bytes, leader_ms: u.leader_ms })
                .collect(),
            leader_max_seq_no: response.leader_max_seq_no,
            needs_base_transfer: response.needs_base_transfer,
            base_version: response.base_version,
        })
    }

    async fn replicate_wdt(&self, request: ReplicateWdtRequest) -> Result<ReplicateWdtResponse> {
        let wire = pb::ReplicateWdtRequest { db_hash: request.db_hash, follower_node_hash: request.follower_node_hash };

        let mut client = self.client.clone();
        let response = client.replicate_wdt(wire).await.map_err(from_status)?.into_inner();

        Ok(ReplicateWdtResponse {
            connect_url: response.connect_url,
            base_version: response.base_version,
            namespace: response.namespace,
            identifier: response.identifier,
        })
    }
}
