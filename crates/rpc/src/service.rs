//! `tonic` server side of the Replicator service: translates wire messages
//! into [`laser_replication`] DTOs, dispatches to the right
//! [`laser_replication::ReplicationDb`] via [`ReplicatorManager`], and
//! translates the answer back.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use laser_core::error::Error;
use laser_replication::{
    CheckpointGuard, CheckpointRegistry, ReplicateRequest as DomainRequest, ReplicateRequestType,
};
use parking_lot::Mutex;
use tonic::{Request, Response, Status};

use crate::manager::ReplicatorManager;
use crate::pb;
use crate::pb::replicator_service_server::{ReplicatorService, ReplicatorServiceServer};

/// Build a ready-to-serve `tonic` service wrapping a [`ReplicatorManager`].
///
/// Holds one checkpoint guard per `(db_hash, follower_node_hash)` so that the
/// checkpoint a `ReplicateWdt` call hands out stays on disk until a later
/// request from the same follower supersedes it (§5 "reference-counted");
/// this is why [`CheckpointGuard`] owns its registry by `Arc` rather than
/// borrowing it.
pub struct ReplicatorServer {
    manager: Arc<ReplicatorManager>,
    checkpoints: Arc<CheckpointRegistry>,
    checkpoint_root: PathBuf,
    sessions: Mutex<HashMap<(i64, i64), CheckpointGuard>>,
}

impl ReplicatorServer {
    /// Wrap `manager` into a `tonic`-servable type. `checkpoint_root` is
    /// where per-follower checkpoint snapshots are staged.
    pub fn new(
        manager: Arc<ReplicatorManager>,
        checkpoints: Arc<CheckpointRegistry>,
        checkpoint_root: PathBuf,
    ) -> ReplicatorServiceServer<Self> {
        ReplicatorServiceServer::new(ReplicatorServer {
            manager,
            checkpoints,
            checkpoint_root,
            sessions: Mutex::new(HashMap::new()),
        })
    }
}

fn to_status(err: Error) -> Status {
    match err {
        Error::SourceNotFound | Error::NotExistsPartition => Status::not_found(err.to_string()),
        Error::WriteInFollower => Status::failed_precondition(err.to_string()),
        Error::Timedout | Error::CallTimeout | Error::FutureTimeout => Status::deadline_exceeded(err.to_string()),
        other => Status::internal(other.to_string()),
    }
}

fn request_type_from_wire(value: i32) -> ReplicateRequestType {
    match pb::ReplicateRequestType::try_from(value).unwrap_or(pb::ReplicateRequestType::LogTail) {
        pb::ReplicateRequestType::LogTail => ReplicateRequestType::LogTail,
        pb::ReplicateRequestType::StatusOnly => ReplicateRequestType::StatusOnly,
    }
}

#[tonic::async_trait]
impl ReplicatorService for ReplicatorServer {
    async fn replicate(&self, request: Request<pb::ReplicateRequest>) -> Result<Response<pb::ReplicateResponse>, Status> {
        let wire = request.into_inner();
        let domain_request = DomainRequest {
            db_hash: wire.db_hash,
            from_seq_no: wire.from_seq_no,
            max_batch_count: wire.max_batch_count,
            max_batch_bytes: wire.max_batch_bytes,
            follower_node_hash: wire.follower_node_hash,
            follower_service_addr: wire.follower_service_addr,
            request_type: request_type_from_wire(wire.r#type),
        };

        let db = self.manager.lookup(domain_request.db_hash).map_err(to_status)?;
        let response = db.handle_replicate(domain_request).await.map_err(to_status)?;

        Ok(Response::new(pb::ReplicateResponse {
            updates: response
                .updates
                .into_iter()
                .map(|u| pb::UpdateRecord { seq_no: u.seq_no, write_batch_bytes: u.write_batch_bytes, leader_ms: u.leader_ms })
                .collect(),
            leader_max_seq_no: response.leader_max_seq_no,
            needs_base_transfer: response.needs_base_transfer,
            base_version: response.base_version,
            status: pb::ReplicateStatus::Ok as i32,
            error_message: String::new(),
        }))
    }

    async fn replicate_wdt(
        &self,
        request: Request<pb::ReplicateWdtRequest>,
    ) -> Result<Response<pb::ReplicateWdtResponse>, Status> {
        let wire = request.into_inner();
        let db = self.manager.lookup(wire.db_hash).map_err(to_status)?;
        let identity = db.identity();

        let session_key = (wire.db_hash, wire.follower_node_hash);
        let checkpoint_dir = self.checkpoint_root.join(format!("{}-{}", wire.db_hash, wire.follower_node_hash));
        let guard = self
            .checkpoints
            .checkout(db.engine(), &checkpoint_dir, &identity.version)
            .map_err(to_status)?;
        let connect_url = guard.dir().display().to_string();
        // Replacing the session's guard drops the previous one, releasing
        // that reference once no other in-flight transfer still holds it.
        self.sessions.lock().insert(session_key, guard);

        Ok(Response::new(pb::ReplicateWdtResponse {
            connect_url,
            base_version: identity.version,
            namespace: identity.database,
            identifier: identity.table,
        }))
    }
}
