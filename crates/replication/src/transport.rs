//! Wire-level shapes for the two RPC calls the Replication DB makes
//! against a remote leader (§6): log-tailing and bulk-transfer
//! negotiation. These are transport-agnostic; `laser-rpc` is what maps
//! them onto `tonic`/`prost` messages for the wire and back.

use async_trait::async_trait;
use laser_core::error::Result;
use laser_engine::WriteBatchRecord;

/// Which kind of response the puller wants back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicateRequestType {
    /// Ship committed batches starting at `from_seq_no`.
    LogTail,
    /// Report `leader_max_seq_no`/`needs_base_transfer` only, no updates.
    StatusOnly,
}

/// Request: "send me updates for this partition starting at `from_seq_no`".
#[derive(Debug, Clone)]
pub struct ReplicateRequest {
    pub db_hash: i64,
    pub from_seq_no: u64,
    pub max_batch_count: u32,
    pub max_batch_bytes: u32,
    pub follower_node_hash: i64,
    pub follower_service_addr: String,
    pub request_type: ReplicateRequestType,
}

/// One committed batch as shipped over the wire: the already-`bincode`d
/// `WriteBatchRecord` plus the fields a follower needs before decoding it.
#[derive(Debug, Clone)]
pub struct UpdateRecord {
    pub seq_no: u64,
    pub write_batch_bytes: Vec<u8>,
    pub leader_ms: i64,
}

impl UpdateRecord {
    pub fn from_batch(record: &WriteBatchRecord) -> Result<Self> {
        Ok(UpdateRecord {
            seq_no: record.seq_no,
            write_batch_bytes: record.to_bytes().map_err(|e| {
                laser_core::error::Error::Corruption(format!("failed to encode write batch: {e}"))
            })?,
            leader_ms: record.leader_ms,
        })
    }

    pub fn decode(&self) -> Result<WriteBatchRecord> {
        WriteBatchRecord::from_bytes(&self.write_batch_bytes)
            .map_err(|e| laser_core::error::Error::Corruption(format!("failed to decode write batch: {e}")))
    }
}

/// Response to a [`ReplicateRequest`].
#[derive(Debug, Clone)]
pub struct ReplicateResponse {
    pub updates: Vec<UpdateRecord>,
    pub leader_max_seq_no: u64,
    pub needs_base_transfer: bool,
    pub base_version: Option<String>,
}

/// Request: "give me a connect URL to bulk-copy this partition's checkpoint".
#[derive(Debug, Clone)]
pub struct ReplicateWdtRequest {
    pub db_hash: i64,
    pub follower_node_hash: i64,
}

/// Response: where and under what session identity to fetch the checkpoint.
#[derive(Debug, Clone)]
pub struct ReplicateWdtResponse {
    pub connect_url: String,
    pub base_version: String,
    pub namespace: String,
    pub identifier: String,
}

/// What a follower's pull loop needs from the network: two async calls
/// against a remote leader. `laser-rpc` implements this over `tonic`;
/// tests implement it in-process to exercise the pull loop without a
/// socket.
#[async_trait]
pub trait ReplicationTransport: Send + Sync {
    async fn replicate(&self, request: ReplicateRequest) -> Result<ReplicateResponse>;
    async fn replicate_wdt(&self, request: ReplicateWdtRequest) -> Result<ReplicateWdtResponse>;
}
