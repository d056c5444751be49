//! Error taxonomy for Laser.
//!
//! `Error` is the unified result type for every public operation in the
//! engine, replication, rpc and router crates. Variants are grouped by the
//! kind categories from the design ("Storage", "Policy/Admission",
//! "Routing", "RPC/Client", "Replication", "Generator") so a caller can
//! match on a category without enumerating every leaf variant, while
//! `thiserror` gives each leaf a stable `Display` message.
//!
//! `Error` deliberately carries no backtraces or source chains beyond
//! `#[from] std::io::Error` — storage faults are reported as a tagged
//! status, not propagated as opaque `anyhow` errors, so callers can route
//! on the kind (e.g. retry `Busy`, never retry `WriteInFollower`).

use thiserror::Error;

/// Result type alias used throughout Laser.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for all Laser operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Key or record not found, including a not-yet-deleted but expired key.
    #[error("not found")]
    NotFound,

    /// On-disk data failed a checksum or structural check.
    #[error("corruption: {0}")]
    Corruption(String),

    /// Operation isn't implemented for this value kind or engine mode.
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Caller-supplied argument is structurally invalid (e.g. counter overflow).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Underlying file or network I/O failed.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// A merge/compaction is already in progress for this partition.
    #[error("merge already in progress")]
    MergeInProgress,

    /// Operation returned partial results (e.g. a truncated range scan).
    #[error("incomplete")]
    Incomplete,

    /// Partition is draining in-flight operations before teardown.
    #[error("shutdown in progress")]
    ShutdownInProgress,

    /// Operation exceeded its deadline.
    #[error("timed out")]
    Timedout,

    /// Operation was aborted (e.g. a bulk-transfer session abort flag fired).
    #[error("aborted")]
    Aborted,

    /// Resource is transiently unavailable; caller should retry.
    #[error("busy")]
    Busy,

    /// Key exists but its TTL has passed.
    #[error("expired")]
    Expired,

    /// Transient failure that resolves itself; caller should retry.
    #[error("try again")]
    TryAgain,

    /// Requested compaction span exceeds the configured limit.
    #[error("compaction too large")]
    CompactionTooLarge,

    /// Synonym for `Expired` used by point-read paths (§4.2).
    #[error("key expired")]
    KeyExpired,

    /// Key already exists (`setx` with `not_exists` semantics).
    #[error("key exists")]
    KeyExists,

    /// Collection (hash/set/list/zset) has no live members.
    #[error("empty collection")]
    Empty,

    /// Table-level traffic rule has `deny_all` set, or no rule is configured
    /// for this command (§4.6).
    #[error("operation denied")]
    OperationDenied,

    /// Admission was sampled out by a configured traffic limit (§4.6).
    #[error("traffic restriction")]
    TrafficRestriction,

    /// A write was routed to a follower replica (§4.2, §7).
    #[error("write attempted on follower")]
    WriteInFollower,

    /// One or more keys in a multi-key batch failed (§7 user-visible behavior).
    #[error("partial failure")]
    PartFailed,

    /// The local node has no partition for the requested
    /// `(database, table, partition_id)`.
    #[error("partition does not exist on this node")]
    NotExistsPartition,

    /// A weak `ReplicationDb` handle failed to upgrade — the partition has
    /// already been torn down (§4.4 Concurrency, §9 Design Notes).
    #[error("replication source not found")]
    SourceNotFound,

    /// A decoded value's type tag doesn't match the caller's expected kind.
    #[error("union data type invalid")]
    UnionDataTypeInvalid,

    /// RPC transport-level failure (connection reset, codec error, ...).
    #[error("rpc call error: {0}")]
    RpcCallError(String),

    /// Caller presented a shard id not assigned on this node.
    #[error("no shard id")]
    NoShardId,

    /// RPC exceeded its receive timeout.
    #[error("call timed out")]
    CallTimeout,

    /// RPC exceeded its future/completion timeout.
    #[error("future timed out")]
    FutureTimeout,

    /// Leader failed to read its own log while answering a pull request.
    #[error("source read error: {0}")]
    SourceReadError(String),

    /// The source `ReplicationDb` was removed mid-replication.
    #[error("source db removed")]
    SourceDbRemoved,

    /// The leader's earliest retained WAL segment is newer than the
    /// follower's requested `from_seq_no` (triggers bulk transfer, §4.3).
    #[error("source wal log removed")]
    SourceWalLogRemoved,

    /// A replication role transition was attempted out of turn (§3 Invariants).
    #[error("role error: {0}")]
    RoleError(String),

    /// Offline SST generator: referenced table does not exist.
    #[error("table does not exist")]
    TableNotExists,

    /// Offline SST generator: failed to acquire the per-table build lock.
    #[error("get table lock failed")]
    GetTableLockFail,

    /// Offline SST generator: a build is already running for this table.
    #[error("table processing")]
    TableProcessing,

    /// Offline SST generator: failed to enqueue a build job.
    #[error("set queue failed")]
    SetQueueFail,

    /// Offline SST generator: failed to record build job state.
    #[error("set hash failed")]
    SetHashFail,

    /// Offline SST generator: failed to set the per-table build lock.
    #[error("set lock failed")]
    SetLockFail,

    /// Offline SST generator: failed to release the per-table build lock.
    #[error("del lock failed")]
    DelLockFail,

    /// Offline SST generator: failed to dequeue a finished build job.
    #[error("del queue failed")]
    DelQueueFail,

    /// Catch-all for conditions that don't map onto a known kind.
    #[error("unknown error: {0}")]
    Unknown(String),
}

impl Error {
    /// Whether a caller should retry this operation without changing
    /// routing (as opposed to `WriteInFollower`, which requires
    /// re-resolving the partition's leader, §7 Propagation).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Busy
                | Error::TryAgain
                | Error::Timedout
                | Error::CallTimeout
                | Error::FutureTimeout
                | Error::MergeInProgress
        )
    }
}
