//! The follower pull loop (§4.3 "Pull loop (follower)"), realized as a
//! supervised `tokio::task` per partition (§9 Design Notes' suggested
//! refactor, folded into the spec via `SPEC_FULL.md` §4.3 ADD).

use std::sync::Arc;
use std::time::Duration;

use laser_core::error::Error;
use laser_core::hash::NodeHash;
use laser_core::Role;
use rand::Rng;
use tracing::{info, warn};

use crate::bulk;
use crate::db::ReplicationDb;
use crate::transport::{ReplicateRequest, ReplicateRequestType, ReplicateWdtRequest, ReplicationTransport};

/// Tunables for one partition's pull loop.
#[derive(Debug, Clone)]
pub struct PullLoopConfig {
    pub max_batch_count: u32,
    pub max_batch_bytes: u32,
    /// Base sleep between pulls; jittered by up to 50% to avoid
    /// synchronized retries across partitions (§5).
    pub poll_interval: Duration,
    /// Switch to bulk transfer once the follower falls this far behind
    /// even when the leader's log could still, in principle, cover it.
    pub too_far_behind: u64,
    pub rpc_timeout: Duration,
}

impl Default for PullLoopConfig {
    fn default() -> Self {
        PullLoopConfig {
            max_batch_count: 500,
            max_batch_bytes: 4 << 20,
            poll_interval: Duration::from_millis(200),
            too_far_behind: 50_000,
            rpc_timeout: Duration::from_secs(5),
        }
    }
}

fn jittered(base: Duration) -> Duration {
    let factor = rand::thread_rng().gen_range(0.5..1.5);
    Duration::from_secs_f64(base.as_secs_f64() * factor)
}

/// Owns a follower's [`ReplicationDb`] handle and a transport to the
/// leader; drives log tailing and bulk-transfer fallback until the
/// partition is promoted to leader.
pub struct PullLoop {
    db: Arc<ReplicationDb>,
    transport: Arc<dyn ReplicationTransport>,
    leader_db_hash: i64,
    follower_node_hash: NodeHash,
    follower_service_addr: String,
    config: PullLoopConfig,
}

impl PullLoop {
    /// Spawn the loop as a `tokio` task; it exits on its own once `db` is
    /// promoted back to `Leader` (§4.3 "Follower -> Leader: stop the pull
    /// loop").
    pub fn spawn(
        db: Arc<ReplicationDb>,
        transport: Arc<dyn ReplicationTransport>,
        leader_db_hash: i64,
        follower_node_hash: NodeHash,
        follower_service_addr: String,
        config: PullLoopConfig,
    ) -> tokio::task::JoinHandle<()> {
        let pull_loop =
            PullLoop { db, transport, leader_db_hash, follower_node_hash, follower_service_addr, config };
        tokio::spawn(async move { pull_loop.run().await })
    }

    async fn run(&self) {
        while self.db.role() == Role::Follower {
            if let Err(e) = self.tick().await {
                warn!(error = %e, "pull loop iteration failed, retrying after backoff");
            }
            tokio::time::sleep(jittered(self.config.poll_interval)).await;
        }
    }

    async fn tick(&self) -> laser_core::error::Result<()> {
        let from_seq_no = self.db.engine().seq_no() + 1;
        let forced = self.db.take_force_base_transfer();

        let request = ReplicateRequest {
            db_hash: self.leader_db_hash,
            from_seq_no,
            max_batch_count: self.config.max_batch_count,
            max_batch_bytes: self.config.max_batch_bytes,
            follower_node_hash: self.follower_node_hash.0,
            follower_service_addr: self.follower_service_addr.clone(),
            request_type: ReplicateRequestType::LogTail,
        };

        let started = std::time::Instant::now();
        let response = match tokio::time::timeout(self.config.rpc_timeout, self.transport.replicate(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!(error = %e, "replicate rpc returned an error, will retry");
                return Ok(());
            }
            Err(_) => {
                warn!("replicate rpc timed out, will retry");
                return Ok(());
            }
        };
        let pull_rpc_latency_ms = started.elapsed().as_millis();

        let lag = response.leader_max_seq_no.saturating_sub(from_seq_no.saturating_sub(1));
        let too_far_behind = lag > self.config.too_far_behind;

        if forced || response.needs_base_transfer || too_far_behind {
            return self.bulk_transfer().await;
        }

        let applied = response.updates.len();
        for update in &response.updates {
            let record = update.decode()?;
            self.db.apply_pulled_batch(record)?;
        }

        info!(
            pull_rpc_latency_ms,
            applied,
            seq_no_diff = lag,
            "pull loop iteration applied updates"
        );
        Ok(())
    }

    async fn bulk_transfer(&self) -> laser_core::error::Result<()> {
        let negotiate = ReplicateWdtRequest { db_hash: self.leader_db_hash, follower_node_hash: self.follower_node_hash.0 };
        let response = tokio::time::timeout(self.config.rpc_timeout, self.transport.replicate_wdt(negotiate))
            .await
            .map_err(|_| Error::CallTimeout)??;

        let source_dir = std::path::Path::new(&response.connect_url);
        let temp_dir = std::env::temp_dir().join(format!("laser-bulk-{}", self.follower_node_hash.0));
        std::fs::create_dir_all(&temp_dir).map_err(Error::IoError)?;
        let temp_path = temp_dir.join(format!("{}.sst", response.identifier));

        let installed_version = bulk::receive_and_install(self.db.engine(), source_dir, &temp_path)?;
        self.db.set_version(installed_version);
        info!(base_version = %response.base_version, "bulk transfer installed, resuming log tail");
        Ok(())
    }
}
