//! Bulk-transfer fallback (§4.3 "Bulk transfer"): when the leader's
//! retained log no longer covers a follower's requested `from_seq_no`,
//! the follower instead copies a whole-partition snapshot and installs
//! it with [`laser_engine::PartitionEngine::ingest_base_sst`].
//!
//! The original wraps Facebook's WDT for the file copy; that's a
//! deliberately out-of-scope collaborator here (§1's "offline ingestion
//! tool" boundary applies to the transfer mechanism too), so the copy
//! step is a plain file copy keyed by the `connect_url` the leader hands
//! back. What's in scope, and implemented faithfully, is the checkpoint
//! ref-counting and the atomic install-then-resume sequence.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use laser_core::error::Result;
use laser_engine::PartitionEngine;
use parking_lot::Mutex;

const BASE_VERSION_FILE: &str = "BASE_VERSION";
const SNAPSHOT_FILE: &str = "snapshot.sst";

/// Leader-side registry of checkpoint directories, ref-counted so that
/// concurrent bulk transfers from the same leader share one checkpoint and
/// physical cleanup only happens once every transfer has finished (§5
/// "Checkpoint directories are reference-counted").
#[derive(Default)]
pub struct CheckpointRegistry {
    refcounts: Mutex<HashMap<PathBuf, usize>>,
}

impl CheckpointRegistry {
    pub fn new() -> Self {
        CheckpointRegistry::default()
    }

    /// Produce (or reuse) a checkpoint at `dir` for `engine`, stamped with
    /// `base_version`, and return a guard that keeps it alive until
    /// dropped. Takes `self` by `Arc` so the guard can outlive the stack
    /// frame that requested it, e.g. parked in a session map until a
    /// remote transfer completes.
    pub fn checkout(self: &Arc<Self>, engine: &PartitionEngine, dir: &Path, base_version: &str) -> Result<CheckpointGuard> {
        let mut refcounts = self.refcounts.lock();
        if !refcounts.contains_key(dir) {
            fs::create_dir_all(dir)?;
            engine.dump_sst(dir.join(SNAPSHOT_FILE))?;
            fs::write(dir.join(BASE_VERSION_FILE), base_version)?;
        }
        *refcounts.entry(dir.to_path_buf()).or_insert(0) += 1;
        Ok(CheckpointGuard { registry: self.clone(), dir: dir.to_path_buf() })
    }

    fn release(&self, dir: &Path) {
        let mut refcounts = self.refcounts.lock();
        if let Some(count) = refcounts.get_mut(dir) {
            *count -= 1;
            if *count == 0 {
                refcounts.remove(dir);
                let _ = fs::remove_dir_all(dir);
            }
        }
    }
}

/// RAII handle on a checked-out checkpoint; dropping it releases the
/// leader's reference, triggering cleanup once no transfer still holds it.
pub struct CheckpointGuard {
    registry: Arc<CheckpointRegistry>,
    dir: PathBuf,
}

impl CheckpointGuard {
    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Drop for CheckpointGuard {
    fn drop(&mut self) {
        self.registry.release(&self.dir);
    }
}

/// Follower side of a bulk transfer: copy the snapshot at `source_dir`
/// (the leader's checkpoint directory, reachable via whatever
/// `connect_url` resolved to) into `temp_path`, install it, and report the
/// installed `base_version`.
pub fn receive_and_install(engine: &PartitionEngine, source_dir: &Path, temp_path: &Path) -> Result<String> {
    let source_snapshot = source_dir.join(SNAPSHOT_FILE);
    fs::copy(&source_snapshot, temp_path)?;
    let install_result = engine.ingest_base_sst(temp_path);
    let _ = fs::remove_file(temp_path);
    install_result?;

    let base_version = fs::read_to_string(source_dir.join(BASE_VERSION_FILE))?.trim().to_string();
    Ok(base_version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use laser_core::key::PartitionId;
    use laser_core::limits::Limits;
    use laser_engine::TableSchema;
    use tempfile::tempdir;

    #[test]
    fn checkout_is_idempotent_and_refcounted() {
        let wal_dir = tempdir().unwrap();
        let engine = PartitionEngine::open(PartitionId(0), TableSchema::simple(), Limits::default(), wal_dir.path()).unwrap();
        engine.set(&["k"], b"v").unwrap();

        let registry = Arc::new(CheckpointRegistry::new());
        let checkpoint_dir = tempdir().unwrap();
        let guard_a = registry.checkout(&engine, checkpoint_dir.path(), "v1").unwrap();
        let guard_b = registry.checkout(&engine, checkpoint_dir.path(), "v1").unwrap();
        assert!(guard_a.snapshot_path().exists());

        drop(guard_a);
        assert!(checkpoint_dir.path().join(SNAPSHOT_FILE).exists(), "still referenced by guard_b");
        drop(guard_b);
        assert!(!checkpoint_dir.path().join(SNAPSHOT_FILE).exists());
    }

    #[test]
    fn receive_and_install_restores_follower_state() {
        let leader_wal = tempdir().unwrap();
        let leader = PartitionEngine::open(PartitionId(0), TableSchema::simple(), Limits::default(), leader_wal.path()).unwrap();
        leader.set(&["k"], b"v").unwrap();

        let registry = Arc::new(CheckpointRegistry::new());
        let checkpoint_dir = tempdir().unwrap();
        let guard = registry.checkout(&leader, checkpoint_dir.path(), "v1").unwrap();

        let follower_wal = tempdir().unwrap();
        let follower = PartitionEngine::open(PartitionId(0), TableSchema::simple(), Limits::default(), follower_wal.path()).unwrap();
        let temp_dir = tempdir().unwrap();
        let temp = temp_dir.path().join("incoming.sst");
        let base_version = receive_and_install(&follower, checkpoint_dir.path(), &temp).unwrap();

        assert_eq!(base_version, "v1");
        assert_eq!(follower.get(&["k"]).unwrap(), Some(b"v".to_vec()));
        drop(guard);
    }
}
