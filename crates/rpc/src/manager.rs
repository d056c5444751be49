//! Replicator Manager (§4.4): the per-node registry that maps a db hash to
//! the locally-hosted [`ReplicationDb`], so the `tonic` service handler can
//! find the right partition without threading routing state through every
//! RPC call.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use laser_core::error::{Error, Result};
use laser_core::hash::DbHash;
use laser_replication::ReplicationDb;
use parking_lot::RwLock;

/// Holds weak references so a torn-down partition disappears from the
/// registry the moment its last strong `Arc` drops, instead of needing an
/// explicit `unregister` on every teardown path (§4.4 Concurrency).
#[derive(Default)]
pub struct ReplicatorManager {
    dbs: RwLock<HashMap<i64, Weak<ReplicationDb>>>,
}

impl ReplicatorManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        ReplicatorManager::default()
    }

    /// Register a locally-hosted partition under its db hash.
    pub fn register(&self, db: &Arc<ReplicationDb>) {
        self.dbs.write().insert(db.db_hash().0, Arc::downgrade(db));
    }

    /// Drop a partition's registration, e.g. after it's torn down.
    pub fn unregister(&self, db_hash: DbHash) {
        self.dbs.write().remove(&db_hash.0);
    }

    /// Resolve a db hash to its live [`ReplicationDb`], or
    /// [`Error::SourceNotFound`] if it was never registered or has since
    /// been torn down.
    pub fn lookup(&self, db_hash: i64) -> Result<Arc<ReplicationDb>> {
        self.dbs
            .read()
            .get(&db_hash)
            .and_then(Weak::upgrade)
            .ok_or(Error::SourceNotFound)
    }

    /// db hashes of every partition currently registered on this node,
    /// regardless of role, for control-plane publication (§4.4).
    pub fn registered_db_hashes(&self) -> Vec<i64> {
        let mut dbs = self.dbs.write();
        dbs.retain(|_, weak| weak.strong_count() > 0);
        dbs.keys().copied().collect()
    }
}
