//! Per-folder write serialization
//!
//! Mutations are keyed by the folder whose cached children they change. Holding
//! the folder's lock across the adapter call and the cache patch means two
//! writers to one folder cannot interleave, while writers to different folders
//! run independently. Reads never take these locks.

use crate::types::NodeId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-folder lock manager for mutating operations
pub struct FolderLockManager {
    /// Map from folder id to its async write lock
    locks: RwLock<HashMap<NodeId, Arc<Mutex<()>>>>,
}

impl FolderLockManager {
    pub fn new() -> Self {
        Self {
            locks: RwLock::new(HashMap::new()),
        }
    }

    /// Get or create the lock for a folder
    fn get_folder_lock(&self, folder_id: &NodeId) -> Arc<Mutex<()>> {
        {
            let map = self.locks.read();
            if let Some(lock) = map.get(folder_id) {
                return lock.clone();
            }
        }

        let mut map = self.locks.write();
        // another task may have created it between the two guards
        map.entry(folder_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Wait for exclusive write access to a folder
    pub async fn lock(&self, folder_id: &NodeId) -> OwnedMutexGuard<()> {
        self.get_folder_lock(folder_id).lock_owned().await
    }

    /// Drop locks for folders that no longer exist and that nobody holds
    pub fn forget(&self, folder_ids: &[NodeId]) {
        let mut map = self.locks.write();
        for id in folder_ids {
            if let Some(lock) = map.get(id) {
                if Arc::strong_count(lock) == 1 {
                    map.remove(id);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.locks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for FolderLockManager {
    fn default() -> Self {
        Self::new()
    }
}
