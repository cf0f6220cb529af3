//! Vote record backing stores

use crate::error::ResourceError;
use crate::types::NodeId;
use crate::votes::ledger::VoteRecord;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;

/// Backing store for vote records, keyed by file id
pub trait VoteStore: Send + Sync {
    fn load(&self, file_id: &NodeId) -> Result<Option<VoteRecord>, ResourceError>;
    fn save(&self, file_id: &NodeId, record: &VoteRecord) -> Result<(), ResourceError>;
    fn remove(&self, file_id: &NodeId) -> Result<(), ResourceError>;
}

/// Process-lifetime store
#[derive(Default)]
pub struct MemoryVoteStore {
    records: Mutex<HashMap<NodeId, VoteRecord>>,
}

impl MemoryVoteStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VoteStore for MemoryVoteStore {
    fn load(&self, file_id: &NodeId) -> Result<Option<VoteRecord>, ResourceError> {
        Ok(self.records.lock().get(file_id).cloned())
    }

    fn save(&self, file_id: &NodeId, record: &VoteRecord) -> Result<(), ResourceError> {
        self.records.lock().insert(file_id.clone(), record.clone());
        Ok(())
    }

    fn remove(&self, file_id: &NodeId) -> Result<(), ResourceError> {
        self.records.lock().remove(file_id);
        Ok(())
    }
}

/// Durable store on sled; records are bincode-encoded
pub struct SledVoteStore {
    tree: sled::Tree,
}

impl SledVoteStore {
    pub fn open(path: &Path) -> Result<Self, ResourceError> {
        let db = sled::open(path)?;
        let tree = db.open_tree("votes")?;
        Ok(Self { tree })
    }

    pub fn flush(&self) -> Result<(), ResourceError> {
        self.tree.flush()?;
        Ok(())
    }
}

impl VoteStore for SledVoteStore {
    fn load(&self, file_id: &NodeId) -> Result<Option<VoteRecord>, ResourceError> {
        match self.tree.get(file_id.as_str().as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    fn save(&self, file_id: &NodeId, record: &VoteRecord) -> Result<(), ResourceError> {
        if record.is_empty() {
            self.tree.remove(file_id.as_str().as_bytes())?;
        } else {
            let bytes = bincode::serialize(record)?;
            self.tree.insert(file_id.as_str().as_bytes(), bytes)?;
        }
        Ok(())
    }

    fn remove(&self, file_id: &NodeId) -> Result<(), ResourceError> {
        self.tree.remove(file_id.as_str().as_bytes())?;
        Ok(())
    }
}
