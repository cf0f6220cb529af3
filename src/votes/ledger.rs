//! Vote Ledger
//!
//! Per-file upvoter/downvoter sets. An identity holds at most one direction per
//! file; voting the other way switches it. Every operation is idempotent and
//! returns the recomputed score.

use crate::error::ResourceError;
use crate::types::{Identity, NodeId};
use crate::votes::store::VoteStore;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Direction of one identity's vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteDirection {
    Up,
    Down,
}

/// Ledger operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOp {
    Upvote,
    Downvote,
    RemoveUpvote,
    RemoveDownvote,
}

/// Voters for one file. The two sets are always disjoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    upvoters: BTreeSet<Identity>,
    downvoters: BTreeSet<Identity>,
}

impl VoteRecord {
    pub fn upvoters(&self) -> &BTreeSet<Identity> {
        &self.upvoters
    }

    pub fn downvoters(&self) -> &BTreeSet<Identity> {
        &self.downvoters
    }

    /// Derived, never stored
    pub fn score(&self) -> i64 {
        self.upvoters.len() as i64 - self.downvoters.len() as i64
    }

    pub fn direction_of(&self, identity: &str) -> Option<VoteDirection> {
        if self.upvoters.contains(identity) {
            Some(VoteDirection::Up)
        } else if self.downvoters.contains(identity) {
            Some(VoteDirection::Down)
        } else {
            None
        }
    }

    pub fn is_empty(&self) -> bool {
        self.upvoters.is_empty() && self.downvoters.is_empty()
    }

    /// Apply an operation; returns whether the record changed
    pub fn apply(&mut self, op: VoteOp, identity: &str) -> bool {
        match op {
            VoteOp::Upvote => {
                let switched = self.downvoters.remove(identity);
                self.upvoters.insert(identity.to_string()) || switched
            }
            VoteOp::Downvote => {
                let switched = self.upvoters.remove(identity);
                self.downvoters.insert(identity.to_string()) || switched
            }
            VoteOp::RemoveUpvote => self.upvoters.remove(identity),
            VoteOp::RemoveDownvote => self.downvoters.remove(identity),
        }
    }
}

/// One file's record. `dropped` is set once the file is forgotten, so a
/// caller still holding the slot cannot write it back.
struct Slot {
    record: VoteRecord,
    dropped: bool,
}

#[derive(Default)]
struct Slots {
    live: HashMap<NodeId, Arc<Mutex<Slot>>>,
    /// Files whose records were dropped; their ids never take votes again
    forgotten: HashSet<NodeId>,
}

/// Process-wide vote ledger.
///
/// Each file's record sits behind its own lock, so concurrent operations on one
/// file apply in sequence while different files never contend.
pub struct VoteLedger {
    slots: RwLock<Slots>,
    store: Arc<dyn VoteStore>,
}

impl VoteLedger {
    pub fn new(store: Arc<dyn VoteStore>) -> Self {
        Self {
            slots: RwLock::new(Slots::default()),
            store,
        }
    }

    /// Get the record slot for a file, loading it from the store on first use.
    /// None once the file has been forgotten.
    fn slot(&self, file_id: &NodeId) -> Result<Option<Arc<Mutex<Slot>>>, ResourceError> {
        {
            let slots = self.slots.read();
            if slots.forgotten.contains(file_id) {
                return Ok(None);
            }
            if let Some(slot) = slots.live.get(file_id) {
                return Ok(Some(slot.clone()));
            }
        }

        // loaded under the write lock so a concurrent forget cannot slip between
        let mut slots = self.slots.write();
        if slots.forgotten.contains(file_id) {
            return Ok(None);
        }
        if let Some(slot) = slots.live.get(file_id) {
            return Ok(Some(slot.clone()));
        }
        let record = self.store.load(file_id)?.unwrap_or_default();
        let slot = Arc::new(Mutex::new(Slot {
            record,
            dropped: false,
        }));
        slots.live.insert(file_id.clone(), slot.clone());
        Ok(Some(slot))
    }

    /// Apply `op` for `identity` on `file_id` and return the new score.
    ///
    /// The store is written before the in-memory record changes, so a failed
    /// write leaves the ledger as it was. Forgotten files fail with `NotFound`.
    pub fn apply(&self, file_id: &NodeId, identity: &str, op: VoteOp) -> Result<i64, ResourceError> {
        let dropped = || ResourceError::NotFound(format!("votes of {} were dropped", file_id));
        let slot = self.slot(file_id)?.ok_or_else(dropped)?;
        let mut entry = slot.lock();
        if entry.dropped {
            return Err(dropped());
        }
        let mut next = entry.record.clone();
        if next.apply(op, identity) {
            self.store.save(file_id, &next)?;
            entry.record = next;
            debug!(
                file_id = %file_id,
                identity = identity,
                op = ?op,
                score = entry.record.score(),
                "Vote recorded"
            );
        }
        Ok(entry.record.score())
    }

    pub fn upvote(&self, file_id: &NodeId, identity: &str) -> Result<i64, ResourceError> {
        self.apply(file_id, identity, VoteOp::Upvote)
    }

    pub fn downvote(&self, file_id: &NodeId, identity: &str) -> Result<i64, ResourceError> {
        self.apply(file_id, identity, VoteOp::Downvote)
    }

    pub fn remove_upvote(&self, file_id: &NodeId, identity: &str) -> Result<i64, ResourceError> {
        self.apply(file_id, identity, VoteOp::RemoveUpvote)
    }

    pub fn remove_downvote(&self, file_id: &NodeId, identity: &str) -> Result<i64, ResourceError> {
        self.apply(file_id, identity, VoteOp::RemoveDownvote)
    }

    /// Snapshot of a file's record (empty if nobody voted or it was forgotten)
    pub fn record(&self, file_id: &NodeId) -> Result<VoteRecord, ResourceError> {
        Ok(match self.slot(file_id)? {
            Some(slot) => slot.lock().record.clone(),
            None => VoteRecord::default(),
        })
    }

    pub fn score(&self, file_id: &NodeId) -> Result<i64, ResourceError> {
        Ok(self.record(file_id)?.score())
    }

    pub fn vote_of(&self, file_id: &NodeId, identity: &str) -> Result<Option<VoteDirection>, ResourceError> {
        Ok(self.record(file_id)?.direction_of(identity))
    }

    /// Drop a deleted file's record from memory and the store.
    ///
    /// An in-flight vote on the file either saves before the slot is marked
    /// dropped, and is then removed with it, or fails with `NotFound`.
    pub fn forget(&self, file_id: &NodeId) -> Result<(), ResourceError> {
        let mut slots = self.slots.write();
        slots.forgotten.insert(file_id.clone());
        if let Some(slot) = slots.live.remove(file_id) {
            slot.lock().dropped = true;
        }
        self.store.remove(file_id)
    }
}
