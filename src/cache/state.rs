//! Per-folder freshness state

use crate::error::ResourceError;
use crate::tree::Node;
use futures::future::{BoxFuture, Shared};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Outcome of one provider listing, shared by every waiter
pub(crate) type FetchResult = Result<Arc<Vec<Node>>, ResourceError>;

/// In-flight listing that concurrent callers await together
pub(crate) type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

#[derive(Clone)]
pub(crate) enum FolderState {
    Empty,
    /// `epoch` identifies this particular fetch. A fetch whose epoch no longer
    /// matches when it lands was superseded and must not be installed.
    Loading {
        epoch: u64,
        fetch: SharedFetch,
    },
    Fresh,
}

impl FolderState {
    pub(crate) fn freshness(&self) -> Freshness {
        match self {
            FolderState::Empty => Freshness::Empty,
            FolderState::Loading { .. } => Freshness::Loading,
            FolderState::Fresh => Freshness::Fresh,
        }
    }
}

/// Observable cache state of one folder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Freshness {
    Empty,
    Loading,
    Fresh,
}

/// What a cache patch did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Patch {
    /// The cached tree now reflects the mutation
    Applied,
    /// Nothing cached was affected; the next read will fetch
    NotCached,
    /// A listing was in flight, so the folder was sent back to Empty
    Invalidated,
}
