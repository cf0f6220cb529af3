//! Hierarchy Cache
//!
//! In-memory mirror of the provider's folder tree for the four collection roots.
//! Folders are populated lazily, one provider listing per folder no matter how
//! many callers ask at once, and are kept current by in-place patches applied
//! after each successful write. There is no time-based expiry.

use crate::cache::state::{FetchResult, FolderState, Freshness, Patch, SharedFetch};
use crate::config::CollectionRoots;
use crate::error::{ResourceError, StorageError};
use crate::storage::StorageAdapter;
use crate::tree::{Node, NodeArena};
use crate::types::{CollectionRoot, NodeId};
use futures::FutureExt;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Longest chain of uncached ancestors walked when reattaching a folder
const MAX_ATTACH_DEPTH: usize = 64;

/// Run one provider call under the deadline
async fn bounded<T, F>(deadline: Duration, what: impl Display, fut: F) -> Result<T, ResourceError>
where
    F: Future<Output = Result<T, StorageError>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result.map_err(ResourceError::from),
        Err(_) => Err(ResourceError::ProviderUnavailable(format!(
            "{} timed out after {:?}",
            what, deadline
        ))),
    }
}

/// Shared mutable cache contents, guarded by one lock
struct CacheState {
    arena: NodeArena,
    folders: HashMap<NodeId, FolderState>,
    /// Ids removed by this process; never valid again
    deleted: HashSet<NodeId>,
    next_epoch: u64,
}

impl CacheState {
    fn folder_state(&self, id: &NodeId) -> &FolderState {
        self.folders.get(id).unwrap_or(&FolderState::Empty)
    }

    fn is_current(&self, folder: &NodeId, epoch: u64) -> bool {
        matches!(self.folders.get(folder), Some(FolderState::Loading { epoch: e, .. }) if *e == epoch)
    }

    /// Check that `folder` is a cached folder inside the tree rooted at `root`
    fn ensure_folder_within(&self, root: &NodeId, folder: &NodeId) -> Result<(), ResourceError> {
        let node = self
            .arena
            .get(folder)
            .ok_or_else(|| ResourceError::NotFound(format!("folder {}", folder)))?;
        if !node.is_folder() {
            return Err(ResourceError::NotFound(format!("{} is not a folder", folder)));
        }
        let mut cursor = Some(folder.clone());
        while let Some(id) = cursor {
            if &id == root {
                return Ok(());
            }
            cursor = self.arena.get(&id).and_then(|n| n.parent_id.clone());
        }
        Err(ResourceError::NotFound(format!(
            "folder {} is outside collection {}",
            folder, root
        )))
    }

    /// Insert a node the provider just created under `parent_id`
    fn create(&mut self, parent_id: &NodeId, node: Node) -> Result<Patch, ResourceError> {
        if self.deleted.contains(&node.id) {
            return Err(ResourceError::InconsistentCache(format!(
                "provider reused deleted id {}",
                node.id
            )));
        }
        if !self.arena.contains(parent_id) {
            return Ok(Patch::NotCached);
        }
        match self.folder_state(parent_id) {
            FolderState::Empty => Ok(Patch::NotCached),
            FolderState::Loading { .. } => {
                self.reset_folder(parent_id);
                Ok(Patch::Invalidated)
            }
            FolderState::Fresh => {
                let id = node.id.clone();
                let is_folder = node.is_folder();
                self.arena
                    .insert_child(parent_id, node)
                    .map_err(ResourceError::InconsistentCache)?;
                if is_folder {
                    // created by us, so known to be empty
                    self.folders.insert(id.clone(), FolderState::Fresh);
                }
                debug!(parent = %parent_id, node = %id, "Patched create into cache");
                Ok(Patch::Applied)
            }
        }
    }

    /// Drop every cached descendant of `folder` along with their folder states
    fn drop_descendants(&mut self, folder: &NodeId) -> Vec<NodeId> {
        let removed = self.arena.remove_descendants(folder);
        for id in &removed {
            self.folders.remove(id);
        }
        removed
    }

    /// Send a folder back to Empty, superseding any in-flight listing
    fn reset_folder(&mut self, folder: &NodeId) -> Vec<NodeId> {
        let removed = self.drop_descendants(folder);
        self.folders.insert(folder.clone(), FolderState::Empty);
        removed
    }

    /// Install the result of a provider listing
    fn finish_fetch(
        &mut self,
        folder: &NodeId,
        epoch: u64,
        result: Result<Vec<Node>, ResourceError>,
    ) -> FetchResult {
        let current = self.is_current(folder, epoch);
        match result {
            Ok(listed) => {
                if !current {
                    debug!(folder = %folder, epoch, "Discarding superseded listing");
                    return Ok(Arc::new(listed));
                }
                let listed: Vec<Node> = listed
                    .into_iter()
                    .filter(|n| !self.deleted.contains(&n.id))
                    .collect();
                self.drop_descendants(folder);
                let skipped = self.arena.replace_children(folder, listed);
                if !skipped.is_empty() {
                    warn!(
                        folder = %folder,
                        skipped = skipped.len(),
                        "Provider listing repeated ids or sibling names; duplicates were not cached"
                    );
                }
                self.folders.insert(folder.clone(), FolderState::Fresh);
                let children = self.arena.children_of(folder);
                debug!(folder = %folder, children = children.len(), "Folder populated");
                Ok(Arc::new(children))
            }
            Err(err) => {
                if current {
                    self.folders.insert(folder.clone(), FolderState::Empty);
                    if let ResourceError::NotFound(_) = err {
                        let is_root = self
                            .arena
                            .get(folder)
                            .map(|n| n.parent_id.is_none())
                            .unwrap_or(true);
                        if !is_root {
                            let removed = self.arena.remove_subtree(folder);
                            for id in &removed {
                                self.folders.remove(id);
                            }
                            info!(folder = %folder, removed = removed.len(), "Folder vanished upstream; dropped from cache");
                        }
                    }
                }
                warn!(folder = %folder, error = %err, "Folder listing failed");
                Err(err)
            }
        }
    }
}

/// Process-wide mirror of the provider hierarchy
pub struct HierarchyCache {
    storage: Arc<dyn StorageAdapter>,
    roots: CollectionRoots,
    deadline: Duration,
    state: Arc<RwLock<CacheState>>,
}

impl HierarchyCache {
    pub fn new(storage: Arc<dyn StorageAdapter>, roots: CollectionRoots, deadline: Duration) -> Self {
        let mut arena = NodeArena::new();
        for root in CollectionRoot::ALL {
            arena.insert_root(Node::folder(
                roots.get(root).clone(),
                root.display_name(),
                None,
            ));
        }
        Self {
            storage,
            roots,
            deadline,
            state: Arc::new(RwLock::new(CacheState {
                arena,
                folders: HashMap::new(),
                deleted: HashSet::new(),
                next_epoch: 0,
            })),
        }
    }

    pub fn root_id(&self, root: CollectionRoot) -> &NodeId {
        self.roots.get(root)
    }

    /// Children of a folder, fetching them from the provider on a miss.
    ///
    /// Concurrent misses on one folder share a single provider listing and all
    /// receive its outcome. A failed listing leaves the folder Empty. A folder
    /// id the cache does not hold is reattached through its upstream ancestry.
    pub async fn get_children(
        &self,
        root: CollectionRoot,
        folder_id: &NodeId,
    ) -> Result<Vec<Node>, ResourceError> {
        {
            let state = self.state.read();
            if let FolderState::Fresh = state.folder_state(folder_id) {
                state.ensure_folder_within(self.root_id(root), folder_id)?;
                trace!(folder = %folder_id, "Cache hit");
                return Ok(state.arena.children_of(folder_id));
            }
        }
        self.attach(root, folder_id).await?;
        self.load_children(root, folder_id).await
    }

    /// Children of a folder already in the arena, listing it on a miss
    async fn load_children(
        &self,
        root: CollectionRoot,
        folder_id: &NodeId,
    ) -> Result<Vec<Node>, ResourceError> {
        let fetch = {
            let mut state = self.state.write();
            state.ensure_folder_within(self.root_id(root), folder_id)?;
            match state.folder_state(folder_id).clone() {
                // populated between the two guards
                FolderState::Fresh => return Ok(state.arena.children_of(folder_id)),
                FolderState::Loading { fetch, .. } => {
                    trace!(folder = %folder_id, "Joining in-flight listing");
                    fetch
                }
                FolderState::Empty => self.start_fetch(&mut state, folder_id),
            }
        };
        let children = fetch.await?;
        Ok(children.as_ref().clone())
    }

    /// Make an uncached folder id addressable again.
    ///
    /// Walks parent links upstream until a cached ancestor is found, then lists
    /// each level back down so the folder rejoins the cached tree. Fails with
    /// `NotFound` when the provider no longer has the folder or it hangs off no
    /// collection root.
    async fn attach(&self, root: CollectionRoot, folder_id: &NodeId) -> Result<(), ResourceError> {
        let mut missing: Vec<NodeId> = Vec::new();
        let mut cursor = folder_id.clone();
        loop {
            {
                let state = self.state.read();
                if state.arena.contains(&cursor) {
                    break;
                }
                if state.deleted.contains(&cursor) {
                    return Err(ResourceError::NotFound(format!("{} was deleted", cursor)));
                }
            }
            if missing.len() >= MAX_ATTACH_DEPTH || missing.contains(&cursor) {
                return Err(ResourceError::NotFound(format!(
                    "folder {} has no reachable collection root",
                    folder_id
                )));
            }
            let node = bounded(
                self.deadline,
                format!("lookup of {}", cursor),
                self.storage.get_node(&cursor),
            )
            .await?;
            let Some(parent) = node.parent_id else {
                return Err(ResourceError::NotFound(format!(
                    "folder {} is outside every collection",
                    folder_id
                )));
            };
            missing.push(cursor);
            cursor = parent;
        }
        if missing.is_empty() {
            return Ok(());
        }

        debug!(folder = %folder_id, levels = missing.len(), "Reattaching folder to cached tree");
        let mut parent = cursor;
        for id in missing.into_iter().rev() {
            let mut children = self.load_children(root, &parent).await?;
            if !children.iter().any(|n| n.id == id) {
                // listed before the node appeared upstream
                self.invalidate(&parent);
                children = self.load_children(root, &parent).await?;
                if !children.iter().any(|n| n.id == id) {
                    return Err(ResourceError::NotFound(format!("folder {}", id)));
                }
            }
            parent = id;
        }
        Ok(())
    }

    fn start_fetch(&self, state: &mut CacheState, folder_id: &NodeId) -> SharedFetch {
        let epoch = state.next_epoch;
        state.next_epoch += 1;

        let storage = self.storage.clone();
        let shared_state: Weak<RwLock<CacheState>> = Arc::downgrade(&self.state);
        let deadline = self.deadline;
        let folder = folder_id.clone();

        let fetch = async move {
            debug!(folder = %folder, epoch, "Listing folder from provider");
            let result = bounded(
                deadline,
                format!("listing {}", folder),
                storage.list_children(&folder),
            )
            .await;
            match shared_state.upgrade() {
                Some(state) => state.write().finish_fetch(&folder, epoch, result),
                None => result.map(Arc::new),
            }
        }
        .boxed()
        .shared();

        state.folders.insert(
            folder_id.clone(),
            FolderState::Loading {
                epoch,
                fetch: fetch.clone(),
            },
        );
        fetch
    }

    /// Walk `segments` down from a collection root, listing folders as needed
    pub async fn resolve_path<S: AsRef<str>>(
        &self,
        root: CollectionRoot,
        segments: &[S],
    ) -> Result<Node, ResourceError> {
        let mut current = self
            .lookup(self.root_id(root))
            .ok_or_else(|| ResourceError::NotFound(format!("collection {}", root)))?;
        for segment in segments {
            let segment = segment.as_ref();
            let children = self.get_children(root, &current.id).await?;
            current = children
                .into_iter()
                .find(|n| n.name == segment)
                .ok_or_else(|| {
                    ResourceError::NotFound(format!("'{}' under '{}'", segment, current.name))
                })?;
        }
        Ok(current)
    }

    /// Patch in a node the provider just created under `parent_id`
    pub fn apply_create(&self, parent_id: &NodeId, node: Node) -> Result<Patch, ResourceError> {
        self.state.write().create(parent_id, node)
    }

    /// Patch in a file that replaced any same-named sibling upstream.
    /// Returns the patch outcome and the id of the replaced sibling, if cached.
    ///
    /// Removal and insert happen under one guard, so readers see either the
    /// old file or the new one.
    pub fn apply_upsert(
        &self,
        parent_id: &NodeId,
        node: Node,
    ) -> Result<(Patch, Option<NodeId>), ResourceError> {
        let mut state = self.state.write();
        let fresh = matches!(state.folder_state(parent_id), FolderState::Fresh);
        let replaced = match state.arena.child_named(parent_id, &node.name) {
            Some(existing) if fresh && existing.id != node.id => {
                let existing = existing.id.clone();
                for id in state.arena.remove_subtree(&existing) {
                    state.folders.remove(&id);
                    state.deleted.insert(id);
                }
                Some(existing)
            }
            _ => None,
        };
        let patch = state.create(parent_id, node)?;
        Ok((patch, replaced))
    }

    /// Patch a rename the provider just confirmed
    pub fn apply_rename(&self, node_id: &NodeId, new_name: &str) -> Result<Patch, ResourceError> {
        let mut state = self.state.write();
        let Some(parent) = state.arena.get(node_id).map(|n| n.parent_id.clone()) else {
            return Ok(Patch::NotCached);
        };
        if let Some(parent) = &parent {
            if let FolderState::Loading { .. } = state.folder_state(parent) {
                state.reset_folder(parent);
                return Ok(Patch::Invalidated);
            }
        }
        state
            .arena
            .rename(node_id, new_name)
            .map_err(ResourceError::InconsistentCache)?;
        debug!(node = %node_id, name = new_name, "Patched rename into cache");
        Ok(Patch::Applied)
    }

    /// Replace a cached node's metadata with the provider's updated record
    pub fn apply_update(&self, node: Node) -> Result<Patch, ResourceError> {
        let mut state = self.state.write();
        let Some(cached) = state.arena.get(&node.id) else {
            return Ok(Patch::NotCached);
        };
        if cached.name != node.name {
            return Err(ResourceError::InconsistentCache(format!(
                "node {} changed name during a metadata update",
                node.id
            )));
        }
        let id = node.id.clone();
        state
            .arena
            .replace(node)
            .map_err(ResourceError::InconsistentCache)?;
        debug!(node = %id, "Patched metadata into cache");
        Ok(Patch::Applied)
    }

    /// Remove a deleted node and its whole cached subtree.
    /// Returns every removed id, `node_id` included.
    pub fn apply_delete(&self, node_id: &NodeId) -> Vec<NodeId> {
        let mut state = self.state.write();
        let parent = state.arena.get(node_id).and_then(|n| n.parent_id.clone());
        let mut removed = state.arena.remove_subtree(node_id);
        if removed.is_empty() {
            removed.push(node_id.clone());
        }
        for id in &removed {
            state.folders.remove(id);
            state.deleted.insert(id.clone());
        }
        if let Some(parent) = parent {
            if let FolderState::Loading { .. } = state.folder_state(&parent) {
                state.reset_folder(&parent);
            }
        }
        debug!(node = %node_id, removed = removed.len(), "Patched delete into cache");
        removed
    }

    /// Force a folder back to Empty, dropping its cached descendants.
    /// Returns false when the folder is not cached.
    pub fn invalidate(&self, folder_id: &NodeId) -> bool {
        let mut state = self.state.write();
        match state.arena.get(folder_id) {
            Some(node) if node.is_folder() => {
                let dropped = state.reset_folder(folder_id);
                info!(folder = %folder_id, dropped = dropped.len(), "Folder invalidated");
                true
            }
            _ => false,
        }
    }

    pub fn invalidate_root(&self, root: CollectionRoot) {
        let id = self.root_id(root).clone();
        self.invalidate(&id);
    }

    pub fn invalidate_all(&self) {
        for root in CollectionRoot::ALL {
            self.invalidate_root(root);
        }
    }

    /// Cached child of `parent` with this name, if `parent` is Fresh
    pub fn cached_child(&self, parent: &NodeId, name: &str) -> Option<Node> {
        let state = self.state.read();
        match state.folder_state(parent) {
            FolderState::Fresh => state.arena.child_named(parent, name).cloned(),
            _ => None,
        }
    }

    /// Cached record for a node; never contacts the provider
    pub fn lookup(&self, node_id: &NodeId) -> Option<Node> {
        self.state.read().arena.get(node_id).cloned()
    }

    pub fn freshness(&self, folder_id: &NodeId) -> Freshness {
        self.state.read().folder_state(folder_id).freshness()
    }

    pub fn is_deleted(&self, node_id: &NodeId) -> bool {
        self.state.read().deleted.contains(node_id)
    }

    /// Collection root that a cached node belongs to
    pub fn collection_of(&self, node_id: &NodeId) -> Option<CollectionRoot> {
        let state = self.state.read();
        let mut cursor = state.arena.get(node_id)?.clone();
        while let Some(parent) = cursor.parent_id.clone() {
            cursor = state.arena.get(&parent)?.clone();
        }
        CollectionRoot::ALL
            .into_iter()
            .find(|root| self.root_id(*root) == &cursor.id)
    }

    /// Number of cached nodes, roots included
    pub fn len(&self) -> usize {
        self.state.read().arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids whose parent is missing from the cache; empty while the tree is connected
    pub fn orphans(&self) -> Vec<NodeId> {
        self.state.read().arena.orphans()
    }
}
