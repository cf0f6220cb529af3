//! Resource Manager
//!
//! The one shared entry point the routing layer calls. Every write goes to the
//! provider first and is then patched into the hierarchy cache; if a patch
//! finds the cache disagreeing with the provider, the affected folder is sent
//! back to Empty so the next read re-fetches it.

pub mod faculty;
pub mod queries;

pub use faculty::FacultyEntry;
pub use queries::{FacultyMember, RatedFile, SubjectFiles};

use crate::cache::{HierarchyCache, Patch};
use crate::concurrency::FolderLockManager;
use crate::config::{CollectionRoots, PortalConfig};
use crate::error::{ResourceError, StartupError, StorageError};
use crate::storage::{ByteStream, FileContent, FileUpload, PutMode, StorageAdapter};
use crate::tree::Node;
use crate::types::{CollectionRoot, Identity, NodeId};
use crate::votes::{VoteLedger, VoteOp, VoteStore};
use futures::StreamExt;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

const MAX_NAME_LEN: usize = 255;

/// Facade over the storage adapter, hierarchy cache and vote ledger
pub struct ResourceManager {
    storage: Arc<dyn StorageAdapter>,
    cache: HierarchyCache,
    votes: VoteLedger,
    locks: FolderLockManager,
    deadline: Duration,
}

impl ResourceManager {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        roots: CollectionRoots,
        vote_store: Arc<dyn VoteStore>,
        deadline: Duration,
    ) -> Result<Self, ResourceError> {
        roots.validate()?;
        Ok(Self {
            cache: HierarchyCache::new(storage.clone(), roots, deadline),
            storage,
            votes: VoteLedger::new(vote_store),
            locks: FolderLockManager::new(),
            deadline,
        })
    }

    /// Build the process-wide instance from configuration
    pub fn from_config(
        storage: Arc<dyn StorageAdapter>,
        config: &PortalConfig,
    ) -> Result<Arc<Self>, StartupError> {
        let store = config.votes.open_store()?;
        let manager = Self::new(
            storage,
            config.collections.clone(),
            store,
            config.storage.timeout(),
        )?;
        info!(
            timeout_ms = config.storage.timeout_ms,
            vote_backend = ?config.votes.backend,
            "Resource manager ready"
        );
        Ok(Arc::new(manager))
    }

    pub fn cache(&self) -> &HierarchyCache {
        &self.cache
    }

    pub fn votes(&self) -> &VoteLedger {
        &self.votes
    }

    /// Run one adapter call under the deadline. Writes are never retried.
    async fn call<T, F>(&self, action: &str, fut: F) -> Result<T, ResourceError>
    where
        F: Future<Output = Result<T, StorageError>>,
    {
        match tokio::time::timeout(self.deadline, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                let err = ResourceError::from(err);
                debug!(action, error = %err, "Adapter call failed");
                Err(err)
            }
            Err(_) => {
                warn!(action, deadline = ?self.deadline, "Adapter call timed out");
                Err(ResourceError::ProviderUnavailable(format!(
                    "{} timed out after {:?}",
                    action, self.deadline
                )))
            }
        }
    }

    /// Absorb a patch outcome. The provider already confirmed the write, so an
    /// inconsistent cache is repaired here and never reported to the caller.
    fn reconcile(&self, folder: &NodeId, outcome: Result<Patch, ResourceError>) {
        match outcome {
            Ok(Patch::Applied) => {}
            Ok(patch) => debug!(folder = %folder, ?patch, "Write not patched into cache"),
            Err(err) => {
                warn!(folder = %folder, error = %err, "Cache disagreed with provider; invalidating folder");
                self.cache.invalidate(folder);
            }
        }
    }

    fn is_root(&self, id: &NodeId) -> bool {
        CollectionRoot::ALL
            .into_iter()
            .any(|root| self.cache.root_id(root) == id)
    }

    /// Ids this process deleted can never be addressed again
    fn ensure_live(&self, id: &NodeId) -> Result<(), ResourceError> {
        if self.cache.is_deleted(id) {
            return Err(ResourceError::NotFound(format!("{} was deleted", id)));
        }
        Ok(())
    }

    /// Folder whose children a mutation of `id` changes; the node itself when
    /// its parent is not cached
    fn scope_of(&self, id: &NodeId) -> NodeId {
        self.parent_of(id).unwrap_or_else(|| id.clone())
    }

    fn parent_of(&self, id: &NodeId) -> Option<NodeId> {
        self.cache.lookup(id).and_then(|n| n.parent_id)
    }

    fn ensure_no_cached_sibling(
        &self,
        parent: &NodeId,
        name: &str,
        except: Option<&NodeId>,
    ) -> Result<(), ResourceError> {
        match self.cache.cached_child(parent, name) {
            Some(existing) if Some(&existing.id) != except => Err(ResourceError::Conflict(
                format!("'{}' already exists in {}", name, parent),
            )),
            _ => Ok(()),
        }
    }

    /// Create a folder (a semester, subject or category) under `parent_id`
    pub async fn add_subject_folder(
        &self,
        parent_id: &NodeId,
        name: &str,
    ) -> Result<Node, ResourceError> {
        validate_name(name)?;
        self.ensure_live(parent_id)?;
        let _guard = self.locks.lock(parent_id).await;
        self.ensure_no_cached_sibling(parent_id, name, None)?;

        let node = self
            .call("create_folder", self.storage.create_folder(parent_id, name))
            .await?;
        self.reconcile(parent_id, self.cache.apply_create(parent_id, node.clone()));
        info!(parent = %parent_id, folder = %node.id, name, "Folder created");
        Ok(node)
    }

    pub async fn rename_node(&self, node_id: &NodeId, new_name: &str) -> Result<Node, ResourceError> {
        validate_name(new_name)?;
        if self.is_root(node_id) {
            return Err(ResourceError::InvalidInput(
                "collection roots cannot be renamed".to_string(),
            ));
        }
        self.ensure_live(node_id)?;
        let parent = self.parent_of(node_id);
        let scope = parent.clone().unwrap_or_else(|| node_id.clone());
        let _guard = self.locks.lock(&scope).await;
        if let Some(parent) = &parent {
            self.ensure_no_cached_sibling(parent, new_name, Some(node_id))?;
        }

        let node = self
            .call("rename", self.storage.rename(node_id, new_name))
            .await?;
        self.reconcile(&scope, self.cache.apply_rename(node_id, &node.name));
        info!(node = %node_id, name = %node.name, "Node renamed");
        Ok(node)
    }

    /// Delete a node and, for folders, everything beneath it.
    ///
    /// Votes on every removed file the cache knew about are dropped too.
    pub async fn delete_node(&self, node_id: &NodeId) -> Result<(), ResourceError> {
        if self.is_root(node_id) {
            return Err(ResourceError::InvalidInput(
                "collection roots cannot be deleted".to_string(),
            ));
        }
        self.ensure_live(node_id)?;
        let scope = self.scope_of(node_id);
        let _guard = self.locks.lock(&scope).await;

        let outcome = self.call("delete", self.storage.delete(node_id)).await;
        // a node already gone upstream is still dropped from the cache
        if matches!(&outcome, Err(err) if !matches!(err, ResourceError::NotFound(_))) {
            return outcome;
        }
        let removed = self.cache.apply_delete(node_id);
        for id in &removed {
            if let Err(err) = self.votes.forget(id) {
                warn!(node = %id, error = %err, "Failed to drop votes of deleted node");
            }
        }
        self.locks.forget(&removed);
        info!(node = %node_id, removed = removed.len(), "Node deleted");
        outcome
    }

    /// Stream a new file into `parent_id`. Fails with `Conflict` if the name is taken.
    pub async fn upload_file(
        &self,
        parent_id: &NodeId,
        name: &str,
        stream: ByteStream,
        mime_type: &str,
        uploaded_by: Option<Identity>,
    ) -> Result<Node, ResourceError> {
        self.put(FileUpload {
            parent_id: parent_id.clone(),
            name: name.to_string(),
            content: FileContent {
                stream,
                mime_type: mime_type.to_string(),
            },
            uploaded_by,
            properties: BTreeMap::new(),
            mode: PutMode::Create,
        })
        .await
    }

    /// Upload a timetable, replacing any timetable with the same name
    pub async fn upload_timetable(
        &self,
        name: &str,
        stream: ByteStream,
        mime_type: &str,
        uploaded_by: Option<Identity>,
    ) -> Result<Node, ResourceError> {
        self.put(FileUpload {
            parent_id: self.cache.root_id(CollectionRoot::Timetables).clone(),
            name: name.to_string(),
            content: FileContent {
                stream,
                mime_type: mime_type.to_string(),
            },
            uploaded_by,
            properties: BTreeMap::new(),
            mode: PutMode::Upsert,
        })
        .await
    }

    /// Add a faculty member: their photo becomes a file in the Faculty Directory
    /// carrying the entry's fields as properties
    pub async fn add_faculty_entry(
        &self,
        entry: &FacultyEntry,
        photo: ByteStream,
        mime_type: &str,
        uploaded_by: Option<Identity>,
    ) -> Result<Node, ResourceError> {
        entry.validate()?;
        faculty::validate_photo_mime(mime_type)?;
        self.put(FileUpload {
            parent_id: self.cache.root_id(CollectionRoot::FacultyDirectory).clone(),
            name: entry.name.trim().to_string(),
            content: FileContent {
                stream: photo,
                mime_type: mime_type.to_string(),
            },
            uploaded_by,
            properties: entry.to_properties(),
            mode: PutMode::Create,
        })
        .await
    }

    /// Replace a faculty entry's fields and, optionally, its photo
    pub async fn update_faculty_entry(
        &self,
        file_id: &NodeId,
        entry: &FacultyEntry,
        photo: Option<FileContent>,
    ) -> Result<Node, ResourceError> {
        entry.validate()?;
        if let Some(photo) = &photo {
            faculty::validate_photo_mime(&photo.mime_type)?;
        }
        self.ensure_live(file_id)?;
        if let Some(cached) = self.cache.lookup(file_id) {
            if !cached.is_file()
                || self.cache.collection_of(file_id) != Some(CollectionRoot::FacultyDirectory)
            {
                return Err(ResourceError::InvalidInput(format!(
                    "{} is not a faculty entry",
                    file_id
                )));
            }
        }
        let scope = self.scope_of(file_id);
        let _guard = self.locks.lock(&scope).await;

        let node = self
            .call(
                "update_file",
                self.storage
                    .update_file(file_id, entry.to_properties(), photo),
            )
            .await?;
        self.reconcile(&scope, self.cache.apply_update(node.clone()));
        info!(file = %file_id, "Faculty entry updated");
        Ok(node)
    }

    async fn put(&self, upload: FileUpload) -> Result<Node, ResourceError> {
        validate_name(&upload.name)?;
        self.ensure_live(&upload.parent_id)?;
        let parent = upload.parent_id.clone();
        let mode = upload.mode;
        let _guard = self.locks.lock(&parent).await;
        if mode == PutMode::Create {
            self.ensure_no_cached_sibling(&parent, &upload.name, None)?;
        }

        let node = self.call("put_file", self.storage.put_file(upload)).await?;
        match mode {
            PutMode::Create => {
                self.reconcile(&parent, self.cache.apply_create(&parent, node.clone()));
            }
            PutMode::Upsert => match self.cache.apply_upsert(&parent, node.clone()) {
                Ok((patch, replaced)) => {
                    if let Some(old) = replaced {
                        if let Err(err) = self.votes.forget(&old) {
                            warn!(node = %old, error = %err, "Failed to drop votes of replaced file");
                        }
                    }
                    self.reconcile(&parent, Ok(patch));
                }
                Err(err) => self.reconcile(&parent, Err(err)),
            },
        }
        info!(parent = %parent, file = %node.id, name = %node.name, "File uploaded");
        Ok(node)
    }

    /// Pipe a file's bytes into `sink` chunk by chunk; returns the byte count.
    ///
    /// Nothing is cached. Each chunk must arrive within the adapter deadline.
    pub async fn stream_file_download<W>(
        &self,
        file_id: &NodeId,
        sink: &mut W,
    ) -> Result<u64, ResourceError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        self.ensure_live(file_id)?;
        if let Some(cached) = self.cache.lookup(file_id) {
            if cached.is_folder() {
                return Err(ResourceError::NotFound(format!("{} is a folder", file_id)));
            }
        }
        let mut stream = self
            .call("read_file", self.storage.read_file(file_id))
            .await?;

        let mut written = 0u64;
        loop {
            let next = tokio::time::timeout(self.deadline, stream.next())
                .await
                .map_err(|_| {
                    ResourceError::ProviderUnavailable(format!(
                        "download of {} stalled for {:?}",
                        file_id, self.deadline
                    ))
                })?;
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk.map_err(|e| ResourceError::ProviderUnavailable(e.to_string()))?;
            sink.write_all(&chunk)
                .await
                .map_err(|e| ResourceError::SinkClosed(e.to_string()))?;
            written += chunk.len() as u64;
        }
        sink.flush()
            .await
            .map_err(|e| ResourceError::SinkClosed(e.to_string()))?;
        debug!(file = %file_id, bytes = written, "Download streamed");
        Ok(written)
    }

    /// Administrative escape hatch: drop one collection, or all of them
    pub fn force_invalidate(&self, root: Option<CollectionRoot>) {
        match root {
            Some(root) => self.cache.invalidate_root(root),
            None => self.cache.invalidate_all(),
        }
        info!(root = ?root, "Cache force-invalidated");
    }

    fn vote(&self, file_id: &NodeId, identity: &str, op: VoteOp) -> Result<i64, ResourceError> {
        if identity.trim().is_empty() {
            return Err(ResourceError::InvalidInput("identity is empty".to_string()));
        }
        self.ensure_live(file_id)?;
        if let Some(node) = self.cache.lookup(file_id) {
            if node.is_folder() {
                return Err(ResourceError::InvalidInput(format!(
                    "{} is a folder; only files take votes",
                    file_id
                )));
            }
        }
        self.votes.apply(file_id, identity, op)
    }

    pub fn upvote(&self, file_id: &NodeId, identity: &str) -> Result<i64, ResourceError> {
        self.vote(file_id, identity, VoteOp::Upvote)
    }

    pub fn downvote(&self, file_id: &NodeId, identity: &str) -> Result<i64, ResourceError> {
        self.vote(file_id, identity, VoteOp::Downvote)
    }

    pub fn remove_upvote(&self, file_id: &NodeId, identity: &str) -> Result<i64, ResourceError> {
        self.vote(file_id, identity, VoteOp::RemoveUpvote)
    }

    pub fn remove_downvote(&self, file_id: &NodeId, identity: &str) -> Result<i64, ResourceError> {
        self.vote(file_id, identity, VoteOp::RemoveDownvote)
    }
}

/// Sibling names must be usable as a single provider path segment
pub fn validate_name(name: &str) -> Result<(), ResourceError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ResourceError::InvalidInput("name is empty".to_string()));
    }
    if trimmed != name {
        return Err(ResourceError::InvalidInput(format!(
            "name '{}' has leading or trailing whitespace",
            name
        )));
    }
    if name == "." || name == ".." || name.contains('/') {
        return Err(ResourceError::InvalidInput(format!("invalid name '{}'", name)));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ResourceError::InvalidInput(format!(
            "name longer than {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(())
}
