//! In-memory storage provider
//!
//! Backs tests and the command-line inspector. Counts calls per operation and
//! supports latency and failure injection so cache behavior can be observed.

use crate::error::StorageError;
use crate::storage::contract::{ByteStream, FileContent, FileUpload, PutMode, StorageAdapter};
use crate::tree::{Node, NodeKind};
use crate::types::NodeId;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use walkdir::WalkDir;

const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Adapter operation, used to count calls and inject failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageOp {
    ListChildren,
    GetNode,
    CreateFolder,
    PutFile,
    ReadFile,
    Rename,
    Delete,
    UpdateFile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Failure {
    Once,
    Always,
}

struct Entry {
    node: Node,
    bytes: Arc<Vec<u8>>,
}

#[derive(Default)]
struct MemoryTree {
    entries: HashMap<NodeId, Entry>,
    children: HashMap<NodeId, Vec<NodeId>>,
}

impl MemoryTree {
    fn folder(&self, id: &NodeId) -> Result<&Node, StorageError> {
        match self.entries.get(id) {
            Some(entry) if entry.node.is_folder() => Ok(&entry.node),
            Some(_) => Err(StorageError::NotFound(format!("{} is not a folder", id))),
            None => Err(StorageError::NotFound(format!("folder {}", id))),
        }
    }

    fn sibling_named(&self, parent: &NodeId, name: &str) -> Option<&Node> {
        self.children.get(parent).and_then(|ids| {
            ids.iter()
                .filter_map(|c| self.entries.get(c))
                .map(|e| &e.node)
                .find(|n| n.name == name)
        })
    }

    fn insert(&mut self, node: Node, bytes: Vec<u8>) {
        let id = node.id.clone();
        if let Some(parent) = &node.parent_id {
            self.children.entry(parent.clone()).or_default().push(id.clone());
        }
        if node.is_folder() {
            self.children.entry(id.clone()).or_default();
        }
        self.entries.insert(
            id,
            Entry {
                node,
                bytes: Arc::new(bytes),
            },
        );
    }

    fn remove(&mut self, id: &NodeId) -> bool {
        let Some(entry) = self.entries.remove(id) else {
            return false;
        };
        if let Some(parent) = &entry.node.parent_id {
            if let Some(siblings) = self.children.get_mut(parent) {
                siblings.retain(|c| c != id);
            }
        }
        let mut stack = self.children.remove(id).unwrap_or_default();
        while let Some(next) = stack.pop() {
            self.entries.remove(&next);
            if let Some(more) = self.children.remove(&next) {
                stack.extend(more);
            }
        }
        true
    }
}

/// In-memory `StorageAdapter` with call accounting
pub struct InMemoryStorage {
    tree: Mutex<MemoryTree>,
    next_id: AtomicU64,
    calls: Mutex<HashMap<StorageOp, usize>>,
    failures: Mutex<HashMap<StorageOp, Failure>>,
    latency: Mutex<Option<Duration>>,
    chunk_size: usize,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::with_chunk_size(DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            tree: Mutex::new(MemoryTree::default()),
            next_id: AtomicU64::new(1),
            calls: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            latency: Mutex::new(None),
            chunk_size: chunk_size.max(1),
        }
    }

    /// Mirror a local directory, serving reads in `chunk_size` pieces. Each
    /// top-level directory becomes a root; returns the root ids keyed by
    /// directory name.
    pub fn from_directory(
        path: &Path,
        chunk_size: usize,
    ) -> Result<(Self, HashMap<String, NodeId>), StorageError> {
        let storage = Self::with_chunk_size(chunk_size);
        let mut roots = HashMap::new();
        let mut ids: HashMap<PathBuf, NodeId> = HashMap::new();

        let walker = WalkDir::new(path)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter();
        for entry in walker {
            let entry = entry.map_err(|e| {
                StorageError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
            })?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            let parent = entry.path().parent().and_then(|p| ids.get(p)).cloned();
            let id = match (entry.depth(), parent, entry.file_type().is_dir()) {
                (1, _, true) => {
                    let id = storage.create_root(&name);
                    roots.insert(name, id.clone());
                    id
                }
                (1, _, false) => continue,
                (_, Some(parent), true) => storage.seed_folder(&parent, &name)?,
                (_, Some(parent), false) => {
                    let bytes = std::fs::read(entry.path())?;
                    storage.seed_file(&parent, &name, bytes, guess_mime(entry.path()))?
                }
                // parent was skipped
                (_, None, _) => continue,
            };
            ids.insert(entry.path().to_path_buf(), id);
        }
        Ok((storage, roots))
    }

    fn allocate_id(&self) -> NodeId {
        NodeId::new(format!("node-{:06}", self.next_id.fetch_add(1, Ordering::SeqCst)))
    }

    /// Create a parentless folder (collection root)
    pub fn create_root(&self, name: &str) -> NodeId {
        let id = self.allocate_id();
        self.tree
            .lock()
            .insert(Node::folder(id.clone(), name, None), Vec::new());
        id
    }

    pub fn seed_folder(&self, parent: &NodeId, name: &str) -> Result<NodeId, StorageError> {
        let mut tree = self.tree.lock();
        tree.folder(parent)?;
        if tree.sibling_named(parent, name).is_some() {
            return Err(StorageError::Conflict(name.to_string()));
        }
        let id = self.allocate_id();
        tree.insert(
            Node::folder(id.clone(), name, Some(parent.clone())),
            Vec::new(),
        );
        Ok(id)
    }

    pub fn seed_file(
        &self,
        parent: &NodeId,
        name: &str,
        bytes: Vec<u8>,
        mime_type: &str,
    ) -> Result<NodeId, StorageError> {
        let mut tree = self.tree.lock();
        tree.folder(parent)?;
        if tree.sibling_named(parent, name).is_some() {
            return Err(StorageError::Conflict(name.to_string()));
        }
        let id = self.allocate_id();
        tree.insert(
            Node::file(id.clone(), name, parent.clone(), mime_type, None),
            bytes,
        );
        Ok(id)
    }

    /// Number of calls made for an operation
    pub fn calls(&self, op: StorageOp) -> usize {
        self.calls.lock().get(&op).copied().unwrap_or(0)
    }

    /// Fail the next call of `op` with `Unavailable`
    pub fn fail_next(&self, op: StorageOp) {
        self.failures.lock().insert(op, Failure::Once);
    }

    /// Fail every call of `op` until cleared
    pub fn set_failing(&self, op: StorageOp, failing: bool) {
        let mut failures = self.failures.lock();
        if failing {
            failures.insert(op, Failure::Always);
        } else {
            failures.remove(&op);
        }
    }

    /// Delay every call by `latency`
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.tree.lock().entries.contains_key(id)
    }

    pub fn node(&self, id: &NodeId) -> Option<Node> {
        self.tree.lock().entries.get(id).map(|e| e.node.clone())
    }

    pub fn file_bytes(&self, id: &NodeId) -> Option<Vec<u8>> {
        self.tree
            .lock()
            .entries
            .get(id)
            .map(|e| e.bytes.as_ref().clone())
    }

    /// Record the call, wait out injected latency, then apply injected failures
    async fn enter(&self, op: StorageOp) -> Result<(), StorageError> {
        *self.calls.lock().entry(op).or_insert(0) += 1;
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let mut failures = self.failures.lock();
        match failures.get(&op).copied() {
            Some(Failure::Once) => {
                failures.remove(&op);
                Err(StorageError::Unavailable(format!("injected failure on {:?}", op)))
            }
            Some(Failure::Always) => Err(StorageError::Unavailable(format!(
                "injected failure on {:?}",
                op
            ))),
            None => Ok(()),
        }
    }
}

async fn drain(mut stream: ByteStream) -> Result<Vec<u8>, StorageError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = stream.next().await {
        bytes.extend_from_slice(&chunk?);
    }
    Ok(bytes)
}

fn guess_mime(path: &Path) -> &'static str {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or("application/octet-stream")
}

#[async_trait]
impl StorageAdapter for InMemoryStorage {
    async fn list_children(&self, folder_id: &NodeId) -> Result<Vec<Node>, StorageError> {
        self.enter(StorageOp::ListChildren).await?;
        let tree = self.tree.lock();
        tree.folder(folder_id)?;
        Ok(tree
            .children
            .get(folder_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|c| tree.entries.get(c))
                    .map(|e| e.node.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_node(&self, node_id: &NodeId) -> Result<Node, StorageError> {
        self.enter(StorageOp::GetNode).await?;
        self.node(node_id)
            .ok_or_else(|| StorageError::NotFound(format!("node {}", node_id)))
    }

    async fn create_folder(&self, parent_id: &NodeId, name: &str) -> Result<Node, StorageError> {
        self.enter(StorageOp::CreateFolder).await?;
        let mut tree = self.tree.lock();
        tree.folder(parent_id)?;
        if tree.sibling_named(parent_id, name).is_some() {
            return Err(StorageError::Conflict(format!(
                "'{}' already exists in {}",
                name, parent_id
            )));
        }
        let node = Node::folder(self.allocate_id(), name, Some(parent_id.clone()));
        tree.insert(node.clone(), Vec::new());
        Ok(node)
    }

    async fn put_file(&self, upload: FileUpload) -> Result<Node, StorageError> {
        self.enter(StorageOp::PutFile).await?;
        let check = |tree: &MemoryTree| -> Result<Option<NodeId>, StorageError> {
            tree.folder(&upload.parent_id)?;
            match tree.sibling_named(&upload.parent_id, &upload.name) {
                None => Ok(None),
                Some(existing) if upload.mode == PutMode::Upsert && existing.is_file() => {
                    Ok(Some(existing.id.clone()))
                }
                Some(_) => Err(StorageError::Conflict(format!(
                    "'{}' already exists in {}",
                    upload.name, upload.parent_id
                ))),
            }
        };
        check(&self.tree.lock())?;

        let bytes = drain(upload.content.stream).await?;

        let mut tree = self.tree.lock();
        // the tree may have changed while the stream was draining
        if let Some(replaced) = check(&tree)? {
            tree.remove(&replaced);
        }
        let mut node = Node::file(
            self.allocate_id(),
            upload.name.clone(),
            upload.parent_id.clone(),
            upload.content.mime_type,
            upload.uploaded_by,
        );
        node.properties = upload.properties;
        tree.insert(node.clone(), bytes);
        Ok(node)
    }

    async fn read_file(&self, file_id: &NodeId) -> Result<ByteStream, StorageError> {
        self.enter(StorageOp::ReadFile).await?;
        let bytes = {
            let tree = self.tree.lock();
            match tree.entries.get(file_id) {
                Some(entry) if entry.node.kind == NodeKind::File => entry.bytes.clone(),
                _ => return Err(StorageError::NotFound(format!("file {}", file_id))),
            }
        };
        let chunk_size = self.chunk_size;
        let chunks = stream::unfold(0usize, move |offset| {
            let bytes = bytes.clone();
            async move {
                if offset >= bytes.len() {
                    return None;
                }
                let end = (offset + chunk_size).min(bytes.len());
                Some((Ok::<_, std::io::Error>(bytes[offset..end].to_vec()), end))
            }
        });
        Ok(chunks.boxed())
    }

    async fn rename(&self, node_id: &NodeId, new_name: &str) -> Result<Node, StorageError> {
        self.enter(StorageOp::Rename).await?;
        let mut tree = self.tree.lock();
        let parent = tree
            .entries
            .get(node_id)
            .ok_or_else(|| StorageError::NotFound(format!("node {}", node_id)))?
            .node
            .parent_id
            .clone();
        if let Some(parent) = &parent {
            if let Some(existing) = tree.sibling_named(parent, new_name) {
                if &existing.id != node_id {
                    return Err(StorageError::Conflict(format!(
                        "'{}' already exists in {}",
                        new_name, parent
                    )));
                }
            }
        }
        let entry = tree
            .entries
            .get_mut(node_id)
            .ok_or_else(|| StorageError::NotFound(format!("node {}", node_id)))?;
        entry.node.name = new_name.to_string();
        Ok(entry.node.clone())
    }

    async fn delete(&self, node_id: &NodeId) -> Result<(), StorageError> {
        self.enter(StorageOp::Delete).await?;
        if self.tree.lock().remove(node_id) {
            Ok(())
        } else {
            Err(StorageError::NotFound(format!("node {}", node_id)))
        }
    }

    async fn update_file(
        &self,
        file_id: &NodeId,
        properties: BTreeMap<String, String>,
        content: Option<FileContent>,
    ) -> Result<Node, StorageError> {
        self.enter(StorageOp::UpdateFile).await?;
        let replacement = match content {
            Some(content) => Some((drain(content.stream).await?, content.mime_type)),
            None => None,
        };
        let mut tree = self.tree.lock();
        let entry = match tree.entries.get_mut(file_id) {
            Some(entry) if entry.node.is_file() => entry,
            _ => return Err(StorageError::NotFound(format!("file {}", file_id))),
        };
        entry.node.properties = properties;
        if let Some((bytes, mime_type)) = replacement {
            entry.bytes = Arc::new(bytes);
            entry.node.mime_type = Some(mime_type);
        }
        Ok(entry.node.clone())
    }
}
