use crate::error::StorageError;
use crate::tree::Node;
use crate::types::{Identity, NodeId};
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::collections::BTreeMap;

/// Chunked byte stream used for uploads and downloads
pub type ByteStream = BoxStream<'static, std::io::Result<Vec<u8>>>;

/// How `put_file` treats an existing sibling with the same name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PutMode {
    /// Fail with `Conflict`
    #[default]
    Create,
    /// Replace the existing sibling; the replacement gets a fresh id
    Upsert,
}

/// File content plus its mime type
pub struct FileContent {
    pub stream: ByteStream,
    pub mime_type: String,
}

/// Everything needed to create a file upstream
pub struct FileUpload {
    pub parent_id: NodeId,
    pub name: String,
    pub content: FileContent,
    pub uploaded_by: Option<Identity>,
    pub properties: BTreeMap<String, String>,
    pub mode: PutMode,
}

/// Capability interface over the external folder/file provider.
///
/// Pure pass-through: no caching and no retries.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Children of a folder in provider order
    async fn list_children(&self, folder_id: &NodeId) -> Result<Vec<Node>, StorageError>;

    /// Metadata of a single node
    async fn get_node(&self, node_id: &NodeId) -> Result<Node, StorageError>;

    async fn create_folder(&self, parent_id: &NodeId, name: &str) -> Result<Node, StorageError>;

    /// Create (or upsert) a file, consuming the content stream chunk by chunk
    async fn put_file(&self, upload: FileUpload) -> Result<Node, StorageError>;

    async fn read_file(&self, file_id: &NodeId) -> Result<ByteStream, StorageError>;

    async fn rename(&self, node_id: &NodeId, new_name: &str) -> Result<Node, StorageError>;

    /// Deleting a folder deletes its subtree upstream
    async fn delete(&self, node_id: &NodeId) -> Result<(), StorageError>;

    /// Replace a file's properties and optionally its content
    async fn update_file(
        &self,
        file_id: &NodeId,
        properties: BTreeMap<String, String>,
        content: Option<FileContent>,
    ) -> Result<Node, StorageError>;
}
