//! Folder and file node records

use crate::types::{Identity, NodeId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Node kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Folder,
    File,
}

/// One folder or file entry in the mirrored hierarchy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    /// None only for collection roots
    pub parent_id: Option<NodeId>,
    pub kind: NodeKind,
    pub created_at: DateTime<Utc>,
    /// Files only
    #[serde(default)]
    pub uploaded_by: Option<Identity>,
    /// Files only
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Free-form key/value metadata (faculty fields live here)
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl Node {
    pub fn folder(id: NodeId, name: impl Into<String>, parent_id: Option<NodeId>) -> Self {
        Self {
            id,
            name: name.into(),
            parent_id,
            kind: NodeKind::Folder,
            created_at: Utc::now(),
            uploaded_by: None,
            mime_type: None,
            properties: BTreeMap::new(),
        }
    }

    pub fn file(
        id: NodeId,
        name: impl Into<String>,
        parent_id: NodeId,
        mime_type: impl Into<String>,
        uploaded_by: Option<Identity>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            parent_id: Some(parent_id),
            kind: NodeKind::File,
            created_at: Utc::now(),
            uploaded_by,
            mime_type: Some(mime_type.into()),
            properties: BTreeMap::new(),
        }
    }

    pub fn is_folder(&self) -> bool {
        self.kind == NodeKind::Folder
    }

    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }
}

/// Folder entry with its nested subfolders, as returned by tree listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderTree {
    pub folder: Node,
    pub children: Vec<FolderTree>,
}

impl FolderTree {
    pub fn find(&self, name: &str) -> Option<&FolderTree> {
        self.children.iter().find(|c| c.folder.name == name)
    }
}
