//! Node arena
//!
//! Nodes are stored flat, indexed by id, with an ordered child index per folder.
//! Parent links are ids, so removing a subtree is a walk over the child index.

use crate::tree::node::Node;
use crate::types::NodeId;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct NodeArena {
    nodes: HashMap<NodeId, Node>,
    /// Folder id -> child ids in provider order
    children: HashMap<NodeId, Vec<NodeId>>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Insert a node with no parent link (collection roots)
    pub fn insert_root(&mut self, node: Node) {
        self.children.entry(node.id.clone()).or_default();
        self.nodes.insert(node.id.clone(), node);
    }

    /// Cached children of a folder, in provider order
    pub fn children_of(&self, id: &NodeId) -> Vec<Node> {
        self.children
            .get(id)
            .map(|ids| ids.iter().filter_map(|c| self.nodes.get(c)).cloned().collect())
            .unwrap_or_default()
    }

    pub fn child_named(&self, parent: &NodeId, name: &str) -> Option<&Node> {
        self.children.get(parent).and_then(|ids| {
            ids.iter()
                .filter_map(|c| self.nodes.get(c))
                .find(|n| n.name == name)
        })
    }

    /// Append a child to a cached folder.
    ///
    /// Fails when the parent is unknown, the id is already present or a sibling
    /// already has the name; the arena is left untouched in that case.
    pub fn insert_child(&mut self, parent: &NodeId, mut node: Node) -> Result<(), String> {
        if !self.nodes.contains_key(parent) {
            return Err(format!("parent {} is not cached", parent));
        }
        if self.nodes.contains_key(&node.id) {
            return Err(format!("node {} is already cached", node.id));
        }
        if self.child_named(parent, &node.name).is_some() {
            return Err(format!(
                "folder {} already has a child named '{}'",
                parent, node.name
            ));
        }
        node.parent_id = Some(parent.clone());
        let id = node.id.clone();
        if node.is_folder() {
            self.children.entry(id.clone()).or_default();
        }
        self.nodes.insert(id.clone(), node);
        self.children.entry(parent.clone()).or_default().push(id);
        Ok(())
    }

    /// Replace a folder's cached children with a freshly listed set.
    ///
    /// Previously cached descendants are dropped first. Entries that repeat an
    /// id or a sibling name already inserted are skipped and returned.
    pub fn replace_children(&mut self, parent: &NodeId, listed: Vec<Node>) -> Vec<Node> {
        self.remove_descendants(parent);
        let mut skipped = Vec::new();
        for node in listed {
            if self.insert_child(parent, node.clone()).is_err() {
                skipped.push(node);
            }
        }
        skipped
    }

    /// Remove every descendant of `id`, keeping `id` itself. Returns removed ids.
    pub fn remove_descendants(&mut self, id: &NodeId) -> Vec<NodeId> {
        let mut removed = Vec::new();
        let mut stack = self
            .children
            .get_mut(id)
            .map(std::mem::take)
            .unwrap_or_default();
        while let Some(next) = stack.pop() {
            if let Some(grandchildren) = self.children.remove(&next) {
                stack.extend(grandchildren);
            }
            if self.nodes.remove(&next).is_some() {
                removed.push(next);
            }
        }
        removed
    }

    /// Remove `id` and its whole subtree, detaching it from its parent.
    /// Returns removed ids, `id` included; empty if `id` was not cached.
    pub fn remove_subtree(&mut self, id: &NodeId) -> Vec<NodeId> {
        let Some(parent) = self.nodes.get(id).map(|n| n.parent_id.clone()) else {
            return Vec::new();
        };
        let mut removed = self.remove_descendants(id);
        self.children.remove(id);
        self.nodes.remove(id);
        removed.push(id.clone());
        if let Some(parent) = parent {
            if let Some(siblings) = self.children.get_mut(&parent) {
                siblings.retain(|c| c != id);
            }
        }
        removed
    }

    /// Rename a cached node in place, keeping sibling names unique
    pub fn rename(&mut self, id: &NodeId, new_name: &str) -> Result<(), String> {
        let parent = self
            .nodes
            .get(id)
            .ok_or_else(|| format!("node {} is not cached", id))?
            .parent_id
            .clone();
        if let Some(parent) = &parent {
            if let Some(existing) = self.child_named(parent, new_name) {
                if &existing.id != id {
                    return Err(format!(
                        "folder {} already has a child named '{}'",
                        parent, new_name
                    ));
                }
            }
        }
        if let Some(node) = self.nodes.get_mut(id) {
            node.name = new_name.to_string();
        }
        Ok(())
    }

    /// Replace a cached node's record, keeping its position and parent link
    pub fn replace(&mut self, node: Node) -> Result<(), String> {
        let slot = self
            .nodes
            .get_mut(&node.id)
            .ok_or_else(|| format!("node {} is not cached", node.id))?;
        if slot.kind != node.kind {
            return Err(format!("node {} changed kind upstream", node.id));
        }
        let parent = slot.parent_id.clone();
        *slot = Node { parent_id: parent, ..node };
        Ok(())
    }

    /// Ids whose parent link points outside the arena
    pub fn orphans(&self) -> Vec<NodeId> {
        self.nodes
            .values()
            .filter(|n| matches!(&n.parent_id, Some(p) if !self.nodes.contains_key(p)))
            .map(|n| n.id.clone())
            .collect()
    }
}
