//! Mirrored folder/file tree: node records and the id-indexed arena that holds them.

pub mod arena;
pub mod node;

pub use arena::NodeArena;
pub use node::{FolderTree, Node, NodeKind};
