//! Hierarchy cache and its per-folder freshness states.

pub mod hierarchy;
pub mod state;

pub use hierarchy::HierarchyCache;
pub use state::{Freshness, Patch};
