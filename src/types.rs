//! Core identifier types shared by the cache, the ledger and the storage adapter.

use serde::{Deserialize, Serialize};
use std::fmt;

/// NodeId: opaque provider-assigned identifier, unique across the whole tree
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identity: opaque name of the acting user, resolved by the auth layer
pub type Identity = String;

/// One of the four independent top-level trees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionRoot {
    AcademicResources,
    FacultyDirectory,
    Schedules,
    Timetables,
}

impl CollectionRoot {
    pub const ALL: [CollectionRoot; 4] = [
        CollectionRoot::AcademicResources,
        CollectionRoot::FacultyDirectory,
        CollectionRoot::Schedules,
        CollectionRoot::Timetables,
    ];

    /// Display name used for the synthetic root node
    pub fn display_name(&self) -> &'static str {
        match self {
            CollectionRoot::AcademicResources => "Academic Resources",
            CollectionRoot::FacultyDirectory => "Faculty Directory",
            CollectionRoot::Schedules => "Class Schedules",
            CollectionRoot::Timetables => "Timetables",
        }
    }
}

impl fmt::Display for CollectionRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Category folder names found under each subject
pub mod category {
    pub const NOTES: &str = "notes";
    pub const PYQS: &str = "pyqs";
}
