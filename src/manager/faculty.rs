//! Faculty directory entries
//!
//! A faculty entry is a photo file in the Faculty Directory collection whose
//! properties carry the person's details.

use crate::error::ResourceError;
use crate::tree::Node;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const NAME: &str = "name";
const EMAIL: &str = "email";
const ROLE: &str = "role";
const CONTACT: &str = "contact";

/// Details shown for one faculty member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacultyEntry {
    pub name: String,
    pub email: String,
    pub role: String,
    pub contact: String,
}

impl FacultyEntry {
    /// Every field is required
    pub fn validate(&self) -> Result<(), ResourceError> {
        let missing: Vec<&str> = [
            (NAME, &self.name),
            (EMAIL, &self.email),
            (ROLE, &self.role),
            (CONTACT, &self.contact),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(key, _)| key)
        .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ResourceError::InvalidInput(format!(
                "missing faculty fields: {}",
                missing.join(", ")
            )))
        }
    }

    pub fn to_properties(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (NAME.to_string(), self.name.trim().to_string()),
            (EMAIL.to_string(), self.email.trim().to_string()),
            (ROLE.to_string(), self.role.trim().to_string()),
            (CONTACT.to_string(), self.contact.trim().to_string()),
        ])
    }

    /// Read an entry back from a faculty file node
    pub fn from_node(node: &Node) -> Option<Self> {
        let get = |key: &str| node.properties.get(key).cloned();
        Some(Self {
            name: get(NAME)?,
            email: get(EMAIL)?,
            role: get(ROLE)?,
            contact: get(CONTACT)?,
        })
    }
}

/// Faculty photos must be images
pub fn validate_photo_mime(mime_type: &str) -> Result<(), ResourceError> {
    if mime_type.starts_with("image/") {
        Ok(())
    } else {
        Err(ResourceError::InvalidInput(format!(
            "faculty photo must be an image, got '{}'",
            mime_type
        )))
    }
}
