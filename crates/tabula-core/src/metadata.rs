//! Object metadata returned by the metadata collaborator.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Type information for one field of an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldInfo {
    pub data_type: String,
    #[serde(default = "default_sortable")]
    pub sortable: bool,
}

fn default_sortable() -> bool {
    true
}

impl FieldInfo {
    /// Whether a field of this type takes part in free-text search by default.
    pub fn is_text_like(&self) -> bool {
        matches!(
            self.data_type.to_ascii_lowercase().as_str(),
            "string" | "text" | "email" | "phone"
        )
    }
}

/// Field metadata for an object type, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    #[serde(default)]
    pub fields: HashMap<String, FieldInfo>,
}

impl ObjectInfo {
    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.get(name)
    }

    /// Builder-style insertion, mostly useful in tests and fixtures.
    pub fn with_field(mut self, name: impl Into<String>, data_type: &str, sortable: bool) -> Self {
        self.fields.insert(
            name.into(),
            FieldInfo {
                data_type: data_type.to_string(),
                sortable,
            },
        );
        self
    }
}
