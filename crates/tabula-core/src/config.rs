//! Configuration types.
//!
//! A table is described by a `TableDefinition` (object, fields, predicates)
//! plus the `TableConfig` paging and behavior knobs. Definitions are read
//! from TOML, by default from `<config dir>/tabula/table.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::field::FieldsInput;
use crate::sort::SortDirection;

/// Paging limits for a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagingConfig {
    /// Hard cap on rows held by the table.
    pub max_records: usize,

    /// Rows requested per incremental load.
    pub records_per_batch: usize,

    /// Rows requested by a full reload. Falls back to `records_per_batch`.
    pub initial_records: Option<usize>,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            max_records: 2000,
            records_per_batch: 50,
            initial_records: None,
        }
    }
}

impl PagingConfig {
    /// LIMIT used for a full reload.
    pub fn initial_limit(&self) -> usize {
        self.initial_records.unwrap_or(self.records_per_batch)
    }
}

/// Runtime behavior of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    pub paging: PagingConfig,

    /// Registry-wide default for field editability.
    pub editable: bool,

    /// Whether scrolling past the end loads further pages.
    pub infinite_loading: bool,

    /// Whether the table follows the source's push events.
    pub live_updates: bool,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            paging: PagingConfig::default(),
            editable: false,
            infinite_loading: true,
            live_updates: false,
        }
    }
}

/// Everything needed to query one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub object_type: String,

    pub fields: FieldsInput,

    #[serde(default)]
    pub filter: String,

    #[serde(default)]
    pub search: String,

    #[serde(default)]
    pub sort_field: String,

    #[serde(default)]
    pub sort_direction: SortDirection,

    #[serde(flatten)]
    pub config: TableConfig,
}

impl TableDefinition {
    /// Parse a definition from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Read and parse a definition file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }
}

/// Get the config directory path.
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("tabula"))
}

/// Get the path of the default table definition.
pub fn default_definition_path() -> Result<PathBuf, ConfigError> {
    config_dir()
        .map(|dir| dir.join("table.toml"))
        .ok_or(ConfigError::NoConfigDir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::RawField;
    use std::io::Write;

    #[test]
    fn test_paging_defaults() {
        let paging = PagingConfig::default();
        assert_eq!(paging.max_records, 2000);
        assert_eq!(paging.records_per_batch, 50);
        assert_eq!(paging.initial_limit(), 50);

        let paging = PagingConfig {
            initial_records: Some(10),
            ..paging
        };
        assert_eq!(paging.initial_limit(), 10);
    }

    #[test]
    fn test_definition_from_toml() {
        let def = TableDefinition::from_toml_str(
            r#"
            object_type = "Opportunity"
            fields = "Name, Account.Name"
            sort_field = "Name"
            sort_direction = "DESC"
            editable = true

            [paging]
            records_per_batch = 25
            "#,
        )
        .unwrap();

        assert_eq!(def.object_type, "Opportunity");
        assert_eq!(def.fields, FieldsInput::Text("Name, Account.Name".into()));
        assert_eq!(def.sort_direction, SortDirection::Desc);
        assert!(def.config.editable);
        assert!(def.config.infinite_loading);
        assert_eq!(def.config.paging.records_per_batch, 25);
        assert_eq!(def.config.paging.max_records, 2000);
        assert!(def.filter.is_empty());
    }

    #[test]
    fn test_definition_structured_fields() {
        let def = TableDefinition::from_toml_str(
            r#"
            object_type = "Contact"
            sort_field = "LastName"

            [[fields]]
            fieldName = "LastName"
            searchable = true

            [[fields]]
            fieldName = "Email"
            visible = false
            "#,
        )
        .unwrap();

        match def.fields {
            FieldsInput::List(fields) => {
                assert_eq!(fields.len(), 2);
                assert_eq!(fields[0].searchable, Some(true));
                assert_eq!(
                    fields[1],
                    RawField {
                        visible: Some(false),
                        ..RawField::named("Email")
                    }
                );
            }
            other => panic!("expected structured fields, got {:?}", other),
        }
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "object_type = \"Account\"").unwrap();
        writeln!(file, "fields = \"Name\"").unwrap();
        writeln!(file, "sort_field = \"Name\"").unwrap();

        let def = TableDefinition::load(file.path()).unwrap();
        assert_eq!(def.object_type, "Account");
        assert_eq!(def.config, TableConfig::default());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = TableDefinition::load(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_load_invalid_toml() {
        let err = TableDefinition::from_toml_str("object_type = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
