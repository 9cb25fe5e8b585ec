//! Observable table state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::record::{Record, RecordId};

/// Where a row is in the edit lifecycle.
///
/// `Clean -> Editing -> Saving -> Clean` on success, or back to `Editing`
/// with a `RowError` attached on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditState {
    Clean,
    Editing,
    Saving,
}

/// Structured error shown against one row after a failed save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowError {
    pub title: String,
    pub messages: Vec<String>,
    /// Display field names the errors concern.
    pub field_names: Vec<String>,
}

impl RowError {
    /// Build a row error with the standard "We found N error(s)." title.
    pub fn new(messages: Vec<String>, field_names: Vec<String>) -> Self {
        let count = messages.len();
        let title = format!(
            "We found {} error{}.",
            count,
            if count > 1 { "s" } else { "" }
        );
        Self {
            title,
            messages,
            field_names,
        }
    }
}

/// All errors currently attached to the table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableErrors {
    pub rows: BTreeMap<RecordId, RowError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
}

/// Snapshot broadcast to subscribers on every mutation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSnapshot {
    pub rows: Vec<Record>,
    /// Selected ids, sorted.
    pub selected_ids: Vec<RecordId>,
    /// Pending draft values per row (each carries its `Id`).
    pub drafts: Vec<Record>,
    pub errors: TableErrors,
    pub record_count: Option<u64>,
    pub loading: bool,
    pub loading_more: bool,
    pub has_more: bool,
    pub offset: usize,
    pub generation: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_error_title_pluralizes() {
        let one = RowError::new(vec!["E: bad".into()], vec![]);
        assert_eq!(one.title, "We found 1 error.");

        let two = RowError::new(vec!["E: bad".into(), "E: worse".into()], vec![]);
        assert_eq!(two.title, "We found 2 errors.");
    }
}
