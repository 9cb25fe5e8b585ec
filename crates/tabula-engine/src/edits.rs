//! Draft edits and their commit bookkeeping.
//!
//! Each row moves `Clean -> Editing -> Saving -> Clean`, or back to
//! `Editing` with a `RowError` when the source rejects the update.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use tabula_core::{
    EditState, FieldDescriptor, Record, RecordId, RowError, RowUpdateFailure, ID_FIELD,
};

use crate::fields::{from_edit_field, to_edit_fields};

/// Pending edits, in-flight saves and per-row errors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DraftStore {
    drafts: BTreeMap<RecordId, Record>,
    /// Draft values as they were when the save started.
    saving: BTreeMap<RecordId, Record>,
    errors: BTreeMap<RecordId, RowError>,
}

impl DraftStore {
    /// Record a cell edit. Returns true if the draft changed.
    ///
    /// Column keys of the form `Field-suffix` are stored under `Field`.
    pub fn apply_draft_edit(&mut self, row_id: &RecordId, column_key: &str, value: Value) -> bool {
        let field = column_field(column_key);
        let draft = self
            .drafts
            .entry(row_id.clone())
            .or_insert_with(|| Record::new(row_id.clone()));

        if draft.get(field) == Some(&value) {
            return false;
        }
        draft.insert(field, value);
        true
    }

    pub fn draft(&self, id: &RecordId) -> Option<&Record> {
        self.drafts.get(id)
    }

    pub fn drafts(&self) -> impl Iterator<Item = &Record> {
        self.drafts.values()
    }

    pub fn is_empty(&self) -> bool {
        self.drafts.is_empty()
    }

    pub fn errors(&self) -> &BTreeMap<RecordId, RowError> {
        &self.errors
    }

    pub fn edit_state(&self, id: &RecordId) -> EditState {
        if self.saving.contains_key(id) {
            EditState::Saving
        } else if self.drafts.contains_key(id) {
            EditState::Editing
        } else {
            EditState::Clean
        }
    }

    /// Mark every draft not already saving as saving and return the
    /// write-ready field maps.
    pub fn begin_commit(&mut self, fields: &[FieldDescriptor]) -> Vec<(RecordId, Map<String, Value>)> {
        let mut pending = Vec::new();
        for (id, draft) in &self.drafts {
            if self.saving.contains_key(id) {
                continue;
            }
            pending.push((id.clone(), to_edit_fields(fields, draft.fields())));
            self.saving.insert(id.clone(), draft.clone());
        }
        pending
    }

    /// The row was written; its error is gone and so are the draft values
    /// that were saved. Edits made while the save was in flight stay.
    pub fn commit_succeeded(&mut self, id: &RecordId) {
        self.errors.remove(id);
        let Some(committed) = self.saving.remove(id) else {
            return;
        };
        let Some(draft) = self.drafts.get_mut(id) else {
            return;
        };

        let saved: Vec<String> = committed
            .fields()
            .iter()
            .filter(|(key, value)| key.as_str() != ID_FIELD && draft.get(key) == Some(*value))
            .map(|(key, _)| key.clone())
            .collect();
        for key in saved {
            draft.remove(&key);
        }

        if draft.fields().keys().all(|key| key == ID_FIELD) {
            self.drafts.remove(id);
        } else {
            tracing::debug!("Keeping edits to '{}' made during save", id);
        }
    }

    /// The row was rejected; its draft stays and the error is attached.
    pub fn commit_failed(&mut self, id: &RecordId, error: RowError) {
        self.saving.remove(id);
        self.errors.insert(id.clone(), error);
    }

    /// Drop a row's draft and error, e.g. after the row itself went away.
    pub fn discard(&mut self, id: &RecordId) {
        self.saving.remove(id);
        self.drafts.remove(id);
        self.errors.remove(id);
    }

    /// Drop every draft that is not being saved.
    pub fn cancel(&mut self) {
        let saving = &self.saving;
        self.drafts.retain(|id, _| saving.contains_key(id));
        self.errors.retain(|id, _| saving.contains_key(id));
    }
}

/// Field a column key edits: `StageName-picklist` edits `StageName`.
pub fn column_field(column_key: &str) -> &str {
    column_key.split('-').next().unwrap_or(column_key)
}

/// Build the row error shown for a rejected update.
///
/// Row-level messages come first, then field messages. Field names are
/// mapped back from write names to display names.
pub fn row_error(failure: &RowUpdateFailure, fields: &[FieldDescriptor]) -> RowError {
    let messages: Vec<String> = failure
        .row_errors
        .iter()
        .chain(failure.field_errors.values().flatten())
        .map(|detail| detail.formatted())
        .collect();

    let field_names = failure
        .field_errors
        .keys()
        .map(|name| from_edit_field(fields, name))
        .collect();

    RowError::new(messages, field_names)
}
