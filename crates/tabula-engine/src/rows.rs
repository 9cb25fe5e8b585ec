//! Row Reconciler
//!
//! `RowSet` is the authoritative set of held rows plus the client state that
//! rides on them: selection and draft edits. Selection is keyed by identity,
//! so it survives page replacement and rows scrolling out of the window.

use std::collections::HashSet;

use tabula_core::{Record, RecordId, RowActionEffect, RowActionError, RowActionOutcome};

use crate::edits::DraftStore;

/// How a fetched page is merged into the held rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageMode {
    /// Full reload: the page becomes the row set.
    Replace,
    /// Pagination: the page extends the row set.
    Append,
}

/// Held rows, selection and drafts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    rows: Vec<Record>,
    selected: HashSet<RecordId>,
    drafts: DraftStore,
}

impl RowSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn get(&self, id: &RecordId) -> Option<&Record> {
        self.rows.iter().find(|r| r.id() == id)
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.position(id).is_some()
    }

    fn position(&self, id: &RecordId) -> Option<usize> {
        self.rows.iter().position(|r| r.id() == id)
    }

    pub fn selected_ids(&self) -> &HashSet<RecordId> {
        &self.selected
    }

    pub fn drafts(&self) -> &DraftStore {
        &self.drafts
    }

    pub fn drafts_mut(&mut self) -> &mut DraftStore {
        &mut self.drafts
    }

    // =========================================================================
    // Pages
    // =========================================================================

    /// Merge a fetched page. Selection is untouched.
    ///
    /// An appended row whose id is already held replaces that row in place.
    pub fn apply_page(&mut self, page: Vec<Record>, mode: PageMode) {
        match mode {
            PageMode::Replace => {
                self.rows = page;
            }
            PageMode::Append => {
                for record in page {
                    match self.position(record.id()) {
                        Some(index) => self.rows[index] = record,
                        None => self.rows.push(record),
                    }
                }
            }
        }
        tracing::debug!("Applied {:?} page, holding {} rows", mode, self.rows.len());
    }

    // =========================================================================
    // Row Mutations
    // =========================================================================

    /// Replace the row with this record's id. Returns false if not held.
    pub fn replace(&mut self, record: Record) -> bool {
        match self.position(record.id()) {
            Some(index) => {
                self.rows[index] = record;
                true
            }
            None => false,
        }
    }

    /// Remove a row. Returns false if not held.
    pub fn remove(&mut self, id: &RecordId) -> bool {
        match self.position(id) {
            Some(index) => {
                self.rows.remove(index);
                true
            }
            None => false,
        }
    }

    /// Replace the row if held, otherwise insert it at the head.
    ///
    /// Returns true if the row was inserted.
    pub fn upsert_head(&mut self, record: Record) -> bool {
        match self.position(record.id()) {
            Some(index) => {
                self.rows[index] = record;
                false
            }
            None => {
                self.rows.insert(0, record);
                true
            }
        }
    }

    /// Run a row action against a private copy of the row and apply its outcome.
    ///
    /// A callback error is returned as is and nothing is changed.
    pub fn apply_row_action<F, E>(
        &mut self,
        id: &RecordId,
        callback: F,
    ) -> Result<RowActionEffect, RowActionError<E>>
    where
        F: FnOnce(Record) -> Result<RowActionOutcome, E>,
    {
        let copy = self
            .get(id)
            .cloned()
            .ok_or_else(|| RowActionError::RowNotFound(id.clone()))?;
        let outcome = callback(copy).map_err(RowActionError::Callback)?;
        self.apply_outcome(id, outcome)
    }

    /// Apply a row action outcome to the row with this id.
    ///
    /// A replacement takes the original row's position and must carry the
    /// same id.
    pub fn apply_outcome<E>(
        &mut self,
        id: &RecordId,
        outcome: RowActionOutcome,
    ) -> Result<RowActionEffect, RowActionError<E>> {
        let index = self
            .position(id)
            .ok_or_else(|| RowActionError::RowNotFound(id.clone()))?;

        let effect = match outcome {
            RowActionOutcome::Replace(record) => {
                if record.id() != id {
                    return Err(RowActionError::IdMismatch {
                        expected: id.clone(),
                        actual: record.id().clone(),
                    });
                }
                self.rows[index] = record;
                RowActionEffect::Replaced
            }
            RowActionOutcome::Remove => {
                self.rows.remove(index);
                RowActionEffect::Removed
            }
            RowActionOutcome::Unchanged => RowActionEffect::Unchanged,
        };

        tracing::debug!("Row action on '{}': {:?}", id, effect);
        Ok(effect)
    }

    // =========================================================================
    // Selection
    // =========================================================================

    /// Apply a selection event from the visible rows.
    pub fn select_visible(&mut self, event_selected: impl IntoIterator<Item = RecordId>) {
        let visible: HashSet<RecordId> = self.rows.iter().map(|r| r.id().clone()).collect();
        let event_selected: HashSet<RecordId> = event_selected.into_iter().collect();
        self.selected = apply_selection(&self.selected, &visible, &event_selected);
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    /// Drop the held rows. Selection and drafts are identity-keyed and stay.
    pub fn clear_rows(&mut self) {
        self.rows.clear();
    }
}

/// `(current - visible) | event_selected`.
///
/// Rows outside the visible window keep their selection; visible rows take
/// exactly the event's selection.
pub fn apply_selection(
    current: &HashSet<RecordId>,
    visible: &HashSet<RecordId>,
    event_selected: &HashSet<RecordId>,
) -> HashSet<RecordId> {
    current
        .difference(visible)
        .cloned()
        .chain(event_selected.iter().cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ids(items: &[&str]) -> HashSet<RecordId> {
        items.iter().map(|s| RecordId::from(*s)).collect()
    }

    fn row_set(items: &[&str]) -> RowSet {
        let mut rows = RowSet::new();
        rows.apply_page(
            items
                .iter()
                .map(|id| Record::new(*id).with("Name", format!("Row {}", id)))
                .collect(),
            PageMode::Replace,
        );
        rows
    }

    fn row_ids(rows: &RowSet) -> Vec<&str> {
        rows.rows().iter().map(|r| r.id().as_ref()).collect()
    }

    #[test]
    fn test_apply_selection() {
        assert!(apply_selection(&ids(&["A", "B"]), &ids(&["A", "B", "C"]), &ids(&[])).is_empty());
        assert_eq!(
            apply_selection(&ids(&["A"]), &ids(&["B"]), &ids(&["C"])),
            ids(&["A", "C"])
        );
    }

    #[test]
    fn test_selection_survives_page_replacement() {
        let mut rows = row_set(&["A", "B"]);
        rows.select_visible(ids(&["A"]));

        rows.apply_page(vec![Record::new("C")], PageMode::Replace);
        assert_eq!(rows.selected_ids(), &ids(&["A"]));

        // A is no longer visible, so selecting C keeps it.
        rows.select_visible(ids(&["C"]));
        assert_eq!(rows.selected_ids(), &ids(&["A", "C"]));

        rows.clear_selection();
        rows.clear_selection();
        assert!(rows.selected_ids().is_empty());
    }

    #[test]
    fn test_append_page() {
        let mut rows = row_set(&["A", "B"]);
        rows.apply_page(
            vec![Record::new("C"), Record::new("A").with("Name", "New A")],
            PageMode::Append,
        );
        assert_eq!(row_ids(&rows), vec!["A", "B", "C"]);
        assert_eq!(rows.rows()[0].get("Name"), Some(&json!("New A")));
    }

    #[test]
    fn test_row_action_remove() {
        let mut rows = row_set(&["A", "B", "C"]);
        let effect = rows
            .apply_row_action(&"B".into(), |_| Ok::<_, String>(RowActionOutcome::Remove))
            .unwrap();
        assert_eq!(effect, RowActionEffect::Removed);
        assert_eq!(row_ids(&rows), vec!["A", "C"]);
    }

    #[test]
    fn test_row_action_replace_keeps_order() {
        let mut rows = row_set(&["A", "B", "C"]);
        let before = rows.clone();

        rows.apply_row_action(&"B".into(), |row| {
            Ok::<_, String>(RowActionOutcome::Replace(row.with("Name", "Changed")))
        })
        .unwrap();

        assert_eq!(row_ids(&rows), vec!["A", "B", "C"]);
        assert_eq!(rows.rows()[1].get("Name"), Some(&json!("Changed")));
        assert_eq!(rows.rows()[0], before.rows()[0]);
        assert_eq!(rows.rows()[2], before.rows()[2]);
    }

    #[test]
    fn test_row_action_unchanged_ignores_copy_mutation() {
        let mut rows = row_set(&["A", "B"]);
        let before = rows.clone();

        let effect = rows
            .apply_row_action(&"A".into(), |mut row| {
                row.insert("Name", "Mutated copy");
                Ok::<_, String>(RowActionOutcome::Unchanged)
            })
            .unwrap();

        assert_eq!(effect, RowActionEffect::Unchanged);
        assert_eq!(rows, before);
    }

    #[test]
    fn test_row_action_error_propagates() {
        let mut rows = row_set(&["A", "B"]);
        let before = rows.clone();

        let err = rows
            .apply_row_action(&"A".into(), |_| Err::<RowActionOutcome, _>("boom"))
            .unwrap_err();
        assert!(matches!(err, RowActionError::Callback("boom")));
        assert_eq!(rows, before);

        let err = rows
            .apply_row_action(&"Z".into(), |_| Ok::<_, String>(RowActionOutcome::Remove))
            .unwrap_err();
        assert!(matches!(err, RowActionError::RowNotFound(_)));
    }

    #[test]
    fn test_row_action_replace_must_keep_id() {
        let mut rows = row_set(&["A", "B"]);
        let before = rows.clone();

        let err = rows
            .apply_row_action(&"A".into(), |_| {
                Ok::<_, String>(RowActionOutcome::Replace(Record::new("B")))
            })
            .unwrap_err();
        assert!(matches!(
            err,
            RowActionError::IdMismatch { ref expected, ref actual }
                if expected.as_ref() == "A" && actual.as_ref() == "B"
        ));
        assert_eq!(rows, before);
        assert_eq!(row_ids(&rows), vec!["A", "B"]);
    }

    #[test]
    fn test_upsert_head() {
        let mut rows = row_set(&["A", "B"]);
        assert!(rows.upsert_head(Record::new("C")));
        assert_eq!(row_ids(&rows), vec!["C", "A", "B"]);

        assert!(!rows.upsert_head(Record::new("B").with("Name", "B2")));
        assert_eq!(row_ids(&rows), vec!["C", "A", "B"]);
        assert_eq!(rows.rows()[2].get("Name"), Some(&json!("B2")));

        assert!(rows.remove(&"A".into()));
        assert!(!rows.remove(&"A".into()));
        assert!(!rows.replace(Record::new("Z")));
    }
}
