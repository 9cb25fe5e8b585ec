//! Draft edits and saves.

use futures::future::join_all;
use serde_json::Value;

use tabula_core::RecordId;

use crate::edits::row_error;
use crate::engine::QueryStateEngine;

/// Outcome of a save: which rows were written and which were rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveSummary {
    pub saved: Vec<RecordId>,
    pub failed: Vec<RecordId>,
}

impl SaveSummary {
    pub fn is_empty(&self) -> bool {
        self.saved.is_empty() && self.failed.is_empty()
    }
}

impl QueryStateEngine {
    /// Record a cell edit in the row's draft. Returns true if it changed.
    pub fn edit_cell(&self, row_id: &RecordId, column_key: &str, value: impl Into<Value>) -> bool {
        let value = value.into();
        self.table
            .modify(|s| s.rows.drafts_mut().apply_draft_edit(row_id, column_key, value))
    }

    /// Drop every draft not currently being saved.
    pub fn cancel_edits(&self) {
        self.table.modify(|s| s.rows.drafts_mut().cancel());
    }

    /// Write every pending draft.
    ///
    /// Rows are written concurrently and fail independently: a rejected row
    /// keeps its draft and gets a row error, the others are committed.
    /// Written rows are then re-read from the source.
    pub async fn save(&self) -> SaveSummary {
        let (pending, fields) = self.table.modify(|s| {
            let fields = s.query.fields.clone();
            (s.rows.drafts_mut().begin_commit(&fields), fields)
        });

        if pending.is_empty() {
            return SaveSummary::default();
        }
        tracing::debug!("Saving {} row(s)", pending.len());

        let writes = pending.into_iter().map(|(id, values)| {
            let write = self.service.update_row(values);
            async move { (id, write.await) }
        });
        let results = join_all(writes).await;

        let summary = self.table.modify(|s| {
            let mut summary = SaveSummary::default();
            for (id, result) in results {
                match result {
                    Ok(()) => {
                        s.rows.drafts_mut().commit_succeeded(&id);
                        summary.saved.push(id);
                    }
                    Err(failure) => {
                        tracing::warn!("Update of '{}' rejected: {}", id, failure);
                        s.rows.drafts_mut().commit_failed(&id, row_error(&failure, &fields));
                        summary.failed.push(id);
                    }
                }
            }
            summary
        });

        let refreshes = summary.saved.iter().map(|id| async move {
            if let Err(e) = self.refresh_row(id).await {
                tracing::warn!("Failed to refresh saved row '{}': {}", id, e);
            }
        });
        join_all(refreshes).await;

        tracing::info!(
            "Saved {} row(s), {} rejected",
            summary.saved.len(),
            summary.failed.len()
        );
        summary
    }
}
