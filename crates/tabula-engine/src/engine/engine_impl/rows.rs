//! Row actions, selection and single-row refreshes.

use std::future::Future;

use tabula_core::{
    EngineError, Record, RecordId, RowActionEffect, RowActionError, RowActionOutcome,
};

use crate::engine::observable_table::TableState;
use crate::engine::QueryStateEngine;
use crate::flatten;
use crate::service::FetchRequest;

impl QueryStateEngine {
    // =========================================================================
    // Row Actions
    // =========================================================================

    /// Run a row action.
    ///
    /// The callback gets a copy of the row and decides its fate. A removal
    /// also moves the paging offset back by one. Callback errors propagate
    /// with nothing changed.
    ///
    /// The callback runs while the table is locked and must not call back
    /// into the engine; use `handle_row_action_async` for callbacks that wait
    /// on anything.
    pub fn handle_row_action<F, E>(
        &self,
        id: &RecordId,
        callback: F,
    ) -> Result<RowActionEffect, RowActionError<E>>
    where
        F: FnOnce(Record) -> Result<RowActionOutcome, E>,
    {
        self.table.modify(|s| {
            let effect = s.rows.apply_row_action(id, callback)?;
            settle_row_action(s, id, effect);
            Ok(effect)
        })
    }

    /// Run a row action whose callback is asynchronous.
    ///
    /// The table is not locked while the callback runs. Its outcome is applied
    /// to the row by id afterwards, so a row that went away in the meantime
    /// fails with `RowNotFound`.
    pub async fn handle_row_action_async<F, Fut, E>(
        &self,
        id: &RecordId,
        callback: F,
    ) -> Result<RowActionEffect, RowActionError<E>>
    where
        F: FnOnce(Record) -> Fut,
        Fut: Future<Output = Result<RowActionOutcome, E>>,
    {
        let copy = self
            .table
            .read(|s| s.rows.get(id).cloned())
            .ok_or_else(|| RowActionError::RowNotFound(id.clone()))?;

        let outcome = callback(copy).await.map_err(RowActionError::Callback)?;

        self.table.modify(|s| {
            let effect = s.rows.apply_outcome(id, outcome)?;
            settle_row_action(s, id, effect);
            Ok(effect)
        })
    }

    // =========================================================================
    // Selection
    // =========================================================================

    /// Apply a selection event for the visible rows and return the selection.
    pub fn handle_row_selection(
        &self,
        selected: impl IntoIterator<Item = RecordId>,
    ) -> Vec<RecordId> {
        self.table.modify(|s| {
            s.rows.select_visible(selected);
            sorted(s.rows.selected_ids().iter().cloned())
        })
    }

    pub fn clear_selection(&self) {
        self.table.modify(|s| s.rows.clear_selection());
    }

    pub fn selected_ids(&self) -> Vec<RecordId> {
        self.table
            .read(|s| sorted(s.rows.selected_ids().iter().cloned()))
    }

    // =========================================================================
    // Single Rows
    // =========================================================================

    /// Fetch one row under the current predicates.
    ///
    /// Returns the generation the request was made under, and the row if it
    /// still matches.
    async fn fetch_row(&self, id: &RecordId) -> Result<(u64, Option<Record>), EngineError> {
        let (generation, request) = self.table.read(|s| -> Result<_, EngineError> {
            let query_string = s.query.row_query(id, s.metadata.as_ref())?;
            Ok((
                s.generation,
                FetchRequest {
                    object_type: s.query.object_type.clone(),
                    filter: s.query.filter.clone(),
                    query_string,
                },
            ))
        })?;

        let page = self.service.fetch(request).await?;
        let record = page
            .rows
            .into_iter()
            .next()
            .map(flatten::to_record)
            .transpose()?;
        Ok((generation, record))
    }

    /// Re-read a held row from the source and replace it in place.
    ///
    /// A row that no longer matches the current predicates is removed.
    /// Returns false if the row is not held or the response was stale.
    pub async fn refresh_row(&self, id: &RecordId) -> Result<bool, EngineError> {
        if !self.table.read(|s| s.rows.contains(id)) {
            return Ok(false);
        }

        let (generation, record) = self.fetch_row(id).await?;

        Ok(self.table.modify(|s| {
            if !s.is_current(generation) {
                tracing::debug!("Discarding stale refresh of '{}'", id);
                return false;
            }
            match record {
                Some(record) => s.rows.replace(record),
                None => {
                    tracing::debug!("Row '{}' no longer matches, removing", id);
                    s.remove_row(id)
                }
            }
        }))
    }

    /// Fetch a row created at the source and show it at the head of the table.
    ///
    /// Skipped once the table holds `max_records` rows. A row already held is
    /// replaced in place. Returns true if the table changed.
    pub async fn add_row(&self, id: &RecordId) -> Result<bool, EngineError> {
        let at_cap = self
            .table
            .read(|s| s.query.offset >= s.query.paging.max_records);
        if at_cap {
            tracing::debug!("Not adding '{}': record cap reached", id);
            return Ok(false);
        }

        let (generation, record) = self.fetch_row(id).await?;
        let Some(record) = record else {
            return Ok(false);
        };

        Ok(self.table.modify(|s| {
            if !s.is_current(generation) {
                tracing::debug!("Discarding stale insert of '{}'", id);
                return false;
            }
            if s.rows.upsert_head(record) {
                s.query.offset += 1;
            }
            true
        }))
    }

    /// Remove a held row. Returns false if it was not held.
    pub fn remove_row(&self, id: &RecordId) -> bool {
        self.table.modify(|s| s.remove_row(id))
    }
}

/// A removed row takes its draft with it and moves the offset back.
fn settle_row_action(s: &mut TableState, id: &RecordId, effect: RowActionEffect) {
    if effect == RowActionEffect::Removed {
        s.query.offset = s.query.offset.saturating_sub(1);
        s.rows.drafts_mut().discard(id);
    }
}

fn sorted(ids: impl Iterator<Item = RecordId>) -> Vec<RecordId> {
    let mut ids: Vec<RecordId> = ids.collect();
    ids.sort();
    ids
}
