//! Observable table state with automatic change notifications.
//!
//! Mutation = notification: every `modify` broadcasts a fresh
//! `TableSnapshot`. State cannot change without subscribers hearing of it.

use parking_lot::RwLock;
use tokio::sync::watch;

use tabula_core::{FieldDescriptor, ObjectInfo, RecordId, TableErrors, TableSnapshot};

use crate::live::LiveUpdateGuard;
use crate::pagination::PageCursor;
use crate::query::QueryState;
use crate::rows::RowSet;

// =============================================================================
// TableState
// =============================================================================

/// Everything the engine owns about one table.
#[derive(Debug, Clone, Default)]
pub(crate) struct TableState {
    pub query: QueryState,
    pub rows: RowSet,
    pub cursor: PageCursor,
    pub guard: LiveUpdateGuard,
    /// The full registry; `query.fields` may be a selection of it.
    pub available_fields: Vec<FieldDescriptor>,
    pub metadata: Option<ObjectInfo>,
    pub record_count: Option<u64>,
    pub loading: bool,
    pub table_error: Option<String>,
    /// Bumped by every invalidation and reload. Responses carry the
    /// generation they were requested under and are dropped if it moved on.
    pub generation: u64,
}

impl TableState {
    pub fn new(query: QueryState) -> Self {
        Self {
            available_fields: query.fields.clone(),
            query,
            ..Self::default()
        }
    }

    /// Start a new generation and return it.
    pub fn bump_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    /// Drop a row and everything attached to it, keeping the offset in step.
    pub fn remove_row(&mut self, id: &RecordId) -> bool {
        if !self.rows.remove(id) {
            return false;
        }
        self.query.offset = self.query.offset.saturating_sub(1);
        self.rows.drafts_mut().discard(id);
        true
    }

    pub fn snapshot(&self) -> TableSnapshot {
        let mut selected_ids: Vec<RecordId> = self.rows.selected_ids().iter().cloned().collect();
        selected_ids.sort();

        TableSnapshot {
            rows: self.rows.rows().to_vec(),
            selected_ids,
            drafts: self.rows.drafts().drafts().cloned().collect(),
            errors: TableErrors {
                rows: self.rows.drafts().errors().clone(),
                table: self.table_error.clone(),
            },
            record_count: self.record_count,
            loading: self.loading,
            loading_more: self.cursor.in_flight(),
            has_more: self.cursor.has_more(),
            offset: self.query.offset,
            generation: self.generation,
        }
    }
}

// =============================================================================
// ObservableTable
// =============================================================================

/// Table state that broadcasts a snapshot after every modification.
///
/// Uses `parking_lot::RwLock` for the state (never poisons) and
/// `tokio::sync::watch` for broadcasts. The lock is never held across an
/// `.await`; callers read or modify through closures.
pub(crate) struct ObservableTable {
    inner: RwLock<TableState>,
    tx: watch::Sender<TableSnapshot>,
    rx: watch::Receiver<TableSnapshot>,
}

impl ObservableTable {
    pub fn new(state: TableState) -> Self {
        let (tx, rx) = watch::channel(state.snapshot());
        Self {
            inner: RwLock::new(state),
            tx,
            rx,
        }
    }

    /// Modify the state and broadcast the result.
    pub fn modify<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut TableState) -> R,
    {
        let (result, snapshot) = {
            let mut inner = self.inner.write();
            let result = f(&mut inner);
            (result, inner.snapshot())
        };
        let _ = self.tx.send(snapshot);
        result
    }

    /// Modify the state without broadcasting.
    ///
    /// Only for bookkeeping that is not part of the snapshot.
    pub fn update<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut TableState) -> R,
    {
        let mut inner = self.inner.write();
        f(&mut inner)
    }

    /// Read the state with a closure.
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&TableState) -> R,
    {
        let inner = self.inner.read();
        f(&inner)
    }

    pub fn snapshot(&self) -> TableSnapshot {
        self.inner.read().snapshot()
    }

    /// The receiver gets the current snapshot immediately and all future ones.
    pub fn subscribe(&self) -> watch::Receiver<TableSnapshot> {
        self.rx.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rows::PageMode;
    use tabula_core::Record;

    #[test]
    fn test_modify_broadcasts() {
        let table = ObservableTable::new(TableState::default());
        let rx = table.subscribe();
        assert!(rx.borrow().rows.is_empty());

        table.modify(|s| {
            s.rows
                .apply_page(vec![Record::new("A"), Record::new("B")], PageMode::Replace);
            s.query.offset = 2;
        });

        assert_eq!(rx.borrow().rows.len(), 2);
        assert_eq!(rx.borrow().offset, 2);
    }

    #[test]
    fn test_read_does_not_broadcast() {
        let table = ObservableTable::new(TableState::default());
        let rx = table.subscribe();

        let generation = table.read(|s| s.generation);
        assert_eq!(generation, 0);
        assert!(!rx.has_changed().unwrap());

        table.modify(|s| s.bump_generation());
        assert!(rx.has_changed().unwrap());
    }

    #[test]
    fn test_remove_row_keeps_offset_in_step() {
        let mut state = TableState::default();
        state
            .rows
            .apply_page(vec![Record::new("A"), Record::new("B")], PageMode::Replace);
        state.query.offset = 2;

        assert!(state.remove_row(&"A".into()));
        assert_eq!(state.query.offset, 1);
        assert!(!state.remove_row(&"A".into()));
        assert_eq!(state.query.offset, 1);
    }

    #[test]
    fn test_snapshot_sorts_selection() {
        let mut state = TableState::default();
        state
            .rows
            .apply_page(vec![Record::new("B"), Record::new("A")], PageMode::Replace);
        state
            .rows
            .select_visible(vec![RecordId::from("B"), RecordId::from("A")]);

        let snapshot = state.snapshot();
        assert_eq!(
            snapshot.selected_ids,
            vec![RecordId::from("A"), RecordId::from("B")]
        );
    }
}
