//! Query State Engine
//!
//! The QueryStateEngine owns one table's query state and held rows and
//! drives the collaborators:
//! - State transitions (object, filter, search, sort, fields) invalidate rows
//! - Full reloads and incremental pages go through the `TableService`
//! - Row actions, selection and draft edits mutate the held rows
//! - Live events from the `PushService` are merged in order
//!
//! ## Load Flow
//!
//! ```text
//! set_filter / set_search / set_sort / ...
//!        │  (dirty: offset = 0, rows dropped, generation + 1)
//!        ▼
//!   reload() ── build_initial ──► fetch ──► stale? ── yes ──► drop response
//!        │                                    │
//!        │                                    no
//!        ▼                                    ▼
//!   load_more() ── build_page ──► fetch ──► flatten + links ──► RowSet
//!                                                                  │
//!                                                                  ▼
//!                                                     TableSnapshot broadcast
//! ```

use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, watch};

use tabula_core::{
    EditState, EngineError, FieldDescriptor, FieldsInput, LiveEvent, ObjectInfo, Record,
    RecordId, SortDirection, TableConfig, TableDefinition, TableSnapshot, ValidationError,
};

use crate::columns::{self, Column};
use crate::export::{self, ExportError};
use crate::fields;
use crate::query::{QueryState, Transition};
use crate::service::{LiveSubscription, PushService, TableService};

mod engine_impl;
mod observable_table;

pub use engine_impl::SaveSummary;
use observable_table::{ObservableTable, TableState};

// =============================================================================
// Query State Engine
// =============================================================================

/// List-view engine for one table.
///
/// ## Reactive State
///
/// Table state is observable: subscribe via `subscribe()`. Every mutation
/// broadcasts a `TableSnapshot`.
///
/// ## Staleness
///
/// Every invalidating transition and every reload starts a new generation.
/// Responses requested under an older generation are discarded.
pub struct QueryStateEngine {
    service: Arc<dyn TableService>,
    push: Option<Arc<dyn PushService>>,
    config: TableConfig,
    table: ObservableTable,
    subscription: Mutex<Option<LiveSubscription>>,
}

impl QueryStateEngine {
    /// Create an engine for a table definition.
    ///
    /// Fails if the field registry is malformed. A missing sort field is
    /// only reported when a query is built.
    pub fn new(
        service: Arc<dyn TableService>,
        definition: &TableDefinition,
    ) -> Result<Self, ValidationError> {
        let config = definition.config;
        let fields = fields::normalize(&definition.fields, config.editable)?;

        let query = QueryState {
            filter: definition.filter.clone(),
            search: definition.search.clone(),
            sort_direction: definition.sort_direction,
            ..QueryState::new(
                definition.object_type.clone(),
                fields,
                definition.sort_field.clone(),
                config.paging,
            )
        };

        tracing::debug!(
            "QueryStateEngine created for '{}' with {} fields",
            query.object_type,
            query.fields.len()
        );

        Ok(Self {
            service,
            push: None,
            config,
            table: ObservableTable::new(TableState::new(query)),
            subscription: Mutex::new(None),
        })
    }

    /// Attach a push collaborator for live updates.
    pub fn with_push_service(mut self, push: Arc<dyn PushService>) -> Self {
        self.push = Some(push);
        self
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    /// Subscribe to table changes.
    ///
    /// Clone the receiver for multiple subscribers.
    pub fn subscribe(&self) -> watch::Receiver<TableSnapshot> {
        self.table.subscribe()
    }

    pub fn snapshot(&self) -> TableSnapshot {
        self.table.snapshot()
    }

    // =========================================================================
    // State Transitions
    // =========================================================================

    /// Apply a transition. A dirty transition drops the held rows and starts
    /// a new generation; the caller reloads.
    fn apply_transition<F>(&self, f: F) -> bool
    where
        F: FnOnce(&QueryState) -> Transition,
    {
        self.table.modify(|s| {
            let Transition { state, dirty } = f(&s.query);
            if dirty {
                s.query = state;
                invalidate(s);
            }
            dirty
        })
    }

    /// Change the object type.
    ///
    /// Metadata belongs to the old object and is dropped; load it again
    /// with `load_metadata`. An active live subscription is moved to the new
    /// object's channel and the new event stream is returned.
    pub async fn set_object_type(
        &self,
        object_type: impl Into<String>,
    ) -> Result<Option<mpsc::UnboundedReceiver<LiveEvent>>, EngineError> {
        let object_type = object_type.into();
        let dirty = self.table.modify(|s| {
            let Transition { state, dirty } = s.query.with_object_type(object_type);
            if dirty {
                s.query = state;
                s.metadata = None;
                invalidate(s);
            }
            dirty
        });

        if dirty && self.is_live() {
            return Ok(Some(self.subscribe_live().await?));
        }
        Ok(None)
    }

    pub fn set_filter(&self, filter: impl Into<String>) -> bool {
        let filter = filter.into();
        self.apply_transition(|q| q.with_filter(filter))
    }

    pub fn set_search(&self, search: impl Into<String>) -> bool {
        let search = search.into();
        self.apply_transition(|q| q.with_search(search))
    }

    pub fn set_sort(&self, field: impl Into<String>, direction: SortDirection) -> bool {
        let field = field.into();
        self.apply_transition(|q| q.with_sort(field, direction))
    }

    /// Sort by a rendered column; link columns sort by their name field.
    pub fn sort_by_column(&self, column: &str, direction: SortDirection) -> bool {
        self.set_sort(fields::sort_field_for_column(column), direction)
    }

    /// Replace the field registry.
    pub fn set_fields(&self, input: impl Into<FieldsInput>) -> Result<bool, ValidationError> {
        let fields = fields::normalize(&input.into(), self.config.editable)?;
        Ok(self.table.modify(|s| {
            s.available_fields = fields.clone();
            let Transition { state, dirty } = s.query.with_fields(fields);
            if dirty {
                s.query = state;
                invalidate(s);
            }
            dirty
        }))
    }

    /// Show only the selected fields; required fields stay queried but hidden.
    pub fn apply_field_selection(
        &self,
        selected: &[String],
        required: &[String],
    ) -> Result<bool, ValidationError> {
        let available = self.table.read(|s| s.available_fields.clone());
        let fields = fields::apply_field_selection(&available, selected, required)?;
        Ok(self.apply_transition(|q| q.with_fields(fields)))
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn query_state(&self) -> QueryState {
        self.table.read(|s| s.query.clone())
    }

    pub fn fields(&self) -> Vec<FieldDescriptor> {
        self.table.read(|s| s.query.fields.clone())
    }

    pub fn available_fields(&self) -> Vec<FieldDescriptor> {
        self.table.read(|s| s.available_fields.clone())
    }

    pub fn metadata(&self) -> Option<ObjectInfo> {
        self.table.read(|s| s.metadata.clone())
    }

    /// The current query without LIMIT.
    pub fn query(&self) -> Result<String, ValidationError> {
        self.table.read(|s| s.query.base_query(s.metadata.as_ref()))
    }

    /// The query a full reload would send.
    pub fn initial_query(&self) -> Result<String, ValidationError> {
        self.table.read(|s| s.query.build_initial(s.metadata.as_ref()))
    }

    pub fn columns(&self) -> Vec<Column> {
        self.table
            .read(|s| columns::columns(&s.query.fields, s.metadata.as_ref()))
    }

    pub fn rows(&self) -> Vec<Record> {
        self.table.read(|s| s.rows.rows().to_vec())
    }

    pub fn row(&self, id: &RecordId) -> Option<Record> {
        self.table.read(|s| s.rows.get(id).cloned())
    }

    pub fn edit_state(&self, id: &RecordId) -> EditState {
        self.table.read(|s| s.rows.drafts().edit_state(id))
    }

    // =========================================================================
    // Export
    // =========================================================================

    /// Export every row of the current query to a CSV file in `dir`.
    pub async fn export_csv(&self, dir: &Path) -> Result<PathBuf, ExportError> {
        let (filter, query) = self.table.read(|s| {
            s.query
                .base_query(s.metadata.as_ref())
                .map(|query| (s.query.filter.clone(), query))
        })?;
        export::export_csv(self.service.as_ref(), &filter, &query, dir).await
    }
}

/// Drop held rows and start a new generation after a dirty transition.
fn invalidate(s: &mut TableState) {
    let generation = s.bump_generation();
    s.rows.clear_rows();
    s.cursor.exhaust();
    s.loading = false;
    tracing::debug!("Query state invalidated, generation {}", generation);
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

// =============================================================================
// Tests
// =============================================================================
