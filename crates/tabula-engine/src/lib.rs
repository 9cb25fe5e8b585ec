//! List-view engine for Tabula.
//!
//! This crate turns a table definition into queries and keeps the rows of
//! one table in step with a remote data source:
//! - Field registry normalization and query construction
//! - Paging with a record cap and stale-response protection
//! - Row reconciliation: actions, selection, draft edits and saves
//! - Live update merging and CSV export

pub mod columns;
pub mod edits;
pub mod engine;
pub mod export;
pub mod fields;
pub mod flatten;
pub mod live;
pub mod pagination;
pub mod query;
pub mod rows;
pub mod service;

// Re-export commonly used types
pub use columns::Column;
pub use edits::DraftStore;
pub use engine::{QueryStateEngine, SaveSummary};
pub use export::ExportError;
pub use live::LiveUpdateGuard;
pub use pagination::PageCursor;
pub use query::{QueryState, Transition};
pub use rows::{PageMode, RowSet};
pub use service::{
    FetchRequest, FetchResponse, LiveStream, LiveSubscription, PushService, TableService,
};

// Re-export tabula_core types for convenience
pub use tabula_core::{
    EditState, EngineError, FetchError, FieldDescriptor, FieldsInput, LiveEvent, LiveEventKind,
    Record, RecordId, RowActionEffect, RowActionOutcome, SortDirection, TableConfig,
    TableDefinition, TableSnapshot, ValidationError,
};
