//! Core types for the Tabula list-view engine.
//!
//! This crate contains shared data structures that are used across all Tabula crates:
//! - Field descriptors and the raw inputs they are normalized from
//! - Records and record identity
//! - Sort direction, object metadata and live-update events
//! - Row action outcomes and table snapshots
//! - Configuration types
//! - Error types

mod action;
mod config;
mod error;
mod event;
mod field;
mod metadata;
mod record;
mod snapshot;
mod sort;

pub use action::{RowActionEffect, RowActionOutcome};
pub use config::{
    config_dir, default_definition_path, PagingConfig, TableConfig, TableDefinition,
};
pub use error::{
    ConfigError, EngineError, ErrorDetail, FetchError, PushError, RowActionError,
    RowUpdateFailure, ValidationError,
};
pub use event::{LiveEvent, LiveEventKind};
pub use field::{is_truthy, FieldDescriptor, FieldsInput, PicklistOption, RawField, RawOptions};
pub use metadata::{FieldInfo, ObjectInfo};
pub use record::{Record, RecordId, ID_FIELD};
pub use snapshot::{EditState, RowError, TableErrors, TableSnapshot};
pub use sort::SortDirection;
