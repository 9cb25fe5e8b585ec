//! Error types for the Tabula engine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::record::RecordId;

/// Malformed input, raised synchronously and never silently defaulted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A field entry has no usable name.
    #[error("Field must have a valid fieldName property")]
    MissingFieldName,

    /// A textual field list could not be parsed.
    #[error("Malformed field list: {0}")]
    MalformedFields(String),

    /// A query was built without a sort field.
    #[error("Sort field is required")]
    MissingSortField,

    /// A query was built without an object type.
    #[error("Object type is required")]
    MissingObjectType,

    /// A record arrived without an `Id`.
    #[error("Record is missing an Id")]
    MissingRecordId,

    /// A field selection left no fields selected.
    #[error("Select at least one field")]
    EmptyFieldSelection,
}

/// The fetch collaborator rejected a query.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{status_code}: {message}")]
#[serde(rename_all = "camelCase")]
pub struct FetchError {
    pub status_code: u16,
    pub message: String,
}

impl FetchError {
    pub fn new(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
        }
    }
}

/// One error reported by the update collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl ErrorDetail {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// `CODE: message`, the form shown to users.
    pub fn formatted(&self) -> String {
        format!("{}: {}", self.code, self.message)
    }
}

/// The update collaborator rejected a row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowUpdateFailure {
    /// Errors keyed by the (write) field name they concern.
    #[serde(default)]
    pub field_errors: BTreeMap<String, Vec<ErrorDetail>>,

    /// Errors that concern the row as a whole.
    #[serde(default)]
    pub row_errors: Vec<ErrorDetail>,
}

impl RowUpdateFailure {
    pub fn error_count(&self) -> usize {
        self.row_errors.len() + self.field_errors.values().map(Vec::len).sum::<usize>()
    }
}

impl fmt::Display for RowUpdateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Row update rejected with {} error(s)", self.error_count())
    }
}

impl std::error::Error for RowUpdateFailure {}

/// Live update subscription failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PushError {
    #[error("No push channel for object '{0}'")]
    NoChannel(String),

    #[error("Subscription to '{channel}' failed: {message}")]
    Subscribe { channel: String, message: String },
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No config directory found.
    #[error("Config directory not found")]
    NoConfigDir,

    /// IO error.
    #[error("IO error: {0}")]
    Io(String),

    /// Parse error.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Errors surfaced by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Remote fetch failed; held rows are untouched.
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Push(#[from] PushError),

    /// A page load was requested while another is outstanding.
    #[error("A page load is already in progress")]
    LoadInProgress,

    /// Live updates were requested without a push collaborator.
    #[error("No push service configured")]
    NoPushService,
}

/// Failure of a row action.
#[derive(Debug, Error)]
pub enum RowActionError<E> {
    /// No held row has this id; the callback was not run.
    #[error("Row '{0}' not found")]
    RowNotFound(RecordId),

    /// The callback itself failed; nothing was changed.
    #[error("Row action failed: {0}")]
    Callback(E),

    /// A replacement carried another row's id; nothing was changed.
    #[error("Replacement for row '{expected}' has id '{actual}'")]
    IdMismatch { expected: RecordId, actual: RecordId },
}
