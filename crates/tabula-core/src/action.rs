//! Row action types.

use crate::record::Record;

/// What a row action callback asks the table to do with its row.
///
/// The callback receives a private copy of the row; nothing it does to that
/// copy is visible until one of these outcomes is applied.
#[derive(Debug, Clone, PartialEq)]
pub enum RowActionOutcome {
    /// Replace the row (matched by id) with this record.
    Replace(Record),

    /// Remove the row from the table.
    Remove,

    /// Leave the table untouched.
    Unchanged,
}

/// What actually happened after a row action was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowActionEffect {
    Replaced,
    Removed,
    Unchanged,
}
