//! Live update events pushed by the data source.

use serde::{Deserialize, Serialize};

use crate::record::RecordId;

/// Kind of change a live event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LiveEventKind {
    Created,
    Updated,
    Deleted,
}

/// A change notification for one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveEvent {
    #[serde(rename = "type")]
    pub kind: LiveEventKind,

    pub record_id: RecordId,

    /// Monotonic per-channel sequence (replay id).
    pub sequence_id: i64,

    /// Milliseconds since the Unix epoch at which the change happened.
    pub timestamp_ms: i64,
}
