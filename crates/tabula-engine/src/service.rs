//! Collaborator traits.
//!
//! The engine talks to the outside world through two traits:
//! - `TableService` executes queries, writes rows and describes objects
//! - `PushService` resolves and manages live-update subscriptions
//!
//! Both return boxed futures so the caller decides how they are driven, and
//! both are easy to fake in tests.

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use uuid::Uuid;

use tabula_core::{FetchError, LiveEvent, ObjectInfo, PushError, RowUpdateFailure};

// =============================================================================
// Table Service
// =============================================================================

/// A query for the fetch collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchRequest {
    pub object_type: String,
    pub filter: String,
    pub query_string: String,
}

/// Rows returned by the fetch collaborator, still nested as the source sent them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchResponse {
    pub rows: Vec<Value>,
    #[serde(default)]
    pub total_count: Option<u64>,
}

impl FetchResponse {
    pub fn new(rows: Vec<Value>) -> Self {
        Self {
            rows,
            total_count: None,
        }
    }

    pub fn with_total(mut self, total_count: u64) -> Self {
        self.total_count = Some(total_count);
        self
    }
}

/// Remote tabular data source.
pub trait TableService: Send + Sync {
    /// Execute a query.
    fn fetch(&self, request: FetchRequest) -> BoxFuture<'static, Result<FetchResponse, FetchError>>;

    /// Write one row. `fields` carries the row's `Id` and write field names.
    fn update_row(
        &self,
        fields: Map<String, Value>,
    ) -> BoxFuture<'static, Result<(), RowUpdateFailure>>;

    /// Describe the fields of an object type.
    fn object_metadata(
        &self,
        object_type: String,
    ) -> BoxFuture<'static, Result<ObjectInfo, FetchError>>;
}

// =============================================================================
// Push Service
// =============================================================================

/// Handle of an active live-update subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveSubscription {
    pub id: Uuid,
    pub channel: String,
}

impl LiveSubscription {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel: channel.into(),
        }
    }
}

/// An active subscription and the events it delivers.
#[derive(Debug)]
pub struct LiveStream {
    pub subscription: LiveSubscription,
    pub events: mpsc::UnboundedReceiver<LiveEvent>,
}

/// Source of live-update events.
#[cfg_attr(test, mockall::automock)]
pub trait PushService: Send + Sync {
    /// Channel that carries changes for an object type.
    fn channel_for(&self, object_type: String) -> BoxFuture<'static, Result<String, PushError>>;

    fn subscribe(&self, channel: String) -> BoxFuture<'static, Result<LiveStream, PushError>>;

    fn unsubscribe(
        &self,
        subscription: LiveSubscription,
    ) -> BoxFuture<'static, Result<(), PushError>>;
}

// =============================================================================
// Fake Table Service (for testing)
// =============================================================================
