//! Record and RecordId types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::ValidationError;

/// Name of the identity field every record carries.
pub const ID_FIELD: &str = "Id";

/// Stable record identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for RecordId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A row of data: field name to value, always carrying an `Id`.
///
/// Records serialize as their plain field map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct Record {
    id: RecordId,
    fields: Map<String, Value>,
}

impl Record {
    /// Create a record with only its identity set.
    pub fn new(id: impl Into<RecordId>) -> Self {
        let id = id.into();
        let mut fields = Map::new();
        fields.insert(ID_FIELD.to_string(), Value::String(id.0.clone()));
        Self { id, fields }
    }

    /// Builder-style field assignment.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn id(&self) -> &RecordId {
        &self.id
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Set a field. Writing a new string `Id` re-keys the record.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let field = field.into();
        let value = value.into();
        if field == ID_FIELD {
            match id_from_value(&value) {
                Some(id) => self.id = id,
                None => return,
            }
        }
        self.fields.insert(field, value);
    }

    /// Remove a field. The identity field cannot be removed.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        if field == ID_FIELD {
            return None;
        }
        self.fields.remove(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

fn id_from_value(value: &Value) -> Option<RecordId> {
    match value {
        Value::String(s) if !s.is_empty() => Some(RecordId(s.clone())),
        Value::Number(n) => Some(RecordId(n.to_string())),
        _ => None,
    }
}

impl TryFrom<Map<String, Value>> for Record {
    type Error = ValidationError;

    fn try_from(fields: Map<String, Value>) -> Result<Self, Self::Error> {
        let id = fields
            .get(ID_FIELD)
            .and_then(id_from_value)
            .ok_or(ValidationError::MissingRecordId)?;
        Ok(Self { id, fields })
    }
}

impl TryFrom<Value> for Record {
    type Error = ValidationError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Self::try_from(map),
            _ => Err(ValidationError::MissingRecordId),
        }
    }
}

impl From<Record> for Map<String, Value> {
    fn from(record: Record) -> Self {
        record.fields
    }
}
