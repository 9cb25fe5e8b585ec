//! Field descriptor types.
//!
//! A field registry arrives in one of three shapes (a comma-separated list,
//! a JSON array, or structured values) and is normalized by the engine into
//! `FieldDescriptor`s. `RawField` is the loose, pre-normalization form.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A selectable value for picklist-style columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PicklistOption {
    pub label: String,
    pub value: String,
}

impl PicklistOption {
    /// An option whose label and value are the same text.
    pub fn same(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            label: text.clone(),
            value: text,
        }
    }
}

/// Options as provided by the caller: bare labels or full options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawOptions {
    Labels(Vec<String>),
    Options(Vec<PicklistOption>),
}

/// A field entry before normalization.
///
/// Boolean flags accept any JSON value and are coerced by truthiness
/// (`null`, `false`, `0` and `""` are false). An absent flag stays `None`
/// so normalization can apply its default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawField {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(
        default,
        deserialize_with = "truthy",
        skip_serializing_if = "Option::is_none"
    )]
    pub visible: Option<bool>,

    #[serde(
        default,
        deserialize_with = "truthy",
        skip_serializing_if = "Option::is_none"
    )]
    pub sortable: Option<bool>,

    #[serde(
        default,
        deserialize_with = "truthy",
        skip_serializing_if = "Option::is_none"
    )]
    pub searchable: Option<bool>,

    #[serde(
        default,
        deserialize_with = "truthy",
        skip_serializing_if = "Option::is_none"
    )]
    pub editable: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit_field_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<RawOptions>,
}

impl RawField {
    /// A raw field carrying only a name.
    pub fn named(field_name: impl Into<String>) -> Self {
        Self {
            field_name: Some(field_name.into()),
            ..Self::default()
        }
    }
}

impl From<FieldDescriptor> for RawField {
    fn from(field: FieldDescriptor) -> Self {
        Self {
            field_name: Some(field.field_name),
            label: field.label,
            visible: Some(field.visible),
            sortable: Some(field.sortable),
            searchable: field.searchable,
            editable: Some(field.editable),
            edit_field_name: field.edit_field_name,
            options: if field.options.is_empty() {
                None
            } else {
                Some(RawOptions::Options(field.options))
            },
        }
    }
}

/// Metadata describing one projected column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    /// Field path; dotted relationship paths such as `Account.Name` are allowed.
    pub field_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    pub visible: bool,

    pub sortable: bool,

    /// Explicit searchability. `None` defers to object metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub searchable: Option<bool>,

    pub editable: bool,

    /// Name the field is written back under, when it differs from `field_name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit_field_name: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<PicklistOption>,
}

impl FieldDescriptor {
    /// A visible, sortable, read-only field.
    pub fn new(field_name: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            label: None,
            visible: true,
            sortable: true,
            searchable: None,
            editable: false,
            edit_field_name: None,
            options: Vec::new(),
        }
    }

    /// Key under which this field appears in a flattened record.
    pub fn flattened_key(&self) -> String {
        self.field_name.replace('.', "_")
    }

    /// Name used when writing this field back to the source.
    pub fn write_name(&self) -> &str {
        self.edit_field_name.as_deref().unwrap_or(&self.field_name)
    }
}

/// A field registry as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldsInput {
    /// Comma-separated names, or a JSON array encoded as text.
    Text(String),
    /// Structured entries.
    List(Vec<RawField>),
}

impl From<&str> for FieldsInput {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldsInput {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<RawField>> for FieldsInput {
    fn from(fields: Vec<RawField>) -> Self {
        Self::List(fields)
    }
}

impl From<Vec<FieldDescriptor>> for FieldsInput {
    fn from(fields: Vec<FieldDescriptor>) -> Self {
        Self::List(fields.into_iter().map(RawField::from).collect())
    }
}

/// Truthiness of a loosely-typed flag value.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn truthy<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(Some(is_truthy(&value)))
}
