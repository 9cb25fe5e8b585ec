//! Column descriptions for rendering.

use serde::Serialize;

use tabula_core::{FieldDescriptor, ObjectInfo, PicklistOption};

/// A rendered column: one per visible field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    /// Key of the column's values in a flattened record.
    pub key: String,
    pub field_name: String,
    pub label: String,
    pub sortable: bool,
    pub editable: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<PicklistOption>,
}

/// Build columns for the visible fields.
///
/// A field is sortable only if both the field and its metadata say so.
pub fn columns(fields: &[FieldDescriptor], metadata: Option<&ObjectInfo>) -> Vec<Column> {
    fields
        .iter()
        .filter(|f| f.visible)
        .map(|field| {
            let metadata_sortable = metadata
                .and_then(|info| info.field(&field.field_name))
                .map_or(true, |info| info.sortable);

            Column {
                key: field.flattened_key(),
                field_name: field.field_name.clone(),
                label: field
                    .label
                    .clone()
                    .unwrap_or_else(|| field.field_name.clone()),
                sortable: field.sortable && metadata_sortable,
                editable: field.editable,
                options: field.options.clone(),
            }
        })
        .collect()
}
