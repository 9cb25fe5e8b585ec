//! Field Registry
//!
//! Normalizes caller-supplied field lists into `FieldDescriptor`s and holds
//! the small name mappings the rest of the engine needs:
//! - link columns back to the name field they sort by
//! - display names to write names (and back) around row updates
//! - the "choose fields" selection with always-queried required fields

use serde_json::{Map, Value};

use tabula_core::{FieldDescriptor, FieldsInput, PicklistOption, RawField, RawOptions, ValidationError};

/// Suffixes of fields that are not editable unless they name an edit field.
const READ_ONLY_SUFFIXES: [&str; 3] = ["Name", "Link", "Id"];

/// Normalize a field registry.
///
/// Text input is either a JSON array (when it starts with `[`) or a
/// comma-separated list of names. Every entry must resolve to a non-empty
/// `fieldName`. Duplicate names are kept as given.
pub fn normalize(
    input: &FieldsInput,
    editable_default: bool,
) -> Result<Vec<FieldDescriptor>, ValidationError> {
    let raw = match input {
        FieldsInput::Text(text) => parse_text(text)?,
        FieldsInput::List(fields) => fields.clone(),
    };

    let fields = raw
        .into_iter()
        .map(|field| normalize_field(field, editable_default))
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!("Normalized {} fields", fields.len());
    Ok(fields)
}

fn parse_text(text: &str) -> Result<Vec<RawField>, ValidationError> {
    if text.trim_start().starts_with('[') {
        return serde_json::from_str(text)
            .map_err(|e| ValidationError::MalformedFields(e.to_string()));
    }

    Ok(text
        .split(',')
        .map(|name| RawField::named(name.trim()))
        .collect())
}

fn normalize_field(
    raw: RawField,
    editable_default: bool,
) -> Result<FieldDescriptor, ValidationError> {
    let field_name = raw
        .field_name
        .filter(|name| !name.is_empty())
        .ok_or(ValidationError::MissingFieldName)?;

    let edit_field_name = raw.edit_field_name.filter(|name| !name.is_empty());

    let editable = raw.editable.unwrap_or_else(|| {
        (edit_field_name.is_some() || !has_read_only_suffix(&field_name)) && editable_default
    });

    let options = match raw.options {
        Some(RawOptions::Labels(labels)) => labels.into_iter().map(PicklistOption::same).collect(),
        Some(RawOptions::Options(options)) => options,
        None => Vec::new(),
    };

    Ok(FieldDescriptor {
        field_name,
        label: raw.label,
        visible: raw.visible.unwrap_or(true),
        sortable: raw.sortable.unwrap_or(true),
        searchable: raw.searchable,
        editable,
        edit_field_name,
        options,
    })
}

fn has_read_only_suffix(field_name: &str) -> bool {
    READ_ONLY_SUFFIXES
        .iter()
        .any(|suffix| field_name.ends_with(suffix))
}

/// Map a column key to the field it sorts by.
///
/// Link columns sort by their name field: `Account_Link` sorts by
/// `Account.Name`, `Link` by `Name`. Other keys are returned unchanged.
pub fn sort_field_for_column(column: &str) -> String {
    if let Some(prefix) = column.strip_suffix("_Link") {
        format!("{}.Name", prefix)
    } else if let Some(prefix) = column.strip_suffix("Link") {
        format!("{}Name", prefix)
    } else {
        column.to_string()
    }
}

/// Find the registry entry a column or draft key refers to.
pub fn find_field<'a>(fields: &'a [FieldDescriptor], key: &str) -> Option<&'a FieldDescriptor> {
    fields
        .iter()
        .find(|f| f.field_name == key || f.flattened_key() == key)
}

/// Rename draft keys to the names the source expects on write.
pub fn to_edit_fields(fields: &[FieldDescriptor], draft: &Map<String, Value>) -> Map<String, Value> {
    draft
        .iter()
        .map(|(key, value)| {
            let name = match find_field(fields, key) {
                Some(field) if field.edit_field_name.is_some() => field.write_name().to_string(),
                _ => key.clone(),
            };
            (name, value.clone())
        })
        .collect()
}

/// Map a write name reported by the source back to its display field name.
pub fn from_edit_field(fields: &[FieldDescriptor], write_name: &str) -> String {
    fields
        .iter()
        .find(|f| f.edit_field_name.as_deref() == Some(write_name))
        .map(|f| f.field_name.clone())
        .unwrap_or_else(|| write_name.to_string())
}

/// Apply a "choose fields" selection.
///
/// Returns the selected fields in selection order, all visible, followed by
/// the required fields that were not selected. Those stay in the query but
/// are hidden. Names not present in `available` are skipped.
pub fn apply_field_selection(
    available: &[FieldDescriptor],
    selected: &[String],
    required: &[String],
) -> Result<Vec<FieldDescriptor>, ValidationError> {
    if selected.is_empty() {
        return Err(ValidationError::EmptyFieldSelection);
    }

    let lookup = |name: &str| available.iter().find(|f| f.field_name == name);

    let mut result = Vec::with_capacity(selected.len() + required.len());
    for name in selected {
        match lookup(name) {
            Some(field) => result.push(FieldDescriptor {
                visible: true,
                ..field.clone()
            }),
            None => tracing::warn!("Ignoring unknown selected field '{}'", name),
        }
    }

    for name in required.iter().filter(|name| !selected.contains(name)) {
        if let Some(field) = lookup(name) {
            result.push(FieldDescriptor {
                visible: false,
                ..field.clone()
            });
        }
    }

    Ok(result)
}
