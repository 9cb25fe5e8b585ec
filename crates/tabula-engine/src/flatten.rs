//! Result flattening.
//!
//! Rows come back from the source with related records nested as objects
//! (`{"Account": {"Name": "Acme"}}`). Tables address them by flattened keys
//! (`Account_Name`), and every `...Id` value gets a companion link column
//! (`AccountId` -> `AccountLink = "/<id>"`).

use serde_json::{Map, Value};

use tabula_core::{Record, ValidationError};

/// Flatten nested objects into `parent_child` keys, recursively.
///
/// Arrays and scalars are kept as they are.
pub fn flatten_row(row: Map<String, Value>) -> Map<String, Value> {
    let mut flat = Map::new();
    for (key, value) in row {
        flatten_into(&mut flat, key, value);
    }
    flat
}

fn flatten_into(flat: &mut Map<String, Value>, key: String, value: Value) {
    match value {
        Value::Object(nested) => {
            for (child, value) in nested {
                flatten_into(flat, format!("{}_{}", key, child), value);
            }
        }
        value => {
            flat.insert(key, value);
        }
    }
}

/// Add a link column for every identifier column.
pub fn apply_links(row: &mut Map<String, Value>) {
    let links: Vec<(String, Value)> = row
        .iter()
        .filter_map(|(key, value)| {
            let prefix = key.strip_suffix("Id")?;
            let id = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                _ => return None,
            };
            Some((format!("{}Link", prefix), Value::String(format!("/{}", id))))
        })
        .collect();

    row.extend(links);
}

/// Turn one raw result row into a table record.
pub fn to_record(value: Value) -> Result<Record, ValidationError> {
    let Value::Object(row) = value else {
        return Err(ValidationError::MissingRecordId);
    };
    let mut row = flatten_row(row);
    apply_links(&mut row);
    Record::try_from(row)
}

/// Turn a page of raw rows into records. Fails if any row lacks an `Id`.
pub fn to_records(values: Vec<Value>) -> Result<Vec<Record>, ValidationError> {
    values.into_iter().map(to_record).collect()
}
