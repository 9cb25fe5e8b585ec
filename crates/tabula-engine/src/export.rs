//! CSV export.
//!
//! Pages a base query through the table service in fixed-size chunks and
//! renders every row as CSV. Columns are the query's SELECT list; a column a
//! row has no value for is written as `N/A`.

use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

use tabula_core::{FetchError, ValidationError};

use crate::service::{FetchRequest, TableService};

/// Rows requested per export query.
pub const EXPORT_PAGE_SIZE: usize = 2000;

/// Placeholder written for missing values.
const MISSING: &str = "N/A";

/// Errors during CSV export.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Export query failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Columns named in a query's SELECT list.
pub fn select_columns(query: &str) -> Vec<String> {
    let Some(rest) = query.trim_start().strip_prefix("SELECT") else {
        return Vec::new();
    };
    let list = rest.split(" FROM ").next().unwrap_or_default();
    list.split(',').map(|c| c.trim().to_string()).collect()
}

/// Object a query reads from: the first token after `FROM`.
pub fn object_name(query: &str) -> Option<&str> {
    query
        .split_once(" FROM ")
        .and_then(|(_, rest)| rest.split_whitespace().next())
}

/// `<Object>-export-<unix seconds>.csv`.
pub fn export_file_name(object: &str, unix_secs: u64) -> String {
    format!("{}-export-{}.csv", object, unix_secs)
}

/// Look up a possibly dotted column in a raw (nested) row.
fn lookup<'a>(row: &'a Value, column: &str) -> Option<&'a Value> {
    if let Some(value) = row.get(column) {
        return Some(value);
    }
    column
        .split('.')
        .try_fold(row, |value, segment| value.get(segment))
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => MISSING.to_string(),
        Some(Value::String(s)) if s.is_empty() => MISSING.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn escape(value: &str) -> String {
    let doubled = value.replace('"', "\"\"");
    if doubled.contains(['"', ',', '\n']) {
        format!("\"{}\"", doubled)
    } else {
        doubled
    }
}

fn line<I: IntoIterator<Item = String>>(values: I) -> String {
    let mut out = values
        .into_iter()
        .map(|v| escape(&v))
        .collect::<Vec<_>>()
        .join(",");
    out.push('\n');
    out
}

/// Render a header line plus one line per row.
pub fn render_csv(columns: &[String], rows: &[Value]) -> String {
    let mut out = line(columns.iter().cloned());
    for row in rows {
        out.push_str(&line(columns.iter().map(|c| cell(lookup(row, c)))));
    }
    out
}

/// Fetch every row of `base_query`, one page at a time.
///
/// Stops on an empty or short page.
pub async fn fetch_all(
    service: &dyn TableService,
    object_type: &str,
    filter: &str,
    base_query: &str,
) -> Result<Vec<Value>, ExportError> {
    let mut rows = Vec::new();
    let mut offset = 0;

    loop {
        let request = FetchRequest {
            object_type: object_type.to_string(),
            filter: filter.to_string(),
            query_string: format!(
                "{} LIMIT {} OFFSET {}",
                base_query, EXPORT_PAGE_SIZE, offset
            ),
        };
        let page = service.fetch(request).await?;
        let fetched = page.rows.len();
        rows.extend(page.rows);
        tracing::debug!("Export fetched {} rows at offset {}", fetched, offset);

        if fetched < EXPORT_PAGE_SIZE {
            break;
        }
        offset += EXPORT_PAGE_SIZE;
    }

    Ok(rows)
}

/// Export `base_query` to a CSV file in `dir`. Returns the file path.
pub async fn export_csv(
    service: &dyn TableService,
    filter: &str,
    base_query: &str,
    dir: &Path,
) -> Result<PathBuf, ExportError> {
    let object = object_name(base_query).ok_or(ValidationError::MissingObjectType)?;
    let rows = fetch_all(service, object, filter, base_query).await?;
    let columns = select_columns(base_query);

    let unix_secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let path = dir.join(export_file_name(object, unix_secs));

    let file = std::fs::File::create(&path)?;
    let mut writer = std::io::BufWriter::new(file);
    writer.write_all(render_csv(&columns, &rows).as_bytes())?;
    writer.flush()?;

    tracing::info!("Exported {} rows to {}", rows.len(), path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::mock::FakeTableService;
    use crate::service::FetchResponse;
    use serde_json::json;

    const QUERY: &str = "SELECT Id,Name,Account.Name FROM Opportunity WHERE IsClosed = false ORDER BY Name asc nulls first";

    #[test]
    fn test_select_columns_and_object() {
        assert_eq!(select_columns(QUERY), vec!["Id", "Name", "Account.Name"]);
        assert_eq!(object_name(QUERY), Some("Opportunity"));
        assert_eq!(object_name("SELECT Id"), None);
        assert_eq!(export_file_name("Opportunity", 42), "Opportunity-export-42.csv");
    }

    #[test]
    fn test_render_csv() {
        let columns = select_columns(QUERY);
        let rows = vec![
            json!({"Id": "006A", "Name": "Big, \"important\" deal", "Account": {"Name": "Acme"}}),
            json!({"Id": "006B", "Name": null, "Amount": 0}),
            json!({"Id": "006C", "Name": "Two\nlines", "Account": null}),
        ];

        let csv = render_csv(&columns, &rows);
        assert_eq!(
            csv,
            "Id,Name,Account.Name\n\
             006A,\"Big, \"\"important\"\" deal\",Acme\n\
             006B,N/A,N/A\n\
             006C,\"Two\nlines\",N/A\n"
        );
    }

    #[test]
    fn test_render_keeps_false_and_zero() {
        let columns = vec!["Id".to_string(), "IsWon".to_string(), "Amount".to_string()];
        let csv = render_csv(&columns, &[json!({"Id": "1", "IsWon": false, "Amount": 0})]);
        assert_eq!(csv, "Id,IsWon,Amount\n1,false,0\n");
    }

    #[tokio::test]
    async fn test_export_pages_until_short_page() {
        let full: Vec<Value> = (0..EXPORT_PAGE_SIZE)
            .map(|i| json!({"Id": format!("{:05}", i), "Name": "x"}))
            .collect();
        let service = FakeTableService::new()
            .with_page(FetchResponse::new(full))
            .with_page(FetchResponse::new(vec![json!({"Id": "last", "Name": "y"})]));

        let dir = tempfile::tempdir().unwrap();
        let path = export_csv(&service, "IsClosed = false", QUERY, dir.path())
            .await
            .unwrap();

        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("Opportunity-export-"));
        assert!(name.ends_with(".csv"));

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), EXPORT_PAGE_SIZE + 2);
        assert!(text.ends_with("last,y,N/A\n"));

        let requests = service.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].query_string.ends_with(" LIMIT 2000 OFFSET 0"));
        assert!(requests[1].query_string.ends_with(" LIMIT 2000 OFFSET 2000"));
        assert_eq!(requests[1].object_type, "Opportunity");
        assert_eq!(requests[1].filter, "IsClosed = false");
    }

    #[tokio::test]
    async fn test_export_fetch_error() {
        let service = FakeTableService::new().with_error(FetchError::new(500, "boom"));
        let dir = tempfile::tempdir().unwrap();
        let err = export_csv(&service, "", QUERY, dir.path()).await.unwrap_err();
        assert!(matches!(err, ExportError::Fetch(_)));
    }
}
