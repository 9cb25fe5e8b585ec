//! Tabula - table definition inspector.
//!
//! Loads a table definition, normalizes its field registry and prints the
//! query a full reload would send, followed by the rendered columns.
//!
//! Usage: `tabula [definition.toml]`. Without an argument the definition is
//! read from `<config dir>/tabula/table.toml`.

use std::path::PathBuf;

use tabula_core::{default_definition_path, TableDefinition};
use tabula_engine::{columns, fields, QueryState};

// =============================================================================
// Configuration
// =============================================================================

fn definition_path() -> Result<PathBuf, String> {
    match std::env::args_os().nth(1) {
        Some(arg) => Ok(PathBuf::from(arg)),
        None => default_definition_path().map_err(|e| e.to_string()),
    }
}

// =============================================================================
// Report
// =============================================================================

/// Render the initial query and the column list for a definition.
fn report(definition: &TableDefinition) -> Result<String, String> {
    let registry = fields::normalize(&definition.fields, definition.config.editable)
        .map_err(|e| format!("Invalid fields: {}", e))?;
    tracing::info!("Normalized {} fields", registry.len());

    let query = QueryState {
        filter: definition.filter.clone(),
        search: definition.search.clone(),
        sort_direction: definition.sort_direction,
        ..QueryState::new(
            definition.object_type.clone(),
            registry,
            definition.sort_field.clone(),
            definition.config.paging,
        )
    };

    let initial = query
        .build_initial(None)
        .map_err(|e| format!("Cannot build query: {}", e))?;
    let columns = columns::columns(&query.fields, None);
    let columns = serde_json::to_string_pretty(&columns)
        .map_err(|e| format!("Cannot render columns: {}", e))?;

    Ok(format!("{}\n\n{}", initial, columns))
}

fn run() -> Result<(), String> {
    let path = definition_path()?;
    tracing::info!("Loading table definition from: {}", path.display());

    let definition = TableDefinition::load(&path).map_err(|e| e.to_string())?;
    println!("{}", report(&definition)?);
    Ok(())
}

// =============================================================================
// Entry Point
// =============================================================================

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    if let Err(e) = run() {
        tracing::error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report() {
        let definition = TableDefinition::from_toml_str(
            r#"
            object_type = "Opportunity"
            fields = "Name,Amount"
            sort_field = "Amount"
            sort_direction = "DESC"

            [paging]
            records_per_batch = 25
            "#,
        )
        .unwrap();

        let report = report(&definition).unwrap();
        assert!(report.starts_with(
            "SELECT Id,Name,Amount FROM Opportunity ORDER BY Amount desc nulls last LIMIT 25\n"
        ));
        assert!(report.contains("\"fieldName\": \"Amount\""));
    }

    #[test]
    fn test_report_requires_sort_field() {
        let definition = TableDefinition::from_toml_str(
            r#"
            object_type = "Opportunity"
            fields = "Name"
            "#,
        )
        .unwrap();

        let err = report(&definition).unwrap_err();
        assert!(err.contains("Sort field is required"));
    }
}
