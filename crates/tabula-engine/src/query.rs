//! Query State and Query Builder
//!
//! `QueryState` holds every input that determines the generated query:
//! fields, object type, filter, search, sort and paging. State changes go
//! through explicit transitions that return the next state plus a `dirty`
//! flag. A dirty transition resets the offset to 0 and means the held rows
//! are stale and need a full reload.
//!
//! ## Query Shape
//!
//! ```text
//! SELECT [Id,]<fields> FROM <object>[ WHERE <filter>[ AND (<search>)]]
//!  ORDER BY <sort> <asc nulls first|desc nulls last> LIMIT <n>[ OFFSET <offset>]
//! ```

use tabula_core::{
    FieldDescriptor, ObjectInfo, PagingConfig, RecordId, SortDirection, ValidationError, ID_FIELD,
};

/// Everything that determines the generated query.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryState {
    pub fields: Vec<FieldDescriptor>,
    pub object_type: String,
    pub filter: String,
    pub search: String,
    pub sort_field: String,
    pub sort_direction: SortDirection,
    /// Rows already loaded; the OFFSET of the next incremental page.
    pub offset: usize,
    pub paging: PagingConfig,
}

/// Result of a state transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: QueryState,
    /// True when the transition invalidated the loaded rows.
    pub dirty: bool,
}

impl QueryState {
    /// Create a state with ascending sort and offset 0.
    pub fn new(
        object_type: impl Into<String>,
        fields: Vec<FieldDescriptor>,
        sort_field: impl Into<String>,
        paging: PagingConfig,
    ) -> Self {
        Self {
            fields,
            object_type: object_type.into(),
            sort_field: sort_field.into(),
            paging,
            ..Self::default()
        }
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    fn transition(&self, changed: bool, apply: impl FnOnce(&mut QueryState)) -> Transition {
        let mut state = self.clone();
        if changed {
            apply(&mut state);
            state.offset = 0;
        }
        Transition {
            state,
            dirty: changed,
        }
    }

    pub fn with_object_type(&self, object_type: impl Into<String>) -> Transition {
        let object_type = object_type.into();
        self.transition(object_type != self.object_type, |s| {
            s.object_type = object_type
        })
    }

    pub fn with_filter(&self, filter: impl Into<String>) -> Transition {
        let filter = filter.into();
        self.transition(filter != self.filter, |s| s.filter = filter)
    }

    pub fn with_search(&self, search: impl Into<String>) -> Transition {
        let search = search.into();
        self.transition(search != self.search, |s| s.search = search)
    }

    pub fn with_sort(&self, field: impl Into<String>, direction: SortDirection) -> Transition {
        let field = field.into();
        let changed = field != self.sort_field || direction != self.sort_direction;
        self.transition(changed, |s| {
            s.sort_field = field;
            s.sort_direction = direction;
        })
    }

    pub fn with_fields(&self, fields: Vec<FieldDescriptor>) -> Transition {
        self.transition(fields != self.fields, |s| s.fields = fields)
    }

    // =========================================================================
    // Clauses
    // =========================================================================

    /// `SELECT ... FROM <object>`.
    fn select_from(&self) -> String {
        let has_id = self.fields.iter().any(|f| f.field_name == ID_FIELD);
        let names: Vec<&str> = self.fields.iter().map(|f| f.field_name.as_str()).collect();
        format!(
            "SELECT {}{} FROM {}",
            if has_id { "" } else { "Id," },
            names.join(","),
            self.object_type
        )
    }

    /// The parenthesized search group, if the term and any field qualify.
    pub fn search_clause(&self, metadata: Option<&ObjectInfo>) -> Option<String> {
        if self.search.is_empty() {
            return None;
        }

        let term = self.search.replace('\'', "\\'");
        let clauses: Vec<String> = self
            .fields
            .iter()
            .filter(|f| is_searchable(f, metadata))
            .map(|f| format!("{} LIKE '%{}%'", f.field_name, term))
            .collect();

        if clauses.is_empty() {
            None
        } else {
            Some(format!("({})", clauses.join(" OR ")))
        }
    }

    /// ` WHERE ...`, or empty when neither filter nor search applies.
    pub fn where_clause(&self, metadata: Option<&ObjectInfo>) -> String {
        let mut parts = Vec::new();
        if !self.filter.is_empty() {
            parts.push(self.filter.clone());
        }
        if let Some(search) = self.search_clause(metadata) {
            parts.push(search);
        }

        if parts.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", parts.join(" AND "))
        }
    }

    fn order_by(&self) -> Result<String, ValidationError> {
        if self.sort_field.is_empty() {
            return Err(ValidationError::MissingSortField);
        }
        Ok(format!(
            " ORDER BY {} {}",
            self.sort_field,
            self.sort_direction.order_clause()
        ))
    }

    fn validate(&self) -> Result<String, ValidationError> {
        let order_by = self.order_by()?;
        if self.object_type.is_empty() {
            return Err(ValidationError::MissingObjectType);
        }
        Ok(order_by)
    }

    // =========================================================================
    // Builders
    // =========================================================================

    /// The query without LIMIT, as used for display and export.
    pub fn base_query(&self, metadata: Option<&ObjectInfo>) -> Result<String, ValidationError> {
        let order_by = self.validate()?;
        Ok(format!(
            "{}{}{}",
            self.select_from(),
            self.where_clause(metadata),
            order_by
        ))
    }

    /// Query for a full reload.
    pub fn build_initial(&self, metadata: Option<&ObjectInfo>) -> Result<String, ValidationError> {
        Ok(format!(
            "{} LIMIT {}",
            self.base_query(metadata)?,
            self.paging.initial_limit()
        ))
    }

    /// Query for the incremental page of `limit` rows at the current offset.
    pub fn build_page(
        &self,
        limit: usize,
        metadata: Option<&ObjectInfo>,
    ) -> Result<String, ValidationError> {
        Ok(format!(
            "{} LIMIT {} OFFSET {}",
            self.base_query(metadata)?,
            limit,
            self.offset
        ))
    }

    /// Query for a single row, restricted by the current predicates.
    pub fn row_query(
        &self,
        id: &RecordId,
        metadata: Option<&ObjectInfo>,
    ) -> Result<String, ValidationError> {
        let order_by = self.validate()?;
        let where_clause = self.where_clause(metadata);
        Ok(format!(
            "{}{}{}Id='{}'{}",
            self.select_from(),
            where_clause,
            if where_clause.is_empty() { " WHERE " } else { " AND " },
            id,
            order_by
        ))
    }
}

/// Explicit `searchable` wins; otherwise text-like metadata types qualify.
fn is_searchable(field: &FieldDescriptor, metadata: Option<&ObjectInfo>) -> bool {
    match field.searchable {
        Some(searchable) => searchable,
        None => metadata
            .and_then(|info| info.field(&field.field_name))
            .is_some_and(|info| info.is_text_like()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opportunity() -> QueryState {
        QueryState::new(
            "Opportunity",
            vec![
                FieldDescriptor::new("Id"),
                FieldDescriptor::new("Name"),
                FieldDescriptor::new("Account.Name"),
            ],
            "Name",
            PagingConfig {
                initial_records: Some(20),
                ..PagingConfig::default()
            },
        )
    }

    fn contact_metadata() -> ObjectInfo {
        ObjectInfo::default()
            .with_field("Name", "String", true)
            .with_field("Email", "Email", true)
            .with_field("Phone", "Phone", true)
            .with_field("Amount", "Currency", true)
    }

    #[test]
    fn test_build_initial_exact() {
        insta::assert_snapshot!(
            opportunity().build_initial(None).unwrap(),
            @"SELECT Id,Name,Account.Name FROM Opportunity ORDER BY Name asc nulls first LIMIT 20"
        );
    }

    #[test]
    fn test_id_prepended_when_absent() {
        let state = QueryState::new(
            "Account",
            vec![FieldDescriptor::new("Name"), FieldDescriptor::new("id")],
            "Name",
            PagingConfig::default(),
        );
        insta::assert_snapshot!(
            state.build_initial(None).unwrap(),
            @"SELECT Id,Name,id FROM Account ORDER BY Name asc nulls first LIMIT 50"
        );
    }

    #[test]
    fn test_missing_sort_field_always_fails() {
        let mut state = opportunity();
        state.sort_field.clear();
        assert_eq!(
            state.build_initial(None).unwrap_err(),
            ValidationError::MissingSortField
        );

        state.object_type.clear();
        state.filter = "IsClosed = false".into();
        state.search = "acme".into();
        assert_eq!(
            state.base_query(None).unwrap_err(),
            ValidationError::MissingSortField
        );
        assert_eq!(
            state.build_page(10, None).unwrap_err(),
            ValidationError::MissingSortField
        );
    }

    #[test]
    fn test_missing_object_type_fails() {
        let mut state = opportunity();
        state.object_type.clear();
        assert_eq!(
            state.build_initial(None).unwrap_err(),
            ValidationError::MissingObjectType
        );
    }

    #[test]
    fn test_desc_direction() {
        let state = opportunity()
            .with_sort("Name", SortDirection::parse_lenient("DESC"))
            .state;
        insta::assert_snapshot!(
            state.build_initial(None).unwrap(),
            @"SELECT Id,Name,Account.Name FROM Opportunity ORDER BY Name desc nulls last LIMIT 20"
        );
    }

    #[test]
    fn test_filter_and_search() {
        let state = QueryState {
            fields: vec![
                FieldDescriptor::new("Name"),
                FieldDescriptor {
                    searchable: Some(false),
                    ..FieldDescriptor::new("Email")
                },
                FieldDescriptor::new("Phone"),
                FieldDescriptor::new("Amount"),
                FieldDescriptor {
                    searchable: Some(true),
                    ..FieldDescriptor::new("Title")
                },
            ],
            filter: "AccountId != null".into(),
            search: "test".into(),
            ..QueryState::new("Contact", vec![], "Name", PagingConfig::default())
        };

        let metadata = contact_metadata();
        insta::assert_snapshot!(
            state.build_initial(Some(&metadata)).unwrap(),
            @"SELECT Id,Name,Email,Phone,Amount,Title FROM Contact WHERE AccountId != null AND (Name LIKE '%test%' OR Phone LIKE '%test%' OR Title LIKE '%test%') ORDER BY Name asc nulls first LIMIT 50"
        );

        let clause = state.search_clause(Some(&metadata)).unwrap();
        assert!(!clause.contains("Email"));
        assert!(clause.contains("Name LIKE '%test%'"));
    }

    #[test]
    fn test_search_without_metadata_uses_explicit_flags_only() {
        let state = QueryState {
            search: "acme".into(),
            ..QueryState::new(
                "Account",
                vec![
                    FieldDescriptor::new("Name"),
                    FieldDescriptor {
                        searchable: Some(true),
                        ..FieldDescriptor::new("Site")
                    },
                ],
                "Name",
                PagingConfig::default(),
            )
        };
        assert_eq!(
            state.where_clause(None),
            " WHERE (Site LIKE '%acme%')"
        );
    }

    #[test]
    fn test_search_omitted_when_nothing_qualifies() {
        let state = QueryState {
            search: "acme".into(),
            ..opportunity()
        };
        assert_eq!(state.search_clause(None), None);
        assert_eq!(state.where_clause(None), "");

        let state = QueryState {
            search: String::new(),
            ..opportunity()
        };
        assert_eq!(state.search_clause(Some(&contact_metadata())), None);
    }

    #[test]
    fn test_search_escapes_quotes() {
        let state = QueryState {
            search: "O'Brien's".into(),
            ..QueryState::new(
                "Contact",
                vec![FieldDescriptor::new("Name")],
                "Name",
                PagingConfig::default(),
            )
        };
        assert_eq!(
            state.search_clause(Some(&contact_metadata())).unwrap(),
            r"(Name LIKE '%O\'Brien\'s%')"
        );
    }

    #[test]
    fn test_build_page_uses_offset() {
        let state = QueryState {
            offset: 50,
            filter: "IsClosed = false".into(),
            ..opportunity()
        };
        insta::assert_snapshot!(
            state.build_page(25, None).unwrap(),
            @"SELECT Id,Name,Account.Name FROM Opportunity WHERE IsClosed = false ORDER BY Name asc nulls first LIMIT 25 OFFSET 50"
        );
    }

    #[test]
    fn test_row_query() {
        let state = opportunity();
        insta::assert_snapshot!(
            state.row_query(&"006A".into(), None).unwrap(),
            @"SELECT Id,Name,Account.Name FROM Opportunity WHERE Id='006A' ORDER BY Name asc nulls first"
        );

        let state = QueryState {
            filter: "IsClosed = false".into(),
            ..opportunity()
        };
        insta::assert_snapshot!(
            state.row_query(&"006A".into(), None).unwrap(),
            @"SELECT Id,Name,Account.Name FROM Opportunity WHERE IsClosed = false AND Id='006A' ORDER BY Name asc nulls first"
        );
    }

    #[test]
    fn test_transitions_reset_offset() {
        let state = QueryState {
            offset: 120,
            ..opportunity()
        };

        let t = state.with_filter("IsClosed = true");
        assert!(t.dirty);
        assert_eq!(t.state.offset, 0);
        assert_eq!(t.state.filter, "IsClosed = true");

        let t = state.with_search("acme");
        assert!(t.dirty);
        assert_eq!(t.state.offset, 0);

        let t = state.with_sort("Amount", SortDirection::Desc);
        assert!(t.dirty);
        assert_eq!(t.state.sort_field, "Amount");

        let t = state.with_object_type("Account");
        assert!(t.dirty);

        let t = state.with_fields(vec![FieldDescriptor::new("Name")]);
        assert!(t.dirty);
        assert_eq!(t.state.fields.len(), 1);
    }

    #[test]
    fn test_unchanged_transition_is_clean() {
        let state = QueryState {
            offset: 120,
            ..opportunity()
        };

        let t = state.with_filter("");
        assert!(!t.dirty);
        assert_eq!(t.state, state);

        let t = state.with_sort("Name", SortDirection::Asc);
        assert!(!t.dirty);
        assert_eq!(t.state.offset, 120);
    }

    #[test]
    fn test_duplicate_fields_pass_through() {
        let state = QueryState::new(
            "Account",
            vec![FieldDescriptor::new("Name"), FieldDescriptor::new("Name")],
            "Name",
            PagingConfig::default(),
        );
        assert!(state
            .base_query(None)
            .unwrap()
            .starts_with("SELECT Id,Name,Name FROM Account"));
    }
}
