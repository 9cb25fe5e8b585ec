//! Sort direction.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of the ORDER BY clause.
///
/// Parsing is lenient: `desc` in any case is descending, anything else is
/// ascending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn parse_lenient(s: &str) -> Self {
        if s.eq_ignore_ascii_case("desc") {
            Self::Desc
        } else {
            Self::Asc
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    /// Direction with its null ordering, as used in ORDER BY.
    pub fn order_clause(&self) -> &'static str {
        match self {
            Self::Asc => "asc nulls first",
            Self::Desc => "desc nulls last",
        }
    }
}

impl From<&str> for SortDirection {
    fn from(s: &str) -> Self {
        Self::parse_lenient(s)
    }
}

impl From<String> for SortDirection {
    fn from(s: String) -> Self {
        Self::parse_lenient(&s)
    }
}

impl From<SortDirection> for String {
    fn from(direction: SortDirection) -> Self {
        direction.as_str().to_string()
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lenient() {
        assert_eq!(SortDirection::parse_lenient("DESC"), SortDirection::Desc);
        assert_eq!(SortDirection::parse_lenient("desc"), SortDirection::Desc);
        assert_eq!(SortDirection::parse_lenient("asc"), SortDirection::Asc);
        assert_eq!(SortDirection::parse_lenient("sideways"), SortDirection::Asc);
        assert_eq!(SortDirection::parse_lenient(""), SortDirection::Asc);
    }

    #[test]
    fn test_order_clause() {
        assert_eq!(SortDirection::Asc.order_clause(), "asc nulls first");
        assert_eq!(SortDirection::Desc.order_clause(), "desc nulls last");
    }
}
