//! Collaborators that supply rows and per-source metadata.

pub mod csv_source;
pub mod registry;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::Result;

pub use csv_source::CsvDirectorySource;
pub use registry::MetadataRegistry;

/// Shown when a source has no registered owner/about text
pub const ABOUT_NOT_FOUND: &str = "Not found";
/// Shown when a source has no registered domain
pub const DOMAIN_UNKNOWN: &str = "Unknown";

/// One distinct value of a requested attribute
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeValue {
    pub attribute_name: String,
    pub raw_value: String,
}

impl AttributeValue {
    pub fn new(attribute_name: impl Into<String>, raw_value: impl Into<String>) -> Self {
        Self {
            attribute_name: attribute_name.into(),
            raw_value: raw_value.into(),
        }
    }
}

/// Owner/about and domain strings registered for a source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMetadata {
    pub about: String,
    pub domain: String,
}

impl SourceMetadata {
    pub fn not_found() -> Self {
        Self {
            about: ABOUT_NOT_FOUND.to_string(),
            domain: DOMAIN_UNKNOWN.to_string(),
        }
    }
}

/// Header plus rows of optional (null) cells
#[derive(Debug, Clone, Default)]
pub struct RowSet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl RowSet {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self { headers, rows }
    }

    pub fn column(&self, attribute: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == attribute)
    }

    /// Distinct non-null values of `attribute` in first-seen order, or `None`
    /// when the attribute is not a column of this row set.
    pub fn distinct_values(&self, attribute: &str) -> Option<Vec<String>> {
        let col = self.column(attribute)?;
        let mut seen: HashSet<&str> = HashSet::new();
        let mut values = Vec::new();
        for row in &self.rows {
            if let Some(Some(cell)) = row.get(col) {
                if seen.insert(cell.as_str()) {
                    values.push(cell.clone());
                }
            }
        }
        Some(values)
    }
}

/// Supplies the rows of a named data source
pub trait DataSource: Send + Sync {
    fn load_rows(&self, source: &str) -> Result<RowSet>;
}

/// Looks up the metadata registered for a named data source
pub trait MetadataLookup: Send + Sync {
    fn lookup(&self, source: &str) -> Option<SourceMetadata>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinct_values_skip_nulls_keep_order() {
        let rows = RowSet::new(
            vec!["name".into(), "blood_type".into()],
            vec![
                vec![Some("Ann".into()), Some("O+".into())],
                vec![Some("Bob".into()), None],
                vec![Some("Cy".into()), Some("A-".into())],
                vec![Some("Di".into()), Some("O+".into())],
            ],
        );
        assert_eq!(rows.distinct_values("blood_type"), Some(vec!["O+".to_string(), "A-".to_string()]));
        assert_eq!(rows.distinct_values("missing"), None);
    }

    #[test]
    fn test_distinct_values_large_column() {
        let n = 50_000;
        let rows: Vec<Vec<Option<String>>> = (0..n)
            .chain(0..n)
            .map(|i| vec![Some(format!("user-{:08}", n - i))])
            .collect();
        let rows = RowSet::new(vec!["id".into()], rows);

        let distinct = rows.distinct_values("id").unwrap();
        assert_eq!(distinct.len(), n);
        assert_eq!(distinct[0], format!("user-{:08}", n));
        assert_eq!(distinct[n - 1], "user-00000001");
        assert!(distinct.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn test_short_rows_are_null() {
        let rows = RowSet::new(
            vec!["a".into(), "b".into()],
            vec![vec![Some("1".into())]],
        );
        assert_eq!(rows.distinct_values("b"), Some(vec![]));
    }
}
