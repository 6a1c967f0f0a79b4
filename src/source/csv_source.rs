use csv::{ReaderBuilder, Trim};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::source::{DataSource, RowSet};

/// Reads uploaded CSV files from a single directory
#[derive(Debug, Clone)]
pub struct CsvDirectorySource {
    root: PathBuf,
}

impl CsvDirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a source name to a file directly inside the root.
    fn resolve(&self, source: &str) -> Result<PathBuf> {
        let name = Path::new(source);
        let mut components = name.components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => {}
            _ => {
                return Err(PipelineError::SourceUnavailable(format!(
                    "invalid source name '{}'",
                    source
                )))
            }
        }
        let path = self.root.join(name);
        if !path.is_file() {
            return Err(PipelineError::SourceUnavailable(format!(
                "source '{}' not found",
                source
            )));
        }
        Ok(path)
    }
}

impl DataSource for CsvDirectorySource {
    fn load_rows(&self, source: &str) -> Result<RowSet> {
        let path = self.resolve(source)?;
        debug!("Reading data source {}", path.display());

        let mut reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_path(&path)
            .map_err(|e| PipelineError::SourceUnavailable(format!("{}: {}", source, e)))?;

        let headers = reader
            .headers()
            .map_err(|e| PipelineError::SourceUnavailable(format!("{}: {}", source, e)))?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record =
                record.map_err(|e| PipelineError::SourceUnavailable(format!("{}: {}", source, e)))?;
            rows.push(
                record
                    .iter()
                    .map(|cell| (!cell.is_empty()).then(|| cell.to_string()))
                    .collect(),
            );
        }
        Ok(RowSet::new(headers, rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_load_rows() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("Healthcare_patients.csv"),
            "name,blood_type\nAnn, O+ \nBob,\n",
        )
        .unwrap();

        let source = CsvDirectorySource::new(dir.path());
        let rows = source.load_rows("Healthcare_patients.csv").unwrap();
        assert_eq!(rows.headers, vec!["name", "blood_type"]);
        assert_eq!(rows.rows[0][1].as_deref(), Some("O+"));
        assert_eq!(rows.rows[1][1], None);
    }

    #[test]
    fn test_rejects_traversal_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let source = CsvDirectorySource::new(dir.path());
        assert!(matches!(
            source.load_rows("../etc/passwd"),
            Err(PipelineError::SourceUnavailable(_))
        ));
        assert!(matches!(
            source.load_rows("missing.csv"),
            Err(PipelineError::SourceUnavailable(_))
        ));
    }
}
