use csv::{ReaderBuilder, Trim};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::source::{MetadataLookup, SourceMetadata};

/// In-memory registry of ingested sources: filename -> (about, domain)
#[derive(Debug, Clone, Default)]
pub struct MetadataRegistry {
    sources: HashMap<String, SourceMetadata>,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: impl Into<String>, metadata: SourceMetadata) {
        self.sources.insert(source.into(), metadata);
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Loads `filename,about,domain` rows. The first row for a filename wins.
    pub fn load_csv(path: &Path) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .trim(Trim::All)
            .from_path(path)
            .map_err(|e| {
                PipelineError::Configuration(format!(
                    "cannot read source registry {}: {}",
                    path.display(),
                    e
                ))
            })?;

        let headers = reader
            .headers()
            .map_err(|e| PipelineError::Configuration(format!("source registry header: {}", e)))?
            .clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case(name))
                .ok_or_else(|| {
                    PipelineError::Configuration(format!(
                        "source registry {} has no '{}' column",
                        path.display(),
                        name
                    ))
                })
        };
        let (file_col, about_col, domain_col) =
            (column("filename")?, column("about")?, column("domain")?);

        let mut registry = Self::new();
        for record in reader.records() {
            let record = record
                .map_err(|e| PipelineError::Configuration(format!("source registry row: {}", e)))?;
            let Some(filename) = record.get(file_col).filter(|s| !s.is_empty()) else {
                continue;
            };
            if registry.sources.contains_key(filename) {
                continue;
            }
            let about = record.get(about_col).unwrap_or_default();
            let domain = record.get(domain_col).unwrap_or_default();
            registry.insert(
                filename,
                SourceMetadata {
                    about: about.to_string(),
                    domain: domain.to_string(),
                },
            );
        }
        info!("Loaded {} registered sources from {}", registry.len(), path.display());
        Ok(registry)
    }
}

impl MetadataLookup for MetadataRegistry {
    fn lookup(&self, source: &str) -> Option<SourceMetadata> {
        self.sources.get(source).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_load_registry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sources.csv");
        fs::write(
            &path,
            "id,name,email,about,domain,filename\n\
             1,Ann,ann@clinic.org,Hospital,Healthcare,Healthcare_patients.csv\n\
             2,Ann,ann@clinic.org,Other,Finance,Healthcare_patients.csv\n",
        )
        .unwrap();

        let registry = MetadataRegistry::load_csv(&path).unwrap();
        assert_eq!(registry.len(), 1);
        let meta = registry.lookup("Healthcare_patients.csv").unwrap();
        assert_eq!(meta.about, "Hospital");
        assert_eq!(meta.domain, "Healthcare");
        assert!(registry.lookup("other.csv").is_none());
    }

    #[test]
    fn test_missing_column_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sources.csv");
        fs::write(&path, "filename,domain\na.csv,Finance\n").unwrap();
        assert!(MetadataRegistry::load_csv(&path).is_err());
    }
}
