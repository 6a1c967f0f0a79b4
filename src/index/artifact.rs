use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::error::{PipelineError, Result};
use crate::index::{ReferenceLabelEntry, VectorLabelIndex};

/// On-disk form of a label index produced by the offline build
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexArtifact {
    /// Embedding model the vectors were produced with
    #[serde(default)]
    pub model: Option<String>,
    pub dimension: usize,
    pub entries: Vec<ArtifactEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub text: String,
    pub label: String,
    pub vector: Vec<f32>,
}

impl IndexArtifact {
    pub fn into_index(self, name: &str) -> Result<VectorLabelIndex> {
        if self.dimension == 0 {
            return Err(PipelineError::Configuration(format!(
                "index '{}' declares zero dimensions",
                name
            )));
        }
        let mut index = VectorLabelIndex::new(name, self.dimension);
        for entry in self.entries {
            index.insert(
                ReferenceLabelEntry {
                    text: entry.text,
                    label: entry.label,
                },
                entry.vector,
            )?;
        }
        Ok(index)
    }
}

/// Loads and validates an index artifact from a JSON file
pub fn load_index(path: &Path, name: &str) -> Result<VectorLabelIndex> {
    let raw = fs::read_to_string(path).map_err(|e| {
        PipelineError::Configuration(format!(
            "cannot read {} index {}: {}",
            name,
            path.display(),
            e
        ))
    })?;
    let artifact: IndexArtifact = serde_json::from_str(&raw).map_err(|e| {
        PipelineError::Configuration(format!(
            "malformed {} index {}: {}",
            name,
            path.display(),
            e
        ))
    })?;
    let model = artifact.model.clone();
    let index = artifact.into_index(name)?;

    if index.is_empty() {
        warn!("{} index {} has no entries", name, path.display());
    }
    info!(
        "Loaded {} index with {} entries ({} dims, model {:?}) from {}",
        name,
        index.len(),
        index.dimension(),
        model,
        path.display()
    );
    Ok(index)
}
