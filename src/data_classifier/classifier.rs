use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::data_classifier::{majority_vote, Classification, LabelKind};
use crate::embedding::EmbeddingProvider;
use crate::error::{PipelineError, Result};
use crate::index::VectorLabelIndex;

/// Default number of neighbors consulted per vote
pub const DEFAULT_K: usize = 5;

/// Nearest-neighbor majority-vote classifier over one reference label set.
///
/// Stateless apart from the shared read-only embedder and index; safe to call
/// concurrently.
#[derive(Clone)]
pub struct LabelClassifier {
    kind: LabelKind,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<VectorLabelIndex>,
    k: usize,
}

impl LabelClassifier {
    /// Fails if the index and the embedder disagree on dimensionality.
    pub fn new(
        kind: LabelKind,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<VectorLabelIndex>,
        k: usize,
    ) -> Result<Self> {
        if embedder.dimension() != index.dimension() {
            return Err(PipelineError::Configuration(format!(
                "{} index '{}' has {} dimensions but embedding model {} produces {}",
                kind,
                index.name(),
                index.dimension(),
                embedder.model(),
                embedder.dimension()
            )));
        }
        if k == 0 {
            return Err(PipelineError::Configuration(
                "neighbor count k must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            kind,
            embedder,
            index,
            k,
        })
    }

    pub fn kind(&self) -> LabelKind {
        self.kind
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn index(&self) -> &VectorLabelIndex {
        &self.index
    }

    /// Classifies `text` by majority vote over its `k` nearest references.
    #[instrument(skip(self), fields(kind = %self.kind))]
    pub async fn classify(&self, text: &str, k: usize) -> Result<Classification> {
        if self.index.is_empty() {
            return Err(PipelineError::IndexUnavailable(format!(
                "{} index '{}' has no entries",
                self.kind,
                self.index.name()
            )));
        }

        let vector = self.embedder.embed(text).await?;
        let neighbors = self.index.search(&vector, k.max(1))?;
        let neighbor_labels: Vec<String> = neighbors.into_iter().map(|n| n.label).collect();

        let label = majority_vote(&neighbor_labels)
            .map(str::to_string)
            .ok_or_else(|| {
                PipelineError::IndexUnavailable(format!("{} search returned no neighbors", self.kind))
            })?;

        debug!("Classified as {} from {:?}", label, neighbor_labels);
        Ok(Classification {
            label,
            neighbor_labels,
        })
    }

    /// Like [`classify`](Self::classify) with the configured `k`, falling back
    /// to the `Unknown` label. The failure, if any, is handed back for reporting.
    pub async fn classify_or_unknown(&self, text: &str) -> (Classification, Option<PipelineError>) {
        match self.classify(text, self.k).await {
            Ok(classification) => (classification, None),
            Err(e) => {
                warn!("{} classification fell back to Unknown: {}", self.kind, e);
                (Classification::unknown(), Some(e))
            }
        }
    }
}
