//! Read-only collaborators built once at startup and shared by every request.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Settings;
use crate::data_classifier::{LabelClassifier, LabelKind};
use crate::embedding::{EmbeddingProvider, HttpEmbeddingClient};
use crate::engine::AnonymizationEngine;
use crate::error::{PipelineError, Result};
use crate::index::artifact::load_index;
use crate::index::VectorLabelIndex;
use crate::sensitivity::PolicyTable;
use crate::source::{CsvDirectorySource, DataSource, MetadataLookup, MetadataRegistry};
use crate::trust::TrustClassifier;

pub struct Services {
    pub domain_classifier: LabelClassifier,
    pub owner_classifier: LabelClassifier,
    pub trust: TrustClassifier,
    pub policy: PolicyTable,
    pub engine: AnonymizationEngine,
    pub data_source: Arc<dyn DataSource>,
    pub metadata: Arc<dyn MetadataLookup>,
}

impl Services {
    /// Loads every artifact named in `settings` and connects to the
    /// configured embedding endpoint. Any failure is a configuration error.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let embedding = &settings.embedding;
        let embedder = HttpEmbeddingClient::new(
            &embedding.endpoint,
            &embedding.model,
            embedding.dimension,
            Duration::from_secs(embedding.timeout_secs),
            embedding.api_key.clone(),
        )?;
        Self::with_embedder(settings, Arc::new(embedder))
    }

    /// Same as [`from_settings`](Self::from_settings) with a caller-supplied
    /// embedding provider.
    pub fn with_embedder(settings: &Settings, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        settings.validate()?;

        let domain_index = Arc::new(load_index(&settings.index.domain_path, "domain")?);
        if domain_index.is_empty() {
            return Err(PipelineError::Configuration(format!(
                "domain index {} has no entries",
                settings.index.domain_path.display()
            )));
        }
        let owner_index = match &settings.index.owner_path {
            Some(path) => Arc::new(load_index(path, "owner")?),
            None => {
                warn!("No owner index configured; owner labels will be Unknown");
                Arc::new(VectorLabelIndex::new("owner", embedder.dimension()))
            }
        };

        let k = settings.index.k;
        let domain_classifier =
            LabelClassifier::new(LabelKind::Domain, embedder.clone(), domain_index, k)?;
        let owner_classifier = LabelClassifier::new(LabelKind::Owner, embedder, owner_index, k)?;

        let trust = TrustClassifier::load(&settings.trust.model_path)?;
        let policy = PolicyTable::load_csv(&settings.policy.path, settings.policy.default_level)?;
        let engine = AnonymizationEngine::new(settings.engine_config())?;

        let data_source: Arc<dyn DataSource> =
            Arc::new(CsvDirectorySource::new(settings.sources.data_dir.clone()));
        let metadata: Arc<dyn MetadataLookup> = match &settings.sources.metadata_path {
            Some(path) => Arc::new(MetadataRegistry::load_csv(path)?),
            None => {
                warn!("No source registry configured; metadata will read as not found");
                Arc::new(MetadataRegistry::new())
            }
        };

        let services = Self {
            domain_classifier,
            owner_classifier,
            trust,
            policy,
            engine,
            data_source,
            metadata,
        };
        info!(
            "Services ready: {} domain refs, {} owner refs, {} policy rows, k={}",
            services.domain_classifier.index().len(),
            services.owner_classifier.index().len(),
            services.policy.len(),
            k
        );
        Ok(services)
    }

    pub fn close(&self) {
        info!("Releasing pipeline services");
    }
}
