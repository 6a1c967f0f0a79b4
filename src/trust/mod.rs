//! Requester trust score: email category, requested domain and stated
//! purpose through fitted encoders into a decision-tree ensemble.

pub mod features;
pub mod model;

use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};
use crate::level::{Level, TrustScore};

pub use features::{EmailCategory, TrustFeatures};
pub use model::{CategoryEncoder, DecisionForest, TrustModelArtifact};

/// Score used whenever prediction fails
pub const DEFAULT_TRUST_SCORE: TrustScore = Level::Low;

#[derive(Debug, Clone)]
pub struct TrustClassifier {
    personal_providers: Vec<String>,
    email_encoder: CategoryEncoder,
    domain_encoder: CategoryEncoder,
    purpose_encoder: CategoryEncoder,
    forest: DecisionForest,
}

impl TrustClassifier {
    pub fn from_artifact(artifact: TrustModelArtifact) -> Result<Self> {
        let classifier = Self {
            email_encoder: CategoryEncoder::new("email_type", artifact.encoders.email_type)?,
            domain_encoder: CategoryEncoder::new("domain", artifact.encoders.domain)?,
            purpose_encoder: CategoryEncoder::new("purpose", artifact.encoders.purpose)?,
            forest: DecisionForest::new(&artifact.classes, artifact.trees)?,
            personal_providers: artifact.personal_providers,
        };

        for category in [EmailCategory::Personal, EmailCategory::Organisational] {
            if classifier.email_encoder.encode(category.as_str()).is_err() {
                warn!("Trust model was never fitted on email category {}", category);
            }
        }
        Ok(classifier)
    }

    /// Loads and validates a JSON model artifact
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            PipelineError::Configuration(format!(
                "cannot read trust model {}: {}",
                path.display(),
                e
            ))
        })?;
        let artifact: TrustModelArtifact = serde_json::from_str(&raw).map_err(|e| {
            PipelineError::Configuration(format!("malformed trust model {}: {}", path.display(), e))
        })?;
        let classifier = Self::from_artifact(artifact)?;
        info!(
            "Loaded trust model with {} trees from {}",
            classifier.forest.tree_count(),
            path.display()
        );
        Ok(classifier)
    }

    pub fn features(&self, email: &str, domain: &str, purpose: &str) -> TrustFeatures {
        TrustFeatures::derive(email, domain, purpose, &self.personal_providers)
    }

    /// Predicts the requester's trust score.
    ///
    /// Fails with `UnseenCategory` when any feature value was not part of
    /// the training data.
    pub fn predict_trust(&self, email: &str, domain: &str, purpose: &str) -> Result<TrustScore> {
        let features = self.features(email, domain, purpose);
        let x = [
            self.email_encoder.encode(features.email_category.as_str())? as f64,
            self.domain_encoder.encode(&features.domain)? as f64,
            self.purpose_encoder.encode(&features.purpose)? as f64,
        ];
        let score = self.forest.predict(&x);
        debug!("Trust features {:?} encoded as {:?} -> {}", features, x, score);
        Ok(score)
    }

    /// [`predict_trust`](Self::predict_trust) with the documented default.
    /// Returns a warning message alongside the default when prediction fails.
    pub fn predict_or_default(
        &self,
        email: &str,
        domain: &str,
        purpose: &str,
    ) -> (TrustScore, Option<String>) {
        match self.predict_trust(email, domain, purpose) {
            Ok(score) => (score, None),
            Err(e) => {
                warn!("Trust prediction failed, defaulting to {}: {}", DEFAULT_TRUST_SCORE, e);
                (
                    DEFAULT_TRUST_SCORE,
                    Some(format!(
                        "trust score defaulted to {}: {}",
                        DEFAULT_TRUST_SCORE, e
                    )),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trust::model::{EncoderArtifact, TreeArtifact, TreeNode};

    /// Personal addresses score Low; organisational ones score High for
    /// Research and Moderate otherwise.
    pub(crate) fn sample_artifact() -> TrustModelArtifact {
        TrustModelArtifact {
            personal_providers: vec!["gmail.com".into(), "yahoo.com".into(), "hotmail.com".into()],
            encoders: EncoderArtifact {
                email_type: vec!["Organisational".into(), "Personal".into()],
                domain: vec!["Finance".into(), "Healthcare".into()],
                purpose: vec!["Marketing".into(), "Research".into()],
            },
            classes: vec![0, 1, 2],
            trees: vec![TreeArtifact {
                nodes: vec![
                    TreeNode::Split {
                        feature: 0,
                        threshold: 0.5,
                        left: 1,
                        right: 4,
                    },
                    TreeNode::Split {
                        feature: 2,
                        threshold: 0.5,
                        left: 2,
                        right: 3,
                    },
                    TreeNode::Leaf {
                        value: vec![0.0, 6.0, 1.0],
                    },
                    TreeNode::Leaf {
                        value: vec![0.0, 1.0, 6.0],
                    },
                    TreeNode::Leaf {
                        value: vec![9.0, 0.0, 0.0],
                    },
                ],
            }],
        }
    }

    #[test]
    fn test_predict_trust() {
        let classifier = TrustClassifier::from_artifact(sample_artifact()).unwrap();
        assert_eq!(
            classifier.predict_trust("lead@clinic.org", "Healthcare", "Research").unwrap(),
            Level::High
        );
        assert_eq!(
            classifier.predict_trust("lead@clinic.org", "Finance", "Marketing").unwrap(),
            Level::Moderate
        );
        assert_eq!(
            classifier.predict_trust("someone@gmail.com", "Healthcare", "Research").unwrap(),
            Level::Low
        );
    }

    #[test]
    fn test_unseen_domain_defaults_to_low() {
        let classifier = TrustClassifier::from_artifact(sample_artifact()).unwrap();
        assert!(matches!(
            classifier.predict_trust("lead@clinic.org", "Aerospace", "Research"),
            Err(PipelineError::UnseenCategory { .. })
        ));

        let (score, warning) = classifier.predict_or_default("lead@clinic.org", "Aerospace", "Research");
        assert_eq!(score, Level::Low);
        assert!(warning.unwrap().contains("Aerospace"));
    }

    #[test]
    fn test_load_from_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        fs::write(file.path(), serde_json::to_string(&sample_artifact()).unwrap()).unwrap();
        let classifier = TrustClassifier::load(file.path()).unwrap();
        assert_eq!(
            classifier.predict_trust("lead@clinic.org", "Healthcare", "Research").unwrap(),
            Level::High
        );
    }

    #[test]
    fn test_load_rejects_garbage() {
        let file = tempfile::NamedTempFile::new().unwrap();
        fs::write(file.path(), "{\"classes\": []}").unwrap();
        assert!(matches!(
            TrustClassifier::load(file.path()),
            Err(PipelineError::Configuration(_))
        ));
    }
}
