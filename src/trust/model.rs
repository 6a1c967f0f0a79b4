use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::level::Level;
use crate::trust::features::DEFAULT_PERSONAL_PROVIDERS;

/// Number of engineered features: email category, domain, purpose
pub const FEATURE_COUNT: usize = 3;

/// Offline-trained trust model as written by the training job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustModelArtifact {
    #[serde(default = "default_providers")]
    pub personal_providers: Vec<String>,
    pub encoders: EncoderArtifact,
    /// Ordinal code of each class column in the leaf distributions
    pub classes: Vec<u8>,
    pub trees: Vec<TreeArtifact>,
}

fn default_providers() -> Vec<String> {
    DEFAULT_PERSONAL_PROVIDERS.iter().map(|s| s.to_string()).collect()
}

/// Fitted class lists; a category's code is its position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderArtifact {
    pub email_type: Vec<String>,
    pub domain: Vec<String>,
    pub purpose: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeArtifact {
    pub nodes: Vec<TreeNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: Vec<f64>,
    },
}

/// Maps a categorical value to the code it was given at training time
#[derive(Debug, Clone)]
pub struct CategoryEncoder {
    feature: String,
    classes: Vec<String>,
}

impl CategoryEncoder {
    pub fn new(feature: impl Into<String>, classes: Vec<String>) -> Result<Self> {
        let feature = feature.into();
        if classes.is_empty() {
            return Err(PipelineError::Configuration(format!(
                "trust encoder '{}' has no categories",
                feature
            )));
        }
        Ok(Self { feature, classes })
    }

    /// Exact-match lookup. Never refits and never coerces unseen values.
    pub fn encode(&self, value: &str) -> Result<usize> {
        self.classes
            .iter()
            .position(|c| c == value)
            .ok_or_else(|| PipelineError::UnseenCategory {
                feature: self.feature.clone(),
                value: value.to_string(),
            })
    }
}

/// A validated decision tree; children always follow their parent
#[derive(Debug, Clone)]
struct DecisionTree {
    nodes: Vec<TreeNode>,
}

impl DecisionTree {
    fn new(nodes: Vec<TreeNode>, class_count: usize, tree: usize) -> Result<Self> {
        let invalid = |reason: String| {
            PipelineError::Configuration(format!("trust model tree {}: {}", tree, reason))
        };
        if nodes.is_empty() {
            return Err(invalid("no nodes".to_string()));
        }
        for (idx, node) in nodes.iter().enumerate() {
            match node {
                TreeNode::Split {
                    feature,
                    left,
                    right,
                    ..
                } => {
                    if *feature >= FEATURE_COUNT {
                        return Err(invalid(format!("node {} splits on feature {}", idx, feature)));
                    }
                    for child in [left, right] {
                        if *child <= idx || *child >= nodes.len() {
                            return Err(invalid(format!(
                                "node {} points at invalid child {}",
                                idx, child
                            )));
                        }
                    }
                }
                TreeNode::Leaf { value } => {
                    if value.len() != class_count {
                        return Err(invalid(format!(
                            "leaf {} has {} weights for {} classes",
                            idx,
                            value.len(),
                            class_count
                        )));
                    }
                    if value.iter().any(|w| !w.is_finite() || *w < 0.0) {
                        return Err(invalid(format!("leaf {} has a negative or non-finite weight", idx)));
                    }
                }
            }
        }
        Ok(Self { nodes })
    }

    /// Class distribution of the leaf `x` falls into, normalized to sum 1
    fn predict_proba(&self, x: &[f64; FEATURE_COUNT]) -> Vec<f64> {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if x[*feature] <= *threshold { *left } else { *right };
                }
                TreeNode::Leaf { value } => {
                    let total: f64 = value.iter().sum();
                    if total > 0.0 {
                        return value.iter().map(|w| w / total).collect();
                    }
                    return vec![0.0; value.len()];
                }
            }
        }
    }
}

/// Decision-tree ensemble with soft voting
#[derive(Debug, Clone)]
pub struct DecisionForest {
    classes: Vec<Level>,
    trees: Vec<DecisionTree>,
}

impl DecisionForest {
    pub fn new(classes: &[u8], trees: Vec<TreeArtifact>) -> Result<Self> {
        if classes.is_empty() {
            return Err(PipelineError::Configuration("trust model has no classes".to_string()));
        }
        let classes = classes
            .iter()
            .map(|code| {
                Level::from_ordinal(*code).ok_or_else(|| {
                    PipelineError::Configuration(format!("trust model class code {} has no level", code))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        if trees.is_empty() {
            return Err(PipelineError::Configuration("trust model has no trees".to_string()));
        }
        let trees = trees
            .into_iter()
            .enumerate()
            .map(|(i, t)| DecisionTree::new(t.nodes, classes.len(), i))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { classes, trees })
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    /// Averages tree distributions and returns the first most probable class.
    pub fn predict(&self, x: &[f64; FEATURE_COUNT]) -> Level {
        let mut totals = vec![0.0; self.classes.len()];
        for tree in &self.trees {
            for (total, p) in totals.iter_mut().zip(tree.predict_proba(x)) {
                *total += p;
            }
        }

        let mut best = 0;
        for (i, total) in totals.iter().enumerate() {
            if *total > totals[best] {
                best = i;
            }
        }
        self.classes[best]
    }
}
