pub mod classifier;
pub mod vote;

use serde::Serialize;
use std::fmt;

use crate::source::AttributeValue;

pub use classifier::LabelClassifier;
pub use vote::majority_vote;

/// Sentinel label used when classification fails
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Which reference label set a classifier consults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelKind {
    Domain,
    Owner,
}

impl fmt::Display for LabelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelKind::Domain => f.write_str("domain"),
            LabelKind::Owner => f.write_str("owner"),
        }
    }
}

/// Majority label plus the neighbor labels it was voted from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub label: String,
    pub neighbor_labels: Vec<String>,
}

impl Classification {
    pub fn unknown() -> Self {
        Self {
            label: UNKNOWN_LABEL.to_string(),
            neighbor_labels: Vec::new(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.label == UNKNOWN_LABEL
    }
}

/// Classification of a single attribute value
#[derive(Debug, Clone, Serialize)]
pub struct ClassificationResult {
    pub value: AttributeValue,
    pub matched_label: String,
    pub neighbor_labels: Vec<String>,
}

impl ClassificationResult {
    pub fn new(value: AttributeValue, classification: Classification) -> Self {
        Self {
            value,
            matched_label: classification.label,
            neighbor_labels: classification.neighbor_labels,
        }
    }
}
