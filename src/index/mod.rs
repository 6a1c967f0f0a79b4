pub mod artifact;

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::error::{PipelineError, Result};

/// A reference text and the label it carries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceLabelEntry {
    pub text: String,
    pub label: String,
}

/// One search hit
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    /// Position of the entry in the index
    pub position: usize,
    /// Euclidean distance between normalized vectors
    pub distance: f32,
    pub label: String,
}

/// Exact nearest-neighbor index over L2-normalized reference embeddings.
///
/// Built offline and loaded once; searches never mutate it.
#[derive(Debug, Clone)]
pub struct VectorLabelIndex {
    name: String,
    dimension: usize,
    entries: Vec<ReferenceLabelEntry>,
    vectors: Vec<Vec<f32>>,
}

/// Scales `vector` to unit length. Zero vectors are left untouched.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        vector.iter_mut().for_each(|x| *x /= norm);
    }
}

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

impl VectorLabelIndex {
    pub fn new(name: impl Into<String>, dimension: usize) -> Self {
        Self {
            name: name.into(),
            dimension,
            entries: Vec::new(),
            vectors: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `label` is carried by any reference entry
    pub fn has_label(&self, label: &str) -> bool {
        self.entries.iter().any(|e| e.label == label)
    }

    /// Appends an entry; the vector is normalized on the way in.
    pub fn insert(&mut self, entry: ReferenceLabelEntry, mut vector: Vec<f32>) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(PipelineError::Configuration(format!(
                "index '{}' expects {}-dimensional vectors, entry '{}' has {}",
                self.name,
                self.dimension,
                entry.text,
                vector.len()
            )));
        }
        if entry.label.trim().is_empty() {
            return Err(PipelineError::Configuration(format!(
                "index '{}' entry '{}' has an empty label",
                self.name, entry.text
            )));
        }
        l2_normalize(&mut vector);
        self.entries.push(entry);
        self.vectors.push(vector);
        Ok(())
    }

    /// Returns up to `k` nearest entries ordered by distance, then position.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if self.is_empty() {
            return Err(PipelineError::IndexUnavailable(format!(
                "index '{}' has no entries",
                self.name
            )));
        }
        if query.len() != self.dimension {
            return Err(PipelineError::EmbeddingFailure(format!(
                "query has {} dimensions, index '{}' has {}",
                query.len(),
                self.name,
                self.dimension
            )));
        }

        let mut query = query.to_vec();
        l2_normalize(&mut query);

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(pos, v)| (pos, squared_distance(&query, v)))
            .collect();
        scored.sort_by(|a, b| match a.1.total_cmp(&b.1) {
            Ordering::Equal => a.0.cmp(&b.0),
            other => other,
        });

        Ok(scored
            .into_iter()
            .take(k.max(1))
            .map(|(position, d)| Neighbor {
                position,
                distance: d.sqrt(),
                label: self.entries[position].label.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(text: &str, label: &str) -> ReferenceLabelEntry {
        ReferenceLabelEntry {
            text: text.to_string(),
            label: label.to_string(),
        }
    }

    fn sample_index() -> VectorLabelIndex {
        let mut index = VectorLabelIndex::new("domain", 2);
        index.insert(entry("blood pressure", "Healthcare"), vec![1.0, 0.0]).unwrap();
        index.insert(entry("diagnosis", "Healthcare"), vec![0.9, 0.1]).unwrap();
        index.insert(entry("account number", "Finance"), vec![0.0, 1.0]).unwrap();
        index
    }

    #[test]
    fn test_normalize() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        let mut zero = vec![0.0, 0.0];
        l2_normalize(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);
    }

    #[test]
    fn test_search_orders_by_distance() {
        let index = sample_index();
        let hits = index.search(&[10.0, 0.5], 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].position, 0);
        assert_eq!(hits[1].label, "Healthcare");
        assert!(hits[0].distance <= hits[1].distance);
    }

    #[test]
    fn test_search_k_larger_than_index() {
        let index = sample_index();
        let hits = index.search(&[0.0, 1.0], 10).unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].label, "Finance");
    }

    #[test]
    fn test_equal_distances_break_by_position() {
        let mut index = VectorLabelIndex::new("owner", 2);
        index.insert(entry("a", "B"), vec![0.0, 1.0]).unwrap();
        index.insert(entry("b", "A"), vec![0.0, 2.0]).unwrap();
        let hits = index.search(&[0.0, 1.0], 2).unwrap();
        assert_eq!(hits[0].position, 0);
        assert_eq!(hits[1].position, 1);
    }

    #[test]
    fn test_empty_index_is_unavailable() {
        let index = VectorLabelIndex::new("owner", 2);
        assert!(matches!(
            index.search(&[1.0, 0.0], 5),
            Err(PipelineError::IndexUnavailable(_))
        ));
    }

    #[test]
    fn test_insert_rejects_wrong_width() {
        let mut index = VectorLabelIndex::new("domain", 3);
        assert!(index.insert(entry("x", "Finance"), vec![1.0]).is_err());
        assert!(index.insert(entry("x", " "), vec![1.0, 0.0, 0.0]).is_err());
        assert!(index.is_empty());
    }
}
