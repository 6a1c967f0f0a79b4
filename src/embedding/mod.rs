pub mod client;

use async_trait::async_trait;

use crate::error::Result;

pub use client::HttpEmbeddingClient;

/// Maps text to a fixed-length vector.
///
/// Implementations must be deterministic for a given model version, and
/// every vector they return must have `dimension()` components.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn dimension(&self) -> usize;

    fn model(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}
