use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, trace};

use crate::embedding::EmbeddingProvider;
use crate::error::{PipelineError, Result};

/// Request body for an OpenAI-compatible embeddings endpoint
#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: u32,
}

/// Embedding provider backed by `POST {base_url}/v1/embeddings`
#[derive(Debug, Clone)]
pub struct HttpEmbeddingClient {
    client: Client,
    endpoint: String,
    model: String,
    dimension: usize,
    api_key: Option<String>,
}

impl HttpEmbeddingClient {
    pub fn new(
        base_url: &str,
        model: &str,
        dimension: usize,
        timeout: Duration,
        api_key: Option<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .build()
            .map_err(|e| {
                PipelineError::Configuration(format!("cannot build embedding client: {}", e))
            })?;

        let endpoint = format!("{}/v1/embeddings", base_url.trim_end_matches('/'));
        debug!("Embedding client targets {} with model {}", endpoint, model);

        Ok(Self {
            client,
            endpoint,
            model: model.to_string(),
            dimension,
            api_key,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingClient {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(PipelineError::EmbeddingFailure(
                "cannot embed empty text".to_string(),
            ));
        }

        trace!("Requesting embedding for {} chars", text.len());
        let mut request = self.client.post(&self.endpoint).json(&EmbeddingRequest {
            model: &self.model,
            input: vec![text],
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PipelineError::EmbeddingFailure(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::EmbeddingFailure(format!(
                "embedding endpoint returned {}: {}",
                status, body
            )));
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::EmbeddingFailure(format!("malformed response: {}", e)))?;

        let embedding = body
            .data
            .into_iter()
            .min_by_key(|d| d.index)
            .map(|d| d.embedding)
            .ok_or_else(|| {
                PipelineError::EmbeddingFailure("response carried no embeddings".to_string())
            })?;

        if embedding.len() != self.dimension {
            return Err(PipelineError::EmbeddingFailure(format!(
                "model {} returned {} dimensions, expected {}",
                self.model,
                embedding.len(),
                self.dimension
            )));
        }
        Ok(embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_for(server: &mockito::Server, dimension: usize) -> HttpEmbeddingClient {
        HttpEmbeddingClient::new(
            &server.url(),
            "all-MiniLM-L6-v2",
            dimension,
            Duration::from_secs(5),
            None,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_embed_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/embeddings")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"object":"list","data":[{"object":"embedding","embedding":[0.1,0.2,0.3],"index":0}],"model":"all-MiniLM-L6-v2"}"#)
            .create_async()
            .await;

        let client = client_for(&server, 3);
        let vector = client.embed("blood type").await.unwrap();
        assert_eq!(vector, vec![0.1, 0.2, 0.3]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_embed_server_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/embeddings")
            .with_status(503)
            .with_body("model loading")
            .create_async()
            .await;

        let client = client_for(&server, 3);
        let err = client.embed("blood type").await.unwrap_err();
        assert!(matches!(err, PipelineError::EmbeddingFailure(_)));
    }

    #[tokio::test]
    async fn test_embed_wrong_dimension() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/embeddings")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":[{"embedding":[0.1,0.2],"index":0}]}"#)
            .create_async()
            .await;

        let client = client_for(&server, 3);
        let err = client.embed("blood type").await.unwrap_err();
        assert!(err.to_string().contains("expected 3"));
    }

    #[tokio::test]
    async fn test_embed_rejects_empty_text() {
        let server = mockito::Server::new_async().await;
        let client = client_for(&server, 3);
        assert!(client.embed("   ").await.is_err());
    }
}
