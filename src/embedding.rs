//! Text-to-vector conversion through an OpenAI-compatible embeddings API.
//!
//! Both self-hosted backends embed memories before storing or searching
//! them; the hosted service embeds server-side and never touches this module.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::backend::ensure_success;
use crate::errors::Error;

/// Default embedding model for the self-hosted backends.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Vector width produced by the default model.
pub const DEFAULT_EMBEDDING_DIMS: usize = 1536;

/// Produces fixed-width embeddings for text.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, Error>;

    /// Width of every vector returned by `embed`.
    fn dims(&self) -> usize;
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Embedder backed by `POST {base_url}/embeddings`.
pub struct OpenAiEmbedder {
    base_url: String,
    model: String,
    dims: usize,
    api_key: String,
    http_client: reqwest::Client,
}

impl OpenAiEmbedder {
    pub fn new(base_url: &str, model: &str, dims: usize, api_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            dims,
            api_key: api_key.to_string(),
            http_client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, Error> {
        let url = format!("{}/embeddings", self.base_url);
        let body = EmbeddingRequest {
            model: &self.model,
            input: text,
        };

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let response = ensure_success("Embedding request", response).await?;

        let parsed: EmbeddingResponse = response.json().await?;
        let embedding = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| Error::Embedding("No embedding in response".to_string()))?;

        if embedding.len() != self.dims {
            return Err(Error::Embedding(format!(
                "Model {} returned {} dimensions, expected {}",
                self.model,
                embedding.len(),
                self.dims
            )));
        }

        Ok(embedding)
    }

    fn dims(&self) -> usize {
        self.dims
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_embed_sends_model_and_input() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/embeddings")
                .header("authorization", "Bearer sk-test")
                .json_body(json!({"model": "text-embedding-3-small", "input": "hello"}));
            then.status(200)
                .json_body(json!({"data": [{"embedding": [0.1, 0.2, 0.3]}]}));
        });

        let embedder = OpenAiEmbedder::new(&server.base_url(), "text-embedding-3-small", 3, "sk-test");
        let vector = embedder.embed("hello").await.unwrap();

        mock.assert();
        assert_eq!(vector.len(), 3);
        assert!((vector[1] - 0.2).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_embed_rejects_wrong_dims() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/embeddings");
            then.status(200)
                .json_body(json!({"data": [{"embedding": [0.1, 0.2]}]}));
        });

        let embedder = OpenAiEmbedder::new(&server.base_url(), "m", 3, "k");
        let err = embedder.embed("hello").await.unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
    }

    #[tokio::test]
    async fn test_embed_status_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/embeddings");
            then.status(401).body("bad key");
        });

        let embedder = OpenAiEmbedder::new(&server.base_url(), "m", 3, "k");
        let err = embedder.embed("hello").await.unwrap_err();
        match err {
            Error::Status { status, body, .. } => {
                assert_eq!(status, 401);
                assert_eq!(body, "bad key");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_embed_empty_data() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/embeddings");
            then.status(200).json_body(json!({"data": []}));
        });

        let embedder = OpenAiEmbedder::new(&server.base_url(), "m", 3, "k");
        assert!(matches!(
            embedder.embed("x").await,
            Err(Error::Embedding(_))
        ));
    }
}
