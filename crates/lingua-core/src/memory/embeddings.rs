//! ============================================================================
//! Embedding Service - Sentence vectors for semantic recall
//! ============================================================================
//! Generates text embeddings through any OpenAI-compatible `/embeddings`
//! endpoint (a local text-embeddings server by default, or OpenAI).
//! E5-family models expect a "query: " prefix on the input text.
//! ============================================================================

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::types::ModelError;

/// Default embedding model (multilingual, 384 dims)
pub const DEFAULT_EMBEDDING_MODEL: &str = "intfloat/multilingual-e5-small";

/// Default base URL of a local OpenAI-compatible embedding server
pub const DEFAULT_EMBEDDING_URL: &str = "http://127.0.0.1:8080/v1";

/// Input prefix expected by E5 models
pub const DEFAULT_QUERY_PREFIX: &str = "query: ";

/// Maps text to a fixed-dimension vector
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError>;

    /// The model name used for embeddings
    fn model_name(&self) -> &str;
}

/// Embedding service for generating text vectors
pub struct EmbeddingService {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    prefix: String,
    /// Dimension observed on the first successful call
    dimension: OnceLock<usize>,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
    #[serde(default)]
    model: Option<String>,
    usage: Option<EmbeddingUsage>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct EmbeddingUsage {
    prompt_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct ErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
}

impl EmbeddingService {
    /// Local embedding server with the default E5 model
    pub fn new_local() -> Self {
        Self::new_custom(
            None,
            DEFAULT_EMBEDDING_URL.to_string(),
            DEFAULT_EMBEDDING_MODEL.to_string(),
        )
    }

    /// OpenAI embeddings (no E5 prefix)
    pub fn new_openai(api_key: String) -> Self {
        Self::new_custom(
            Some(api_key),
            "https://api.openai.com/v1".to_string(),
            "text-embedding-3-small".to_string(),
        )
        .with_prefix("")
    }

    /// Create with custom base URL and model
    pub fn new_custom(api_key: Option<String>, base_url: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            prefix: DEFAULT_QUERY_PREFIX.to_string(),
            dimension: OnceLock::new(),
        }
    }

    /// Override the input prefix
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Generate embeddings for multiple texts
    pub async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, ModelError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let request = EmbeddingRequest {
            model: self.model.clone(),
            input: texts.iter().map(|t| self.prepare_input(t)).collect(),
        };

        let mut builder = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Content-Type", "application/json")
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }

        let response = builder.send().await.map_err(|e| {
            ModelError::Unavailable(format!("Failed to send embedding request: {}", e))
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            ModelError::Unavailable(format!("Failed to read response body: {}", e))
        })?;

        if !status.is_success() {
            // Try to parse error response
            if let Ok(error) = serde_json::from_str::<ErrorResponse>(&body) {
                return Err(ModelError::Unavailable(format!(
                    "Embedding API error ({}): {}",
                    status, error.error.message
                )));
            }
            return Err(ModelError::Unavailable(format!(
                "Embedding API error ({}): {}",
                status, body
            )));
        }

        let embeddings = parse_embedding_response(&body)?;
        for embedding in &embeddings {
            self.check_dimension(embedding.len())?;
        }
        Ok(embeddings)
    }

    /// Get the current model name
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Dimension seen so far, if any call has succeeded
    pub fn dimension(&self) -> Option<usize> {
        self.dimension.get().copied()
    }

    fn prepare_input(&self, text: &str) -> String {
        format!("{}{}", self.prefix, text)
    }

    /// The model's dimension must not change during the process lifetime
    fn check_dimension(&self, len: usize) -> Result<(), ModelError> {
        if len == 0 {
            return Err(ModelError::Unavailable("empty embedding returned".to_string()));
        }
        let established = *self.dimension.get_or_init(|| len);
        if established != len {
            warn!(
                "Embedding dimension changed from {} to {} (model: {})",
                established, len, self.model
            );
            return Err(ModelError::Unavailable(format!(
                "embedding dimension changed from {} to {}",
                established, len
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Embedder for EmbeddingService {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError> {
        let embeddings = self.embed_batch(vec![text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::Unavailable("No embedding returned".to_string()))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Decode an embeddings response, ordered by input index
fn parse_embedding_response(body: &str) -> Result<Vec<Vec<f32>>, ModelError> {
    let embedding_response: EmbeddingResponse = serde_json::from_str(body).map_err(|e| {
        ModelError::Unavailable(format!("Failed to parse embedding response: {}", e))
    })?;

    if let Some(usage) = &embedding_response.usage {
        debug!(
            "Embedding tokens used: {} (model: {})",
            usage.total_tokens,
            embedding_response.model.as_deref().unwrap_or("unknown")
        );
    }

    // Sort by index and extract embeddings
    let mut embeddings: Vec<(usize, Vec<f32>)> = embedding_response
        .data
        .into_iter()
        .map(|d| (d.index, d.embedding))
        .collect();
    embeddings.sort_by_key(|(idx, _)| *idx);

    Ok(embeddings.into_iter().map(|(_, e)| e).collect())
}

/// Create an embedding service: explicit endpoint first, then OpenAI, then local default
pub fn create_embedding_service(
    base_url: Option<String>,
    model: Option<String>,
    api_key: Option<String>,
    prefix: Option<String>,
) -> EmbeddingService {
    let api_key = api_key.filter(|k| !k.is_empty());

    let service = match base_url.filter(|u| !u.is_empty()) {
        Some(url) => {
            debug!("Using embedding endpoint {}", url);
            EmbeddingService::new_custom(
                api_key,
                url,
                model.unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            )
        }
        None => match api_key {
            Some(key) if model.is_none() => {
                warn!("No embedding endpoint configured, falling back to OpenAI embeddings");
                EmbeddingService::new_openai(key)
            }
            key => EmbeddingService::new_custom(
                key,
                DEFAULT_EMBEDDING_URL.to_string(),
                model.unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            ),
        },
    };

    match prefix {
        Some(p) => service.with_prefix(p),
        None => service,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_creation() {
        let service = EmbeddingService::new_local();
        assert_eq!(service.base_url(), DEFAULT_EMBEDDING_URL);
        assert_eq!(service.model(), DEFAULT_EMBEDDING_MODEL);
        assert_eq!(service.prepare_input("The cat sat."), "query: The cat sat.");
    }

    #[test]
    fn test_openai_fallback() {
        let service = create_embedding_service(None, None, Some("test-key".to_string()), None);
        assert_eq!(service.base_url(), "https://api.openai.com/v1");
        assert_eq!(service.prepare_input("hi"), "hi");
    }

    #[test]
    fn test_custom_endpoint_trims_slash() {
        let service = create_embedding_service(
            Some("http://embed.local/v1/".to_string()),
            None,
            None,
            Some("passage: ".to_string()),
        );
        assert_eq!(service.base_url(), "http://embed.local/v1");
        assert_eq!(service.prepare_input("x"), "passage: x");
    }

    #[test]
    fn test_parse_response_orders_by_index() {
        let body = r#"{"data":[{"embedding":[0.5,0.5],"index":1},{"embedding":[1.0,0.0],"index":0}],"model":"e5","usage":{"prompt_tokens":4,"total_tokens":4}}"#;
        let parsed = parse_embedding_response(body).unwrap();
        assert_eq!(parsed, vec![vec![1.0, 0.0], vec![0.5, 0.5]]);
    }

    #[test]
    fn test_dimension_is_fixed_after_first_call() {
        let service = EmbeddingService::new_local();
        assert!(service.check_dimension(384).is_ok());
        assert!(service.check_dimension(384).is_ok());
        assert!(service.check_dimension(768).is_err());
        assert_eq!(service.dimension(), Some(384));
    }

    #[tokio::test]
    async fn test_empty_input() {
        let service = EmbeddingService::new_local();
        let result = service.embed_batch(vec![]).await;
        assert!(result.is_ok());
        assert!(result.unwrap().is_empty());
    }
}
