//! ============================================================================
//! Annotator - Part-of-speech tagging for source sentences
//! ============================================================================
//! The tagging model runs out of process. `HttpAnnotator` talks to a small
//! tagging server that wraps a spaCy-style pipeline:
//!
//! ```text
//! POST {base_url}/tag   {"text": "The cat sat."}
//! 200 {"tokens": [{"text": "The", "pos": "DET", "lemma": "the", "tag": "DT"}, ...]}
//! ```
//! ============================================================================

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::types::{ModelError, Token};

/// Default tagging server address
pub const DEFAULT_ANNOTATOR_URL: &str = "http://127.0.0.1:8700";

/// Turns raw text into tagged tokens. Identical input must yield identical output.
#[async_trait]
pub trait Annotator: Send + Sync {
    async fn tag(&self, text: &str) -> Result<Vec<Token>, ModelError>;
}

/// Client for an HTTP tagging server
pub struct HttpAnnotator {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct TagRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct TagResponse {
    tokens: Vec<TaggedToken>,
}

#[derive(Deserialize)]
struct TaggedToken {
    text: String,
    pos: String,
    #[serde(default)]
    lemma: Option<String>,
    #[serde(default)]
    tag: Option<String>,
}

impl From<TaggedToken> for Token {
    fn from(t: TaggedToken) -> Self {
        Token {
            surface: t.text,
            category: t.pos,
            lemma: t.lemma.filter(|l| !l.is_empty()),
            tag: t.tag.filter(|t| !t.is_empty()),
        }
    }
}

impl HttpAnnotator {
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Annotator for HttpAnnotator {
    async fn tag(&self, text: &str) -> Result<Vec<Token>, ModelError> {
        debug!("Tagging {} chars via {}", text.len(), self.base_url);

        let response = self
            .client
            .post(format!("{}/tag", self.base_url))
            .json(&TagRequest { text })
            .send()
            .await
            .map_err(|e| ModelError::Unavailable(format!("Failed to reach tagger: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Unavailable(format!(
                "Tagger error {}: {}",
                status, body
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ModelError::Unavailable(format!("Failed to read tagger reply: {}", e)))?;
        parse_tag_response(&body)
    }
}

fn parse_tag_response(body: &str) -> Result<Vec<Token>, ModelError> {
    let parsed: TagResponse = serde_json::from_str(body)
        .map_err(|e| ModelError::Unavailable(format!("Failed to parse tagger reply: {}", e)))?;
    Ok(parsed.tokens.into_iter().map(Token::from).collect())
}
