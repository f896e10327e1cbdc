//! Google Translate web endpoint (`translate_a/single`, client `gtx`).
//!
//! The reply is a nested JSON array; the first element holds one
//! `[translated, original, ...]` entry per sentence segment.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::Translator;
use crate::types::TranslationError;

const GOOGLE_TRANSLATE_URL: &str = "https://translate.googleapis.com/translate_a/single";

pub struct GoogleTranslator {
    client: reqwest::Client,
    endpoint: String,
}

impl GoogleTranslator {
    pub fn new() -> Self {
        Self::with_endpoint(GOOGLE_TRANSLATE_URL)
    }

    pub fn with_endpoint(endpoint: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            endpoint: endpoint.to_string(),
        }
    }
}

impl Default for GoogleTranslator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Translator for GoogleTranslator {
    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String, TranslationError> {
        debug!("Translating {} chars {} -> {}", text.len(), source_lang, target_lang);

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("client", "gtx"),
                ("sl", source_lang),
                ("tl", target_lang),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await
            .map_err(|e| TranslationError::ServiceError(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(TranslationError::ServiceError(format!(
                "Google Translate returned {}",
                status
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| TranslationError::ServiceError(format!("invalid reply: {}", e)))?;

        extract_translation(&body)
    }
}

/// Join the translated segments of a `translate_a/single` reply
fn extract_translation(body: &Value) -> Result<String, TranslationError> {
    let segments = body
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| TranslationError::ServiceError("reply has no segments".to_string()))?;

    let translation: String = segments
        .iter()
        .filter_map(|segment| segment.get(0).and_then(Value::as_str))
        .collect();

    let translation = translation.trim().to_string();
    if translation.is_empty() {
        return Err(TranslationError::ServiceError(
            "empty translation returned".to_string(),
        ));
    }
    Ok(translation)
}
