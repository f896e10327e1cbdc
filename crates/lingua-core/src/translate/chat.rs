//! ============================================================================
//! Chat Translator - Translation via an OpenAI-compatible chat API
//! ============================================================================

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{language_name, Translator};
use crate::types::TranslationError;

/// Default chat completions base URL
pub const DEFAULT_CHAT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default model for translation
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

/// Translator backed by a chat completions endpoint
pub struct ChatTranslator {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl ChatTranslator {
    pub fn new(api_key: String) -> Self {
        Self::new_custom(
            api_key,
            DEFAULT_CHAT_BASE_URL.to_string(),
            DEFAULT_CHAT_MODEL.to_string(),
        )
    }

    pub fn new_custom(api_key: String, base_url: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Call the chat completions API
    async fn call_api(&self, prompt: &str) -> Result<String, TranslationError> {
        debug!("Calling chat API with {} chars", prompt.len());

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: Some(0.0),
            max_tokens: Some(1024),
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| TranslationError::ServiceError(format!("Failed to call chat API: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TranslationError::ServiceError(format!(
                "Chat API error {}: {}",
                status, body
            )));
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            TranslationError::ServiceError(format!("Failed to parse API response: {}", e))
        })?;

        chat_response
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| TranslationError::ServiceError("No response from API".to_string()))
    }
}

#[async_trait]
impl Translator for ChatTranslator {
    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String, TranslationError> {
        info!("Translating with {}", self.model);

        let prompt = build_prompt(text, source_lang, target_lang);
        let reply = self.call_api(&prompt).await?;
        let translation = clean_reply(&reply);
        if translation.is_empty() {
            return Err(TranslationError::ServiceError(
                "empty translation returned".to_string(),
            ));
        }
        Ok(translation)
    }
}

fn build_prompt(text: &str, source_lang: &str, target_lang: &str) -> String {
    format!(
        "Translate the following {} sentence into natural {}.\n\
        Respond with ONLY the translation, no quotes or explanations.\n\n\
        {}",
        language_name(source_lang),
        language_name(target_lang),
        text
    )
}

/// Strip whitespace and wrapping quotes the model sometimes adds
fn clean_reply(reply: &str) -> String {
    let trimmed = reply.trim();
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed);
    unquoted.trim().to_string()
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}
