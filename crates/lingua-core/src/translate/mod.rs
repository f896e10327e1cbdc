//! ============================================================================
//! Translate Module - Source → target sentence translation
//! ============================================================================
//! - GoogleTranslator: public Google Translate web endpoint (no key)
//! - ChatTranslator: any OpenAI-compatible chat completions API
//! ============================================================================

mod chat;
mod google;

use async_trait::async_trait;

use crate::types::TranslationError;

pub use chat::{ChatTranslator, DEFAULT_CHAT_BASE_URL, DEFAULT_CHAT_MODEL};
pub use google::GoogleTranslator;

/// Maps source text to target-language text
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String, TranslationError>;
}

/// Display name for the language codes the CLI prints
pub fn language_name(code: &str) -> &str {
    match code {
        "en" => "English",
        "ko" => "Korean",
        "ja" => "Japanese",
        "zh" => "Chinese",
        "es" => "Spanish",
        "fr" => "French",
        "de" => "German",
        other => other,
    }
}
