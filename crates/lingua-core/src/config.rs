//! ============================================================================
//! Configuration - Environment-driven settings for the pipeline
//! ============================================================================
//! Values come from the process environment (after `.env` is loaded with
//! dotenvy); the CLI overrides individual fields from its flags.
//! ============================================================================

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::annotate::{Annotator, HttpAnnotator, DEFAULT_ANNOTATOR_URL};
use crate::memory::{
    create_embedding_service, InMemoryStore, MemoryStore, RedbStore, DEFAULT_NAMESPACE,
};
use crate::pipeline::{PipelineBuilder, SentencePipeline};
use crate::translate::{
    ChatTranslator, GoogleTranslator, Translator, DEFAULT_CHAT_BASE_URL, DEFAULT_CHAT_MODEL,
};
use crate::types::LanguagePair;

/// Default Qdrant gRPC address
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";

/// Default number of recall hits
pub const DEFAULT_TOP_K: usize = 5;

/// Where sentence memory lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Memory,
    Redb,
    Qdrant,
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreBackend::Memory => f.write_str("memory"),
            StoreBackend::Redb => f.write_str("redb"),
            StoreBackend::Qdrant => f.write_str("qdrant"),
        }
    }
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "in-memory" | "ephemeral" => Ok(StoreBackend::Memory),
            "redb" | "local" => Ok(StoreBackend::Redb),
            "qdrant" => Ok(StoreBackend::Qdrant),
            _ => Err(format!("Unknown store backend: {}", s)),
        }
    }
}

/// Which translation service to call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslatorBackend {
    Google,
    Chat,
}

impl FromStr for TranslatorBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "google" => Ok(TranslatorBackend::Google),
            "chat" | "openai" | "llm" => Ok(TranslatorBackend::Chat),
            _ => Err(format!("Unknown translator backend: {}", s)),
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinguaConfig {
    pub namespace: String,
    pub store: StoreBackend,
    pub db_path: Option<PathBuf>,
    pub qdrant_url: String,
    pub languages: LanguagePair,
    pub translator: TranslatorBackend,
    pub chat_api_key: Option<String>,
    pub chat_base_url: String,
    pub chat_model: String,
    pub annotator_url: String,
    pub embedding_url: Option<String>,
    pub embedding_model: Option<String>,
    pub embedding_api_key: Option<String>,
    pub embedding_prefix: Option<String>,
    pub top_k: usize,
}

impl Default for LinguaConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            store: StoreBackend::Redb,
            db_path: None,
            qdrant_url: DEFAULT_QDRANT_URL.to_string(),
            languages: LanguagePair::default(),
            translator: TranslatorBackend::Google,
            chat_api_key: None,
            chat_base_url: DEFAULT_CHAT_BASE_URL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            annotator_url: DEFAULT_ANNOTATOR_URL.to_string(),
            embedding_url: None,
            embedding_model: None,
            embedding_api_key: None,
            embedding_prefix: None,
            top_k: DEFAULT_TOP_K,
        }
    }
}

/// Non-empty env var
fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl LinguaConfig {
    /// Load `.env` (if present) and read settings from the environment
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                warn!("Could not load .env file: {}", e);
            }
        }
        Self::from_lookup(env_var)
    }

    /// Build from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let store = match lookup("LINGUA_STORE") {
            Some(s) => s.parse::<StoreBackend>().map_err(|e| anyhow!(e))?,
            None => defaults.store,
        };
        let translator = match lookup("LINGUA_TRANSLATOR") {
            Some(s) => s.parse::<TranslatorBackend>().map_err(|e| anyhow!(e))?,
            None => defaults.translator,
        };
        let top_k = match lookup("LINGUA_TOP_K") {
            Some(s) => s
                .trim()
                .parse::<usize>()
                .with_context(|| format!("LINGUA_TOP_K is not a number: {}", s))?,
            None => defaults.top_k,
        };

        let config = Self {
            namespace: lookup("LINGUA_NAMESPACE").unwrap_or(defaults.namespace),
            store,
            db_path: lookup("LINGUA_DB_PATH").map(PathBuf::from),
            qdrant_url: lookup("QDRANT_URL").unwrap_or(defaults.qdrant_url),
            languages: LanguagePair {
                source: lookup("LINGUA_SOURCE_LANG").unwrap_or(defaults.languages.source),
                target: lookup("LINGUA_TARGET_LANG").unwrap_or(defaults.languages.target),
            },
            translator,
            chat_api_key: lookup("LINGUA_CHAT_API_KEY").or_else(|| lookup("OPENAI_API_KEY")),
            chat_base_url: lookup("LINGUA_CHAT_BASE_URL").unwrap_or(defaults.chat_base_url),
            chat_model: lookup("LINGUA_CHAT_MODEL").unwrap_or(defaults.chat_model),
            annotator_url: lookup("LINGUA_ANNOTATOR_URL").unwrap_or(defaults.annotator_url),
            embedding_url: lookup("LINGUA_EMBEDDING_URL"),
            embedding_model: lookup("LINGUA_EMBEDDING_MODEL"),
            embedding_api_key: lookup("LINGUA_EMBEDDING_API_KEY"),
            embedding_prefix: lookup("LINGUA_EMBEDDING_PREFIX"),
            top_k,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no pipeline could run with
    pub fn validate(&self) -> Result<()> {
        if self.namespace.trim().is_empty() || self.namespace.contains(':') {
            bail!("Invalid namespace '{}': must be non-empty without ':'", self.namespace);
        }
        if self.top_k == 0 {
            bail!("top_k must be a positive integer");
        }
        if self.languages.source == self.languages.target {
            bail!(
                "Source and target language are both '{}'",
                self.languages.source
            );
        }
        if self.translator == TranslatorBackend::Chat && self.chat_api_key.is_none() {
            bail!("Chat translator selected but LINGUA_CHAT_API_KEY is not set");
        }
        Ok(())
    }

    /// Open the configured memory store
    pub fn open_store(&self) -> Result<Arc<dyn MemoryStore>> {
        match self.store {
            StoreBackend::Memory => {
                info!("Using in-memory sentence store (not persisted)");
                Ok(Arc::new(InMemoryStore::new()))
            }
            StoreBackend::Redb => {
                let store = RedbStore::open(self.db_path.as_deref())
                    .context("Failed to open local sentence memory")?;
                Ok(Arc::new(store))
            }
            StoreBackend::Qdrant => self.open_qdrant(),
        }
    }

    #[cfg(feature = "qdrant")]
    fn open_qdrant(&self) -> Result<Arc<dyn MemoryStore>> {
        let store = crate::memory::QdrantStore::new(&self.qdrant_url)
            .context("Failed to connect to Qdrant")?;
        Ok(Arc::new(store))
    }

    #[cfg(not(feature = "qdrant"))]
    fn open_qdrant(&self) -> Result<Arc<dyn MemoryStore>> {
        bail!("Qdrant backend requires building with the `qdrant` feature")
    }

    fn build_translator(&self) -> Result<Arc<dyn Translator>> {
        match self.translator {
            TranslatorBackend::Google => Ok(Arc::new(GoogleTranslator::new())),
            TranslatorBackend::Chat => {
                let key = self
                    .chat_api_key
                    .clone()
                    .ok_or_else(|| anyhow!("LINGUA_CHAT_API_KEY is not set"))?;
                Ok(Arc::new(ChatTranslator::new_custom(
                    key,
                    self.chat_base_url.clone(),
                    self.chat_model.clone(),
                )))
            }
        }
    }

    /// Wire every collaborator into a pipeline (not yet initialized)
    pub fn build_pipeline(&self) -> Result<SentencePipeline> {
        self.validate()?;

        let annotator: Arc<dyn Annotator> = Arc::new(HttpAnnotator::new(&self.annotator_url));
        let translator = self.build_translator()?;
        let embedder = Arc::new(create_embedding_service(
            self.embedding_url.clone(),
            self.embedding_model.clone(),
            self.embedding_api_key.clone(),
            self.embedding_prefix.clone(),
        ));
        let store = self.open_store()?;

        Ok(PipelineBuilder::new(annotator, translator, embedder, store)
            .languages(self.languages.clone())
            .namespace(self.namespace.clone())
            .build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = LinguaConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.namespace, "lang-memory");
        assert_eq!(config.store, StoreBackend::Redb);
        assert_eq!(config.languages, LanguagePair::default());
        assert_eq!(config.translator, TranslatorBackend::Google);
        assert_eq!(config.top_k, DEFAULT_TOP_K);
    }

    #[test]
    fn test_env_overrides() {
        let config = LinguaConfig::from_lookup(lookup_from(&[
            ("LINGUA_STORE", "memory"),
            ("LINGUA_NAMESPACE", "korean-drills"),
            ("LINGUA_TARGET_LANG", "ja"),
            ("LINGUA_TRANSLATOR", "chat"),
            ("OPENAI_API_KEY", "sk-test"),
            ("LINGUA_TOP_K", "3"),
        ]))
        .unwrap();

        assert_eq!(config.store, StoreBackend::Memory);
        assert_eq!(config.namespace, "korean-drills");
        assert_eq!(config.languages.target, "ja");
        assert_eq!(config.chat_api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.top_k, 3);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(LinguaConfig::from_lookup(lookup_from(&[("LINGUA_STORE", "chroma")])).is_err());
        assert!(LinguaConfig::from_lookup(lookup_from(&[("LINGUA_TOP_K", "0")])).is_err());
        assert!(LinguaConfig::from_lookup(lookup_from(&[("LINGUA_TOP_K", "many")])).is_err());
        assert!(LinguaConfig::from_lookup(lookup_from(&[("LINGUA_TRANSLATOR", "chat")])).is_err());
        assert!(LinguaConfig::from_lookup(lookup_from(&[("LINGUA_NAMESPACE", "a:b")])).is_err());
    }

    #[test]
    fn test_backend_parsing() {
        assert_eq!("Redb".parse::<StoreBackend>().unwrap(), StoreBackend::Redb);
        assert_eq!("in-memory".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert_eq!(StoreBackend::Qdrant.to_string(), "qdrant");
    }

    #[tokio::test]
    async fn test_build_pipeline_with_memory_store() {
        let mut config = LinguaConfig::default();
        config.store = StoreBackend::Memory;
        let pipeline = config.build_pipeline().unwrap();
        pipeline.initialize().await.unwrap();
        assert_eq!(pipeline.backend(), "memory");
        assert_eq!(pipeline.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_build_pipeline_with_redb_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = LinguaConfig::default();
        config.db_path = Some(dir.path().join("nested").join("memory.redb"));
        let pipeline = config.build_pipeline().unwrap();
        pipeline.initialize().await.unwrap();
        assert_eq!(pipeline.backend(), "redb");
    }
}
