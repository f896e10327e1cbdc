//! ============================================================================
//! Sentence Pipeline - Orchestrates annotate → translate → embed → store → align
//! ============================================================================
//! All collaborators are injected at construction. Only an empty input or a
//! translation failure aborts `process`; every other stage failure is
//! recorded in the result and the run continues with empty output for it.
//! ============================================================================

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::align::{Aligner, PositionalAligner};
use crate::annotate::Annotator;
use crate::memory::{Embedder, MemoryStore, ScoredRecord, DEFAULT_NAMESPACE};
use crate::tokenize::{TargetTokenizer, WhitespaceTokenizer};
use crate::translate::Translator;
use crate::types::{
    AlignmentPair, FailureKind, LanguagePair, ModelError, PipelineError, Stage, StageFailure,
    StoreError, Token,
};

/// Everything one `process` call produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    /// Input as submitted
    pub text: String,
    pub source_tokens: Vec<Token>,
    pub translation: String,
    pub target_tokens: Vec<String>,
    pub alignment: Vec<AlignmentPair>,
    /// Stored record id, absent when embedding or storage failed
    pub record_id: Option<Uuid>,
    /// Degraded stages, in pipeline order
    pub failures: Vec<StageFailure>,
}

impl PipelineResult {
    pub fn is_stored(&self) -> bool {
        self.record_id.is_some()
    }

    pub fn failure(&self, stage: Stage) -> Option<&StageFailure> {
        self.failures.iter().find(|f| f.stage == stage)
    }
}

/// Errors from a recall query
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecallError {
    #[error("Input is empty")]
    EmptyInput,

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The sentence memory pipeline
pub struct SentencePipeline {
    annotator: Arc<dyn Annotator>,
    translator: Arc<dyn Translator>,
    tokenizer: Arc<dyn TargetTokenizer>,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn MemoryStore>,
    aligner: Arc<dyn Aligner>,
    languages: LanguagePair,
    namespace: String,
}

/// Assembles a `SentencePipeline`; tokenizer and aligner default to the placeholders
pub struct PipelineBuilder {
    annotator: Arc<dyn Annotator>,
    translator: Arc<dyn Translator>,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn MemoryStore>,
    tokenizer: Option<Arc<dyn TargetTokenizer>>,
    aligner: Option<Arc<dyn Aligner>>,
    languages: LanguagePair,
    namespace: String,
}

impl PipelineBuilder {
    pub fn new(
        annotator: Arc<dyn Annotator>,
        translator: Arc<dyn Translator>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn MemoryStore>,
    ) -> Self {
        Self {
            annotator,
            translator,
            embedder,
            store,
            tokenizer: None,
            aligner: None,
            languages: LanguagePair::default(),
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }

    pub fn tokenizer(mut self, tokenizer: Arc<dyn TargetTokenizer>) -> Self {
        self.tokenizer = Some(tokenizer);
        self
    }

    pub fn aligner(mut self, aligner: Arc<dyn Aligner>) -> Self {
        self.aligner = Some(aligner);
        self
    }

    pub fn languages(mut self, languages: LanguagePair) -> Self {
        self.languages = languages;
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn build(self) -> SentencePipeline {
        SentencePipeline {
            annotator: self.annotator,
            translator: self.translator,
            tokenizer: self
                .tokenizer
                .unwrap_or_else(|| Arc::new(WhitespaceTokenizer)),
            embedder: self.embedder,
            store: self.store,
            aligner: self.aligner.unwrap_or_else(|| Arc::new(PositionalAligner)),
            languages: self.languages,
            namespace: self.namespace,
        }
    }
}

impl SentencePipeline {
    /// Ensure the memory namespace exists. Safe to call at every start.
    pub async fn initialize(&self) -> Result<(), StoreError> {
        self.store.initialize(&self.namespace).await?;
        info!(
            "Sentence memory ready (backend: {}, namespace: {}, embeddings: {})",
            self.store.backend(),
            self.namespace,
            self.embedder.model_name()
        );
        Ok(())
    }

    /// Release the memory store
    pub async fn shutdown(&self) -> Result<(), StoreError> {
        debug!("Shutting down sentence memory");
        self.store.shutdown().await
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn languages(&self) -> &LanguagePair {
        &self.languages
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Run one sentence through every stage
    pub async fn process(&self, text: &str) -> Result<PipelineResult, PipelineError> {
        if text.trim().is_empty() {
            return Err(PipelineError::EmptyInput);
        }

        let mut failures = Vec::new();

        // Annotation (best effort)
        let source_tokens = match self.annotator.tag(text).await {
            Ok(tokens) => {
                debug!("Annotated {} tokens", tokens.len());
                tokens
            }
            Err(e) => {
                warn!("Annotation failed, continuing without tokens: {}", e);
                failures.push(StageFailure::new(
                    Stage::Annotation,
                    FailureKind::ModelUnavailable,
                    e.to_string(),
                ));
                Vec::new()
            }
        };

        // Translation (required by every later stage)
        let translation = self
            .translator
            .translate(text, &self.languages.source, &self.languages.target)
            .await
            .map_err(|e| {
                warn!("Translation failed: {}", e);
                PipelineError::TranslationFailed(e)
            })?;
        debug!("Translated to {} chars", translation.len());

        let target_tokens = self.tokenizer.tokenize(&translation);

        // Embedding + storage (best effort)
        let record_id = match self.embedder.embed(text).await {
            Ok(embedding) => {
                match self
                    .store
                    .add(&self.namespace, text, &translation, embedding)
                    .await
                {
                    Ok(id) => {
                        info!("Stored sentence {} in {}", id, self.namespace);
                        Some(id)
                    }
                    Err(e) => {
                        warn!("Storage failed, sentence not remembered: {}", e);
                        failures.push(StageFailure::new(Stage::Storage, e.kind(), e.to_string()));
                        None
                    }
                }
            }
            Err(e) => {
                warn!("Embedding failed, sentence not remembered: {}", e);
                failures.push(StageFailure::new(
                    Stage::Embedding,
                    FailureKind::ModelUnavailable,
                    e.to_string(),
                ));
                None
            }
        };

        // Alignment (best effort)
        let source_surfaces: Vec<String> =
            source_tokens.iter().map(|t| t.surface.clone()).collect();
        let alignment = match self.aligner.align(&source_surfaces, &target_tokens) {
            Ok(pairs) => pairs,
            Err(e) => {
                warn!("Alignment failed: {}", e);
                failures.push(StageFailure::new(
                    Stage::Alignment,
                    FailureKind::AlignmentFailed,
                    e.to_string(),
                ));
                Vec::new()
            }
        };

        Ok(PipelineResult {
            text: text.to_string(),
            source_tokens,
            translation,
            target_tokens,
            alignment,
            record_id,
            failures,
        })
    }

    /// Find remembered sentences similar to `text`
    pub async fn recall(&self, text: &str, top_k: usize) -> Result<Vec<ScoredRecord>, RecallError> {
        if text.trim().is_empty() {
            return Err(RecallError::EmptyInput);
        }
        debug!("Recalling up to {} sentences similar to: {}", top_k, text);

        let query = self.embedder.embed(text).await?;
        Ok(self
            .store
            .query_similar(&self.namespace, &query, top_k)
            .await?)
    }

    /// Number of remembered sentences in this namespace
    pub async fn count(&self) -> Result<u64, StoreError> {
        self.store.count(&self.namespace).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use crate::types::{AlignError, TranslationError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedAnnotator(Vec<Token>);

    #[async_trait]
    impl Annotator for FixedAnnotator {
        async fn tag(&self, _text: &str) -> Result<Vec<Token>, ModelError> {
            Ok(self.0.clone())
        }
    }

    struct DownAnnotator;

    #[async_trait]
    impl Annotator for DownAnnotator {
        async fn tag(&self, _text: &str) -> Result<Vec<Token>, ModelError> {
            Err(ModelError::Unavailable("tagger offline".to_string()))
        }
    }

    struct FixedTranslator {
        reply: String,
        calls: AtomicUsize,
    }

    impl FixedTranslator {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Translator for FixedTranslator {
        async fn translate(
            &self,
            _text: &str,
            source_lang: &str,
            target_lang: &str,
        ) -> Result<String, TranslationError> {
            assert_eq!((source_lang, target_lang), ("en", "ko"));
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.clone())
        }
    }

    struct DownTranslator;

    #[async_trait]
    impl Translator for DownTranslator {
        async fn translate(
            &self,
            _text: &str,
            _source_lang: &str,
            _target_lang: &str,
        ) -> Result<String, TranslationError> {
            Err(TranslationError::ServiceError("quota exceeded".to_string()))
        }
    }

    /// Deterministic 4-dim vector derived from the text
    fn vector_for(text: &str) -> Vec<f32> {
        let len = text.chars().count() as f32;
        let vowels = text.chars().filter(|c| "aeiouAEIOU".contains(*c)).count() as f32;
        let spaces = text.chars().filter(|c| c.is_whitespace()).count() as f32;
        vec![len, vowels, spaces, 1.0]
    }

    struct TextEmbedder;

    #[async_trait]
    impl Embedder for TextEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError> {
            Ok(vector_for(text))
        }

        fn model_name(&self) -> &str {
            "test-embedder"
        }
    }

    struct DownEmbedder;

    #[async_trait]
    impl Embedder for DownEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, ModelError> {
            Err(ModelError::Unavailable("embedding server offline".to_string()))
        }

        fn model_name(&self) -> &str {
            "down"
        }
    }

    struct OfflineStore;

    #[async_trait]
    impl MemoryStore for OfflineStore {
        async fn initialize(&self, _namespace: &str) -> Result<(), StoreError> {
            Ok(())
        }

        async fn add(
            &self,
            _namespace: &str,
            _original_text: &str,
            _translation: &str,
            _embedding: Vec<f32>,
        ) -> Result<Uuid, StoreError> {
            Err(StoreError::StoreUnavailable("connection refused".to_string()))
        }

        async fn query_similar(
            &self,
            _namespace: &str,
            _embedding: &[f32],
            _top_k: usize,
        ) -> Result<Vec<ScoredRecord>, StoreError> {
            Err(StoreError::StoreUnavailable("connection refused".to_string()))
        }

        async fn count(&self, _namespace: &str) -> Result<u64, StoreError> {
            Err(StoreError::StoreUnavailable("connection refused".to_string()))
        }

        fn backend(&self) -> &'static str {
            "offline"
        }
    }

    struct BrokenAligner;

    impl Aligner for BrokenAligner {
        fn align(
            &self,
            _source: &[String],
            _target: &[String],
        ) -> Result<Vec<AlignmentPair>, AlignError> {
            Err(AlignError::Failed("model not loaded".to_string()))
        }
    }

    fn cat_tokens() -> Vec<Token> {
        vec![
            Token::new("The", "DET"),
            Token::new("cat", "NOUN"),
            Token::new("sat", "VERB"),
            Token::new(".", "PUNCT"),
        ]
    }

    async fn pipeline_with(
        annotator: Arc<dyn Annotator>,
        translator: Arc<dyn Translator>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn MemoryStore>,
    ) -> SentencePipeline {
        let pipeline = PipelineBuilder::new(annotator, translator, embedder, store)
            .namespace("test-memory")
            .build();
        pipeline.initialize().await.unwrap();
        pipeline
    }

    #[tokio::test]
    async fn test_cat_sat_end_to_end() {
        let store = Arc::new(InMemoryStore::new());
        let pipeline = pipeline_with(
            Arc::new(FixedAnnotator(cat_tokens())),
            Arc::new(FixedTranslator::new("고양이가 앉았다.")),
            Arc::new(TextEmbedder),
            store.clone(),
        )
        .await;

        let result = pipeline.process("The cat sat.").await.unwrap();

        assert_eq!(result.source_tokens, cat_tokens());
        assert_eq!(result.translation, "고양이가 앉았다.");
        assert_eq!(result.target_tokens, vec!["고양이가", "앉았다."]);
        let pairs: Vec<(&str, &str)> = result
            .alignment
            .iter()
            .map(|p| (p.source.as_str(), p.target.as_str()))
            .collect();
        assert_eq!(pairs, vec![("The", "고양이가"), ("cat", "앉았다.")]);
        assert!(result.failures.is_empty());

        let id = result.record_id.expect("record stored");
        let hits = store
            .query_similar("test-memory", &vector_for("The cat sat."), 1)
            .await
            .unwrap();
        assert_eq!(hits[0].record.id, id);
        assert_eq!(hits[0].record.original_text, "The cat sat.");
        assert_eq!(hits[0].record.translation, "고양이가 앉았다.");
        assert_eq!(hits[0].record.embedding, vector_for("The cat sat."));
    }

    #[tokio::test]
    async fn test_empty_input_rejected_without_side_effects() {
        let store = Arc::new(InMemoryStore::new());
        let translator = Arc::new(FixedTranslator::new("x"));
        let pipeline = pipeline_with(
            Arc::new(FixedAnnotator(cat_tokens())),
            translator.clone(),
            Arc::new(TextEmbedder),
            store.clone(),
        )
        .await;

        assert_eq!(pipeline.process("").await.unwrap_err(), PipelineError::EmptyInput);
        assert_eq!(pipeline.process("   ").await.unwrap_err(), PipelineError::EmptyInput);
        assert_eq!(store.count("test-memory").await.unwrap(), 0);
        assert_eq!(translator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_translation_failure_is_fatal_and_stores_nothing() {
        let store = Arc::new(InMemoryStore::new());
        let pipeline = pipeline_with(
            Arc::new(FixedAnnotator(cat_tokens())),
            Arc::new(DownTranslator),
            Arc::new(TextEmbedder),
            store.clone(),
        )
        .await;

        let err = pipeline.process("The cat sat.").await.unwrap_err();
        assert!(matches!(err, PipelineError::TranslationFailed(_)));
        assert_eq!(store.count("test-memory").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_store_outage_keeps_other_outputs() {
        let pipeline = pipeline_with(
            Arc::new(FixedAnnotator(cat_tokens())),
            Arc::new(FixedTranslator::new("고양이가 앉았다.")),
            Arc::new(TextEmbedder),
            Arc::new(OfflineStore),
        )
        .await;

        let result = pipeline.process("The cat sat.").await.unwrap();
        assert_eq!(result.source_tokens.len(), 4);
        assert_eq!(result.translation, "고양이가 앉았다.");
        assert_eq!(result.alignment.len(), 2);
        assert_eq!(result.record_id, None);
        assert!(!result.is_stored());

        let failure = result.failure(Stage::Storage).expect("storage note");
        assert_eq!(failure.kind, FailureKind::StoreUnavailable);
        assert_eq!(result.failures.len(), 1);
    }

    #[tokio::test]
    async fn test_annotator_failure_degrades_to_empty_tokens() {
        let store = Arc::new(InMemoryStore::new());
        let pipeline = pipeline_with(
            Arc::new(DownAnnotator),
            Arc::new(FixedTranslator::new("고양이가 앉았다.")),
            Arc::new(TextEmbedder),
            store.clone(),
        )
        .await;

        let result = pipeline.process("The cat sat.").await.unwrap();
        assert!(result.source_tokens.is_empty());
        assert!(result.alignment.is_empty());
        assert_eq!(result.target_tokens.len(), 2);
        assert!(result.is_stored());
        assert_eq!(
            result.failure(Stage::Annotation).map(|f| f.kind),
            Some(FailureKind::ModelUnavailable)
        );
        assert_eq!(store.count("test-memory").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_embedder_failure_skips_storage() {
        let store = Arc::new(InMemoryStore::new());
        let pipeline = pipeline_with(
            Arc::new(FixedAnnotator(cat_tokens())),
            Arc::new(FixedTranslator::new("고양이가 앉았다.")),
            Arc::new(DownEmbedder),
            store.clone(),
        )
        .await;

        let result = pipeline.process("The cat sat.").await.unwrap();
        assert_eq!(result.record_id, None);
        assert!(result.failure(Stage::Embedding).is_some());
        assert!(result.failure(Stage::Storage).is_none());
        assert_eq!(result.alignment.len(), 2);
        assert_eq!(store.count("test-memory").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_aligner_failure_is_recorded() {
        let store = Arc::new(InMemoryStore::new());
        let pipeline = PipelineBuilder::new(
            Arc::new(FixedAnnotator(cat_tokens())),
            Arc::new(FixedTranslator::new("고양이가 앉았다.")),
            Arc::new(TextEmbedder),
            store.clone(),
        )
        .aligner(Arc::new(BrokenAligner))
        .build();
        pipeline.initialize().await.unwrap();

        let result = pipeline.process("The cat sat.").await.unwrap();
        assert!(result.alignment.is_empty());
        assert!(result.is_stored());
        assert_eq!(
            result.failure(Stage::Alignment).map(|f| f.kind),
            Some(FailureKind::AlignmentFailed)
        );
    }

    #[tokio::test]
    async fn test_dimension_mismatch_reported_as_storage_failure() {
        let store = Arc::new(InMemoryStore::new());
        store.initialize("test-memory").await.unwrap();
        store
            .add("test-memory", "seed", "씨앗", vec![1.0, 2.0])
            .await
            .unwrap();

        let pipeline = pipeline_with(
            Arc::new(FixedAnnotator(cat_tokens())),
            Arc::new(FixedTranslator::new("고양이가 앉았다.")),
            Arc::new(TextEmbedder),
            store.clone(),
        )
        .await;

        let result = pipeline.process("The cat sat.").await.unwrap();
        assert_eq!(
            result.failure(Stage::Storage).map(|f| f.kind),
            Some(FailureKind::DimensionMismatch)
        );
        assert_eq!(store.count("test-memory").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_recall_finds_processed_sentence() {
        let store = Arc::new(InMemoryStore::new());
        let pipeline = pipeline_with(
            Arc::new(FixedAnnotator(cat_tokens())),
            Arc::new(FixedTranslator::new("고양이가 앉았다.")),
            Arc::new(TextEmbedder),
            store,
        )
        .await;

        assert!(pipeline.recall("The cat sat.", 3).await.unwrap().is_empty());
        pipeline.process("The cat sat.").await.unwrap();

        let hits = pipeline.recall("The cat sat.", 3).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.translation, "고양이가 앉았다.");
        assert_eq!(pipeline.count().await.unwrap(), 1);

        assert_eq!(pipeline.recall(" ", 3).await.unwrap_err(), RecallError::EmptyInput);
        assert!(matches!(
            pipeline.recall("The cat sat.", 0).await,
            Err(RecallError::Store(StoreError::InvalidArgument(_)))
        ));
    }
}
