//! ============================================================================
//! Core Types for the Sentence Memory Pipeline
//! ============================================================================
//! Tokens, alignment pairs, per-stage failure notes and the error taxonomy
//! shared by every collaborator. Serialized to JSON by `lingua process --json`.
//! ============================================================================

use serde::{Deserialize, Serialize};

/// A single lexical unit produced by the annotator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Literal text span
    pub surface: String,
    /// Coarse grammatical category (e.g. "NOUN")
    pub category: String,
    /// Base form, when the tagging model provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lemma: Option<String>,
    /// Fine-grained tag (e.g. "NN"), when the tagging model provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl Token {
    pub fn new(surface: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            surface: surface.into(),
            category: category.into(),
            lemma: None,
            tag: None,
        }
    }

    pub fn with_lemma(mut self, lemma: impl Into<String>) -> Self {
        self.lemma = Some(lemma.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

/// Positional association between one source token and one target token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignmentPair {
    pub index: usize,
    pub source: String,
    pub target: String,
}

/// Fixed source/target language pair for one process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguagePair {
    pub source: String,
    pub target: String,
}

impl Default for LanguagePair {
    fn default() -> Self {
        Self {
            source: "en".to_string(),
            target: "ko".to_string(),
        }
    }
}

// ============================================================================
// Stage failures (recorded, not raised)
// ============================================================================

/// Pipeline stages whose failure can be recorded in a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Annotation,
    Embedding,
    Storage,
    Alignment,
}

impl Stage {
    pub fn display_name(&self) -> &'static str {
        match self {
            Stage::Annotation => "Annotation",
            Stage::Embedding => "Embedding",
            Stage::Storage => "Storage",
            Stage::Alignment => "Alignment",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Kind of a recovered failure, one per error in the taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ModelUnavailable,
    StoreUnavailable,
    DimensionMismatch,
    InvalidArgument,
    AlignmentFailed,
}

/// A degraded stage, carried in the pipeline result instead of aborting it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailure {
    pub stage: Stage,
    pub kind: FailureKind,
    /// Internal reason, logged but not shown to the interactive user
    pub reason: String,
}

impl StageFailure {
    pub fn new(stage: Stage, kind: FailureKind, reason: impl Into<String>) -> Self {
        Self {
            stage,
            kind,
            reason: reason.into(),
        }
    }

    /// One human-readable line naming the failed stage
    pub fn user_message(&self) -> String {
        let detail = match self.kind {
            FailureKind::ModelUnavailable => "the model could not be reached",
            FailureKind::StoreUnavailable => "the memory store could not be reached",
            FailureKind::DimensionMismatch => {
                "the embedding size does not match this memory namespace"
            }
            FailureKind::InvalidArgument => "the request was rejected as invalid",
            FailureKind::AlignmentFailed => "the tokens could not be aligned",
        };
        format!("{} skipped: {}", self.stage, detail)
    }
}

// ============================================================================
// Error taxonomy
// ============================================================================

/// Annotator and embedder failures
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("Model unavailable: {0}")]
    Unavailable(String),
}

/// Translation service failures (network, quota, malformed reply)
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TranslationError {
    #[error("Translation service error: {0}")]
    ServiceError(String),
}

/// Aligner failures
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AlignError {
    #[error("Alignment failed: {0}")]
    Failed(String),
}

/// Memory store failures
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Dimension mismatch: namespace expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl StoreError {
    pub fn kind(&self) -> FailureKind {
        match self {
            StoreError::StoreUnavailable(_) => FailureKind::StoreUnavailable,
            StoreError::DimensionMismatch { .. } => FailureKind::DimensionMismatch,
            StoreError::InvalidArgument(_) => FailureKind::InvalidArgument,
        }
    }
}

/// Errors that abort a whole `process` call
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
    #[error("Input is empty")]
    EmptyInput,

    #[error("Translation failed: {0}")]
    TranslationFailed(#[source] TranslationError),
}

impl PipelineError {
    /// Message shown to the interactive user
    pub fn user_message(&self) -> &'static str {
        match self {
            PipelineError::EmptyInput => "Please enter a sentence.",
            PipelineError::TranslationFailed(_) => {
                "Translation failed: the translation service could not be reached."
            }
        }
    }
}
