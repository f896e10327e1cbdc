//! ============================================================================
//! LINGUA-CORE: Sentence memory for language study
//! ============================================================================
//! This crate handles the backend of the Lingua study tool:
//! - Part-of-speech annotation through an external tagging server
//! - Translation via Google Translate or an OpenAI-compatible chat API
//! - Sentence embeddings and vector memory (in-memory, redb, Qdrant)
//! - Naive positional alignment between source and target tokens
//! ============================================================================

pub mod align;
pub mod annotate;
pub mod config;
pub mod memory;
pub mod pipeline;
pub mod tokenize;
pub mod translate;
pub mod types;

// Re-export main types for convenience
pub use types::*;
pub use align::{Aligner, PositionalAligner};
pub use annotate::{Annotator, HttpAnnotator};
pub use config::{LinguaConfig, StoreBackend, TranslatorBackend};
pub use memory::{Embedder, MemoryStore, ScoredRecord, SentenceRecord};
pub use pipeline::{PipelineBuilder, PipelineResult, RecallError, SentencePipeline};
pub use tokenize::{TargetTokenizer, WhitespaceTokenizer};
pub use translate::Translator;
