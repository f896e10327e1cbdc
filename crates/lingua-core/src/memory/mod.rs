//! ============================================================================
//! Memory Module - Persistent sentence memory
//! ============================================================================
//! Stores every processed sentence with its translation and embedding, and
//! recalls earlier sentences by vector similarity.
//!
//! ## Backends
//! - **memory**: process-local, gone on exit
//! - **redb**: single local file (default)
//! - **qdrant**: remote Qdrant server (`qdrant` cargo feature)
//!
//! ## Usage
//! ```rust,ignore
//! use lingua_core::memory::{InMemoryStore, MemoryStore};
//!
//! let store = InMemoryStore::new();
//! store.initialize("lang-memory").await?;
//! let id = store.add("lang-memory", "The cat sat.", "고양이가 앉았다.", embedding).await?;
//! let similar = store.query_similar("lang-memory", &query, 5).await?;
//! ```
//! ============================================================================

mod embeddings;
#[cfg(feature = "qdrant")]
mod qdrant_store;
mod redb_store;
mod store;
mod types;

// Re-export public types
pub use embeddings::{
    create_embedding_service, Embedder, EmbeddingService, DEFAULT_EMBEDDING_MODEL,
    DEFAULT_EMBEDDING_URL, DEFAULT_QUERY_PREFIX,
};
#[cfg(feature = "qdrant")]
pub use qdrant_store::QdrantStore;
pub use redb_store::{default_db_path, RedbStore};
pub use store::{InMemoryStore, MemoryStore, DEFAULT_NAMESPACE};
pub use types::{cosine_similarity, ScoredRecord, SentenceRecord};
