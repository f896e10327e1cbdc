//! ============================================================================
//! Memory Store - Sentence persistence and similarity lookup
//! ============================================================================
//! `MemoryStore` is the seam every backend implements. `InMemoryStore` keeps
//! collections in process memory and is lost on exit.
//! ============================================================================

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use super::types::{rank_by_similarity, ScoredRecord, SentenceRecord};
use crate::types::StoreError;

/// Default namespace for sentence memory
pub const DEFAULT_NAMESPACE: &str = "lang-memory";

/// Persistent sentence memory with nearest-neighbour lookup.
///
/// Every backend scores with cosine similarity, higher is better.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Ensure `namespace` exists. Calling it again is a no-op.
    async fn initialize(&self, namespace: &str) -> Result<(), StoreError>;

    /// Append a new record and return its id.
    ///
    /// The first successful add fixes the namespace's embedding dimension.
    async fn add(
        &self,
        namespace: &str,
        original_text: &str,
        translation: &str,
        embedding: Vec<f32>,
    ) -> Result<Uuid, StoreError>;

    /// Up to `top_k` records ordered from most to least similar.
    async fn query_similar(
        &self,
        namespace: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredRecord>, StoreError>;

    /// Number of records in `namespace`
    async fn count(&self, namespace: &str) -> Result<u64, StoreError>;

    /// Backend name for status output
    fn backend(&self) -> &'static str;

    /// Release the backing medium
    async fn shutdown(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Namespaces are non-empty and free of ':' (used as the key separator).
pub(crate) fn validate_namespace(namespace: &str) -> Result<(), StoreError> {
    if namespace.trim().is_empty() {
        return Err(StoreError::InvalidArgument(
            "namespace must not be empty".to_string(),
        ));
    }
    if namespace.contains(':') {
        return Err(StoreError::InvalidArgument(format!(
            "namespace '{}' must not contain ':'",
            namespace
        )));
    }
    Ok(())
}

pub(crate) fn validate_top_k(top_k: usize) -> Result<(), StoreError> {
    if top_k == 0 {
        return Err(StoreError::InvalidArgument(
            "top_k must be a positive integer".to_string(),
        ));
    }
    Ok(())
}

/// Check `actual` against an established dimension, if any.
pub(crate) fn check_dimension(established: Option<usize>, actual: usize) -> Result<(), StoreError> {
    if actual == 0 {
        return Err(StoreError::InvalidArgument(
            "cannot store a record without an embedding".to_string(),
        ));
    }
    match established {
        Some(expected) if expected != actual => {
            Err(StoreError::DimensionMismatch { expected, actual })
        }
        _ => Ok(()),
    }
}

/// A query must match the namespace dimension once one is established.
pub(crate) fn check_query_dimension(
    established: Option<usize>,
    actual: usize,
) -> Result<(), StoreError> {
    match established {
        Some(expected) if expected != actual => {
            Err(StoreError::DimensionMismatch { expected, actual })
        }
        _ => Ok(()),
    }
}

fn unknown_namespace(namespace: &str) -> StoreError {
    StoreError::InvalidArgument(format!("namespace '{}' is not initialized", namespace))
}

// ============================================================================
// In-memory backend
// ============================================================================

#[derive(Debug, Default)]
struct Collection {
    dimension: Option<usize>,
    records: Vec<SentenceRecord>,
}

/// Process-local store; collections vanish when the process exits
#[derive(Debug, Default)]
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of namespaces created so far
    pub fn namespace_count(&self) -> usize {
        self.collections.read().map(|c| c.len()).unwrap_or(0)
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::StoreUnavailable("in-memory store lock poisoned".to_string())
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn initialize(&self, namespace: &str) -> Result<(), StoreError> {
        validate_namespace(namespace)?;

        let mut collections = self.collections.write().map_err(poisoned)?;
        if !collections.contains_key(namespace) {
            info!("Creating in-memory collection: {}", namespace);
            collections.insert(namespace.to_string(), Collection::default());
        } else {
            debug!("Collection {} already exists", namespace);
        }
        Ok(())
    }

    async fn add(
        &self,
        namespace: &str,
        original_text: &str,
        translation: &str,
        embedding: Vec<f32>,
    ) -> Result<Uuid, StoreError> {
        // Id generation and append happen under one write lock
        let mut collections = self.collections.write().map_err(poisoned)?;
        let collection = collections
            .get_mut(namespace)
            .ok_or_else(|| unknown_namespace(namespace))?;

        check_dimension(collection.dimension, embedding.len())?;

        let mut record = SentenceRecord::new(
            original_text.to_string(),
            translation.to_string(),
            embedding,
        );
        while collection.records.iter().any(|r| r.id == record.id) {
            record.id = Uuid::new_v4();
        }

        collection.dimension = Some(record.embedding.len());
        let id = record.id;
        collection.records.push(record);

        debug!("Stored sentence {} in {}", id, namespace);
        Ok(id)
    }

    async fn query_similar(
        &self,
        namespace: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredRecord>, StoreError> {
        validate_top_k(top_k)?;

        let collections = self.collections.read().map_err(poisoned)?;
        let collection = collections
            .get(namespace)
            .ok_or_else(|| unknown_namespace(namespace))?;
        check_query_dimension(collection.dimension, embedding.len())?;

        Ok(rank_by_similarity(
            embedding,
            collection.records.iter().cloned(),
            top_k,
        ))
    }

    async fn count(&self, namespace: &str) -> Result<u64, StoreError> {
        let collections = self.collections.read().map_err(poisoned)?;
        collections
            .get(namespace)
            .map(|c| c.records.len() as u64)
            .ok_or_else(|| unknown_namespace(namespace))
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
