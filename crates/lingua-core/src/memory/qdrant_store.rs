//! ============================================================================
//! Qdrant Store - Remote vector database backend
//! ============================================================================
//! One Qdrant collection per namespace, cosine distance. Qdrant fixes the
//! vector size at collection creation, so the collection is created lazily
//! by the first `add` and its size becomes the namespace dimension.
//! ============================================================================

use async_trait::async_trait;
use qdrant_client::qdrant::{
    point_id::PointIdOptions, vectors_config, CountPointsBuilder, CreateCollectionBuilder,
    Distance, PointStruct, SearchPointsBuilder, UpsertPointsBuilder, Value, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::store::{
    check_dimension, check_query_dimension, validate_namespace, validate_top_k, MemoryStore,
};
use super::types::{ScoredRecord, SentenceRecord};
use crate::types::StoreError;

/// Memory store backed by a Qdrant server
pub struct QdrantStore {
    client: Qdrant,
    /// Namespaces initialized but not yet backed by a collection
    pending: Mutex<HashSet<String>>,
    /// Established dimension per namespace
    dimensions: Mutex<HashMap<String, usize>>,
}

fn unavailable(e: impl std::fmt::Display) -> StoreError {
    StoreError::StoreUnavailable(e.to_string())
}

fn unknown_namespace(namespace: &str) -> StoreError {
    StoreError::InvalidArgument(format!("namespace '{}' is not initialized", namespace))
}

impl QdrantStore {
    /// Create a new store, connecting to Qdrant
    pub fn new(url: &str) -> Result<Self, StoreError> {
        debug!("Connecting to Qdrant at {}", url);

        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| unavailable(format!("Failed to create Qdrant client: {}", e)))?;

        Ok(Self {
            client,
            pending: Mutex::new(HashSet::new()),
            dimensions: Mutex::new(HashMap::new()),
        })
    }

    fn cached_dimension(&self, namespace: &str) -> Option<usize> {
        self.dimensions
            .lock()
            .ok()
            .and_then(|d| d.get(namespace).copied())
    }

    fn remember_dimension(&self, namespace: &str, dimension: usize) {
        if let Ok(mut dims) = self.dimensions.lock() {
            dims.insert(namespace.to_string(), dimension);
        }
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(namespace);
        }
    }

    fn mark_pending(&self, namespace: &str) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.insert(namespace.to_string());
        }
    }

    fn is_pending(&self, namespace: &str) -> bool {
        self.pending
            .lock()
            .map(|p| p.contains(namespace))
            .unwrap_or(false)
    }

    /// Read the vector size of an existing collection
    async fn collection_dimension(&self, namespace: &str) -> Result<Option<usize>, StoreError> {
        let info = self
            .client
            .collection_info(namespace)
            .await
            .map_err(|e| unavailable(format!("Failed to get collection info: {}", e)))?;

        let size = info
            .result
            .and_then(|r| r.config)
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|v| v.config)
            .and_then(|config| match config {
                vectors_config::Config::Params(params) => Some(params.size as usize),
                vectors_config::Config::ParamsMap(_) => None,
            });
        Ok(size)
    }

    async fn create_collection(&self, namespace: &str, dimension: usize) -> Result<(), StoreError> {
        info!("Creating collection: {} ({} dims)", namespace, dimension);

        self.client
            .create_collection(
                CreateCollectionBuilder::new(namespace)
                    .vectors_config(VectorParamsBuilder::new(dimension as u64, Distance::Cosine)),
            )
            .await
            .map_err(|e| unavailable(format!("Failed to create collection: {}", e)))?;

        self.remember_dimension(namespace, dimension);
        Ok(())
    }
}

#[async_trait]
impl MemoryStore for QdrantStore {
    async fn initialize(&self, namespace: &str) -> Result<(), StoreError> {
        validate_namespace(namespace)?;

        let exists = self
            .client
            .collection_exists(namespace)
            .await
            .map_err(|e| unavailable(format!("Failed to check collection existence: {}", e)))?;

        if exists {
            debug!("Collection {} already exists", namespace);
            if let Some(dimension) = self.collection_dimension(namespace).await? {
                self.remember_dimension(namespace, dimension);
            }
        } else {
            debug!("Collection {} will be created on first add", namespace);
            self.mark_pending(namespace);
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
        let established = self.cached_dimension(namespace);
        check_dimension(established, embedding.len())?;

        if established.is_none() {
            if !self.is_pending(namespace) {
                return Err(unknown_namespace(namespace));
            }
            self.create_collection(namespace, embedding.len()).await?;
        }

        let record = SentenceRecord::new(
            original_text.to_string(),
            translation.to_string(),
            embedding,
        );

        let payload: HashMap<String, Value> = [
            ("original_text".to_string(), Value::from(record.original_text.clone())),
            ("translation".to_string(), Value::from(record.translation.clone())),
            ("created_at".to_string(), Value::from(record.created_at)),
        ]
        .into_iter()
        .collect();

        let point = PointStruct::new(record.id.to_string(), record.embedding.clone(), payload);

        self.client
            .upsert_points(UpsertPointsBuilder::new(namespace, vec![point]).wait(true))
            .await
            .map_err(|e| unavailable(format!("Failed to upsert sentence: {}", e)))?;

        debug!("Sentence {} stored in {}", record.id, namespace);
        Ok(record.id)
    }

    async fn query_similar(
        &self,
        namespace: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredRecord>, StoreError> {
        validate_top_k(top_k)?;
        let Some(dimension) = self.cached_dimension(namespace) else {
            if self.is_pending(namespace) {
                return Ok(Vec::new());
            }
            return Err(unknown_namespace(namespace));
        };
        check_query_dimension(Some(dimension), embedding.len())?;

        let search_result = self
            .client
            .search_points(
                SearchPointsBuilder::new(namespace, embedding.to_vec(), top_k as u64)
                    .with_payload(true),
            )
            .await
            .map_err(|e| unavailable(format!("Failed to search sentences: {}", e)))?;

        let hits = search_result
            .result
            .into_iter()
            .filter_map(|point| {
                let id = extract_uuid_from_point_id(point.id?)?;
                let payload = point.payload;

                Some(ScoredRecord {
                    record: SentenceRecord {
                        id,
                        original_text: get_string(&payload, "original_text")?,
                        translation: get_string(&payload, "translation")?,
                        embedding: vec![], // Not returned in search results
                        created_at: get_i64(&payload, "created_at").unwrap_or(0),
                    },
                    score: point.score,
                })
            })
            .collect::<Vec<_>>();

        debug!("Found {} similar sentences in {}", hits.len(), namespace);
        Ok(hits)
    }

    async fn count(&self, namespace: &str) -> Result<u64, StoreError> {
        if self.cached_dimension(namespace).is_none() {
            if self.is_pending(namespace) {
                return Ok(0);
            }
            return Err(unknown_namespace(namespace));
        }

        let response = self
            .client
            .count(CountPointsBuilder::new(namespace).exact(true))
            .await
            .map_err(|e| unavailable(format!("Failed to count sentences: {}", e)))?;

        Ok(response.result.map(|r| r.count).unwrap_or(0))
    }

    fn backend(&self) -> &'static str {
        "qdrant"
    }

    /// Final health check so a lost connection surfaces at exit
    async fn shutdown(&self) -> Result<(), StoreError> {
        self.client.health_check().await.map_err(|e| {
            warn!("Qdrant health check failed during shutdown: {}", e);
            unavailable(format!("Qdrant health check failed: {}", e))
        })?;
        Ok(())
    }
}

// Helper to extract UUID from PointId
fn extract_uuid_from_point_id(point_id: qdrant_client::qdrant::PointId) -> Option<Uuid> {
    match point_id.point_id_options? {
        PointIdOptions::Uuid(uuid_str) => Uuid::parse_str(&uuid_str).ok(),
        PointIdOptions::Num(_) => None, // We use UUID strings, not numeric IDs
    }
}

fn get_string(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
    payload.get(key).and_then(|v| v.as_str().map(|s| s.to_string()))
}

fn get_i64(payload: &HashMap<String, Value>, key: &str) -> Option<i64> {
    payload.get(key).and_then(|v| v.as_integer())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Integration tests require a running Qdrant instance
    // These are marked as ignored by default

    #[tokio::test]
    #[ignore]
    async fn test_store_and_search() {
        let store = QdrantStore::new("http://localhost:6334").unwrap();
        let namespace = format!("lingua-test-{}", Uuid::new_v4());
        store.initialize(&namespace).await.unwrap();
        store.initialize(&namespace).await.unwrap();

        let id = store
            .add(&namespace, "The cat sat.", "고양이가 앉았다.", vec![0.1, 0.7, 0.2])
            .await
            .unwrap();

        let hits = store
            .query_similar(&namespace, &[0.1, 0.7, 0.2], 3)
            .await
            .unwrap();
        assert_eq!(hits[0].record.id, id);

        assert!(matches!(
            store.add(&namespace, "x", "y", vec![1.0]).await,
            Err(StoreError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            store.query_similar(&namespace, &[0.1, 0.7], 3).await,
            Err(StoreError::DimensionMismatch { expected: 3, actual: 2 })
        ));
        assert_eq!(store.count(&namespace).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_reports_unreachable_server() {
        let store = QdrantStore::new("http://127.0.0.1:1").unwrap();
        assert!(matches!(
            store.shutdown().await,
            Err(StoreError::StoreUnavailable(_))
        ));
    }
}
