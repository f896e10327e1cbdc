// ============================================================================
// RedbStore - Embedded sentence memory (redb)
// ============================================================================
// Persistent local storage for sentence records, one file per user.
// Default path: ~/.lingua/memory.redb (override via LINGUA_DB_PATH env var)
// ============================================================================

use async_trait::async_trait;
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

use super::store::{
    check_dimension, check_query_dimension, validate_namespace, validate_top_k, MemoryStore,
};
use super::types::{rank_by_similarity, ScoredRecord, SentenceRecord};
use crate::types::StoreError;

// Table definitions
const NAMESPACES: TableDefinition<&str, &[u8]> = TableDefinition::new("namespaces");
const SENTENCES: TableDefinition<&str, &[u8]> = TableDefinition::new("sentences");

/// Per-namespace metadata row
#[derive(Debug, Clone, Serialize, Deserialize)]
struct NamespaceMeta {
    dimension: Option<usize>,
    created_at: i64,
}

/// Sentence memory stored in a single redb file
pub struct RedbStore {
    db: Database,
    path: PathBuf,
}

fn unavailable(e: impl std::fmt::Display) -> StoreError {
    StoreError::StoreUnavailable(e.to_string())
}

fn corrupt(e: impl std::fmt::Display) -> StoreError {
    StoreError::StoreUnavailable(format!("corrupt entry: {}", e))
}

fn unknown_namespace(namespace: &str) -> StoreError {
    StoreError::InvalidArgument(format!("namespace '{}' is not initialized", namespace))
}

/// Key range covering every record of one namespace: "ns:" .. "ns;"
fn namespace_range(namespace: &str) -> (String, String) {
    (format!("{}:", namespace), format!("{};", namespace))
}

fn record_key(namespace: &str, id: &Uuid) -> String {
    format!("{}:{}", namespace, id)
}

/// Resolve the database path: explicit, LINGUA_DB_PATH, then ~/.lingua/memory.redb
pub fn default_db_path() -> Result<PathBuf, StoreError> {
    if let Ok(env_path) = std::env::var("LINGUA_DB_PATH") {
        return Ok(PathBuf::from(env_path));
    }
    let home = dirs::home_dir()
        .ok_or_else(|| unavailable("cannot determine home directory"))?;
    Ok(home.join(".lingua").join("memory.redb"))
}

impl RedbStore {
    /// Open (or create) the database at the given path.
    /// If `path` is None, uses LINGUA_DB_PATH or ~/.lingua/memory.redb
    pub fn open(path: Option<&Path>) -> Result<Self, StoreError> {
        let db_path = match path {
            Some(p) => p.to_path_buf(),
            None => default_db_path()?,
        };

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    unavailable(format!("failed to create {}: {}", parent.display(), e))
                })?;
            }
        }

        info!("Opening sentence memory at: {}", db_path.display());

        let db = Database::create(&db_path).map_err(unavailable)?;

        // Ensure tables exist by doing a write transaction
        let write_txn = db.begin_write().map_err(unavailable)?;
        {
            write_txn.open_table(NAMESPACES).map_err(unavailable)?;
            write_txn.open_table(SENTENCES).map_err(unavailable)?;
        }
        write_txn.commit().map_err(unavailable)?;

        Ok(Self { db, path: db_path })
    }

    /// Get the database file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn namespace_meta(&self, namespace: &str) -> Result<Option<NamespaceMeta>, StoreError> {
        let read_txn = self.db.begin_read().map_err(unavailable)?;
        let table = read_txn.open_table(NAMESPACES).map_err(unavailable)?;

        match table.get(namespace).map_err(unavailable)? {
            Some(value) => {
                let meta: NamespaceMeta = bincode::deserialize(value.value()).map_err(corrupt)?;
                Ok(Some(meta))
            }
            None => Ok(None),
        }
    }

    fn load_records(&self, namespace: &str) -> Result<Vec<SentenceRecord>, StoreError> {
        let read_txn = self.db.begin_read().map_err(unavailable)?;
        let table = read_txn.open_table(SENTENCES).map_err(unavailable)?;

        let (start, end) = namespace_range(namespace);
        let mut records = Vec::new();
        let iter = table
            .range::<&str>(start.as_str()..end.as_str())
            .map_err(unavailable)?;
        for entry in iter {
            let (_key, value) = entry.map_err(unavailable)?;
            let record: SentenceRecord = bincode::deserialize(value.value()).map_err(corrupt)?;
            records.push(record);
        }
        Ok(records)
    }
}

#[async_trait]
impl MemoryStore for RedbStore {
    async fn initialize(&self, namespace: &str) -> Result<(), StoreError> {
        validate_namespace(namespace)?;

        let write_txn = self.db.begin_write().map_err(unavailable)?;
        let created;
        {
            let mut table = write_txn.open_table(NAMESPACES).map_err(unavailable)?;
            let exists = table.get(namespace).map_err(unavailable)?.is_some();
            created = !exists;
            if created {
                let meta = NamespaceMeta {
                    dimension: None,
                    created_at: chrono::Utc::now().timestamp(),
                };
                let value = bincode::serialize(&meta).map_err(corrupt)?;
                table
                    .insert(namespace, value.as_slice())
                    .map_err(unavailable)?;
            }
        }
        write_txn.commit().map_err(unavailable)?;

        if created {
            info!("Created namespace {} in {}", namespace, self.path.display());
        } else {
            debug!("Namespace {} already exists", namespace);
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
        // Dimension check, insert and meta update commit together or not at all
        let write_txn = self.db.begin_write().map_err(unavailable)?;
        let id;
        {
            let mut namespaces = write_txn.open_table(NAMESPACES).map_err(unavailable)?;
            let existing: Option<Vec<u8>> = namespaces
                .get(namespace)
                .map_err(unavailable)?
                .map(|guard| guard.value().to_vec());
            let mut meta: NamespaceMeta = match existing {
                Some(bytes) => bincode::deserialize(&bytes).map_err(corrupt)?,
                None => return Err(unknown_namespace(namespace)),
            };

            check_dimension(meta.dimension, embedding.len())?;

            let mut sentences = write_txn.open_table(SENTENCES).map_err(unavailable)?;
            let mut record = SentenceRecord::new(
                original_text.to_string(),
                translation.to_string(),
                embedding,
            );
            while sentences
                .get(record_key(namespace, &record.id).as_str())
                .map_err(unavailable)?
                .is_some()
            {
                record.id = Uuid::new_v4();
            }

            let value = bincode::serialize(&record).map_err(corrupt)?;
            sentences
                .insert(record_key(namespace, &record.id).as_str(), value.as_slice())
                .map_err(unavailable)?;

            if meta.dimension.is_none() {
                meta.dimension = Some(record.embedding.len());
                let meta_value = bincode::serialize(&meta).map_err(corrupt)?;
                namespaces
                    .insert(namespace, meta_value.as_slice())
                    .map_err(unavailable)?;
            }
            id = record.id;
        }
        write_txn.commit().map_err(unavailable)?;

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
        let meta = self
            .namespace_meta(namespace)?
            .ok_or_else(|| unknown_namespace(namespace))?;
        check_query_dimension(meta.dimension, embedding.len())?;

        let records = self.load_records(namespace)?;
        debug!("Scoring {} records in {}", records.len(), namespace);
        Ok(rank_by_similarity(embedding, records, top_k))
    }

    async fn count(&self, namespace: &str) -> Result<u64, StoreError> {
        if self.namespace_meta(namespace)?.is_none() {
            return Err(unknown_namespace(namespace));
        }

        let read_txn = self.db.begin_read().map_err(unavailable)?;
        let table = read_txn.open_table(SENTENCES).map_err(unavailable)?;
        let (start, end) = namespace_range(namespace);
        let count = table
            .range::<&str>(start.as_str()..end.as_str())
            .map_err(unavailable)?
            .count();
        Ok(count as u64)
    }

    fn backend(&self) -> &'static str {
        "redb"
    }
}

impl RedbStore {
    /// Total records across all namespaces
    pub fn total_records(&self) -> Result<u64, StoreError> {
        let read_txn = self.db.begin_read().map_err(unavailable)?;
        let table = read_txn.open_table(SENTENCES).map_err(unavailable)?;
        table.len().map_err(unavailable)
    }
}
