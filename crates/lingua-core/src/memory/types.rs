//! ============================================================================
//! Memory Types - Persisted sentence records and similarity hits
//! ============================================================================

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A remembered sentence: source text, its translation and its embedding.
///
/// Records are created once by the pipeline and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentenceRecord {
    /// Unique identifier, never reused within a namespace
    pub id: Uuid,
    /// Source-language sentence as submitted
    pub original_text: String,
    /// Target-language sentence
    pub translation: String,
    /// Vector embedding of `original_text`
    pub embedding: Vec<f32>,
    /// Unix timestamp when the record was created
    pub created_at: i64,
}

impl SentenceRecord {
    pub fn new(original_text: String, translation: String, embedding: Vec<f32>) -> Self {
        Self {
            id: Uuid::new_v4(),
            original_text,
            translation,
            embedding,
            created_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// A record returned by a similarity query, with its cosine score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecord {
    pub record: SentenceRecord,
    pub score: f32,
}

/// Cosine similarity in [-1, 1]; zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Score every candidate against `query` and keep the best `top_k`.
///
/// Ties keep their input order, so results are deterministic.
pub(crate) fn rank_by_similarity<I>(query: &[f32], candidates: I, top_k: usize) -> Vec<ScoredRecord>
where
    I: IntoIterator<Item = SentenceRecord>,
{
    let mut scored: Vec<ScoredRecord> = candidates
        .into_iter()
        .map(|record| {
            let score = cosine_similarity(query, &record.embedding);
            ScoredRecord { record, score }
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(top_k);
    scored
}
