//! ============================================================================
//! Aligner - Source/target token pairing
//! ============================================================================
//! `PositionalAligner` is a placeholder for a real alignment model: it pairs
//! tokens by position and drops whatever the longer side has left over. Its
//! output carries no linguistic meaning.
//! ============================================================================

use crate::types::{AlignError, AlignmentPair};

/// Pairs source tokens with target tokens
pub trait Aligner: Send + Sync {
    fn align(&self, source: &[String], target: &[String]) -> Result<Vec<AlignmentPair>, AlignError>;
}

/// Zip by position, stopping at the shorter sequence
#[derive(Debug, Clone, Copy, Default)]
pub struct PositionalAligner;

impl Aligner for PositionalAligner {
    fn align(&self, source: &[String], target: &[String]) -> Result<Vec<AlignmentPair>, AlignError> {
        Ok(align_positional(source, target))
    }
}

/// Pair `i` is `(source[i], target[i])`; length is `min(source.len(), target.len())`.
pub fn align_positional(source: &[String], target: &[String]) -> Vec<AlignmentPair> {
    source
        .iter()
        .zip(target.iter())
        .enumerate()
        .map(|(index, (s, t))| AlignmentPair {
            index,
            source: s.clone(),
            target: t.clone(),
        })
        .collect()
}
