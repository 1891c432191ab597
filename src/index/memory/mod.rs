
use std::collections::BTreeMap;

use tracing::debug;
use uuid::Uuid;

use super::{IndexedVector, RankedCandidate, SimilarityMetric, VectorIndex, sort_candidates};
use crate::{RagError, Result};

/// In-process vector index.
///
/// Backs tests and small corpora with the same ordering contract as the
/// Qdrant adapter. Callers that share one instance across threads are
/// responsible for wrapping it in their own synchronization.
#[derive(Debug, Clone)]
pub struct MemoryIndex {
    dimension: usize,
    metric: SimilarityMetric,
    entries: BTreeMap<Uuid, IndexedVector>,
}

impl MemoryIndex {
    #[inline]
    pub fn new(dimension: usize, metric: SimilarityMetric) -> Self {
        Self {
            dimension,
            metric,
            entries: BTreeMap::new(),
        }
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    fn score(&self, query: &[f32], candidate: &[f32]) -> f32 {
        match self.metric {
            SimilarityMetric::Cosine => cosine_similarity(query, candidate),
            SimilarityMetric::Dot => dot_product(query, candidate),
        }
    }
}

impl VectorIndex for MemoryIndex {
    #[inline]
    fn upsert(&mut self, entries: &[IndexedVector]) -> Result<usize> {
        for entry in entries {
            self.check_dimension(&entry.vector)?;
        }

        for entry in entries {
            self.entries.insert(entry.chunk_id, entry.clone());
        }

        debug!(
            "Upserted {} entries, index now holds {}",
            entries.len(),
            self.entries.len()
        );
        Ok(entries.len())
    }

    #[inline]
    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<RankedCandidate>> {
        self.check_dimension(query)?;

        let mut candidates: Vec<RankedCandidate> = self
            .entries
            .values()
            .map(|entry| RankedCandidate {
                chunk_id: entry.chunk_id,
                payload: entry.payload.clone(),
                similarity: self.score(query, &entry.vector),
            })
            .collect();

        sort_candidates(&mut candidates);
        candidates.truncate(top_k.max(1));
        Ok(candidates)
    }

    #[inline]
    fn prune_document(&mut self, document_id: &str, keep_chunks: u32) -> Result<()> {
        self.entries.retain(|_, entry| {
            entry.payload.document_id != document_id
                || entry.payload.sequence_index < keep_chunks
        });
        Ok(())
    }

    #[inline]
    fn count(&self) -> Result<u64> {
        Ok(self.entries.len() as u64)
    }

    #[inline]
    fn metric(&self) -> SimilarityMetric {
        self.metric
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let x = f64::from(x);
        let y = f64::from(y);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom <= f64::EPSILON {
        return 0.0;
    }
    (dot / denom) as f32
}

fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| f64::from(x) * f64::from(y))
        .sum::<f64>() as f32
}
