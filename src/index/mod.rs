// Vector index module
// Capability interface over nearest-neighbor storage, plus concrete adapters

pub mod memory;
pub mod qdrant;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Result;
use crate::corpus::{Document, SourceKind};
use crate::embeddings::chunking::Chunk;

pub use memory::MemoryIndex;
pub use qdrant::QdrantIndex;

/// Scoring function for vector closeness.
///
/// Scores are only comparable between vectors produced by the same embedding
/// model under the same metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityMetric {
    #[default]
    Cosine,
    Dot,
}

impl SimilarityMetric {
    /// Distance name Qdrant uses when creating a collection.
    #[inline]
    pub fn qdrant_name(self) -> &'static str {
        match self {
            SimilarityMetric::Cosine => "Cosine",
            SimilarityMetric::Dot => "Dot",
        }
    }
}

impl fmt::Display for SimilarityMetric {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimilarityMetric::Cosine => f.write_str("cosine"),
            SimilarityMetric::Dot => f.write_str("dot"),
        }
    }
}

/// Chunk metadata stored alongside its vector, sufficient to answer queries
/// without a second lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkPayload {
    pub chunk_id: Uuid,
    pub document_id: String,
    pub source_kind: SourceKind,
    pub title: String,
    pub url: Option<String>,
    pub text: String,
    pub sequence_index: u32,
    pub fetched_at: DateTime<Utc>,
}

impl ChunkPayload {
    /// Build the payload stored for one chunk of a document.
    #[inline]
    pub fn from_chunk(document: &Document, chunk: &Chunk) -> Self {
        Self {
            chunk_id: chunk.id,
            document_id: document.id.clone(),
            source_kind: document.source_kind,
            title: document.title.clone(),
            url: document.url.clone(),
            text: chunk.text.clone(),
            sequence_index: chunk.sequence_index,
            fetched_at: document.fetched_at,
        }
    }
}

/// An entry owned by the vector index; overwritten when the same `chunk_id`
/// is upserted again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedVector {
    pub chunk_id: Uuid,
    pub vector: Vec<f32>,
    pub payload: ChunkPayload,
}

/// A search hit; ephemeral, produced per query.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidate {
    pub chunk_id: Uuid,
    pub payload: ChunkPayload,
    pub similarity: f32,
}

/// Capability interface over nearest-neighbor storage.
///
/// Upserting an entry with an existing `chunk_id` replaces it atomically from
/// the caller's perspective. Search results are ordered by descending
/// similarity, ties broken by ascending `chunk_id`; asking for more entries
/// than the index holds returns everything, not an error.
pub trait VectorIndex {
    /// Create whatever backing storage the index needs. Idempotent.
    #[inline]
    fn ensure_ready(&mut self) -> Result<()> {
        Ok(())
    }

    /// Store entries, replacing any with the same `chunk_id`. Returns the
    /// number of entries applied. Fails with `DimensionMismatch` when an
    /// entry's vector disagrees with the index's dimensionality.
    fn upsert(&mut self, entries: &[IndexedVector]) -> Result<usize>;

    /// Return up to `top_k` entries ranked by similarity to `query`.
    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<RankedCandidate>>;

    /// Drop entries of `document_id` with `sequence_index >= keep_chunks`,
    /// so a re-ingested document that shrank leaves no stale tail.
    fn prune_document(&mut self, document_id: &str, keep_chunks: u32) -> Result<()>;

    /// Total number of entries stored.
    fn count(&self) -> Result<u64>;

    /// The metric this index was created with.
    fn metric(&self) -> SimilarityMetric;
}

/// Descending similarity, ties by ascending chunk id, so results are
/// deterministic for fixed inputs.
pub(crate) fn sort_candidates(candidates: &mut [RankedCandidate]) {
    candidates.sort_by(|a, b| {
        b.similarity
            .total_cmp(&a.similarity)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
}
