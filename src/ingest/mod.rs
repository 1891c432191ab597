// Ingestion module
// Drives chunking, embedding, and index writes for scraped documents

#[cfg(test)]
mod tests;

use std::fmt;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::corpus::Document;
use crate::embeddings::chunking::Chunker;
use crate::embeddings::EmbeddingProvider;
use crate::index::{ChunkPayload, IndexedVector, VectorIndex};
use crate::{RagError, Result};

/// Progress of an ingestion run. `Failed` is terminal and reachable from any
/// step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestionPhase {
    Collecting,
    Chunking,
    Embedding,
    Storing,
    Done,
    Failed,
}

impl fmt::Display for IngestionPhase {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IngestionPhase::Collecting => "collecting",
            IngestionPhase::Chunking => "chunking",
            IngestionPhase::Embedding => "embedding",
            IngestionPhase::Storing => "storing",
            IngestionPhase::Done => "done",
            IngestionPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A document the run could not ingest. The caller can retry just these;
/// chunk ids are deterministic, so a retry overwrites any partial write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFailure {
    pub document_id: String,
    pub error: String,
}

/// Terminal report of one ingestion run.
#[derive(Debug, Clone, Default)]
pub struct IngestionReport {
    pub run_id: Uuid,
    pub documents_ingested: usize,
    pub chunks_indexed: usize,
    pub failed: Vec<DocumentFailure>,
}

impl IngestionReport {
    /// True when every document made it into the index.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Orchestrates chunking, embedding, and index writes for a batch of
/// documents.
///
/// Per-document failures are recorded and the run continues; a dimension
/// mismatch signals an embedding-model inconsistency and aborts the whole
/// run instead.
pub struct IngestionPipeline<E, I> {
    chunker: Chunker,
    embedder: E,
    index: I,
    batch_size: usize,
    phase: IngestionPhase,
}

impl<E: EmbeddingProvider, I: VectorIndex> IngestionPipeline<E, I> {
    #[inline]
    pub fn new(chunker: Chunker, embedder: E, index: I, batch_size: usize) -> Self {
        Self {
            chunker,
            embedder,
            index,
            batch_size: batch_size.max(1),
            phase: IngestionPhase::Collecting,
        }
    }

    #[inline]
    pub fn phase(&self) -> IngestionPhase {
        self.phase
    }

    /// Borrow the index this pipeline writes into.
    #[inline]
    pub fn index(&self) -> &I {
        &self.index
    }

    /// Hand back the populated index once ingestion is finished.
    #[inline]
    pub fn into_index(self) -> I {
        self.index
    }

    /// Ingest a batch of documents, best-effort.
    ///
    /// The report lists the ids of documents that failed so the caller can
    /// retry them. Embedding and index writes are batched to bound the number
    /// of round trips.
    #[inline]
    pub fn ingest(&mut self, documents: &[Document]) -> Result<IngestionReport> {
        let run_id = Uuid::new_v4();
        self.advance(IngestionPhase::Collecting);
        info!(
            "Starting ingestion run {} with {} documents (model: {})",
            run_id,
            documents.len(),
            self.embedder.model_id()
        );

        if let Err(error) = self.index.ensure_ready() {
            self.advance(IngestionPhase::Failed);
            return Err(error);
        }

        let mut report = IngestionReport {
            run_id,
            ..IngestionReport::default()
        };

        for document in documents {
            match self.ingest_document(document) {
                Ok(chunk_count) => {
                    report.documents_ingested += 1;
                    report.chunks_indexed += chunk_count;
                }
                Err(error @ RagError::DimensionMismatch { .. }) => {
                    // A mismatched vector means the index holds another
                    // model's embeddings; continuing would corrupt it.
                    self.advance(IngestionPhase::Failed);
                    return Err(error);
                }
                Err(error) => {
                    warn!("Skipping document '{}': {}", document.id, error);
                    report.failed.push(DocumentFailure {
                        document_id: document.id.clone(),
                        error: error.to_string(),
                    });
                }
            }
        }

        self.advance(IngestionPhase::Done);
        info!(
            "Ingestion run {} finished: {} documents, {} chunks, {} failures",
            run_id,
            report.documents_ingested,
            report.chunks_indexed,
            report.failed.len()
        );

        Ok(report)
    }

    fn ingest_document(&mut self, document: &Document) -> Result<usize> {
        self.advance(IngestionPhase::Chunking);
        let chunks = self.chunker.chunk(document);

        if chunks.is_empty() {
            debug!("Document '{}' produced no chunks", document.id);
            self.advance(IngestionPhase::Storing);
            self.index.prune_document(&document.id, 0)?;
            return Ok(0);
        }

        let mut stored = 0;
        for batch in chunks.chunks(self.batch_size) {
            self.advance(IngestionPhase::Embedding);
            let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts)?;

            self.advance(IngestionPhase::Storing);
            let entries: Vec<IndexedVector> = batch
                .iter()
                .zip(vectors)
                .map(|(chunk, vector)| IndexedVector {
                    chunk_id: chunk.id,
                    vector,
                    payload: ChunkPayload::from_chunk(document, chunk),
                })
                .collect();
            stored += self.index.upsert(&entries)?;
        }

        // A shrunken document leaves fewer chunks than before; drop the rest.
        self.index
            .prune_document(&document.id, chunks.len() as u32)?;

        debug!(
            "Indexed document '{}' as {} chunks",
            document.id, stored
        );
        Ok(stored)
    }

    fn advance(&mut self, phase: IngestionPhase) {
        if phase != self.phase {
            debug!("Ingestion phase: {} -> {}", self.phase, phase);
            self.phase = phase;
        }
    }
}
