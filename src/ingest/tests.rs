use super::*;
use crate::corpus::SourceKind;
use crate::embeddings::chunking::ChunkingConfig;
use crate::index::{MemoryIndex, SimilarityMetric};
use chrono::Utc;
use std::cell::RefCell;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

const DIMENSION: usize = 8;

fn hash_embedding(text: &str, dimension: usize) -> Vec<f32> {
    (0..dimension)
        .map(|component| {
            let mut hasher = DefaultHasher::new();
            text.hash(&mut hasher);
            component.hash(&mut hasher);
            (hasher.finish() % 1000) as f32 / 1000.0 - 0.5
        })
        .collect()
}

#[derive(Debug, Clone)]
struct HashEmbedder {
    dimension: usize,
    calls: Rc<RefCell<usize>>,
    fail_marker: Option<String>,
}

impl HashEmbedder {
    fn new(dimension: usize) -> Self {
        Self {
            dimension,
            calls: Rc::new(RefCell::new(0)),
            fail_marker: None,
        }
    }

    fn failing_on(dimension: usize, marker: &str) -> Self {
        Self {
            dimension,
            calls: Rc::new(RefCell::new(0)),
            fail_marker: Some(marker.to_string()),
        }
    }

    fn batch_calls(&self) -> usize {
        *self.calls.borrow()
    }
}

impl EmbeddingProvider for HashEmbedder {
    fn embed(&self, text: &str) -> crate::Result<Vec<f32>> {
        if let Some(marker) = &self.fail_marker {
            if text.contains(marker) {
                return Err(RagError::EmbeddingUnavailable(
                    "model refused the input".to_string(),
                ));
            }
        }
        Ok(hash_embedding(text, self.dimension))
    }

    fn embed_batch(&self, texts: &[String]) -> crate::Result<Vec<Vec<f32>>> {
        *self.calls.borrow_mut() += 1;
        texts.iter().map(|text| self.embed(text)).collect()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> &str {
        "hash-embedder-test"
    }
}

fn document(id: &str, text: &str) -> Document {
    Document {
        id: id.to_string(),
        source_kind: SourceKind::Medium,
        title: format!("Article {}", id),
        url: Some(format!("https://example.com/{}", id)),
        raw_text: text.to_string(),
        fetched_at: Utc::now(),
    }
}

fn pipeline(
    embedder: HashEmbedder,
    index_dimension: usize,
    batch_size: usize,
) -> IngestionPipeline<HashEmbedder, MemoryIndex> {
    let chunker = Chunker::new(ChunkingConfig {
        chunk_size: 500,
        overlap: 50,
    })
    .expect("config should be valid");
    let index = MemoryIndex::new(index_dimension, SimilarityMetric::Cosine);
    IngestionPipeline::new(chunker, embedder, index, batch_size)
}

#[test]
fn ingest_populates_the_index() {
    let mut pipeline = pipeline(HashEmbedder::new(DIMENSION), DIMENSION, 16);
    let report = pipeline
        .ingest(&[document("d1", &"A".repeat(1200))])
        .expect("ingest should succeed");

    assert_eq!(report.documents_ingested, 1);
    assert_eq!(report.chunks_indexed, 3);
    assert!(report.is_complete());
    assert_eq!(pipeline.phase(), IngestionPhase::Done);

    let index = pipeline.into_index();
    assert_eq!(index.count().expect("count should succeed"), 3);
}

#[test]
fn reingesting_the_same_document_is_idempotent() {
    let mut pipeline = pipeline(HashEmbedder::new(DIMENSION), DIMENSION, 16);
    let documents = [document("d1", &"A".repeat(1200))];

    pipeline.ingest(&documents).expect("ingest should succeed");
    pipeline.ingest(&documents).expect("ingest should succeed");

    let index = pipeline.into_index();
    assert_eq!(index.count().expect("count should succeed"), 3);
}

#[test]
fn reingesting_a_shrunken_document_prunes_the_stale_tail() {
    let mut pipeline = pipeline(HashEmbedder::new(DIMENSION), DIMENSION, 16);

    pipeline
        .ingest(&[document("d1", &"A".repeat(1200))])
        .expect("ingest should succeed");
    pipeline
        .ingest(&[document("d1", &"B".repeat(100))])
        .expect("ingest should succeed");

    let index = pipeline.into_index();
    assert_eq!(index.count().expect("count should succeed"), 1);
}

#[test]
fn reingesting_an_emptied_document_clears_its_entries() {
    let mut pipeline = pipeline(HashEmbedder::new(DIMENSION), DIMENSION, 16);

    pipeline
        .ingest(&[document("d1", &"A".repeat(1200))])
        .expect("ingest should succeed");
    let report = pipeline
        .ingest(&[document("d1", "")])
        .expect("ingest should succeed");

    assert_eq!(report.documents_ingested, 1);
    assert_eq!(report.chunks_indexed, 0);

    let index = pipeline.into_index();
    assert_eq!(index.count().expect("count should succeed"), 0);
}

#[test]
fn one_failing_document_does_not_abort_the_run() {
    let embedder = HashEmbedder::failing_on(DIMENSION, "UNEMBEDDABLE");
    let mut pipeline = pipeline(embedder, DIMENSION, 16);

    let report = pipeline
        .ingest(&[
            document("d1", &"A".repeat(600)),
            document("d2", "UNEMBEDDABLE text"),
            document("d3", &"C".repeat(600)),
        ])
        .expect("ingest should succeed");

    assert_eq!(report.documents_ingested, 2);
    assert!(!report.is_complete());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].document_id, "d2");
    assert_eq!(pipeline.phase(), IngestionPhase::Done);
}

#[test]
fn dimension_mismatch_aborts_the_whole_run() {
    // Embedder produces 4-dimensional vectors, index expects 8.
    let mut pipeline = pipeline(HashEmbedder::new(4), DIMENSION, 16);

    let result = pipeline.ingest(&[
        document("d1", &"A".repeat(600)),
        document("d2", &"B".repeat(600)),
    ]);

    assert!(matches!(
        result,
        Err(RagError::DimensionMismatch {
            expected: 8,
            actual: 4
        })
    ));
    assert_eq!(pipeline.phase(), IngestionPhase::Failed);
}

#[test]
fn embedding_calls_are_batched() {
    let embedder = HashEmbedder::new(DIMENSION);
    let calls = Rc::clone(&embedder.calls);

    // 1200 chars at size 100 / overlap 10 -> 90-char steps -> 14 chunks.
    let chunker = Chunker::new(ChunkingConfig {
        chunk_size: 100,
        overlap: 10,
    })
    .expect("config should be valid");
    let index = MemoryIndex::new(DIMENSION, SimilarityMetric::Cosine);
    let mut pipeline = IngestionPipeline::new(chunker, embedder, index, 5);

    let report = pipeline
        .ingest(&[document("d1", &"A".repeat(1200))])
        .expect("ingest should succeed");

    assert_eq!(report.chunks_indexed, 14);
    // ceil(14 / 5) batches, not one call per chunk
    assert_eq!(*calls.borrow(), 3);
}

#[test]
fn batch_calls_counter_is_shared_between_clones() {
    let embedder = HashEmbedder::new(DIMENSION);
    let clone = embedder.clone();

    embedder
        .embed_batch(&["one".to_string()])
        .expect("embed should succeed");
    assert_eq!(clone.batch_calls(), 1);
}
