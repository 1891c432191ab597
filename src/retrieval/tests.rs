use super::*;
use crate::RagError;
use crate::corpus::{Document, SourceKind};
use crate::embeddings::chunking::{Chunker, ChunkingConfig};
use crate::index::{MemoryIndex, SimilarityMetric};
use crate::ingest::IngestionPipeline;
use chrono::Utc;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

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
}

impl EmbeddingProvider for HashEmbedder {
    fn embed(&self, text: &str) -> crate::Result<Vec<f32>> {
        Ok(hash_embedding(text, self.dimension))
    }

    fn embed_batch(&self, texts: &[String]) -> crate::Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> &str {
        "hash-embedder-test"
    }
}

#[derive(Debug)]
struct UnavailableEmbedder;

impl EmbeddingProvider for UnavailableEmbedder {
    fn embed(&self, _text: &str) -> crate::Result<Vec<f32>> {
        Err(RagError::EmbeddingUnavailable(
            "model could not be loaded".to_string(),
        ))
    }

    fn embed_batch(&self, _texts: &[String]) -> crate::Result<Vec<Vec<f32>>> {
        Err(RagError::EmbeddingUnavailable(
            "model could not be loaded".to_string(),
        ))
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }

    fn model_id(&self) -> &str {
        "unavailable-test"
    }
}

fn document(id: &str, title: &str, text: &str) -> Document {
    Document {
        id: id.to_string(),
        source_kind: SourceKind::Medium,
        title: title.to_string(),
        url: None,
        raw_text: text.to_string(),
        fetched_at: Utc::now(),
    }
}

/// Ingest short single-chunk documents and hand back the populated index.
fn populated_index(documents: &[Document]) -> MemoryIndex {
    let chunker = Chunker::new(ChunkingConfig::default()).expect("config should be valid");
    let embedder = HashEmbedder {
        dimension: DIMENSION,
    };
    let index = MemoryIndex::new(DIMENSION, SimilarityMetric::Cosine);
    let mut pipeline = IngestionPipeline::new(chunker, embedder, index, 16);
    pipeline.ingest(documents).expect("ingest should succeed");
    pipeline.into_index()
}

#[test]
fn query_matching_an_indexed_chunk_ranks_it_first() {
    let documents = [
        document("d1", "On Databases", "all about relational databases"),
        document("d2", "On Sailing", "sailing across the ocean at night"),
        document("d3", "On Cooking", "recipes for slow cooked meals"),
    ];
    let index = populated_index(&documents);
    let engine = QueryEngine::new(
        HashEmbedder {
            dimension: DIMENSION,
        },
        index,
        5,
    );

    let candidates = engine
        .retrieve("sailing across the ocean at night", None)
        .expect("retrieve should succeed");

    assert_eq!(candidates[0].payload.title, "On Sailing");
    assert!((candidates[0].similarity - 1.0).abs() < 1e-6);
    for pair in candidates.windows(2) {
        assert!(pair[0].similarity >= pair[1].similarity);
    }
}

#[test]
fn top_k_defaults_to_the_configured_value() {
    let documents: Vec<Document> = (0..8)
        .map(|n| {
            document(
                &format!("d{}", n),
                &format!("Article {}", n),
                &format!("text of article number {}", n),
            )
        })
        .collect();
    let index = populated_index(&documents);
    let engine = QueryEngine::new(
        HashEmbedder {
            dimension: DIMENSION,
        },
        index,
        5,
    );

    let candidates = engine
        .retrieve("text of an article", None)
        .expect("retrieve should succeed");
    assert_eq!(candidates.len(), 5);
}

#[test]
fn top_k_larger_than_the_index_returns_everything() {
    let documents = [
        document("d1", "One", "first article text"),
        document("d2", "Two", "second article text"),
    ];
    let index = populated_index(&documents);
    let engine = QueryEngine::new(
        HashEmbedder {
            dimension: DIMENSION,
        },
        index,
        5,
    );

    let candidates = engine
        .retrieve("article text", Some(5))
        .expect("retrieve should succeed");
    assert_eq!(candidates.len(), 2);
}

#[test]
fn zero_top_k_is_clamped_to_one() {
    let documents = [document("d1", "One", "first article text")];
    let index = populated_index(&documents);
    let engine = QueryEngine::new(
        HashEmbedder {
            dimension: DIMENSION,
        },
        index,
        5,
    );

    let candidates = engine
        .retrieve("first article", Some(0))
        .expect("retrieve should succeed");
    assert_eq!(candidates.len(), 1);
}

#[test]
fn embedding_failure_propagates_unchanged() {
    let index = MemoryIndex::new(DIMENSION, SimilarityMetric::Cosine);
    let engine = QueryEngine::new(UnavailableEmbedder, index, 5);

    let result = engine.retrieve("any question", None);
    assert!(matches!(result, Err(RagError::EmbeddingUnavailable(_))));
}
