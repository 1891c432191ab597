#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// End-to-end pipeline tests with deterministic in-process fakes:
// ingest -> retrieve -> assemble -> generate, no network access.

use std::cell::RefCell;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use chrono::Utc;
use persona_rag::corpus::{Document, SourceKind};
use persona_rag::embeddings::chunking::{Chunker, ChunkingConfig};
use persona_rag::embeddings::EmbeddingProvider;
use persona_rag::generation::{GenerationRequest, Generator};
use persona_rag::index::{MemoryIndex, SimilarityMetric, VectorIndex};
use persona_rag::ingest::IngestionPipeline;
use persona_rag::retrieval::{AnswerEngine, ContextPolicy, QueryEngine};

const DIMENSION: usize = 16;

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
struct HashEmbedder;

impl EmbeddingProvider for HashEmbedder {
    fn embed(&self, text: &str) -> persona_rag::Result<Vec<f32>> {
        Ok(hash_embedding(text, DIMENSION))
    }

    fn embed_batch(&self, texts: &[String]) -> persona_rag::Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }

    fn model_id(&self) -> &str {
        "hash-embedder-test"
    }
}

#[derive(Debug, Clone)]
struct RecordingGenerator {
    calls: Rc<RefCell<usize>>,
}

impl RecordingGenerator {
    fn new() -> Self {
        Self {
            calls: Rc::new(RefCell::new(0)),
        }
    }
}

impl Generator for RecordingGenerator {
    fn generate(&self, _request: &GenerationRequest) -> persona_rag::Result<String> {
        *self.calls.borrow_mut() += 1;
        Ok("A generated answer grounded in the corpus.".to_string())
    }
}

fn document(id: &str, title: &str, text: &str) -> Document {
    Document {
        id: id.to_string(),
        source_kind: SourceKind::Medium,
        title: title.to_string(),
        url: Some(format!("https://example.com/{}", id)),
        raw_text: text.to_string(),
        fetched_at: Utc::now(),
    }
}

fn corpus() -> Vec<Document> {
    vec![
        document(
            "d1",
            "Postgres at Scale",
            "Notes on tuning relational databases for heavy write workloads. \
             Partitioning, vacuum scheduling, and connection pooling all matter.",
        ),
        document(
            "d2",
            "A Season of Sailing",
            "sailing across the ocean at night under a full set of stars",
        ),
        document(
            "d3",
            "Profile",
            "Software engineer with a background in distributed systems and storage.",
        ),
    ]
}

fn populated_index(documents: &[Document]) -> MemoryIndex {
    let chunker = Chunker::new(ChunkingConfig::default()).expect("config should be valid");
    let index = MemoryIndex::new(DIMENSION, SimilarityMetric::Cosine);
    let mut pipeline = IngestionPipeline::new(chunker, HashEmbedder, index, 16);

    let report = pipeline
        .ingest(documents)
        .expect("ingest should succeed");
    assert!(report.is_complete());

    pipeline.into_index()
}

#[test]
fn question_is_answered_with_cited_sources() {
    let index = populated_index(&corpus());
    let generator = RecordingGenerator::new();
    let engine = AnswerEngine::new(
        QueryEngine::new(HashEmbedder, index, 5),
        generator.clone(),
        ContextPolicy {
            budget: 4000,
            min_similarity: None,
        },
        "Jason",
    );

    let result = engine
        .answer_question("sailing across the ocean at night under a full set of stars", None)
        .expect("answer should succeed");

    assert_eq!(result.answer_text, "A generated answer grounded in the corpus.");
    assert_eq!(*generator.calls.borrow(), 1);
    assert!(!result.sources.is_empty());
    assert!(result.sources.len() <= 5);
    assert_eq!(result.sources[0].title, "A Season of Sailing");
    assert!(result.sources[0].similarity >= result.sources.last().expect("non-empty").similarity);
}

#[test]
fn reingestion_keeps_the_index_stable_across_queries() {
    let documents = corpus();
    let chunker = Chunker::new(ChunkingConfig::default()).expect("config should be valid");
    let index = MemoryIndex::new(DIMENSION, SimilarityMetric::Cosine);
    let mut pipeline = IngestionPipeline::new(chunker, HashEmbedder, index, 16);

    pipeline.ingest(&documents).expect("ingest should succeed");
    let count_after_first = pipeline_count(&pipeline);
    pipeline.ingest(&documents).expect("ingest should succeed");

    assert_eq!(pipeline_count(&pipeline), count_after_first);
}

fn pipeline_count(pipeline: &IngestionPipeline<HashEmbedder, MemoryIndex>) -> u64 {
    pipeline.index().count().expect("count should succeed")
}

#[test]
fn unanswerable_question_reports_insufficient_context() {
    let index = populated_index(&corpus());
    let generator = RecordingGenerator::new();
    let engine = AnswerEngine::new(
        QueryEngine::new(HashEmbedder, index, 5),
        generator.clone(),
        ContextPolicy {
            budget: 4000,
            min_similarity: Some(0.99),
        },
        "Jason",
    );

    let result = engine
        .answer_question("what is the airspeed velocity of an unladen swallow", None)
        .expect("answer should succeed");

    assert!(result.is_insufficient_context());
    assert!(result.sources.is_empty());
    assert_eq!(*generator.calls.borrow(), 0);
}

#[test]
fn context_budget_caps_the_cited_sources() {
    let index = populated_index(&corpus());
    let generator = RecordingGenerator::new();
    let engine = AnswerEngine::new(
        QueryEngine::new(HashEmbedder, index, 5),
        generator.clone(),
        ContextPolicy {
            budget: 80,
            min_similarity: None,
        },
        "Jason",
    );

    let result = engine
        .answer_question("distributed systems and storage", None)
        .expect("answer should succeed");

    let total: usize = result
        .sources
        .iter()
        .map(|source| source.content.chars().count())
        .sum();
    assert!(total <= 80);
}
