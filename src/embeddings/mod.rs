// Embeddings module
// This module handles content chunking and the embedding service client

pub mod chunking;
pub mod ollama;

use crate::Result;

pub use chunking::{Chunk, Chunker, ChunkingConfig};
pub use ollama::OllamaClient;

/// Capability interface over an embedding model.
///
/// Implementations must be deterministic for a fixed model version and must
/// preserve input order in `embed_batch`. Batch calls are all-or-nothing: a
/// partial result is an error, never a shorter output.
pub trait EmbeddingProvider {
    /// Embed a single text. Fails with `RagError::EmbeddingUnavailable` when
    /// the underlying model or service cannot be reached.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed multiple texts, preserving input order.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Dimensionality of every vector this provider produces.
    fn dimension(&self) -> usize;

    /// Stable identity of the underlying model. Vectors produced under
    /// different model identities must never share an index.
    fn model_id(&self) -> &str;
}
