// Retrieval module
// Query embedding, similarity search, context assembly, and answer packaging

#[cfg(test)]
mod tests;

pub mod answer;
pub mod context;

use tracing::debug;

use crate::Result;
use crate::embeddings::EmbeddingProvider;
use crate::index::{RankedCandidate, VectorIndex};

pub use answer::{AnswerEngine, AnswerResult, CitedSource, INSUFFICIENT_CONTEXT_MESSAGE};
pub use context::{ContextPolicy, ContextSelection, SelectedContext};

/// Embeds questions and ranks indexed chunks by similarity.
pub struct QueryEngine<E, I> {
    embedder: E,
    index: I,
    default_top_k: usize,
}

impl<E: EmbeddingProvider, I: VectorIndex> QueryEngine<E, I> {
    #[inline]
    pub fn new(embedder: E, index: I, default_top_k: usize) -> Self {
        Self {
            embedder,
            index,
            default_top_k: default_top_k.max(1),
        }
    }

    /// Return the chunks most similar to `question`, best first.
    ///
    /// `top_k` falls back to the configured default and is clamped to at
    /// least 1. Embedding failures propagate unchanged; scores are comparable
    /// only under this index's metric.
    #[inline]
    pub fn retrieve(
        &self,
        question: &str,
        top_k: Option<usize>,
    ) -> Result<Vec<RankedCandidate>> {
        let top_k = top_k.unwrap_or(self.default_top_k).max(1);

        debug!(
            "Retrieving top {} candidates under {} similarity",
            top_k,
            self.index.metric()
        );

        let query_vector = self.embedder.embed(question)?;
        let candidates = self.index.search(&query_vector, top_k)?;

        debug!("Retrieved {} candidates", candidates.len());
        Ok(candidates)
    }
}
