
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::Result;
use crate::corpus::SourceKind;
use crate::embeddings::EmbeddingProvider;
use crate::generation::{GenerationRequest, Generator};
use crate::index::{RankedCandidate, VectorIndex};
use crate::retrieval::QueryEngine;
use crate::retrieval::context::{self, ContextPolicy, ContextSelection};

/// Fixed response used when nothing relevant could be retrieved. Distinct
/// from a failed answer: nothing went wrong, the corpus just has no match.
pub const INSUFFICIENT_CONTEXT_MESSAGE: &str =
    "I could not find anything relevant in the corpus to answer that question.";

/// Source metadata cited alongside an answer, in prompt order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitedSource {
    pub title: String,
    pub content: String,
    pub source_kind: SourceKind,
    pub url: Option<String>,
    pub similarity: f32,
}

/// Response to one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResult {
    pub answer_text: String,
    pub sources: Vec<CitedSource>,
}

impl AnswerResult {
    /// The distinguished no-relevant-content result.
    #[inline]
    pub fn insufficient_context() -> Self {
        Self {
            answer_text: INSUFFICIENT_CONTEXT_MESSAGE.to_string(),
            sources: Vec::new(),
        }
    }

    /// True when this result reports that the corpus held nothing relevant,
    /// rather than carrying a generated answer.
    #[inline]
    pub fn is_insufficient_context(&self) -> bool {
        self.sources.is_empty() && self.answer_text == INSUFFICIENT_CONTEXT_MESSAGE
    }
}

/// Orchestrates retrieval, context assembly, and generation for one
/// question.
pub struct AnswerEngine<E, I, G> {
    query: QueryEngine<E, I>,
    generator: G,
    policy: ContextPolicy,
    persona: String,
}

impl<E: EmbeddingProvider, I: VectorIndex, G: Generator> AnswerEngine<E, I, G> {
    #[inline]
    pub fn new(
        query: QueryEngine<E, I>,
        generator: G,
        policy: ContextPolicy,
        persona: impl Into<String>,
    ) -> Self {
        Self {
            query,
            generator,
            policy,
            persona: persona.into(),
        }
    }

    /// Answer a question from the corpus.
    ///
    /// When no candidate clears the similarity threshold, the generator is
    /// never invoked and the distinguished insufficient-context result is
    /// returned instead.
    #[inline]
    pub fn answer_question(
        &self,
        question: &str,
        top_k: Option<usize>,
    ) -> Result<AnswerResult> {
        let candidates = self.query.retrieve(question, top_k)?;

        let selected = match context::select_context(candidates, &self.policy) {
            ContextSelection::Assembled(selected) => selected,
            ContextSelection::Empty => {
                info!("No relevant content found for question");
                return Ok(AnswerResult::insufficient_context());
            }
        };

        let prompt = context::build_prompt(question, &selected, &self.persona);
        debug!(
            "Generating answer from {} sources ({} prompt chars)",
            selected.entries.len(),
            prompt.user.len()
        );

        let answer_text = self.generator.generate(&GenerationRequest {
            system: prompt.system,
            prompt: prompt.user,
            max_output_tokens: None,
            temperature: None,
        })?;

        Ok(AnswerResult {
            answer_text,
            sources: selected.entries.iter().map(cited_source).collect(),
        })
    }
}

fn cited_source(candidate: &RankedCandidate) -> CitedSource {
    CitedSource {
        title: candidate.payload.title.clone(),
        content: candidate.payload.text.clone(),
        source_kind: candidate.payload.source_kind,
        url: candidate.payload.url.clone(),
        similarity: candidate.similarity,
    }
}
