
use itertools::Itertools;
use tracing::debug;

use crate::index::RankedCandidate;

/// Bounds on what may be admitted into a generation prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextPolicy {
    /// Maximum combined chunk text, in characters.
    pub budget: usize,
    /// Candidates scoring below this are dropped even when budget remains.
    pub min_similarity: Option<f32>,
}

/// Candidates admitted under a policy, in prompt order.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedContext {
    pub entries: Vec<RankedCandidate>,
    /// Set when the top candidate alone exceeded the budget and was cut to
    /// fit.
    pub truncated_first: bool,
}

/// Outcome of candidate selection. `Empty` is a legitimate
/// no-relevant-content result, distinguished from failures so callers render
/// it differently.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextSelection {
    Assembled(SelectedContext),
    Empty,
}

/// Deterministic prompt for the generative model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Admit candidates in descending-similarity order until the character
/// budget is exhausted.
///
/// The selection is a prefix: the first candidate that would overflow stops
/// it. A candidate is never split across the boundary, except that an
/// oversized top candidate is truncated to fit so a non-empty candidate set
/// always yields some context.
#[inline]
pub fn select_context(
    candidates: Vec<RankedCandidate>,
    policy: &ContextPolicy,
) -> ContextSelection {
    let mut entries = Vec::new();
    let mut used = 0;
    let mut truncated_first = false;

    for mut candidate in candidates {
        if let Some(threshold) = policy.min_similarity {
            if candidate.similarity < threshold {
                debug!(
                    "Dropping candidate {} below similarity threshold ({} < {})",
                    candidate.chunk_id, candidate.similarity, threshold
                );
                continue;
            }
        }

        let length = candidate.payload.text.chars().count();
        if used + length > policy.budget {
            if !entries.is_empty() {
                break;
            }
            // The best candidate alone blows the budget; cut it down rather
            // than answer with no context at all.
            candidate.payload.text =
                candidate.payload.text.chars().take(policy.budget).collect();
            truncated_first = true;
            entries.push(candidate);
            break;
        }

        used += length;
        entries.push(candidate);
    }

    if entries.is_empty() {
        debug!("No candidate survived selection");
        return ContextSelection::Empty;
    }

    debug!(
        "Selected {} candidates ({} of {} budget chars)",
        entries.len(),
        entries
            .iter()
            .map(|entry| entry.payload.text.chars().count())
            .sum::<usize>(),
        policy.budget
    );
    ContextSelection::Assembled(SelectedContext {
        entries,
        truncated_first,
    })
}

/// Assemble the fixed prompt template from the selected context.
///
/// The output is a pure function of the question, the selection, and the
/// persona name: same inputs, same prompt.
#[inline]
pub fn build_prompt(question: &str, selection: &SelectedContext, persona: &str) -> Prompt {
    let context = selection
        .entries
        .iter()
        .enumerate()
        .map(|(position, candidate)| {
            format!(
                "[Source {}] {} ({})\n{}\n",
                position + 1,
                candidate.payload.title,
                candidate.payload.source_kind,
                candidate.payload.text
            )
        })
        .join("\n");

    let system = format!(
        "You are a helpful assistant that answers questions based on what you know about {}.",
        persona
    );
    let user = format!(
        "You are an AI assistant answering questions based on {persona}'s writing and profile. \
The following is what you know about {persona}; use it to answer the question. If the answer \
is not in what you know about {persona}, say that you do not know {persona} well enough to \
answer the question.\n\n\
What I know about {persona}:\n{context}\n\n\
Question: {question}\n\n\
Answer:",
        persona = persona,
        context = context,
        question = question
    );

    Prompt { system, user }
}
