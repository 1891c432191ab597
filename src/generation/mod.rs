// Generation module
// Capability interface over the answer-producing model

pub mod openai;

use crate::Result;

pub use openai::OpenAiClient;

/// One generation call. Unset knobs fall back to the implementation's
/// configured defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system: String,
    pub prompt: String,
    pub max_output_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// Capability interface over a generative model.
///
/// Failures surface as `RagError::GenerationUnavailable` and are not retried
/// here; retry policy, if any, belongs to the implementation's own client.
pub trait Generator {
    fn generate(&self, request: &GenerationRequest) -> Result<String>;
}
