
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::config::OpenAiConfig;
use crate::generation::{GenerationRequest, Generator};
use crate::{RagError, Result};

const DEFAULT_TIMEOUT_SECONDS: u64 = 60;
const DEFAULT_API_BASE: &str = "https://api.openai.com/v1/";
const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Chat-completions client.
///
/// One attempt per call; a failed generation is surfaced to the caller as a
/// failed answer rather than retried.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    base_url: Url,
    api_key: String,
    model: String,
    temperature: f32,
    max_output_tokens: u32,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

impl OpenAiClient {
    /// Build a client with an explicit API key. The external surface decides
    /// where the key comes from.
    #[inline]
    pub fn new(config: &OpenAiConfig, api_key: impl Into<String>) -> Result<Self> {
        let base_url = Url::parse(DEFAULT_API_BASE)
            .map_err(|e| RagError::Config(format!("invalid API base URL: {}", e)))?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)))
            .build()
            .into();

        Ok(Self {
            base_url,
            api_key: api_key.into(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            agent,
        })
    }

    /// Build a client with the API key from `OPENAI_API_KEY`.
    #[inline]
    pub fn from_env(config: &OpenAiConfig) -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV)
            .map_err(|_| RagError::Config(format!("{} is not set", API_KEY_ENV)))?;
        Self::new(config, api_key)
    }

    /// Point the client at a different API host.
    #[inline]
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        self
    }
}

impl Generator for OpenAiClient {
    #[inline]
    fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let chat_request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: request.system.clone(),
                },
                ChatMessage {
                    role: "user",
                    content: request.prompt.clone(),
                },
            ],
            temperature: request.temperature.unwrap_or(self.temperature),
            max_tokens: request.max_output_tokens.unwrap_or(self.max_output_tokens),
        };

        let url = self
            .base_url
            .join("chat/completions")
            .map_err(|e| RagError::Config(format!("failed to build API URL: {}", e)))?;
        let request_json = serde_json::to_string(&chat_request).map_err(|e| {
            RagError::GenerationUnavailable(format!("failed to serialize request: {}", e))
        })?;

        debug!(
            "Requesting completion from {} (prompt: {} chars)",
            self.model,
            request.prompt.len()
        );

        let authorization = format!("Bearer {}", self.api_key);
        let response_text = self
            .agent
            .post(url.as_str())
            .header("Authorization", authorization.as_str())
            .header("Content-Type", "application/json")
            .send(&request_json)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| {
                RagError::GenerationUnavailable(format!("completion request failed: {}", e))
            })?;

        let response: ChatResponse = serde_json::from_str(&response_text).map_err(|e| {
            RagError::GenerationUnavailable(format!("failed to parse completion: {}", e))
        })?;

        let answer = response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| {
                RagError::GenerationUnavailable("completion contained no choices".to_string())
            })?;

        debug!("Received completion ({} chars)", answer.len());
        Ok(answer)
    }
}
