
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

use super::{
    ChunkPayload, IndexedVector, RankedCandidate, SimilarityMetric, VectorIndex, sort_candidates,
};
use crate::config::QdrantConfig;
use crate::{RagError, Result};

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

/// HTTP adapter over a Qdrant collection.
///
/// The collection is created on first use with the configured dimensionality
/// and metric; upserts are issued with `wait=true` so a replaced point is
/// never observable half-written. Persistence and ANN internals belong to the
/// server.
#[derive(Debug, Clone)]
pub struct QdrantIndex {
    base_url: Url,
    collection: String,
    dimension: usize,
    metric: SimilarityMetric,
    agent: ureq::Agent,
    retry_attempts: u32,
}

#[derive(Debug, Serialize)]
struct CreateCollectionRequest {
    vectors: VectorParams,
}

#[derive(Debug, Serialize)]
struct VectorParams {
    size: usize,
    distance: &'static str,
}

#[derive(Debug, Serialize)]
struct UpsertRequest {
    points: Vec<PointStruct>,
}

#[derive(Debug, Serialize)]
struct PointStruct {
    id: Uuid,
    vector: Vec<f32>,
    payload: ChunkPayload,
}

#[derive(Debug, Serialize)]
struct SearchRequest {
    vector: Vec<f32>,
    limit: usize,
    with_payload: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct ScoredPoint {
    id: Uuid,
    score: f32,
    payload: ChunkPayload,
}

#[derive(Debug, Deserialize)]
struct CountResult {
    count: u64,
}

impl QdrantIndex {
    #[inline]
    pub fn new(
        config: &QdrantConfig,
        dimension: usize,
        metric: SimilarityMetric,
    ) -> Result<Self> {
        let base_url = config
            .url()
            .map_err(|e| RagError::Config(e.to_string()))?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)))
            .build()
            .into();

        Ok(Self {
            base_url,
            collection: config.collection.clone(),
            dimension,
            metric,
            agent,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    /// Create the collection when it does not exist yet.
    fn ensure_collection(&self) -> Result<()> {
        let url = self.collection_url("")?;

        debug!("Checking for collection '{}'", self.collection);

        let exists = match self
            .agent
            .get(url.as_str())
            .call()
            .and_then(|mut resp| resp.body_mut().read_to_string())
        {
            Ok(_) => true,
            Err(ureq::Error::StatusCode(404)) => false,
            Err(error) => {
                return Err(RagError::IndexUnavailable(format!(
                    "failed to check collection '{}': {}",
                    self.collection, error
                )));
            }
        };

        if exists {
            debug!("Collection '{}' already exists", self.collection);
            return Ok(());
        }

        let request = CreateCollectionRequest {
            vectors: VectorParams {
                size: self.dimension,
                distance: self.metric.qdrant_name(),
            },
        };
        let request_json = serialize_request(&request)?;

        self.request_with_retry(|| {
            self.agent
                .put(url.as_str())
                .header("Content-Type", "application/json")
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;

        info!(
            "Created collection '{}' ({} dimensions, {} distance)",
            self.collection,
            self.dimension,
            self.metric.qdrant_name()
        );
        Ok(())
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    fn collection_url(&self, suffix: &str) -> Result<Url> {
        let path = format!("/collections/{}{}", self.collection, suffix);
        self.base_url
            .join(&path)
            .map_err(|e| RagError::Config(format!("failed to build Qdrant URL: {}", e)))
    }

    fn request_with_retry<F>(&self, mut request_fn: F) -> Result<String>
    where
        F: FnMut() -> std::result::Result<String, ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("HTTP request attempt {}/{}", attempt, self.retry_attempts);

            match request_fn() {
                Ok(response_text) => {
                    debug!("Request succeeded on attempt {}", attempt);
                    return Ok(response_text);
                }
                Err(error) => {
                    let should_retry = match &error {
                        ureq::Error::StatusCode(status) => {
                            if *status >= 500 {
                                warn!(
                                    "Server error (status {}), attempt {}/{}",
                                    status, attempt, self.retry_attempts
                                );
                                true
                            } else {
                                warn!("Client error (status {}), not retrying", status);
                                return Err(RagError::IndexUnavailable(format!(
                                    "client error: HTTP {}",
                                    status
                                )));
                            }
                        }
                        ureq::Error::ConnectionFailed
                        | ureq::Error::HostNotFound
                        | ureq::Error::Timeout(_)
                        | ureq::Error::Io(_) => {
                            warn!(
                                "Transport error: {}, attempt {}/{}",
                                error, attempt, self.retry_attempts
                            );
                            true
                        }
                        _ => {
                            warn!("Non-retryable error: {}", error);
                            false
                        }
                    };

                    if !should_retry {
                        return Err(RagError::IndexUnavailable(format!(
                            "non-retryable error: {}",
                            error
                        )));
                    }

                    last_error = Some(RagError::IndexUnavailable(format!(
                        "request error: {}",
                        error
                    )));

                    if attempt < self.retry_attempts {
                        let delay_ms = EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) * 1000;
                        let delay = Duration::from_millis(delay_ms);
                        debug!("Waiting {:?} before retry", delay);
                        std::thread::sleep(delay);
                    }
                }
            }
        }

        error!("All retry attempts failed for request to {}", self.base_url);

        Err(last_error.unwrap_or_else(|| {
            RagError::IndexUnavailable("request failed after retries".to_string())
        }))
    }
}

impl VectorIndex for QdrantIndex {
    #[inline]
    fn ensure_ready(&mut self) -> Result<()> {
        self.ensure_collection()
    }

    #[inline]
    fn upsert(&mut self, entries: &[IndexedVector]) -> Result<usize> {
        if entries.is_empty() {
            debug!("No entries to upsert");
            return Ok(0);
        }

        for entry in entries {
            self.check_dimension(&entry.vector)?;
        }

        let request = UpsertRequest {
            points: entries
                .iter()
                .map(|entry| PointStruct {
                    id: entry.chunk_id,
                    vector: entry.vector.clone(),
                    payload: entry.payload.clone(),
                })
                .collect(),
        };
        let request_json = serialize_request(&request)?;
        let url = self.collection_url("/points?wait=true")?;

        self.request_with_retry(|| {
            self.agent
                .put(url.as_str())
                .header("Content-Type", "application/json")
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;

        debug!(
            "Upserted {} points into collection '{}'",
            entries.len(),
            self.collection
        );
        Ok(entries.len())
    }

    #[inline]
    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<RankedCandidate>> {
        self.check_dimension(query)?;

        let request = SearchRequest {
            vector: query.to_vec(),
            limit: top_k.max(1),
            with_payload: true,
        };
        let request_json = serialize_request(&request)?;
        let url = self.collection_url("/points/search")?;

        let response_text = self.request_with_retry(|| {
            self.agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;

        let response: ApiResponse<Vec<ScoredPoint>> = serde_json::from_str(&response_text)
            .map_err(|e| {
                RagError::IndexUnavailable(format!("failed to parse search response: {}", e))
            })?;

        let mut candidates: Vec<RankedCandidate> = response
            .result
            .into_iter()
            .map(|point| RankedCandidate {
                chunk_id: point.id,
                payload: point.payload,
                similarity: point.score,
            })
            .collect();

        // The server orders by score but leaves equal scores unordered.
        sort_candidates(&mut candidates);

        debug!("Search returned {} candidates", candidates.len());
        Ok(candidates)
    }

    #[inline]
    fn prune_document(&mut self, document_id: &str, keep_chunks: u32) -> Result<()> {
        let request = json!({
            "filter": {
                "must": [
                    { "key": "document_id", "match": { "value": document_id } },
                    { "key": "sequence_index", "range": { "gte": keep_chunks } }
                ]
            }
        });
        let request_json = request.to_string();
        let url = self.collection_url("/points/delete?wait=true")?;

        self.request_with_retry(|| {
            self.agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;

        debug!(
            "Pruned entries of document '{}' past index {}",
            document_id, keep_chunks
        );
        Ok(())
    }

    #[inline]
    fn count(&self) -> Result<u64> {
        let request_json = json!({ "exact": true }).to_string();
        let url = self.collection_url("/points/count")?;

        let response_text = self.request_with_retry(|| {
            self.agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;

        let response: ApiResponse<CountResult> =
            serde_json::from_str(&response_text).map_err(|e| {
                RagError::IndexUnavailable(format!("failed to parse count response: {}", e))
            })?;

        Ok(response.result.count)
    }

    #[inline]
    fn metric(&self) -> SimilarityMetric {
        self.metric
    }
}

fn serialize_request<T: Serialize>(request: &T) -> Result<String> {
    serde_json::to_string(request)
        .map_err(|e| RagError::IndexUnavailable(format!("failed to serialize request: {}", e)))
}
