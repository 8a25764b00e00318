//! HTTP client for the inference service (`POST {base_url}/answer`).

use crate::relay::ParsedQuery;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Upper bound on one inference call, including connect and body read.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Response body of `/answer`: `{"answer": ..}` or `{"error": ..}`. `score` is the model confidence when reported.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InferenceResponse {
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
}

/// Result of one inference call. Callers match both variants.
#[derive(Debug, Clone, PartialEq)]
pub enum InferenceOutcome {
    Answered { text: String, score: Option<f64> },
    Failed(Failure),
}

/// Why an inference call did not produce an answer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Failure {
    /// The service answered with an explicit `error` field.
    #[error("{reason}")]
    Application { reason: String },
    #[error("API returned status {code}")]
    Status { code: u16 },
    /// 200 with a body that has neither `answer` nor `error`, or is not JSON.
    #[error("unexpected response")]
    Unexpected,
    /// Connect, DNS or timeout failure. `cause` is for operator logs only.
    #[error("unreachable")]
    Unreachable { cause: String },
}

impl Failure {
    /// Short reason string: the service's error text, `API returned status <code>`, `unexpected response` or `unreachable`.
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

impl From<InferenceResponse> for InferenceOutcome {
    fn from(res: InferenceResponse) -> Self {
        match res {
            InferenceResponse {
                answer: Some(text),
                score,
                ..
            } => InferenceOutcome::Answered { text, score },
            InferenceResponse {
                error: Some(reason),
                ..
            } => InferenceOutcome::Failed(Failure::Application { reason }),
            _ => InferenceOutcome::Failed(Failure::Unexpected),
        }
    }
}

/// Anything that can answer a parsed query. The gateway only depends on this.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    async fn call(&self, query: &ParsedQuery) -> InferenceOutcome;
}

/// Client for the inference HTTP API.
#[derive(Clone)]
pub struct InferenceClient {
    base_url: String,
    client: reqwest::Client,
}

impl InferenceClient {
    /// `base_url` is the service root; `/answer` is appended. Trailing slashes are ignored.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn answer_url(&self) -> String {
        format!("{}/answer", self.base_url)
    }

    /// POST /answer — single attempt, no retries.
    pub async fn call(&self, query: &ParsedQuery) -> InferenceOutcome {
        let url = self.answer_url();
        let res = match self.client.post(&url).json(query).send().await {
            Ok(r) => r,
            Err(e) => {
                return InferenceOutcome::Failed(Failure::Unreachable {
                    cause: e.to_string(),
                })
            }
        };
        let status = res.status();
        if status != reqwest::StatusCode::OK {
            let body = res.text().await.unwrap_or_default();
            log::debug!("inference: {} returned {}: {}", url, status, body);
            return InferenceOutcome::Failed(Failure::Status {
                code: status.as_u16(),
            });
        }
        let body = match res.bytes().await {
            Ok(b) => b,
            Err(e) => {
                return InferenceOutcome::Failed(Failure::Unreachable {
                    cause: e.to_string(),
                })
            }
        };
        match serde_json::from_slice::<InferenceResponse>(&body) {
            Ok(data) => data.into(),
            Err(e) => {
                log::debug!("inference: undecodable body from {}: {}", url, e);
                InferenceOutcome::Failed(Failure::Unexpected)
            }
        }
    }
}

#[async_trait]
impl InferenceBackend for InferenceClient {
    async fn call(&self, query: &ParsedQuery) -> InferenceOutcome {
        InferenceClient::call(self, query).await
    }
}
