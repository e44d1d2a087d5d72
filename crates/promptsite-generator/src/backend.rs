//! Text-generation backends.
//!
//! The pipeline only needs "prompt in, text out"; [`TextBackend`] is that seam.
//! [`GeminiBackend`] talks to the Google Generative Language REST API.

use async_trait::async_trait;
use promptsite_core::config::BackendConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::http::{ResponseError, ensure_success};

/// Errors returned by a text-generation backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API returned a non-success status code.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message or response body.
        message: String,
    },

    /// The API returned 429 Too Many Requests.
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// The call did not complete in time.
    #[error("backend call timed out after {secs}s")]
    Timeout {
        /// The timeout that elapsed.
        secs: u64,
    },

    /// The response body could not be understood.
    #[error("parse error: {0}")]
    Parse(String),

    /// No API key was configured.
    #[error("no API key configured (set backend.api_key or the {env} environment variable)")]
    MissingApiKey {
        /// Environment variable that was consulted.
        env: String,
    },
}

impl BackendError {
    /// Whether retrying the same call may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Timeout { .. } => true,
            Self::Api { status, .. } => *status >= 500,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Parse(_) | Self::MissingApiKey { .. } => false,
        }
    }
}

impl From<ResponseError> for BackendError {
    fn from(err: ResponseError) -> Self {
        match err {
            ResponseError::RateLimited { retry_after_secs } => {
                Self::RateLimited { retry_after_secs }
            }
            ResponseError::Status { status, message } => Self::Api { status, message },
        }
    }
}

/// A service that turns a prompt into free-form text.
#[async_trait]
pub trait TextBackend: Send + Sync {
    /// Generate a response for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String, BackendError>;
}

// ── Gemini ─────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: [RequestContent<'a>; 1],
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    role: &'static str,
    parts: [RequestPart<'a>; 1],
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// Backend for the Gemini `generateContent` endpoint.
pub struct GeminiBackend {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl GeminiBackend {
    /// Build a backend from configuration.
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let api_key = config
            .resolve_api_key()
            .ok_or_else(|| BackendError::MissingApiKey {
                env: config.api_key_env.clone(),
            })?;

        let http = reqwest::Client::builder()
            .user_agent(concat!("promptsite/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }
}

#[async_trait]
impl TextBackend for GeminiBackend {
    async fn generate(&self, prompt: &str) -> Result<String, BackendError> {
        let body = GenerateContentRequest {
            contents: [RequestContent {
                role: "user",
                parts: [RequestPart { text: prompt }],
            }],
        };

        debug!(model = %self.model, prompt_len = prompt.len(), "calling backend");

        let resp = self
            .http
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        let resp = ensure_success(resp).await?;
        let parsed: GenerateContentResponse = resp.json().await?;

        response_text(parsed)
    }
}

/// Concatenate the text parts of the first candidate.
fn response_text(resp: GenerateContentResponse) -> Result<String, BackendError> {
    let candidate = resp
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| BackendError::Parse("response contained no candidates".to_string()))?;

    let text: String = candidate
        .content
        .map(|content| content.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|part| part.text)
        .collect();

    Ok(text)
}
