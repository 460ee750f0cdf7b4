//! CMS upload: POST one Perseus document to an exercise's question list.
//!
//! ```text
//! POST {base_url}/exercise/{exercise_id}/questions
//! Authorization: Bearer {token}
//! {"question_json": <PerseusDocument>}
//! ```
//!
//! HTTP 200 is the only success. The protocol has no idempotency key, so a
//! retry after an ambiguous failure could create a duplicate question:
//! this client never retries and leaves that decision to the caller.

use crate::error::McqError;
use crate::pipeline::perseus::PerseusDocument;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Environment variable holding the CMS base URL.
pub const ENV_UPLOAD_URL: &str = "MCQ_UPLOAD_URL";
/// Environment variable holding the CMS bearer token.
pub const ENV_UPLOAD_TOKEN: &str = "MCQ_UPLOAD_TOKEN";

/// A positive exercise identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExerciseId(u64);

impl ExerciseId {
    pub fn new(id: u64) -> Option<Self> {
        (id > 0).then_some(Self(id))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl FromStr for ExerciseId {
    type Err = McqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .ok()
            .and_then(Self::new)
            .ok_or_else(|| McqError::InvalidExerciseId {
                input: s.to_string(),
            })
    }
}

impl fmt::Display for ExerciseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where and how to upload.
#[derive(Clone)]
pub struct UploadConfig {
    /// Base URL up to (not including) `/exercise/…`.
    pub base_url: String,
    pub api_token: String,
    /// Per-request timeout in seconds. Default: 30.
    pub timeout_secs: u64,
}

impl fmt::Debug for UploadConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadConfig")
            .field("base_url", &self.base_url)
            .field("api_token", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl UploadConfig {
    pub fn new(
        base_url: impl Into<String>,
        api_token: impl Into<String>,
    ) -> Result<Self, McqError> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        let api_token = api_token.into().trim().to_string();

        if base_url.is_empty() {
            return Err(McqError::MissingConfig {
                name: ENV_UPLOAD_URL.into(),
                hint: "Provide the CMS base URL with --upload-url or MCQ_UPLOAD_URL.".into(),
            });
        }
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(McqError::InvalidConfig(format!(
                "upload URL must be http(s), got '{base_url}'"
            )));
        }
        if api_token.is_empty() {
            return Err(McqError::MissingConfig {
                name: ENV_UPLOAD_TOKEN.into(),
                hint: "Provide the CMS token with --upload-token or MCQ_UPLOAD_TOKEN.".into(),
            });
        }

        Ok(Self {
            base_url,
            api_token,
            timeout_secs: 30,
        })
    }

    /// Read `MCQ_UPLOAD_URL` and `MCQ_UPLOAD_TOKEN`.
    pub fn from_env() -> Result<Self, McqError> {
        let url = std::env::var(ENV_UPLOAD_URL).unwrap_or_default();
        let token = std::env::var(ENV_UPLOAD_TOKEN).unwrap_or_default();
        Self::new(url, token)
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs.max(1);
        self
    }
}

/// Result of one upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UploadOutcome {
    Success,
    RejectedByServer {
        status: u16,
        body: String,
        /// Error message extracted from a JSON body, when there is one.
        error: Option<String>,
    },
    TransportFailure {
        cause: String,
    },
}

impl UploadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, UploadOutcome::Success)
    }
}

impl fmt::Display for UploadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadOutcome::Success => write!(f, "uploaded"),
            UploadOutcome::RejectedByServer {
                status,
                error: Some(msg),
                ..
            } => write!(f, "rejected by server (HTTP {status}): {msg}"),
            UploadOutcome::RejectedByServer { status, body, .. } => {
                write!(f, "rejected by server (HTTP {status}): {body}")
            }
            UploadOutcome::TransportFailure { cause } => write!(f, "transport failure: {cause}"),
        }
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    question_json: &'a PerseusDocument,
}

/// Authenticated client for the exercise question endpoint.
#[derive(Debug, Clone)]
pub struct UploadClient {
    http: reqwest::Client,
    config: UploadConfig,
}

impl UploadClient {
    pub fn new(config: UploadConfig) -> Result<Self, McqError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| McqError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    pub fn endpoint(&self, exercise: ExerciseId) -> String {
        format!("{}/exercise/{}/questions", self.config.base_url, exercise)
    }

    /// Parse `exercise` and upload. Invalid ids fail before any request.
    pub async fn upload_to(
        &self,
        exercise: &str,
        document: &PerseusDocument,
    ) -> Result<UploadOutcome, McqError> {
        let exercise: ExerciseId = exercise.parse()?;
        Ok(self.upload(exercise, document).await)
    }

    pub async fn upload(&self, exercise: ExerciseId, document: &PerseusDocument) -> UploadOutcome {
        let url = self.endpoint(exercise);
        debug!("POST {}", url);

        let response = match self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_token)
            .json(&Envelope {
                question_json: document,
            })
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let cause = if e.is_timeout() {
                    format!("request timed out after {}s", self.config.timeout_secs)
                } else {
                    e.to_string()
                };
                warn!("Upload to exercise {} failed: {}", exercise, cause);
                return UploadOutcome::TransportFailure { cause };
            }
        };

        let status = response.status();
        if status == StatusCode::OK {
            info!("Uploaded question to exercise {}", exercise);
            return UploadOutcome::Success;
        }

        let (body, error) = match response.text().await {
            Ok(body) => {
                let error = server_error_message(&body);
                (body, error)
            }
            Err(e) => (String::new(), Some(format!("failed to read response body: {e}"))),
        };
        warn!(
            "Exercise {} rejected upload: HTTP {} {}",
            exercise,
            status.as_u16(),
            error.as_deref().unwrap_or(&body)
        );
        UploadOutcome::RejectedByServer {
            status: status.as_u16(),
            body,
            error,
        }
    }
}

/// Pull a human-readable message out of a JSON error body.
fn server_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["error", "message", "detail"].iter().find_map(|key| match value.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Object(inner) => inner
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    })
}
