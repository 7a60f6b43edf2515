//! Remote style recommendation client.
//!
//! Sends the user's seed tracks to the recommendation service and turns
//! its answer into a flat list of style labels.
//!
//! # Endpoints
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | `POST` | `/recommend` | Score seed tracks, returns `final_top_labels` |
//! | `GET` | `/health` | Liveness probe |
//!
//! # Failure Handling
//!
//! - 2xx with a missing or malformed `final_top_labels` → logged, empty list.
//! - Non-2xx with a JSON body (`{error, traceback}`) → returned as
//!   [`RecommendOutcome::RemoteError`], not an `Err`.
//! - Any other failure (connection refused, timeout, non-JSON error body)
//!   → [`Error::Transport`].
//!
//! No retries are attempted.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::config::ApiConfig;
use crate::error::{Error, Result};

/// Model selector sent with every request.
pub const MODEL_ID: u32 = 1;
/// Neighbor / top-k parameters sent with every request.
pub const K_NEIGHBORS: u32 = 3;
pub const PER_SEED_TOP: u32 = 3;
pub const FINAL_TOP: u32 = 3;
/// Feature columns the model compares on.
pub const VECTOR_COLS: [&str; 3] = ["genre_vector", "mood_vector", "texture_vector"];

/// Body of `POST /recommend`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendRequest {
    pub model_id: u32,
    pub seeds: Vec<u32>,
    pub k_neighbors: u32,
    pub per_seed_top: u32,
    pub final_top: u32,
    pub vector_cols: Vec<String>,
}

impl RecommendRequest {
    pub fn for_seeds(seeds: &[u32]) -> Self {
        Self {
            model_id: MODEL_ID,
            seeds: seeds.to_vec(),
            k_neighbors: K_NEIGHBORS,
            per_seed_top: PER_SEED_TOP,
            final_top: FINAL_TOP,
            vector_cols: VECTOR_COLS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Structured error body returned by the service on failure.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteError {
    pub status: u16,
    pub body: Value,
}

impl RemoteError {
    /// The `error` field, when it is a string.
    pub fn message(&self) -> Option<&str> {
        self.body.get("error").and_then(Value::as_str)
    }

    pub fn traceback(&self) -> Option<&str> {
        self.body.get("traceback").and_then(Value::as_str)
    }
}

/// Result of a recommendation call that reached the service.
#[derive(Debug, Clone, PartialEq)]
pub enum RecommendOutcome {
    Labels(Vec<String>),
    RemoteError(RemoteError),
}

impl RecommendOutcome {
    /// Style labels, or an empty list when the service reported an error.
    pub fn labels(&self) -> &[String] {
        match self {
            RecommendOutcome::Labels(labels) => labels,
            RecommendOutcome::RemoteError(_) => &[],
        }
    }

    pub fn into_labels(self) -> Vec<String> {
        match self {
            RecommendOutcome::Labels(labels) => labels,
            RecommendOutcome::RemoteError(_) => Vec::new(),
        }
    }
}

/// Keep the part of a label before the first `/`, trimmed. Non-strings
/// become `""` so positions still line up with the response.
pub fn normalize_label(label: &Value) -> String {
    match label.as_str() {
        Some(s) => s.split('/').next().unwrap_or_default().trim().to_string(),
        None => String::new(),
    }
}

/// Extract and normalize `final_top_labels` from a success body.
///
/// Returns `None` when the field is missing or not an array.
pub fn parse_labels(body: &Value) -> Option<Vec<String>> {
    body.get("final_top_labels")
        .and_then(Value::as_array)
        .map(|labels| labels.iter().map(normalize_label).collect())
}

pub struct RecommendClient {
    base_url: String,
    http: reqwest::Client,
}

impl RecommendClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        Self::new(
            config.base_url.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Ask the service for style labels matching `seeds`.
    pub async fn recommend(&self, seeds: &[u32]) -> Result<RecommendOutcome> {
        let request = RecommendRequest::for_seeds(seeds);
        let url = format!("{}/recommend", self.base_url);

        let resp = self
            .http
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!(url = %url, error = %e, "recommend request failed");
                Error::from(e)
            })?;

        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return match serde_json::from_str::<Value>(&text) {
                Ok(body) => {
                    warn!(status = status.as_u16(), body = %body, "recommend returned an error body");
                    Ok(RecommendOutcome::RemoteError(RemoteError {
                        status: status.as_u16(),
                        body,
                    }))
                }
                Err(_) => {
                    error!(status = status.as_u16(), "recommend failed without a structured body");
                    Err(Error::Transport(format!(
                        "recommend failed (HTTP {}): {}",
                        status,
                        text.chars().take(500).collect::<String>()
                    )))
                }
            };
        }

        let body: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
        match parse_labels(&body) {
            Some(labels) => {
                info!(seeds = seeds.len(), labels = ?labels, "recommendation received");
                Ok(RecommendOutcome::Labels(labels))
            }
            None => {
                warn!(body = %body, "final_top_labels missing or not an array");
                Ok(RecommendOutcome::Labels(Vec::new()))
            }
        }
    }

    /// Best-effort liveness probe. Never fails; logs what it saw.
    pub async fn health(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.http.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => {
                let body = resp.text().await.unwrap_or_default();
                info!(body = %body, "health ok");
                true
            }
            Ok(resp) => {
                warn!(status = resp.status().as_u16(), "health check failed");
                false
            }
            Err(e) => {
                warn!(error = %e, "health check error");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalize_keeps_prefix() {
        assert_eq!(normalize_label(&json!("casual/etc")), "casual");
        assert_eq!(normalize_label(&json!(" street / urban / x")), "street");
        assert_eq!(normalize_label(&json!("formal")), "formal");
        assert_eq!(normalize_label(&json!(42)), "");
        assert_eq!(normalize_label(&json!(null)), "");
    }

    #[test]
    fn normalize_is_idempotent() {
        for raw in ["casual/etc", "formal", "  minimal  "] {
            let once = normalize_label(&json!(raw));
            assert_eq!(normalize_label(&json!(once.clone())), once);
        }
    }

    #[test]
    fn parse_labels_preserves_positions() {
        let body = json!({ "final_top_labels": ["casual/a", 7, "dandy"] });
        assert_eq!(
            parse_labels(&body),
            Some(vec!["casual".to_string(), String::new(), "dandy".to_string()])
        );
        assert_eq!(parse_labels(&json!({ "final_top_labels": "casual" })), None);
        assert_eq!(parse_labels(&json!({})), None);
    }

    #[test]
    fn request_has_fixed_shape() {
        let v = serde_json::to_value(RecommendRequest::for_seeds(&[15, 22, 36])).unwrap();
        assert_eq!(
            v,
            json!({
                "model_id": 1,
                "seeds": [15, 22, 36],
                "k_neighbors": 3,
                "per_seed_top": 3,
                "final_top": 3,
                "vector_cols": ["genre_vector", "mood_vector", "texture_vector"],
            })
        );
    }

    #[test]
    fn remote_error_accessors() {
        let e = RemoteError {
            status: 500,
            body: json!({ "error": "boom", "traceback": "line 1" }),
        };
        assert_eq!(e.message(), Some("boom"));
        assert_eq!(e.traceback(), Some("line 1"));
        assert!(RecommendOutcome::RemoteError(e).labels().is_empty());
    }
}
