//! Review queue HTTP client.
//!
//! Blocking reqwest client (no Tokio runtime required).
//! Covers the full review flow: submit tasks → poll → fetch decisions.

use std::thread;
use std::time::Duration;

use canonize_core::ReviewDecision;

use crate::auth::{load_auth, ReviewCredentials};
use crate::task::ReviewTask;

/// Review queue API client (blocking).
#[derive(Clone)]
pub struct ReviewClient {
    http: reqwest::blocking::Client,
    api_base: String,
    token: String,
}

/// Error type for review queue operations.
#[derive(Debug)]
pub enum ReviewError {
    /// No auth credentials configured
    NotAuthenticated,
    /// Network error
    Network(String),
    /// HTTP error with status code
    Http(u16, String),
    /// JSON parsing error
    Parse(String),
    /// Server returned a validation error (4xx with message)
    Validation(String),
    /// Timeout waiting for decisions
    Timeout(String),
}

impl std::fmt::Display for ReviewError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReviewError::NotAuthenticated => {
                write!(f, "Not authenticated — run `canonize login` first")
            }
            ReviewError::Network(msg) => write!(f, "Network error: {}", msg),
            ReviewError::Http(code, msg) => write!(f, "HTTP {}: {}", code, msg),
            ReviewError::Parse(msg) => write!(f, "Parse error: {}", msg),
            ReviewError::Validation(msg) => write!(f, "{}", msg),
            ReviewError::Timeout(msg) => write!(f, "Timeout: {}", msg),
        }
    }
}

impl std::error::Error for ReviewError {}

impl ReviewClient {
    /// Create a new client using saved auth credentials.
    pub fn from_saved_auth() -> Result<Self, ReviewError> {
        let creds = load_auth().ok_or(ReviewError::NotAuthenticated)?;
        Ok(Self::new(creds))
    }

    /// Create a new client with explicit credentials.
    pub fn new(creds: ReviewCredentials) -> Self {
        let http = reqwest::blocking::Client::builder()
            .user_agent(format!("canonize/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            api_base: creds.api_base,
            token: creds.token,
        }
    }

    /// Submit review tasks. The server deduplicates on `task_key`, so
    /// resubmitting a pair from a later run is harmless. Returns the number
    /// of tasks newly accepted.
    pub fn submit_tasks(&self, tasks: &[ReviewTask]) -> Result<usize, ReviewError> {
        if tasks.is_empty() {
            return Ok(0);
        }

        let url = format!("{}/api/review/tasks", self.api_base);
        let body = serde_json::json!({ "tasks": tasks });
        let resp = self.post_json(&url, &body)?;
        let json: serde_json::Value =
            resp.json().map_err(|e| ReviewError::Parse(e.to_string()))?;

        Ok(json["accepted"].as_u64().unwrap_or(0) as usize)
    }

    /// Fetch decisions recorded since the given RFC 3339 timestamp (all
    /// decisions when `since` is None).
    pub fn fetch_decisions(&self, since: Option<&str>) -> Result<Vec<ReviewDecision>, ReviewError> {
        let url = match since {
            Some(ts) => format!("{}/api/review/decisions?since={}", self.api_base, ts),
            None => format!("{}/api/review/decisions", self.api_base),
        };
        let resp = self.get(&url)?;
        let json: serde_json::Value =
            resp.json().map_err(|e| ReviewError::Parse(e.to_string()))?;

        let decisions = json["decisions"].clone();
        serde_json::from_value(decisions).map_err(|e| ReviewError::Parse(e.to_string()))
    }

    /// Poll until every listed task has a decision, or the timeout passes.
    pub fn poll_decisions(
        &self,
        task_keys: &[String],
        timeout: Duration,
    ) -> Result<Vec<ReviewDecision>, ReviewError> {
        let start = std::time::Instant::now();
        let poll_interval = Duration::from_secs(3);

        loop {
            let decisions = self.fetch_decisions(None)?;
            let pending = task_keys
                .iter()
                .filter(|key| !decisions.iter().any(|d| d.task_key == **key))
                .count();
            if pending == 0 {
                return Ok(decisions);
            }

            if start.elapsed() > timeout {
                log::warn!("{pending} review task(s) still undecided after {}s", timeout.as_secs());
                return Err(ReviewError::Timeout(format!(
                    "Review decisions did not arrive within {}s",
                    timeout.as_secs()
                )));
            }

            log::debug!(
                "{pending} review task(s) still undecided, polling again in {}s",
                poll_interval.as_secs()
            );
            thread::sleep(poll_interval);
        }
    }

    // ── Internal helpers ────────────────────────────────────────────

    fn get(&self, url: &str) -> Result<reqwest::blocking::Response, ReviewError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .map_err(|e| ReviewError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().unwrap_or_default();
            if status == 422 || status == 400 {
                return Err(ReviewError::Validation(body));
            }
            return Err(ReviewError::Http(status, body));
        }

        Ok(response)
    }

    fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::blocking::Response, ReviewError> {
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .map_err(|e| ReviewError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().unwrap_or_default();
            if status == 422 || status == 400 {
                return Err(ReviewError::Validation(body));
            }
            return Err(ReviewError::Http(status, body));
        }

        Ok(response)
    }
}
