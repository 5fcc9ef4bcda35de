//! Ollama API client
//!
//! One-shot, non-streaming calls against /api/generate plus the model
//! listing from /api/tags. Every failure mode of a generate call is folded
//! into the returned RunOutcome; the call itself never errors.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::config;
use crate::types::{monotonic_nanos, RunOutcome, PROVIDER_OLLAMA};

/// Floor for the per-request transport timeout
const MIN_REQUEST_TIMEOUT_MS: u64 = 1000;
/// Timeout for the model listing call
const TAGS_TIMEOUT_SECS: u64 = 10;

/// Transport failure classes, rendered as "Class: message" in outcomes
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Timeout: {0}")]
    Timeout(String),
    #[error("Connect: {0}")]
    Connect(String),
    #[error("Request: {0}")]
    Request(String),
}

impl From<&reqwest::Error> for BackendError {
    fn from(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendError::Timeout(err.to_string())
        } else if err.is_connect() {
            BackendError::Connect(err.to_string())
        } else {
            BackendError::Request(err.to_string())
        }
    }
}

/// The seam between the batch runner and the inference transport
#[async_trait]
pub trait GenerateBackend: Send + Sync {
    /// One blocking (from the caller's perspective) generate call.
    /// All failures come back as a failure outcome, never as Err.
    async fn generate_once(
        &self,
        model: &str,
        prompt: &str,
        temperature: f64,
        max_tokens: u32,
        timeout_ms: u64,
    ) -> RunOutcome;
}

// ═══════════════════════════════════════════════════════════════
// OLLAMA CLIENT
// ═══════════════════════════════════════════════════════════════

/// Client for one Ollama server. The base URL is captured at construction
/// and treated as immutable configuration.
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
}

impl OllamaClient {
    /// Client against the configured base URL (env, config file, default)
    pub fn new() -> Self {
        Self::with_base_url(config::base_url())
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// List available models from /api/tags.
    ///
    /// Never fails: upstream errors and unreachable servers are reported
    /// inside the reply so callers can render partial data.
    pub async fn list_models(&self) -> ModelsReply {
        let mut reply = ModelsReply {
            base_url: self.base_url.clone(),
            upstream_status: None,
            count: 0,
            models: Vec::new(),
            error: None,
            raw: None,
        };

        let result = self
            .http
            .get(format!("{}/api/tags", self.base_url))
            .header("Accept", "application/json")
            .timeout(Duration::from_secs(TAGS_TIMEOUT_SECS))
            .send()
            .await;

        let response = match result {
            Ok(r) => r,
            Err(e) => {
                reply.error = Some(BackendError::from(&e).to_string());
                return reply;
            }
        };

        let status = response.status().as_u16();
        reply.upstream_status = Some(status);
        let body = response.bytes().await.unwrap_or_default();

        if (200..300).contains(&status) {
            let models = dedupe_and_sort(parse_tag_names(&body));
            reply.count = models.len();
            reply.models = models;
        } else {
            reply.error = Some(format!("Upstream returned status {}", status));
            reply.raw = Some(String::from_utf8_lossy(&body).to_string());
        }
        reply
    }

    /// Quick reachability probe, used by the doctor command
    pub async fn check_connectivity(&self) -> anyhow::Result<()> {
        use anyhow::Context;
        self.http
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .with_context(|| format!("Failed to connect to {}", self.base_url))?;
        Ok(())
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerateBackend for OllamaClient {
    async fn generate_once(
        &self,
        model: &str,
        prompt: &str,
        temperature: f64,
        max_tokens: u32,
        timeout_ms: u64,
    ) -> RunOutcome {
        let body = GenerateRequest {
            model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature,
                // never send a non-positive token budget upstream
                num_predict: max_tokens.max(1),
            },
        };

        let start = monotonic_nanos();
        let mut status: u16 = 0;
        let mut success = false;
        let mut error = None;
        let mut input_tokens = None;
        let mut output_tokens = None;
        let mut response_bytes = None;
        let mut text = None;

        let result = self
            .http
            .post(format!("{}/api/generate", self.base_url))
            .header("Content-Type", "application/json")
            .timeout(Duration::from_millis(timeout_ms.max(MIN_REQUEST_TIMEOUT_MS)))
            .json(&body)
            .send()
            .await;

        match result {
            Ok(response) => {
                status = response.status().as_u16();
                let bytes = response.bytes().await.unwrap_or_default();
                response_bytes = Some(bytes.len() as u64);

                let payload = parse_generate_payload(&bytes);
                input_tokens = payload.prompt_eval_count;
                output_tokens = payload.eval_count;
                text = payload.response;

                success = (200..300).contains(&status);
                if !success {
                    error = Some(String::from_utf8_lossy(&bytes).to_string());
                }
            }
            Err(e) => {
                error = Some(BackendError::from(&e).to_string());
            }
        }

        let end = monotonic_nanos();
        RunOutcome {
            provider: PROVIDER_OLLAMA.to_string(),
            model: model.to_string(),
            start_nanos: start,
            end_nanos: end,
            http_status: status,
            success,
            error,
            input_tokens,
            output_tokens,
            total_tokens: total_tokens(input_tokens, output_tokens),
            response_bytes,
            text,
            quality: None,
        }
    }
}

/// Both sides present, or no total at all - never a partial sum
fn total_tokens(input: Option<u64>, output: Option<u64>) -> Option<u64> {
    match (input, output) {
        (Some(i), Some(o)) => Some(i + o),
        _ => None,
    }
}

/// Best-effort extraction from a generate payload. Any missing field, or
/// a body that is not JSON at all, yields absent values rather than a
/// failure.
fn parse_generate_payload(bytes: &[u8]) -> GeneratePayload {
    serde_json::from_slice(bytes).unwrap_or_default()
}

fn parse_tag_names(bytes: &[u8]) -> Vec<String> {
    let payload: TagsPayload = serde_json::from_slice(bytes).unwrap_or_default();
    payload.models.into_iter().map(|m| m.name).collect()
}

/// Drop exact duplicates keeping first occurrence, then sort
/// case-insensitively. The sort is stable, so case-variant names stay in
/// arrival order.
fn dedupe_and_sort(names: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut models: Vec<String> = names.into_iter().filter(|m| seen.insert(m.clone())).collect();
    models.sort_by_key(|m| m.to_lowercase());
    models
}

// ═══════════════════════════════════════════════════════════════
// API Types
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f64,
    num_predict: u32,
}

#[derive(Debug, Default, Deserialize)]
struct GeneratePayload {
    response: Option<String>,
    prompt_eval_count: Option<u64>,
    eval_count: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct TagsPayload {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
}

/// Reply for the model listing; errors surface as data, never as Err
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelsReply {
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<u16>,
    pub count: usize,
    pub models: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Raw upstream body, kept only when the listing failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}
