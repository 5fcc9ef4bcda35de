//! Request and outcome types for benchmark runs
//!
//! RunRequest mirrors the JSON body accepted over HTTP; every field is
//! optional and normalize() applies defaults and clamps. RunOutcome is an
//! immutable per-call value - quality attachment produces a new copy.

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Instant;

/// The single provider this harness supports
pub const PROVIDER_OLLAMA: &str = "ollama";

/// Hard cap on runs per batch, prevents runaway fan-out
pub const MAX_RUNS: usize = 200;

const DEFAULT_MODEL: &str = "qwen2.5:3b";
const DEFAULT_PROMPT: &str = "Say hello.";
const DEFAULT_TEMPERATURE: f64 = 0.2;
const DEFAULT_MAX_TOKENS: u32 = 64;
const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// Monotonic clock reading in nanoseconds, relative to a process-local anchor
pub fn monotonic_nanos() -> u64 {
    static ANCHOR: OnceLock<Instant> = OnceLock::new();
    ANCHOR.get_or_init(Instant::now).elapsed().as_nanos() as u64
}

// ═══════════════════════════════════════════════════════════════
// REQUEST
// ═══════════════════════════════════════════════════════════════

/// Parameters for one benchmark batch, as received over the wire
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunRequest {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub prompt: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<i64>,
    pub runs: Option<i64>,
    pub timeout_ms: Option<u64>,
    pub concurrency: Option<i64>,
    /// Keywords for response quality scoring, checked in order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_keywords: Option<Vec<String>>,
}

/// Effective batch parameters after defaults and clamps
#[derive(Debug, Clone)]
pub struct BatchParams {
    pub provider: String,
    pub model: String,
    pub prompt: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub runs: usize,
    pub timeout_ms: u64,
    pub concurrency: usize,
    pub expected_keywords: Vec<String>,
}

impl RunRequest {
    /// Apply defaults and clamps. Post-conditions: 1 <= runs <= 200 and
    /// 1 <= concurrency <= runs.
    pub fn normalize(&self) -> BatchParams {
        let runs = match self.runs {
            Some(r) if r >= 1 => (r as usize).min(MAX_RUNS),
            _ => 1,
        };
        let concurrency = match self.concurrency {
            Some(c) if c >= 1 => (c as usize).min(runs),
            _ => 1,
        };
        BatchParams {
            provider: self
                .provider
                .as_deref()
                .unwrap_or(PROVIDER_OLLAMA)
                .to_lowercase(),
            model: self
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            prompt: self
                .prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_PROMPT.to_string()),
            temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: match self.max_tokens {
                Some(t) if t >= 1 => t.min(u32::MAX as i64) as u32,
                Some(_) => 1,
                None => DEFAULT_MAX_TOKENS,
            },
            runs,
            timeout_ms: self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS),
            concurrency,
            expected_keywords: self.expected_keywords.clone().unwrap_or_default(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// OUTCOME
// ═══════════════════════════════════════════════════════════════

/// Recorded result of a single run, success or failure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    pub provider: String,
    pub model: String,
    pub start_nanos: u64,
    pub end_nanos: u64,
    /// 0 when no HTTP response was obtained
    pub http_status: u16,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<f64>,
}

impl RunOutcome {
    /// Wall-clock duration of this run in milliseconds
    pub fn duration_ms(&self) -> f64 {
        self.end_nanos.saturating_sub(self.start_nanos) as f64 / 1_000_000.0
    }

    /// Failure outcome with zero timing (start == end), used when the
    /// batch rejects a request without calling the backend.
    pub fn rejected(provider: &str, model: &str, error: &str) -> Self {
        let now = monotonic_nanos();
        Self::failure(provider, model, now, now, error)
    }

    /// Synthetic failure for a task that produced no result within the
    /// grace window. The real start time is not observable from the waiting
    /// side, so it is back-computed as end - timeout; a documented
    /// approximation, not a measurement.
    pub fn timed_out(provider: &str, model: &str, timeout_ms: u64, error: &str) -> Self {
        let end = monotonic_nanos();
        let start = end.saturating_sub(timeout_ms.saturating_mul(1_000_000));
        Self::failure(provider, model, start, end, error)
    }

    fn failure(provider: &str, model: &str, start: u64, end: u64, error: &str) -> Self {
        Self {
            provider: provider.to_string(),
            model: model.to_string(),
            start_nanos: start,
            end_nanos: end,
            http_status: 0,
            success: false,
            error: Some(error.to_string()),
            input_tokens: None,
            output_tokens: None,
            total_tokens: None,
            response_bytes: None,
            text: None,
            quality: None,
        }
    }

    /// Copy with the quality score attached; the outcome itself stays
    /// immutable.
    pub fn with_quality(self, quality: f64) -> Self {
        Self {
            quality: Some(quality),
            ..self
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// AGGREGATES
// ═══════════════════════════════════════════════════════════════

/// Latency statistics over one batch. `runs` counts every attempted run,
/// including failures; the timing fields cover only positive durations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregates {
    pub runs: usize,
    pub avg_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub p50_ms: f64,
    pub p90_ms: f64,
    pub p95_ms: f64,
}

impl Aggregates {
    pub fn empty(runs: usize) -> Self {
        Self {
            runs,
            avg_ms: 0.0,
            min_ms: 0.0,
            max_ms: 0.0,
            p50_ms: 0.0,
            p90_ms: 0.0,
            p95_ms: 0.0,
        }
    }
}
