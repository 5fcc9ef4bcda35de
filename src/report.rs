//! Report assembly and CSV rendering
//!
//! A Report is the terminal value of one benchmark invocation: timestamp,
//! the effective request parameters, the ordered outcomes and the
//! aggregates. It owns everything it carries.

use serde::{Deserialize, Serialize};

use crate::types::{Aggregates, BatchParams, RunOutcome};

/// Effective request parameters echoed back in the report
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEcho {
    pub provider: String,
    pub model: String,
    pub runs: usize,
    pub concurrency: usize,
    pub timeout_ms: u64,
    pub temperature: f64,
    pub max_tokens: u32,
    /// Derived: length of the prompt in characters
    pub prompt_chars: usize,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub expected_keywords: Vec<String>,
}

/// Complete result of one benchmark invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub timestamp: String,
    pub request: RequestEcho,
    pub results: Vec<RunOutcome>,
    pub aggregates: Aggregates,
}

impl Report {
    pub fn assemble(params: &BatchParams, results: Vec<RunOutcome>, aggregates: Aggregates) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            request: RequestEcho {
                provider: params.provider.clone(),
                model: params.model.clone(),
                runs: params.runs,
                concurrency: params.concurrency,
                timeout_ms: params.timeout_ms,
                temperature: params.temperature,
                max_tokens: params.max_tokens,
                prompt_chars: params.prompt.chars().count(),
                expected_keywords: params.expected_keywords.clone(),
            },
            results,
            aggregates,
        }
    }

    /// Render the per-run results as CSV. Durations get one decimal place,
    /// absent numeric fields become empty cells, and commas inside field
    /// values are replaced with spaces.
    pub fn to_csv(&self) -> String {
        let mut out = String::from(
            "provider,model,httpStatus,success,durationMs,inputTokens,outputTokens,totalTokens,responseBytes\n",
        );
        for r in &self.results {
            out.push_str(&format!(
                "{},{},{},{},{:.1},{},{},{},{}\n",
                escape(&r.provider),
                escape(&r.model),
                r.http_status,
                r.success,
                r.duration_ms(),
                opt(r.input_tokens),
                opt(r.output_tokens),
                opt(r.total_tokens),
                opt(r.response_bytes),
            ));
        }
        out
    }
}

fn escape(field: &str) -> String {
    field.replace(',', " ")
}

fn opt(value: Option<u64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
