//! ollabench-api: HTTP server for benchmark runs
//!
//! Accepts benchmark requests, runs them against the configured Ollama
//! server, returns reports as JSON or CSV.
//! Run with: PORT=3000 OLLAMA_BASE_URL=... cargo run --bin ollabench-api

use axum::{
    body::Bytes,
    extract::State,
    http::{header, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use std::{env, sync::Arc};
use tower_http::cors::{Any, CorsLayer};

use ollabench::client::OllamaClient;
use ollabench::runner::BatchRunner;
use ollabench::types::RunRequest;

/// Application state: one runner and one listing client, both bound to
/// the base URL read once at startup.
struct AppState {
    runner: BatchRunner,
    client: OllamaClient,
}

/// Health check
async fn health() -> &'static str {
    "ok"
}

/// Parse an optional benchmark request body. An absent or empty body
/// means "run with defaults"; malformed JSON is rejected rather than
/// silently falling back to a default run.
fn parse_request(body: &[u8]) -> Result<RunRequest, String> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(RunRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| format!("Invalid request body: {}", e))
}

/// Run a benchmark batch, reply with the full report as JSON
async fn run_bench(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let request = parse_request(&body).map_err(|e| (StatusCode::BAD_REQUEST, e))?;
    let params = request.normalize();
    println!(
        "bench: model={} runs={} concurrency={}",
        params.model, params.runs, params.concurrency
    );

    let report = state.runner.run(&request).await;
    Ok(Json(report))
}

/// Run a benchmark batch, reply with the per-run results as a CSV file
async fn run_bench_csv(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let request = parse_request(&body).map_err(|e| (StatusCode::BAD_REQUEST, e))?;
    let params = request.normalize();
    println!(
        "bench/csv: model={} runs={} concurrency={}",
        params.model, params.runs, params.concurrency
    );

    let report = state.runner.run(&request).await;
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"bench.csv\"",
            ),
        ],
        report.to_csv(),
    ))
}

/// List models from the Ollama server. Upstream problems come back as
/// data in the reply, never as a 5xx.
async fn list_models(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.client.list_models().await)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Configuration from environment
    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);

    let state = Arc::new(AppState {
        runner: BatchRunner::new(),
        client: OllamaClient::new(),
    });

    // CORS for browser dashboards polling this API
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    let app = Router::new()
        .route("/health", get(health))
        .route("/api/bench", post(run_bench))
        .route("/api/bench/csv", post(run_bench_csv))
        .route("/api/models", get(list_models))
        .layer(cors)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    eprintln!(
        "ollabench-api listening on port {} (ollama at {})",
        port,
        ollabench::config::base_url()
    );

    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_body_defaults() {
        let req = parse_request(b"").unwrap();
        assert!(req.model.is_none());
        let req = parse_request(b"  \n\t").unwrap();
        assert!(req.runs.is_none());
    }

    #[test]
    fn test_well_formed_body_parses() {
        let req = parse_request(br#"{"runs": 3, "model": "llama3"}"#).unwrap();
        assert_eq!(req.runs, Some(3));
        assert_eq!(req.model.as_deref(), Some("llama3"));
    }

    #[test]
    fn test_malformed_body_rejected() {
        assert!(parse_request(b"{not json").is_err());
        assert!(parse_request(b"[1, 2]").is_err());
    }
}
