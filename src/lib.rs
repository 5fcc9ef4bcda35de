//! ollabench - benchmark harness for a local Ollama server
//!
//! Fires repeated /api/generate calls with a bounded concurrency cap,
//! records per-call latency and token counts, optionally scores responses
//! against expected keywords, and aggregates latency percentiles.

pub mod client;
pub mod config;
pub mod quality;
pub mod report;
pub mod runner;
pub mod stats;
pub mod types;
