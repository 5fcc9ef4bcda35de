//! Concurrent batch execution
//!
//! Fans one request out into N independent generate calls behind a
//! semaphore sized to the concurrency cap, then collects outcomes by
//! awaiting the join handles in submission order - never by draining a
//! completion queue - so the result sequence always matches the order the
//! tasks were submitted in, whatever order they finish.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::client::{GenerateBackend, OllamaClient};
use crate::quality;
use crate::report::Report;
use crate::stats;
use crate::types::{BatchParams, RunOutcome, RunRequest, PROVIDER_OLLAMA};

/// Fixed margin added to the per-call timeout when waiting for a task's
/// result. A task that produces nothing within timeout + grace is written
/// off as a synthetic failure.
pub const GRACE_MS: u64 = 5000;

const UNSUPPORTED_PROVIDER: &str = "Unsupported provider";

/// Executes benchmark batches against one backend
pub struct BatchRunner {
    backend: Arc<dyn GenerateBackend>,
}

impl BatchRunner {
    /// Runner against the configured Ollama server
    pub fn new() -> Self {
        Self::with_backend(Arc::new(OllamaClient::new()))
    }

    pub fn with_backend(backend: Arc<dyn GenerateBackend>) -> Self {
        Self { backend }
    }

    /// Full benchmark run: execute the batch, aggregate, assemble a report.
    pub async fn run(&self, req: &RunRequest) -> Report {
        let params = req.normalize();
        let outcomes = self.execute(&params).await;
        let aggregates = stats::aggregate(&outcomes);
        Report::assemble(&params, outcomes, aggregates)
    }

    /// Execute one batch. Always returns exactly `runs` (post-clamp)
    /// outcomes, in submission order. Individual call failures and
    /// timeouts are data in the outcomes, never an error of the batch.
    pub async fn execute_batch(&self, req: &RunRequest) -> Vec<RunOutcome> {
        self.execute(&req.normalize()).await
    }

    async fn execute(&self, params: &BatchParams) -> Vec<RunOutcome> {
        // Only Ollama is supported; anything else short-circuits to
        // failure outcomes without any network activity.
        if params.provider != PROVIDER_OLLAMA {
            return (0..params.runs)
                .map(|_| RunOutcome::rejected(&params.provider, &params.model, UNSUPPORTED_PROVIDER))
                .collect();
        }

        let semaphore = Arc::new(Semaphore::new(params.concurrency));
        let mut handles = Vec::with_capacity(params.runs);
        for _ in 0..params.runs {
            let backend = Arc::clone(&self.backend);
            let semaphore = Arc::clone(&semaphore);
            let p = params.clone();
            handles.push(tokio::spawn(async move {
                // The semaphore lives as long as every task; acquisition
                // can only fail if it were closed, which never happens.
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return RunOutcome::rejected(&p.provider, &p.model, "Batch cancelled"),
                };
                let outcome = backend
                    .generate_once(&p.model, &p.prompt, p.temperature, p.max_tokens, p.timeout_ms)
                    .await;
                match quality::score_by_keywords(outcome.text.as_deref(), &p.expected_keywords) {
                    Some(score) => outcome.with_quality(score),
                    None => outcome,
                }
            }));
        }

        let grace = Duration::from_millis(params.timeout_ms.saturating_add(GRACE_MS));
        let mut outcomes = Vec::with_capacity(params.runs);
        for mut handle in handles {
            match tokio::time::timeout(grace, &mut handle).await {
                Ok(Ok(outcome)) => outcomes.push(outcome),
                Ok(Err(join_err)) => outcomes.push(RunOutcome::timed_out(
                    &params.provider,
                    &params.model,
                    params.timeout_ms,
                    &format!("Join: {}", join_err),
                )),
                Err(_) => {
                    // Best-effort cancellation: the in-flight call is
                    // aborted, and whatever it was doing can no longer
                    // reach this batch.
                    handle.abort();
                    outcomes.push(RunOutcome::timed_out(
                        &params.provider,
                        &params.model,
                        params.timeout_ms,
                        &format!("Timeout: no result within {}ms", grace.as_millis()),
                    ));
                }
            }
        }
        outcomes
    }
}

impl Default for BatchRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::monotonic_nanos;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Backend stub: per-call delays indexed by acquisition order, call
    /// and in-flight counters for concurrency assertions.
    struct MockBackend {
        delays_ms: Vec<u64>,
        reply: String,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl MockBackend {
        fn new(delays_ms: Vec<u64>) -> Self {
            Self {
                delays_ms,
                reply: "ok".into(),
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }

        fn with_reply(mut self, reply: &str) -> Self {
            self.reply = reply.into();
            self
        }
    }

    #[async_trait]
    impl GenerateBackend for MockBackend {
        async fn generate_once(
            &self,
            model: &str,
            _prompt: &str,
            _temperature: f64,
            _max_tokens: u32,
            _timeout_ms: u64,
        ) -> RunOutcome {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let delay = self.delays_ms[n.min(self.delays_ms.len() - 1)];
            let start = monotonic_nanos();
            tokio::time::sleep(Duration::from_millis(delay)).await;
            let end = monotonic_nanos();

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            RunOutcome {
                provider: "ollama".into(),
                model: model.into(),
                start_nanos: start,
                end_nanos: end.max(start + 1),
                http_status: 200,
                success: true,
                error: None,
                input_tokens: Some(5),
                output_tokens: Some(7),
                total_tokens: Some(12),
                response_bytes: Some(64),
                text: Some(format!("{} #{}", self.reply, n)),
                quality: None,
            }
        }
    }

    fn request(runs: i64, concurrency: i64, timeout_ms: u64) -> RunRequest {
        RunRequest {
            runs: Some(runs),
            concurrency: Some(concurrency),
            timeout_ms: Some(timeout_ms),
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_outcome_count_matches_runs() {
        let backend = Arc::new(MockBackend::new(vec![1]));
        let runner = BatchRunner::with_backend(backend.clone());
        let outcomes = runner.execute_batch(&request(5, 2, 1000)).await;
        assert_eq!(outcomes.len(), 5);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 5);
        assert!(outcomes.iter().all(|o| o.success));
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_clamped_to_hard_cap() {
        let backend = Arc::new(MockBackend::new(vec![1]));
        let runner = BatchRunner::with_backend(backend);
        let outcomes = runner.execute_batch(&request(500, 4, 1000)).await;
        assert_eq!(outcomes.len(), 200);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submission_order_preserved_under_reversed_completion() {
        // First submitted call is the slowest, so completion order is the
        // exact reverse of submission order.
        let backend = Arc::new(MockBackend::new(vec![40, 30, 20, 10]));
        let runner = BatchRunner::with_backend(backend);
        let outcomes = runner.execute_batch(&request(4, 4, 1000)).await;

        let texts: Vec<_> = outcomes.iter().map(|o| o.text.clone().unwrap()).collect();
        assert_eq!(texts, vec!["ok #0", "ok #1", "ok #2", "ok #3"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_cap_respected() {
        let backend = Arc::new(MockBackend::new(vec![20]));
        let runner = BatchRunner::with_backend(backend.clone());
        let outcomes = runner.execute_batch(&request(8, 2, 1000)).await;
        assert_eq!(outcomes.len(), 8);
        assert!(backend.max_in_flight.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_unsupported_provider_short_circuits() {
        let backend = Arc::new(MockBackend::new(vec![1]));
        let runner = BatchRunner::with_backend(backend.clone());
        let req = RunRequest {
            provider: Some("openai".into()),
            runs: Some(3),
            ..Default::default()
        };
        let outcomes = runner.execute_batch(&req).await;

        assert_eq!(outcomes.len(), 3);
        for o in &outcomes {
            assert!(!o.success);
            assert_eq!(o.error.as_deref(), Some("Unsupported provider"));
            assert_eq!(o.http_status, 0);
            assert_eq!(o.duration_ms(), 0.0);
        }
        // no network activity at all
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_task_becomes_synthetic_failure() {
        // Second call hangs far past timeout + grace; the batch must still
        // return, with a synthetic failure in that slot.
        let backend = Arc::new(MockBackend::new(vec![10, 60_000_000, 10]));
        let runner = BatchRunner::with_backend(backend);
        let outcomes = runner.execute_batch(&request(3, 3, 1000)).await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].success);
        assert!(outcomes[2].success);

        let stuck = &outcomes[1];
        assert!(!stuck.success);
        assert_eq!(stuck.http_status, 0);
        assert!(stuck.error.as_deref().unwrap().starts_with("Timeout:"));
        assert_eq!(stuck.text, None);
        assert_eq!(stuck.total_tokens, None);
        // synthetic start is back-computed as end - timeout
        assert_eq!(stuck.end_nanos - stuck.start_nanos, 1_000_000_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quality_attached_to_successful_outcomes() {
        let backend =
            Arc::new(MockBackend::new(vec![1]).with_reply("The capital is Paris, reply"));
        let runner = BatchRunner::with_backend(backend);
        let req = RunRequest {
            runs: Some(2),
            expected_keywords: Some(vec!["Paris".into(), "Berlin".into()]),
            ..Default::default()
        };
        let outcomes = runner.execute_batch(&req).await;
        assert!(outcomes.iter().all(|o| o.quality == Some(0.5)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_keywords_leaves_quality_absent() {
        let backend = Arc::new(MockBackend::new(vec![1]));
        let runner = BatchRunner::with_backend(backend);
        let outcomes = runner.execute_batch(&request(2, 1, 1000)).await;
        assert!(outcomes.iter().all(|o| o.quality.is_none()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_produces_full_report() {
        let backend = Arc::new(MockBackend::new(vec![10, 20]));
        let runner = BatchRunner::with_backend(backend);
        let report = runner.run(&request(2, 1, 1000)).await;

        assert_eq!(report.results.len(), 2);
        assert_eq!(report.aggregates.runs, 2);
        assert!(report.aggregates.min_ms > 0.0);
        assert_eq!(report.request.runs, 2);
    }
}
