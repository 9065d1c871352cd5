//! Bounded-concurrency dispatch with ordered collection
//!
//! The dispatcher runs one batch through four phases: resolve (done by the
//! caller: headers and credential are fixed before dispatch), submit (one
//! task per descriptor into a bounded queue), drain (a fixed worker pool
//! executes tasks, gated by the shared rate limiter), and complete (results
//! reassembled into original input order).
//!
//! Workers share a single task queue receiver behind a mutex; each worker
//! holds the lock only long enough to dequeue, never across rate limiting or
//! request execution. No lock here spans another component's exclusive
//! region: the limiter, the credential, and the progress counters each guard
//! themselves.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, warn};
use volley_common::resilience::RateLimiter;
use volley_domain::constants::DEFAULT_PROGRESS_INTERVAL_SECS;
use volley_domain::{BatchSummary, RequestDescriptor, ResultRecord};

use super::ports::RequestExecutor;
use super::progress::{ProgressAggregator, ProgressReporter};

/// Everything a finished batch produces: the ordered records plus the
/// aggregate summary.
#[derive(Debug)]
pub struct BatchOutcome {
    /// One record per input descriptor, in input order.
    pub results: Vec<ResultRecord>,
    pub summary: BatchSummary,
}

/// Fans a batch of descriptors out to a fixed-size worker pool and collects
/// the results back into input order.
pub struct Dispatcher {
    executor: Arc<dyn RequestExecutor>,
    limiter: Arc<RateLimiter>,
    concurrency: usize,
    progress_interval: Duration,
}

impl Dispatcher {
    /// Create a dispatcher.
    ///
    /// `concurrency` is the worker pool size and is clamped to a minimum
    /// of 1. The limiter is shared by all workers, enforcing one global
    /// ceiling rather than a per-worker one.
    #[must_use]
    pub fn new(
        executor: Arc<dyn RequestExecutor>,
        limiter: Arc<RateLimiter>,
        concurrency: usize,
    ) -> Self {
        Self {
            executor,
            limiter,
            concurrency: concurrency.max(1),
            progress_interval: Duration::from_secs(DEFAULT_PROGRESS_INTERVAL_SECS),
        }
    }

    /// Override how often the background reporter emits progress.
    #[must_use]
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Run the batch to completion.
    ///
    /// Every descriptor yields exactly one result record: request failures
    /// are captured by the executor, and a worker faulting outside the
    /// executor's own error capture (a panic) yields a synthesized error
    /// record for each slot it failed to report. One task's failure never
    /// cancels or blocks its siblings.
    pub async fn run(&self, descriptors: Vec<RequestDescriptor>) -> BatchOutcome {
        let total = descriptors.len();
        let progress = Arc::new(ProgressAggregator::new(total as u64));
        let reporter = ProgressReporter::spawn(Arc::clone(&progress), self.progress_interval);

        let descriptors = Arc::new(descriptors);
        let workers = self.concurrency.min(total.max(1));
        debug!(total, workers, "dispatching batch");

        // Slot index (position among submitted tasks) travels with each task
        // and result so the collector can restore input order regardless of
        // completion order.
        let (task_tx, task_rx) = mpsc::channel::<(usize, RequestDescriptor)>(workers);
        let task_rx = Arc::new(Mutex::new(task_rx));
        let (result_tx, mut result_rx) = mpsc::channel::<(usize, ResultRecord)>(workers);

        let mut pool = JoinSet::new();
        for worker in 0..workers {
            let task_rx = Arc::clone(&task_rx);
            let result_tx = result_tx.clone();
            let executor = Arc::clone(&self.executor);
            let limiter = Arc::clone(&self.limiter);
            let progress = Arc::clone(&progress);

            pool.spawn(async move {
                loop {
                    // Dequeue under the lock, execute outside it.
                    let next = { task_rx.lock().await.recv().await };
                    let Some((slot, descriptor)) = next else { break };

                    limiter.acquire().await;
                    debug!(
                        worker,
                        index = descriptor.index,
                        method = %descriptor.method,
                        url = %descriptor.url,
                        "issuing request"
                    );
                    let record = executor.execute(&descriptor).await;
                    progress.record(!record.response.is_success());

                    if result_tx.send((slot, record)).await.is_err() {
                        // Collector is gone; nothing left to report to.
                        break;
                    }
                }
            });
        }
        // Only workers keep these handles alive now. When every worker has
        // exited (normally or by panic) the queue closes and the submitter
        // unblocks instead of deadlocking on a full channel.
        drop(result_tx);
        drop(task_rx);

        let submitter = {
            let descriptors = Arc::clone(&descriptors);
            let task_tx = task_tx;
            tokio::spawn(async move {
                for (slot, descriptor) in descriptors.iter().enumerate() {
                    if task_tx.send((slot, descriptor.clone())).await.is_err() {
                        warn!("task queue closed early; remaining submissions dropped");
                        break;
                    }
                }
            })
        };

        // Drain: collect until every result sender is gone. Individual task
        // failures have already been folded into their records by now.
        let mut slots: Vec<Option<ResultRecord>> = Vec::with_capacity(total);
        slots.resize_with(total, || None);
        while let Some((slot, record)) = result_rx.recv().await {
            slots[slot] = Some(record);
        }

        if submitter.await.is_err() {
            warn!("submitter task failed");
        }
        while let Some(joined) = pool.join_next().await {
            if let Err(err) = joined {
                if err.is_panic() {
                    warn!("request worker panicked; its unreported tasks become errors");
                } else {
                    warn!(error = %err, "request worker terminated abnormally");
                }
            }
        }

        // Complete: fill any slot a faulted worker never reported, then emit
        // in input order.
        let mut results = Vec::with_capacity(total);
        for (slot, entry) in slots.into_iter().enumerate() {
            match entry {
                Some(record) => results.push(record),
                None => {
                    let descriptor = &descriptors[slot];
                    warn!(index = descriptor.index, "request produced no result; recording error");
                    progress.record(true);
                    results.push(ResultRecord::failed(
                        descriptor,
                        "request worker terminated before producing a result",
                    ));
                }
            }
        }

        reporter.shutdown().await;

        let snapshot = progress.snapshot();
        let processed = results.len() as u64;
        let summary = BatchSummary {
            processed,
            succeeded: processed - snapshot.errors,
            failed: snapshot.errors,
            elapsed: snapshot.elapsed,
        };
        BatchOutcome { results, summary }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;
    use tokio::time::sleep;
    use volley_domain::HttpMethod;

    use super::*;

    /// Executor driven entirely by the request URL: `fail` URLs report a
    /// transport error, `panic` URLs fault the worker, everything else
    /// succeeds after a stagger that makes later descriptors finish first.
    struct ScriptedExecutor {
        stagger_unit: Duration,
        batch_len: usize,
    }

    impl ScriptedExecutor {
        fn instant() -> Self {
            Self { stagger_unit: Duration::ZERO, batch_len: 0 }
        }

        fn reverse_staggered(batch_len: usize, unit: Duration) -> Self {
            Self { stagger_unit: unit, batch_len }
        }
    }

    #[async_trait]
    impl RequestExecutor for ScriptedExecutor {
        async fn execute(&self, descriptor: &RequestDescriptor) -> ResultRecord {
            if descriptor.url.contains("panic") {
                panic!("scripted worker fault");
            }
            if !self.stagger_unit.is_zero() {
                let rank = self.batch_len.saturating_sub(descriptor.index) as u32;
                sleep(self.stagger_unit * rank).await;
            }
            if descriptor.url.contains("fail") {
                ResultRecord::failed(descriptor, "connection refused")
            } else {
                ResultRecord::completed(descriptor, 200, Some(json!({"ok": true})))
            }
        }
    }

    fn descriptors(urls: &[&str]) -> Vec<RequestDescriptor> {
        urls.iter()
            .enumerate()
            .map(|(index, url)| RequestDescriptor {
                index,
                method: HttpMethod::Get,
                url: (*url).to_string(),
                body: None,
            })
            .collect()
    }

    fn dispatcher(executor: ScriptedExecutor, concurrency: usize) -> Dispatcher {
        Dispatcher::new(Arc::new(executor), Arc::new(RateLimiter::disabled()), concurrency)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn results_come_back_in_input_order() {
        let urls: Vec<String> =
            (0..8).map(|i| format!("https://example.com/item/{i}")).collect();
        let url_refs: Vec<&str> = urls.iter().map(String::as_str).collect();
        let batch = descriptors(&url_refs);

        let executor = ScriptedExecutor::reverse_staggered(batch.len(), Duration::from_millis(5));
        let outcome = dispatcher(executor, 8).run(batch).await;

        assert_eq!(outcome.results.len(), 8);
        for (position, record) in outcome.results.iter().enumerate() {
            assert_eq!(record.index, position);
        }
        assert_eq!(outcome.summary.processed, 8);
        assert_eq!(outcome.summary.failed, 0);
    }

    #[tokio::test]
    async fn one_transport_failure_does_not_touch_siblings() {
        let batch =
            descriptors(&["https://a.example.com", "https://fail.example.com", "https://c.example.com"]);
        let outcome = dispatcher(ScriptedExecutor::instant(), 3).run(batch).await;

        assert_eq!(outcome.results.len(), 3);

        let failed = &outcome.results[1];
        assert_eq!(failed.response.status, None);
        assert_eq!(failed.response.message.as_deref(), Some("connection refused"));

        for record in [&outcome.results[0], &outcome.results[2]] {
            assert_eq!(record.response.status, Some(200));
            assert!(record.response.message.is_none());
        }

        assert_eq!(outcome.summary.succeeded, 2);
        assert_eq!(outcome.summary.failed, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn worker_panic_still_yields_every_result() {
        let batch = descriptors(&[
            "https://a.example.com",
            "https://panic.example.com",
            "https://c.example.com",
            "https://d.example.com",
        ]);
        let outcome = dispatcher(ScriptedExecutor::instant(), 2).run(batch).await;

        assert_eq!(outcome.results.len(), 4);
        for (position, record) in outcome.results.iter().enumerate() {
            assert_eq!(record.index, position);
        }
        assert!(outcome.results[1].response.message.is_some());
        assert_eq!(outcome.results[1].response.status, None);
        assert_eq!(outcome.summary.failed, 1);
        assert_eq!(outcome.summary.succeeded, 3);
    }

    #[tokio::test]
    async fn empty_batch_completes_immediately() {
        let outcome = dispatcher(ScriptedExecutor::instant(), 4).run(Vec::new()).await;
        assert!(outcome.results.is_empty());
        assert_eq!(outcome.summary.processed, 0);
        assert_eq!(outcome.summary.failed, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn shared_rate_ceiling_paces_the_whole_pool() {
        // 3000 rpm -> 20ms spacing; 5 requests span at least 4 intervals no
        // matter how many workers run.
        let batch = descriptors(&[
            "https://example.com/1",
            "https://example.com/2",
            "https://example.com/3",
            "https://example.com/4",
            "https://example.com/5",
        ]);
        let dispatcher = Dispatcher::new(
            Arc::new(ScriptedExecutor::instant()),
            Arc::new(RateLimiter::per_minute(3000)),
            10,
        );

        let started = std::time::Instant::now();
        let outcome = dispatcher.run(batch).await;
        assert!(started.elapsed() >= Duration::from_millis(80));
        assert_eq!(outcome.summary.processed, 5);
    }

    #[tokio::test]
    async fn concurrency_zero_is_clamped_to_one() {
        let batch = descriptors(&["https://example.com/only"]);
        let outcome = dispatcher(ScriptedExecutor::instant(), 0).run(batch).await;
        assert_eq!(outcome.results.len(), 1);
    }
}
