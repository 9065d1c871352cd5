//! Progress aggregation and periodic reporting
//!
//! The aggregator is purely observational: workers increment it after each
//! completion and it never feeds back into dispatch. The reporter is a
//! best-effort background ticker tied to the batch's lifetime; it is
//! cancelled when the dispatcher finishes (or is dropped) and never outlives
//! the batch.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::info;
use volley_domain::ProgressSnapshot;

/// Thread-safe completion counters for one batch run.
///
/// `total` is fixed at construction (the count of valid input descriptors);
/// `completed` and `errors` only ever grow. `completed <= total` holds
/// because every descriptor is recorded exactly once.
#[derive(Debug)]
pub struct ProgressAggregator {
    total: u64,
    completed: AtomicU64,
    errors: AtomicU64,
    started: Instant,
}

impl ProgressAggregator {
    /// Create an aggregator for a batch of `total` descriptors.
    #[must_use]
    pub fn new(total: u64) -> Self {
        Self {
            total,
            completed: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    /// Record one completed request. O(1), lock-free.
    pub fn record(&self, is_error: bool) {
        if is_error {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Non-blocking read of current progress.
    ///
    /// Errors are read before completions so a concurrent `record` can never
    /// make a snapshot show more errors than completions.
    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        let errors = self.errors.load(Ordering::Relaxed);
        let completed = self.completed.load(Ordering::Relaxed);
        ProgressSnapshot { completed, errors, total: self.total, elapsed: self.started.elapsed() }
    }

    /// Number of descriptors in the batch.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total
    }
}

/// Periodic background reporter over an aggregator.
///
/// Emits one structured log line per interval. Purely advisory: it has no
/// effect on dispatch correctness or ordering, and a slow emission only
/// delays the next tick.
#[derive(Debug)]
pub struct ProgressReporter {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ProgressReporter {
    /// Spawn a reporter that logs a snapshot every `every`.
    #[must_use]
    pub fn spawn(progress: Arc<ProgressAggregator>, every: Duration) -> Self {
        // interval() panics on zero; treat nonsense intervals as "fast".
        let every = every.max(Duration::from_millis(100));
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // interval() fires immediately; swallow that first tick so the
            // initial report lands one full interval into the run.
            ticker.tick().await;

            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let snapshot = progress.snapshot();
                        info!(
                            completed = snapshot.completed,
                            errors = snapshot.errors,
                            total = snapshot.total,
                            elapsed_secs = snapshot.elapsed.as_secs(),
                            "batch progress"
                        );
                    }
                }
            }
        });

        Self { cancel, task: Some(task) }
    }

    /// Stop the reporter and wait for its task to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for ProgressReporter {
    /// Cancellation is tied to the owning scope: dropping the reporter stops
    /// the ticker even if `shutdown` was never awaited.
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
