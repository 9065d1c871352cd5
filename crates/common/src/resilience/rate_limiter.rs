//! Global request pacing
//!
//! Enforces a minimum interval between grants across any number of
//! concurrent callers. Unlike a token bucket there is no burst allowance:
//! back-to-back callers are spaced evenly at `60s / ceiling`, which is what a
//! requests-per-minute ceiling means to the remote end.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::debug;

/// Paces callers to a global requests-per-minute ceiling.
///
/// One instance is shared (via `Arc`) by every worker in a batch; the ceiling
/// is global, not per-worker. A ceiling of zero disables pacing entirely.
///
/// The last-grant timestamp is read, compared, and rewritten under a single
/// lock that is held across the wait, so the check-and-update is atomic:
/// each waiter observes the grant before it and sleeps out its own full
/// interval. Contention on the lock is FIFO-ish; fairness beyond that is not
/// guaranteed and not needed at tens of workers.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_grant: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Create a limiter for the given requests-per-minute ceiling.
    ///
    /// A ceiling of zero builds a disabled limiter whose
    /// [`acquire`](Self::acquire) returns immediately.
    #[must_use]
    pub fn per_minute(ceiling: u32) -> Self {
        let min_interval = if ceiling == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(60.0 / f64::from(ceiling))
        };
        Self { min_interval, last_grant: Mutex::new(None) }
    }

    /// Create a limiter that never paces.
    #[must_use]
    pub fn disabled() -> Self {
        Self::per_minute(0)
    }

    /// Whether pacing is disabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.min_interval.is_zero()
    }

    /// Minimum spacing between grants.
    #[must_use]
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Block until the caller may issue the next request.
    ///
    /// The first caller is granted immediately; every subsequent grant is at
    /// least `min_interval` after the previous one. The timestamp is stamped
    /// at the moment of grant (not when the wait began), so bursts come out
    /// evenly spaced rather than clustered.
    pub async fn acquire(&self) {
        if self.min_interval.is_zero() {
            return;
        }

        let mut last_grant = self.last_grant.lock().await;
        if let Some(previous) = *last_grant {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                debug!(wait_ms = wait.as_millis() as u64, "rate ceiling reached, pacing");
                tokio::time::sleep(wait).await;
            }
        }
        *last_grant = Some(Instant::now());
    }
}
