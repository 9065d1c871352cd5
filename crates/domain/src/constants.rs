//! Domain constants and defaults

/// Default worker pool size when no concurrency is configured.
pub const DEFAULT_CONCURRENCY: usize = 1;

/// Default requests-per-minute ceiling; zero disables pacing.
pub const DEFAULT_RATE_LIMIT: u32 = 0;

/// Default interval between progress report emissions, in seconds.
pub const DEFAULT_PROGRESS_INTERVAL_SECS: u64 = 10;

/// OAuth scope requested when the configuration names none.
pub const DEFAULT_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Lifetime requested for impersonated credentials, in seconds.
pub const DEFAULT_IMPERSONATED_LIFETIME_SECS: i64 = 3600;
