//! Resilience building blocks
//!
//! Currently a single concern: pacing outbound work to a shared global rate
//! ceiling.

pub mod rate_limiter;

pub use rate_limiter::RateLimiter;
