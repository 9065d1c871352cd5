//! # Volley Core
//!
//! Batch orchestration: the dispatcher state machine that fans request
//! descriptors out to a bounded worker pool, gates issuance through the
//! shared rate limiter, collects completions, and restores original input
//! order; plus the progress aggregation that observes completions off the
//! critical path.
//!
//! Network access lives behind the [`batch::RequestExecutor`] port so the
//! orchestration here is fully testable without a transport.

pub mod batch;

pub use batch::{
    BatchOutcome, Dispatcher, ProgressAggregator, ProgressReporter, RequestExecutor,
};
