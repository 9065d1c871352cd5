//! Port interfaces for batch execution

use async_trait::async_trait;
use volley_domain::{RequestDescriptor, ResultRecord};

/// Trait for executing one request descriptor against its endpoint.
///
/// Implementations are infallible by contract: every failure mode (non-2xx
/// status, undecodable payload, transport error) is captured into
/// the returned record, never raised. Request headers (including any bearer
/// credential) are fixed at implementation construction time; the dispatcher
/// resolves them once before dispatch begins.
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    /// Issue the request described by `descriptor` and record the outcome.
    async fn execute(&self, descriptor: &RequestDescriptor) -> ResultRecord;
}
