//! Credential acquisition port
//!
//! Abstracts the identity-provider exchange so the manager can be exercised
//! with mock implementations and so providers can be swapped without touching
//! any consumer.

use async_trait::async_trait;

use super::manager::CredentialError;
use super::types::AccessToken;

/// Trait for obtaining a fresh bearer credential.
///
/// Implementations perform the full provider-specific exchange (including any
/// multi-step impersonation flow) and return a ready-to-use token. They hold
/// no mutable state of their own; caching and refresh discipline live in the
/// [`CredentialManager`](super::CredentialManager).
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Obtain a fresh credential from the provider.
    ///
    /// # Errors
    /// Returns [`CredentialError`] if the exchange fails; callers treat this
    /// as fatal to the batch run.
    async fn fetch_token(&self) -> Result<AccessToken, CredentialError>;
}

/// Implement `TokenSource` for `Arc<T>` so a source can be shared between the
/// manager and e.g. test assertions.
#[async_trait]
impl<T: TokenSource> TokenSource for std::sync::Arc<T> {
    async fn fetch_token(&self) -> Result<AccessToken, CredentialError> {
        (**self).fetch_token().await
    }
}
