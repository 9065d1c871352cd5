//! Credential manager with single-flight refresh
//!
//! Owns the one bearer credential shared by every concurrent worker:
//! - Construction performs the initial acquisition (fatal on failure)
//! - Reads are served from cache while the credential stays valid
//! - Stale reads refresh under a gate so at most one refresh is in flight;
//!   callers arriving mid-refresh wait for and share its result
//! - `force_refresh` unconditionally refreshes under the same gate

use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use super::traits::TokenSource;
use super::types::AccessToken;

/// Refresh this many seconds before the credential actually expires.
pub const DEFAULT_REFRESH_THRESHOLD_SECS: i64 = 300;

/// Error type for credential lifecycle operations.
///
/// Either variant is fatal to a batch run: no request can be meaningfully
/// authenticated without a usable credential.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Initial credential acquisition failed.
    #[error("credential acquisition failed: {0}")]
    Acquisition(String),

    /// Refreshing an existing credential failed.
    #[error("credential refresh failed: {0}")]
    Refresh(String),
}

/// Shared bearer credential with lazy, serialized refresh.
pub struct CredentialManager<S: TokenSource> {
    source: S,
    current: RwLock<AccessToken>,
    /// Gate serializing refresh attempts. Never held together with the
    /// credential write lock across an await point, and never held while a
    /// caller is doing anything but refreshing.
    refresh_gate: Mutex<()>,
    refresh_threshold_secs: i64,
}

impl<S: TokenSource> CredentialManager<S> {
    /// Acquire the initial credential and build the manager.
    ///
    /// # Errors
    /// Returns [`CredentialError::Acquisition`] if the initial exchange
    /// fails. This is the one unrecoverable startup error: the caller is
    /// expected to abort the run.
    pub async fn connect(source: S, refresh_threshold_secs: i64) -> Result<Self, CredentialError> {
        let initial = source.fetch_token().await?;
        info!("credential manager initialized");

        Ok(Self {
            source,
            current: RwLock::new(initial),
            refresh_gate: Mutex::new(()),
            refresh_threshold_secs,
        })
    }

    /// Acquire the initial credential with the default staleness threshold.
    ///
    /// # Errors
    /// See [`CredentialManager::connect`].
    pub async fn connect_with_defaults(source: S) -> Result<Self, CredentialError> {
        Self::connect(source, DEFAULT_REFRESH_THRESHOLD_SECS).await
    }

    /// Get a currently valid bearer token, refreshing if stale.
    ///
    /// Safe for any number of concurrent callers. Callers observing a stale
    /// credential do not each trigger a refresh: the first through the gate
    /// refreshes, the rest wait and receive the refreshed token.
    ///
    /// # Errors
    /// Returns [`CredentialError::Refresh`] if a needed refresh fails; the
    /// failure is fatal to the run.
    pub async fn token(&self) -> Result<String, CredentialError> {
        {
            let current = self.current.read().await;
            if !current.is_expired(self.refresh_threshold_secs) {
                return Ok(current.token.clone());
            }
        }

        let _gate = self.refresh_gate.lock().await;

        // Re-check after acquiring the gate: a caller ahead of us may have
        // already completed the refresh we queued up for.
        {
            let current = self.current.read().await;
            if !current.is_expired(self.refresh_threshold_secs) {
                debug!("credential refreshed while waiting; reusing result");
                return Ok(current.token.clone());
            }
        }

        self.refresh_locked().await
    }

    /// Unconditionally refresh the credential, regardless of perceived
    /// validity, and return the new token.
    ///
    /// Present as an externally triggerable hook (e.g. after an upstream
    /// unauthorized response); the dispatch path itself never calls it.
    ///
    /// # Errors
    /// Returns [`CredentialError::Refresh`] if the refresh fails.
    pub async fn force_refresh(&self) -> Result<String, CredentialError> {
        let _gate = self.refresh_gate.lock().await;
        self.refresh_locked().await
    }

    /// Perform one refresh. Caller must hold `refresh_gate`.
    async fn refresh_locked(&self) -> Result<String, CredentialError> {
        let fresh = self
            .source
            .fetch_token()
            .await
            .map_err(|e| CredentialError::Refresh(e.to_string()))?;
        let token = fresh.token.clone();
        *self.current.write().await = fresh;
        info!("credential refreshed");
        Ok(token)
    }
}
