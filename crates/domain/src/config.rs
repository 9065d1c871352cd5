//! Batch run configuration and validation
//!
//! Replaces duck-typed option handling with an explicit struct and an
//! explicit validation pass that rejects inconsistent option combinations
//! before any request is issued.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_CONCURRENCY, DEFAULT_RATE_LIMIT};
use crate::errors::{Result, VolleyError};

/// Recognized options for one batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Authenticate outbound requests with a Google-issued bearer token.
    #[serde(default)]
    pub use_google_token: bool,

    /// OAuth scopes requested during credential acquisition.
    /// Only meaningful together with `use_google_token`.
    #[serde(default)]
    pub scopes: Vec<String>,

    /// Extra headers merged into every outgoing request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Worker pool size; the dispatcher clamps this to a minimum of 1.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Global requests-per-minute ceiling shared by all workers; 0 disables.
    #[serde(default)]
    pub rate_limit: u32,
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            use_google_token: false,
            scopes: Vec::new(),
            headers: BTreeMap::new(),
            concurrency: DEFAULT_CONCURRENCY,
            rate_limit: DEFAULT_RATE_LIMIT,
        }
    }
}

impl BatchConfig {
    /// Check option consistency.
    ///
    /// # Errors
    /// Returns `VolleyError::Config` if:
    /// - `scopes` is set while `use_google_token` is false
    /// - `headers` carries an `Authorization` entry while `use_google_token`
    ///   is true (the managed bearer header would silently collide with it)
    pub fn validate(&self) -> Result<()> {
        if !self.scopes.is_empty() && !self.use_google_token {
            return Err(VolleyError::Config(
                "`scopes` can only be used when `use_google_token` is true".to_string(),
            ));
        }

        if self.use_google_token {
            if let Some(name) = self.authorization_header() {
                return Err(VolleyError::Config(format!(
                    "cannot use `use_google_token` when a custom `{name}` header is provided"
                )));
            }
        }

        Ok(())
    }

    /// The user-supplied Authorization header name, if any (header names are
    /// matched case-insensitively).
    fn authorization_header(&self) -> Option<&str> {
        self.headers
            .keys()
            .map(String::as_str)
            .find(|name| name.eq_ignore_ascii_case("authorization"))
    }
}
