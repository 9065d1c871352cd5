//! Credential data types

use chrono::{DateTime, Utc};

/// A bearer access token with its validity window.
///
/// A single instance is shared by reference across all concurrent executors;
/// staleness is judged against `expires_at` with a caller-chosen threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    /// Opaque token string sent as `Authorization: Bearer <token>`.
    pub token: String,

    /// Absolute expiration timestamp (UTC). `None` means the provider did not
    /// report a lifetime; such tokens are treated as never expiring.
    pub expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    /// Create a token whose expiry is `expires_in` seconds from now.
    ///
    /// A non-positive `expires_in` leaves the expiry unset.
    #[must_use]
    pub fn new(token: String, expires_in: i64) -> Self {
        let expires_at =
            (expires_in > 0).then(|| Utc::now() + chrono::Duration::seconds(expires_in));
        Self { token, expires_at }
    }

    /// Create a token with an explicit expiration timestamp.
    #[must_use]
    pub fn with_expiry(token: String, expires_at: DateTime<Utc>) -> Self {
        Self { token, expires_at: Some(expires_at) }
    }

    /// Check whether the token is expired or will expire within the given
    /// threshold.
    ///
    /// Returns `false` when no expiry is set.
    #[must_use]
    pub fn is_expired(&self, threshold_seconds: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => {
                let cutoff = Utc::now() + chrono::Duration::seconds(threshold_seconds);
                expires_at <= cutoff
            }
            None => false,
        }
    }
}
