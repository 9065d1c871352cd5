//! Bearer credential lifecycle
//!
//! The pieces compose as: a [`TokenSource`] knows how to obtain a fresh
//! credential from an identity provider; the [`CredentialManager`] owns the
//! single shared credential, serves cached reads, and serializes refreshes so
//! concurrent stale readers collapse into one underlying acquisition.

pub mod manager;
pub mod traits;
pub mod types;

pub use manager::{CredentialError, CredentialManager, DEFAULT_REFRESH_THRESHOLD_SECS};
pub use traits::TokenSource;
pub use types::AccessToken;
