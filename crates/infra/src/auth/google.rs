//! Google identity token source
//!
//! Implements the `TokenSource` port against Google identity infrastructure.
//! Two acquisition flows exist, selected by environment:
//!
//! - **Direct** (Application Default Credentials on GCE / Workload
//!   Identity): fetch a token for the instance's default service account
//!   from the metadata server.
//! - **Impersonated**: when `GOOGLE_IMPERSONATE_SERVICE_ACCOUNT` names a
//!   target principal, exchange the default identity's token for a
//!   short-lived token acting as that principal via the IAM Credentials
//!   `generateAccessToken` API, constrained to the requested scopes and
//!   lifetime.
//!
//! The choice is invisible to every consumer; they only ever see
//! `fetch_token`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use volley_common::auth::{AccessToken, CredentialError, TokenSource};
use volley_domain::constants::{DEFAULT_IMPERSONATED_LIFETIME_SECS, DEFAULT_SCOPE};

/// Environment variable naming a service account to impersonate.
pub const IMPERSONATE_ENV: &str = "GOOGLE_IMPERSONATE_SERVICE_ACCOUNT";

/// Environment variable overriding the metadata server host.
pub const METADATA_HOST_ENV: &str = "GCE_METADATA_HOST";

const DEFAULT_METADATA_HOST: &str = "metadata.google.internal";
const IAM_CREDENTIALS_ENDPOINT: &str = "https://iamcredentials.googleapis.com";
const METADATA_TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";

/// Token response from the metadata server.
#[derive(Debug, Deserialize)]
struct MetadataTokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateAccessTokenRequest {
    scope: Vec<String>,
    lifetime: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateAccessTokenResponse {
    access_token: String,
    expire_time: String,
}

/// Credential acquisition against Google identity endpoints.
pub struct GoogleTokenSource {
    client: Client,
    scopes: Vec<String>,
    impersonate: Option<String>,
    lifetime_secs: i64,
    metadata_endpoint: String,
    iam_endpoint: String,
}

impl GoogleTokenSource {
    /// Build a source from the process environment.
    ///
    /// Reads `GOOGLE_IMPERSONATE_SERVICE_ACCOUNT` to select the acquisition
    /// flow and `GCE_METADATA_HOST` to locate the metadata server.
    ///
    /// # Errors
    /// Returns [`CredentialError::Acquisition`] if the HTTP client cannot be
    /// constructed.
    pub fn from_env(scopes: Vec<String>) -> Result<Self, CredentialError> {
        let impersonate =
            std::env::var(IMPERSONATE_ENV).ok().filter(|target| !target.is_empty());
        let metadata_host = std::env::var(METADATA_HOST_ENV)
            .ok()
            .filter(|host| !host.is_empty())
            .unwrap_or_else(|| DEFAULT_METADATA_HOST.to_string());

        Self::with_endpoints(
            scopes,
            impersonate,
            format!("http://{metadata_host}"),
            IAM_CREDENTIALS_ENDPOINT.to_string(),
        )
    }

    /// Build a source against explicit endpoints.
    ///
    /// # Errors
    /// Returns [`CredentialError::Acquisition`] if the HTTP client cannot be
    /// constructed.
    pub fn with_endpoints(
        scopes: Vec<String>,
        impersonate: Option<String>,
        metadata_endpoint: String,
        iam_endpoint: String,
    ) -> Result<Self, CredentialError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| CredentialError::Acquisition(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            scopes,
            impersonate,
            lifetime_secs: DEFAULT_IMPERSONATED_LIFETIME_SECS,
            metadata_endpoint,
            iam_endpoint,
        })
    }

    /// Fetch a token for the instance's default service account.
    ///
    /// `scopes` narrows the issued token when non-empty; the metadata server
    /// otherwise applies the account's default scopes.
    async fn fetch_metadata_token(&self, scopes: &[String]) -> Result<AccessToken, CredentialError> {
        let url = format!("{}{METADATA_TOKEN_PATH}", self.metadata_endpoint);
        debug!(%url, "requesting token from metadata server");

        let mut request = self.client.get(&url).header("Metadata-Flavor", "Google");
        if !scopes.is_empty() {
            request = request.query(&[("scopes", scopes.join(","))]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CredentialError::Acquisition(format!("metadata server unreachable: {e}")))?;
        let response = reject_error_status(response, "metadata token endpoint").await?;
        let payload: MetadataTokenResponse = response
            .json()
            .await
            .map_err(|e| CredentialError::Acquisition(format!("invalid metadata token response: {e}")))?;

        Ok(AccessToken::new(payload.access_token, payload.expires_in))
    }

    /// Exchange the default identity for a short-lived token acting as
    /// `target`.
    async fn fetch_impersonated(&self, target: &str) -> Result<AccessToken, CredentialError> {
        // The source identity authenticates the exchange; its own scopes are
        // the account defaults, the requested scopes apply to the issued
        // token.
        let source = self.fetch_metadata_token(&[]).await?;
        info!(target, "impersonating service account");

        let url = format!(
            "{}/v1/projects/-/serviceAccounts/{target}:generateAccessToken",
            self.iam_endpoint
        );
        let scope = if self.scopes.is_empty() {
            vec![DEFAULT_SCOPE.to_string()]
        } else {
            self.scopes.clone()
        };
        let body =
            GenerateAccessTokenRequest { scope, lifetime: format!("{}s", self.lifetime_secs) };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&source.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| CredentialError::Acquisition(format!("IAM credentials API unreachable: {e}")))?;
        let response = reject_error_status(response, "IAM credentials endpoint").await?;
        let payload: GenerateAccessTokenResponse = response
            .json()
            .await
            .map_err(|e| CredentialError::Acquisition(format!("invalid impersonation response: {e}")))?;

        let expires_at = DateTime::parse_from_rfc3339(&payload.expire_time)
            .map_err(|e| CredentialError::Acquisition(format!("invalid expireTime in response: {e}")))?
            .with_timezone(&Utc);

        Ok(AccessToken::with_expiry(payload.access_token, expires_at))
    }
}

#[async_trait]
impl TokenSource for GoogleTokenSource {
    async fn fetch_token(&self) -> Result<AccessToken, CredentialError> {
        match &self.impersonate {
            Some(target) => self.fetch_impersonated(target).await,
            None => self.fetch_metadata_token(&self.scopes).await,
        }
    }
}

async fn reject_error_status(
    response: reqwest::Response,
    context: &str,
) -> Result<reqwest::Response, CredentialError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let detail = response.text().await.unwrap_or_default();
    Err(CredentialError::Acquisition(format!("{context} returned {status}: {detail}")))
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn direct_source(server: &MockServer, scopes: Vec<String>) -> GoogleTokenSource {
        GoogleTokenSource::with_endpoints(scopes, None, server.uri(), server.uri()).unwrap()
    }

    #[tokio::test]
    async fn direct_acquisition_hits_the_metadata_server() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(METADATA_TOKEN_PATH))
            .and(header("Metadata-Flavor", "Google"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "adc-token",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let token = direct_source(&server, Vec::new()).fetch_token().await.unwrap();
        assert_eq!(token.token, "adc-token");
        assert!(token.expires_at.is_some());
        assert!(!token.is_expired(300));
    }

    #[tokio::test]
    async fn direct_acquisition_forwards_scopes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(METADATA_TOKEN_PATH))
            .and(query_param("scopes", "https://www.googleapis.com/auth/a,https://www.googleapis.com/auth/b"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "scoped-token",
                "expires_in": 3599
            })))
            .expect(1)
            .mount(&server)
            .await;

        let scopes = vec![
            "https://www.googleapis.com/auth/a".to_string(),
            "https://www.googleapis.com/auth/b".to_string(),
        ];
        let token = direct_source(&server, scopes).fetch_token().await.unwrap();
        assert_eq!(token.token, "scoped-token");
    }

    #[tokio::test]
    async fn impersonation_exchanges_the_source_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(METADATA_TOKEN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "source-token",
                "expires_in": 3599
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/projects/-/serviceAccounts/robot@proj.iam.gserviceaccount.com:generateAccessToken"))
            .and(header("authorization", "Bearer source-token"))
            .and(body_json(json!({
                "scope": ["https://www.googleapis.com/auth/cloud-platform"],
                "lifetime": "3600s"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "accessToken": "impersonated-token",
                "expireTime": "2099-01-01T00:00:00Z"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let source = GoogleTokenSource::with_endpoints(
            Vec::new(),
            Some("robot@proj.iam.gserviceaccount.com".to_string()),
            server.uri(),
            server.uri(),
        )
        .unwrap();

        let token = source.fetch_token().await.unwrap();
        assert_eq!(token.token, "impersonated-token");
        assert!(!token.is_expired(300));
    }

    #[tokio::test]
    async fn metadata_error_status_is_an_acquisition_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(METADATA_TOKEN_PATH))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let result = direct_source(&server, Vec::new()).fetch_token().await;
        match result {
            Err(CredentialError::Acquisition(message)) => {
                assert!(message.contains("403"));
                assert!(message.contains("forbidden"));
            }
            other => panic!("expected acquisition error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn impersonation_failure_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(METADATA_TOKEN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "source-token",
                "expires_in": 3599
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_string("unknown service account"))
            .mount(&server)
            .await;

        let source = GoogleTokenSource::with_endpoints(
            Vec::new(),
            Some("missing@proj.iam.gserviceaccount.com".to_string()),
            server.uri(),
            server.uri(),
        )
        .unwrap();

        assert!(matches!(source.fetch_token().await, Err(CredentialError::Acquisition(_))));
    }
}
