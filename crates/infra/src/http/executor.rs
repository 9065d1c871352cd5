//! reqwest-backed request executor
//!
//! One executor serves a whole batch: the merged header set (extras plus the
//! optional bearer credential) is resolved before dispatch begins and baked
//! into the client, so per-request work is just verb/URL/body assembly.
//!
//! No retries happen here: each descriptor is attempted exactly once and
//! every failure mode is folded into the returned record.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Method};
use serde_json::Value;
use tracing::{debug, warn};
use volley_core::batch::RequestExecutor;
use volley_domain::{HttpMethod, RequestDescriptor, Result, ResultRecord, VolleyError};

/// Build the header set applied to every outgoing request.
///
/// `bearer`, when present, becomes an `Authorization: Bearer <token>` entry
/// marked sensitive so it stays out of header dumps. Config validation has
/// already rejected the case where `extra` carries its own Authorization
/// entry alongside a managed bearer.
///
/// # Errors
/// Returns `VolleyError::Config` if a header name or value is not legal HTTP.
pub fn build_header_map(extra: &BTreeMap<String, String>, bearer: Option<&str>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();

    for (name, value) in extra {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| VolleyError::Config(format!("invalid header name `{name}`: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| VolleyError::Config(format!("invalid value for header `{name}`: {e}")))?;
        headers.insert(name, value);
    }

    if let Some(token) = bearer {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| VolleyError::Config(format!("bearer token is not a valid header value: {e}")))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    Ok(headers)
}

/// Executes request descriptors over a shared reqwest client.
#[derive(Debug, Clone)]
pub struct HttpRequestExecutor {
    client: Client,
}

impl HttpRequestExecutor {
    /// Build an executor with the given default headers.
    ///
    /// `timeout` bounds each whole request; `None` leaves the transport's
    /// own defaults in charge.
    ///
    /// # Errors
    /// Returns `VolleyError::Network` if the underlying client cannot be
    /// constructed.
    pub fn new(headers: HeaderMap, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder().default_headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| VolleyError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

fn verb(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
        HttpMethod::Head => Method::HEAD,
        HttpMethod::Options => Method::OPTIONS,
    }
}

/// Decode a response payload as JSON, falling back to the raw text.
///
/// Decode failure is not an error; it only changes how the body is
/// represented in the record.
fn decode_body(text: String) -> Value {
    match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(_) => Value::String(text),
    }
}

#[async_trait]
impl RequestExecutor for HttpRequestExecutor {
    async fn execute(&self, descriptor: &RequestDescriptor) -> ResultRecord {
        let mut request = self.client.request(verb(descriptor.method), &descriptor.url);
        if descriptor.method.sends_body() {
            if let Some(body) = &descriptor.body {
                request = request.json(body);
            }
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                if !(200..300).contains(&status) {
                    warn!(index = descriptor.index, status, "request returned non-success status");
                } else {
                    debug!(index = descriptor.index, status, "request completed");
                }

                match response.text().await {
                    Ok(text) => ResultRecord::completed(descriptor, status, Some(decode_body(text))),
                    Err(err) => {
                        warn!(index = descriptor.index, error = %err, "failed to read response body");
                        let mut record = ResultRecord::completed(descriptor, status, None);
                        record.response.message = Some(format!("failed to read response body: {err}"));
                        record
                    }
                }
            }
            Err(err) => {
                warn!(index = descriptor.index, error = %err, "request failed");
                ResultRecord::failed(descriptor, err.to_string())
            }
        }
    }
}
