//! Core data types for batch request execution
//!
//! The JSON shapes here are wire-facing: `RequestLine` matches the ingested
//! JSONL records and `ResultRecord` matches the emitted ones, so serde
//! attributes on these types are part of the external contract.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::errors::VolleyError;

/// HTTP verb for an outbound request.
///
/// Parsing is case-insensitive (`"get"`, `"Get"`, and `"GET"` are all
/// accepted) and serialization always emits the canonical uppercase form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    /// Canonical uppercase name of the verb.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }

    /// Whether a request payload is sent for this verb.
    ///
    /// GET/DELETE (and HEAD/OPTIONS) are issued bodiless even when the input
    /// record carries a `body` field.
    #[must_use]
    pub fn sends_body(&self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = VolleyError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "HEAD" => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            other => Err(VolleyError::InvalidInput(format!("unsupported HTTP method: {other}"))),
        }
    }
}

impl Serialize for HttpMethod {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for HttpMethod {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(|e: VolleyError| D::Error::custom(e.to_string()))
    }
}

/// One raw record as it appears in the input stream, before validation.
///
/// `method` defaults to GET when absent; `url` is optional here because
/// URL-less records are a skip condition, not a parse failure. Unknown fields
/// are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestLine {
    #[serde(default)]
    pub method: HttpMethod,

    #[serde(default)]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

/// One validated unit of work: an input record that carries a usable URL.
///
/// `index` is 0-based, unique, and assigned at ingestion over all parsed
/// records (skipped records consume an index too). Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestDescriptor {
    pub index: usize,
    pub method: HttpMethod,
    pub url: String,
    pub body: Option<Value>,
}

impl RequestDescriptor {
    /// The request portion echoed into the matching [`ResultRecord`].
    #[must_use]
    pub fn echo(&self) -> RequestEcho {
        RequestEcho { method: self.method, url: self.url.clone(), body: self.body.clone() }
    }
}

/// Echo of the originating request inside a result record.
///
/// `body` serializes as an explicit `null` when absent; the output contract
/// always carries all three request fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEcho {
    pub method: HttpMethod,
    pub url: String,
    pub body: Option<Value>,
}

/// Observed outcome of one request.
///
/// Exactly one of two shapes is produced:
/// - a response was received: `status` is set, `body` holds the decoded
///   payload (JSON if it parses, raw text otherwise), `message` is absent
///   unless the payload itself could not be read;
/// - transport failure: `status` is `null`, `body` is absent, `message`
///   carries the error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ResponseRecord {
    pub status: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ResponseRecord {
    /// Success classification: a received status in `[200, 300)`.
    ///
    /// Used only for aggregate statistics; never written to the output.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.status, Some(status) if (200..300).contains(&status))
    }
}

/// Terminal record produced for every non-skipped descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub index: usize,
    pub request: RequestEcho,
    pub response: ResponseRecord,
}

impl ResultRecord {
    /// Build a record for a request that received a response.
    #[must_use]
    pub fn completed(descriptor: &RequestDescriptor, status: u16, body: Option<Value>) -> Self {
        Self {
            index: descriptor.index,
            request: descriptor.echo(),
            response: ResponseRecord { status: Some(status), body, message: None },
        }
    }

    /// Build a record for a request that failed at the transport level.
    ///
    /// No status is recorded; the error text is preserved in `message`.
    #[must_use]
    pub fn failed(descriptor: &RequestDescriptor, message: impl Into<String>) -> Self {
        Self {
            index: descriptor.index,
            request: descriptor.echo(),
            response: ResponseRecord { status: None, body: None, message: Some(message.into()) },
        }
    }
}

/// Read-only view of batch progress at one point in time.
///
/// `total` is fixed for the life of the run; `completed` and `errors` are
/// monotonically non-decreasing and `completed <= total` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub completed: u64,
    pub errors: u64,
    pub total: u64,
    pub elapsed: Duration,
}

/// Aggregate outcome of a finished batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    /// Number of result records produced (equals valid descriptors).
    pub processed: u64,
    /// Records classified successful (2xx status).
    pub succeeded: u64,
    /// Records classified as errors (non-2xx or transport failure).
    pub failed: u64,
    /// Wall-clock duration of the dispatch phase.
    pub elapsed: Duration,
}

impl BatchSummary {
    /// Requests completed per second of wall-clock time.
    #[must_use]
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.processed as f64 / secs
        } else {
            self.processed as f64
        }
    }
}
