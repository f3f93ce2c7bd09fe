//! The uniform response envelope the Flume service wraps around every payload.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::warn;

/// Generic success/error envelope returned by every Flume endpoint.
///
/// Field names reproduce the wire contract exactly. `detailed` has no stable
/// shape (sometimes a string list, sometimes structured objects), so it is
/// kept as an opaque JSON value and never consulted for control flow.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
pub struct ResponseEnvelope<T> {
    #[serde(default)]
    pub success: bool,

    /// HTTP-status-shaped result code, present even for non-HTTP transports.
    /// The service has been observed returning 400 alongside `success: true`,
    /// so classification checks this before the flag.
    #[serde(default = "default_code")]
    pub code: u16,

    #[serde(default)]
    pub message: Option<String>,

    /// Name of the status code. Some deployments send it as `status_message`.
    #[serde(default, alias = "status_message")]
    pub http_message: Option<String>,

    /// Best-effort diagnostic blob. Opaque by design.
    #[serde(default)]
    pub detailed: Option<serde_json::Value>,

    /// Payload array. Individual entries may be null; when `success` is false
    /// this must not be trusted even if present.
    #[serde(default)]
    pub data: Option<Vec<Option<T>>>,

    /// Total records in existence for the route, not just this page.
    #[serde(default)]
    pub count: Option<u64>,

    #[serde(default)]
    pub pagination: Option<PaginationCursor>,
}

/// Links to the next/previous page when a GET exceeds its query limit.
#[derive(Debug, Clone, Deserialize)]
pub struct PaginationCursor {
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub prev: Option<String>,
}

fn default_code() -> u16 {
    400
}

/// Outcome of classifying an envelope, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Ok,
    AuthorizationFailure,
    NotFound,
    GenericFailure,
}

impl<T: DeserializeOwned> ResponseEnvelope<T> {
    /// Decode an envelope from raw response bytes.
    pub fn parse(raw: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(raw)
    }
}

impl<T> ResponseEnvelope<T> {
    /// Classify this envelope into one of four actionable outcomes.
    ///
    /// Precedence is load-bearing: 401/403/503 are an authorization problem
    /// regardless of the `success` flag, and 404 outranks the flag as well.
    /// Only then does a false flag (or a 400 code) count as a generic failure.
    pub fn classify(&self) -> Classification {
        match self.code {
            401 | 403 | 503 => Classification::AuthorizationFailure,
            404 => Classification::NotFound,
            _ if !self.success || self.code == 400 => Classification::GenericFailure,
            _ => Classification::Ok,
        }
    }

    /// Human-readable summary of a failed envelope for error payloads.
    pub fn diagnostic(&self) -> String {
        let status = self.http_message.as_deref().unwrap_or("unknown status");
        let message = self.message.as_deref().unwrap_or("no message");
        if let Some(detailed) = &self.detailed {
            warn!(code = self.code, %detailed, "envelope carried error details");
        }
        format!("{status} (code {code}): {message}", code = self.code)
    }
}
