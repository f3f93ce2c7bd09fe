//! Error types for flume-water.

use thiserror::Error;

/// Primary error type for all API operations.
///
/// Every variant carries only display text so the type stays `Clone`; in-flight
/// token acquisitions share their outcome with every waiting caller, and a
/// shared outcome has to be cloneable.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// Credentials were rejected or expired and could not be refreshed.
    /// The token store has already been invalidated; user action is required.
    #[error("Authorization failed: {0}")]
    Authorization(String),

    /// The resource is absent or of the wrong kind. Configuration error.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Network-level failure: connect error, reset, or timeout. Transient.
    #[error("Transport failure: {0}")]
    Transport(String),

    /// The response envelope violated its structural contract. Treated as
    /// transient, but may indicate a remote API change.
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// The caller canceled a pending request.
    #[error("Request canceled")]
    Canceled,
}

impl ApiError {
    /// Whether a polling caller should simply wait for its next scheduled
    /// attempt rather than escalate.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Malformed(_) | Self::Canceled
        )
    }

    /// Whether the failure needs user intervention (re-authorization or a
    /// configuration fix) before any retry can succeed.
    pub fn requires_user_action(&self) -> bool {
        matches!(self, Self::Authorization(_) | Self::NotFound(_))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Transport(format!("request timed out: {error}"))
        } else {
            Self::Transport(error.to_string())
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ApiError>;
