//! Client configuration (code > env).

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Production API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.flumetech.com";

/// Per-request deadline. The cloud service answers quickly or not at all, so a
/// short deadline keeps polling callers from stacking up behind a dead socket.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(&'static str),
}

/// Credentials and connection settings for one Flume account.
///
/// # Example
/// ```no_run
/// use flume_water::FlumeConfig;
///
/// let config = FlumeConfig::new("user@example.com", "hunter2", "client-id", "client-secret")
///     .with_base_url("https://api.flumetech.com");
/// ```
#[derive(Clone)]
pub struct FlumeConfig {
    pub username: String,
    pub password: String,
    pub client_id: String,
    pub client_secret: String,
    pub base_url: String,
    pub request_timeout: Duration,
}

impl FlumeConfig {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let url = base_url.into();
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Load credentials from environment variables (`FLUME_USERNAME`,
    /// `FLUME_PASSWORD`, `FLUME_CLIENT_ID`, `FLUME_CLIENT_SECRET`, and
    /// optionally `FLUME_BASE_URL`). Reads `.env` if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error

        let get = |name: &'static str| std::env::var(name).map_err(|_| ConfigError::MissingVar(name));
        let mut config = Self::new(
            get("FLUME_USERNAME")?,
            get("FLUME_PASSWORD")?,
            get("FLUME_CLIENT_ID")?,
            get("FLUME_CLIENT_SECRET")?,
        );
        if let Ok(base_url) = std::env::var("FLUME_BASE_URL") {
            config = config.with_base_url(base_url);
        }
        Ok(config)
    }
}

impl fmt::Debug for FlumeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlumeConfig")
            .field("username", &self.username)
            .field("password", &"..")
            .field("client_id", &self.client_id)
            .field("client_secret", &"..")
            .field("base_url", &self.base_url)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}
