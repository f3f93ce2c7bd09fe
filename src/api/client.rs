//! The client context: authorized request pipeline plus the device API facade.

use chrono::{Duration, NaiveDateTime, Timelike};
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::api::request::{Method, RequestDescriptor};
use crate::api::types::{Device, UsageQueryResult};
use crate::auth::Authorizer;
use crate::config::FlumeConfig;
use crate::envelope::{Classification, ResponseEnvelope};
use crate::error::{ApiError, Result};

/// Fixed id echoed back as the bucket key in water-use query responses.
const QUERY_REQUEST_ID: &str = "water-usage";

const QUERY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Asynchronous client for the Flume cloud API.
///
/// One `FlumeClient` owns the HTTP connection pool, the account credentials,
/// and the token state; there are no ambient singletons. Cloning is cheap and
/// every clone shares the same token state, so independent polling jobs can
/// each hold one without risking duplicate token requests.
///
/// # Example
/// ```no_run
/// use flume_water::{FlumeClient, FlumeConfig};
///
/// # async fn example() -> flume_water::Result<()> {
/// let config = FlumeConfig::new("user@example.com", "pw", "client-id", "client-secret");
/// let client = FlumeClient::new(config)?;
/// for device in client.list_devices().await? {
///     println!("{} ({:?})", device.id, device.device_type);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct FlumeClient {
    http: reqwest::Client,
    config: FlumeConfig,
    authorizer: Authorizer,
}

impl FlumeClient {
    pub fn new(config: FlumeConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ApiError::Transport(format!("failed to build HTTP client: {e}")))?;
        let authorizer = Authorizer::new(http.clone(), config.clone());
        Ok(Self {
            http,
            config,
            authorizer,
        })
    }

    /// The token lifecycle manager backing this client.
    pub fn authorizer(&self) -> &Authorizer {
        &self.authorizer
    }

    // -----------------------------------------------------------------------
    // Device API facade
    // -----------------------------------------------------------------------

    /// List every device registered to the account.
    pub async fn list_devices(&self) -> Result<Vec<Device>> {
        self.send_list(RequestDescriptor::get("/devices")).await
    }

    /// Fetch a single water-sensor device.
    ///
    /// The service silently returns any device type for this path, so a
    /// record that is not the flow sensor fails with [`ApiError::NotFound`].
    pub async fn get_device(&self, device_id: &str) -> Result<Device> {
        let device: Device = self
            .send(RequestDescriptor::get(format!("/devices/{device_id}")))
            .await?;
        if !device.device_type.is_sensor() {
            return Err(ApiError::NotFound(format!(
                "device {device_id} is a {:?}, not a water sensor",
                device.device_type
            )));
        }
        Ok(device)
    }

    /// Total water use over the trailing `window_minutes`, in the account's
    /// configured units.
    pub async fn get_water_usage(&self, device_id: &str, window_minutes: i64) -> Result<f64> {
        let body = usage_query_body(window_minutes, chrono::Local::now().naive_local());
        let result: UsageQueryResult = self
            .send(RequestDescriptor::post(
                format!("/devices/{device_id}/query"),
                body,
            ))
            .await?;
        result
            .0
            .get(QUERY_REQUEST_ID)
            .and_then(|samples| samples.first())
            .map(|sample| sample.value)
            .ok_or_else(|| {
                ApiError::Malformed("query response missing the usage bucket".to_string())
            })
    }

    // -----------------------------------------------------------------------
    // Authorized request pipeline
    // -----------------------------------------------------------------------

    /// Dispatch a descriptor whose endpoint guarantees at least one `data`
    /// element, returning that element.
    pub async fn send<T: DeserializeOwned>(&self, descriptor: RequestDescriptor) -> Result<T> {
        let mut data = self.payload(descriptor).await?;
        if data.is_empty() {
            return Err(ApiError::Malformed(
                "response data array was empty".to_string(),
            ));
        }
        Ok(data.remove(0))
    }

    /// Dispatch a descriptor returning the full `data` array.
    pub async fn send_list<T: DeserializeOwned>(
        &self,
        descriptor: RequestDescriptor,
    ) -> Result<Vec<T>> {
        self.payload(descriptor).await
    }

    /// Like [`send`](Self::send), but resolves with [`ApiError::Canceled`]
    /// as soon as `cancel` fires, dropping the underlying network call.
    pub async fn send_cancellable<T: DeserializeOwned>(
        &self,
        descriptor: RequestDescriptor,
        cancel: &CancellationToken,
    ) -> Result<T> {
        tokio::select! {
            _ = cancel.cancelled() => Err(ApiError::Canceled),
            result = self.send(descriptor) => result,
        }
    }

    async fn payload<T: DeserializeOwned>(&self, descriptor: RequestDescriptor) -> Result<Vec<T>> {
        let url = if descriptor.requires_authorization {
            // Short-circuit without a network call when authorization fails.
            self.authorizer.ensure_authorized().await?;
            let user_id = self.authorizer.user_id()?;
            format!("{}/{user_id}{}", self.config.base_url, descriptor.path)
        } else {
            format!("{}{}", self.config.base_url, descriptor.path)
        };
        debug!(method = ?descriptor.method, path = %descriptor.path, "dispatching API request");

        let mut builder = match descriptor.method {
            Method::Get => self.http.get(&url),
            Method::Post => self.http.post(&url),
        };
        builder = builder.header(CONTENT_TYPE, "application/json");
        if descriptor.requires_authorization {
            let token = self.authorizer.bearer_token().ok_or_else(|| {
                ApiError::Authorization("no access token available".to_string())
            })?;
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &descriptor.body {
            trace!(%body, "request body");
            builder = builder.json(body);
        }

        let response = builder.timeout(self.config.request_timeout).send().await?;
        let raw = response.bytes().await?;

        let envelope: ResponseEnvelope<T> = ResponseEnvelope::parse(&raw).map_err(|e| {
            warn!(path = %descriptor.path, "response envelope did not decode: {e}");
            ApiError::Malformed(format!("response envelope did not decode: {e}"))
        })?;

        match envelope.classify() {
            Classification::AuthorizationFailure => {
                // The stored credentials are doomed; drop them so the next
                // call re-authorizes from scratch.
                self.authorizer.invalidate();
                Err(ApiError::Authorization(envelope.diagnostic()))
            }
            Classification::NotFound => Err(ApiError::NotFound(envelope.diagnostic())),
            Classification::GenericFailure => {
                warn!(path = %descriptor.path, "request failed: {}", envelope.diagnostic());
                Err(ApiError::Malformed(envelope.diagnostic()))
            }
            Classification::Ok => {
                let data = envelope.data.unwrap_or_default();
                let mut items = Vec::with_capacity(data.len());
                for (index, item) in data.into_iter().enumerate() {
                    match item {
                        Some(item) => items.push(item),
                        None => {
                            return Err(ApiError::Malformed(format!(
                                "response data entry {index} was null"
                            )));
                        }
                    }
                }
                Ok(items)
            }
        }
    }
}

/// Build the time-windowed water-use query body: the window start is
/// truncated to the minute, the end is now.
fn usage_query_body(window_minutes: i64, now: NaiveDateTime) -> serde_json::Value {
    let since = truncate_to_minute(now - Duration::minutes(window_minutes));
    serde_json::json!({
        "request_id": QUERY_REQUEST_ID,
        "since_datetime": since.format(QUERY_TIME_FORMAT).to_string(),
        "until_datetime": now.format(QUERY_TIME_FORMAT).to_string(),
        "bucket": "MIN",
        "group_multiplier": window_minutes,
        "operation": "SUM",
        "sort_direction": "ASC",
    })
}

fn truncate_to_minute(time: NaiveDateTime) -> NaiveDateTime {
    time.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(time)
}
