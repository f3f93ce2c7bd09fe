//! Token lifecycle management: acquisition, refresh, expiry, single-flight.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{Duration, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, warn};

use crate::config::FlumeConfig;
use crate::envelope::{Classification, ResponseEnvelope};
use crate::error::{ApiError, Result};

use super::store::{TokenState, TokenStore};
use super::token::{decode_identity, ParsedIdentity, TokenGrant};

/// Seconds subtracted from the server-declared token lifetime, so a request
/// started just before the computed expiry cannot race the real one.
pub const EXPIRY_MARGIN_SECS: i64 = 300;

const TOKEN_PATH: &str = "/oauth/token";

type InFlight = Shared<BoxFuture<'static, Result<()>>>;

/// Manages the access/refresh token pair for one account.
///
/// All state lives behind an `Arc`, so the authorizer is cheap to clone and
/// every clone observes the same tokens. The one concurrency invariant that
/// matters: at most one token-acquiring request is outstanding at a time.
/// Concurrent callers of [`ensure_authorized`](Self::ensure_authorized)
/// attach to the in-flight outcome instead of issuing a duplicate request,
/// because a second refresh with the same refresh token would be rejected and
/// void otherwise-valid credentials.
#[derive(Clone)]
pub struct Authorizer {
    inner: Arc<AuthorizerInner>,
}

struct AuthorizerInner {
    http: reqwest::Client,
    config: FlumeConfig,
    store: TokenStore,
    identity: Mutex<Option<ParsedIdentity>>,
    /// The single pending token flight, tagged with a generation id so the
    /// caller that observes completion can retire exactly this flight.
    in_flight: Mutex<Option<(u64, InFlight)>>,
    flight_counter: AtomicU64,
}

impl Authorizer {
    pub fn new(http: reqwest::Client, config: FlumeConfig) -> Self {
        Self {
            inner: Arc::new(AuthorizerInner {
                http,
                config,
                store: TokenStore::new(),
                identity: Mutex::new(None),
                in_flight: Mutex::new(None),
                flight_counter: AtomicU64::new(0),
            }),
        }
    }

    /// Make sure a valid access token is available, acquiring or refreshing
    /// one if necessary.
    ///
    /// While the stored token is valid this returns immediately with no
    /// network call. Otherwise exactly one caller performs the token request;
    /// everyone else awaits the same shared outcome.
    pub async fn ensure_authorized(&self) -> Result<()> {
        if self.inner.store.read().is_valid(Utc::now()) {
            return Ok(());
        }

        let (flight_id, future) = {
            let mut slot = lock(&self.inner.in_flight);
            match slot.as_ref() {
                Some((id, pending)) => (*id, pending.clone()),
                None => {
                    let id = self.inner.flight_counter.fetch_add(1, Ordering::Relaxed);
                    let this = self.clone();
                    let fresh: InFlight = async move { this.acquire().await }.boxed().shared();
                    *slot = Some((id, fresh.clone()));
                    (id, fresh)
                }
            }
        };

        let result = future.await;

        // Whoever observes completion retires the handle, so a canceled
        // leader cannot leave a resolved flight pinned in the slot.
        let mut slot = lock(&self.inner.in_flight);
        if slot.as_ref().map(|(id, _)| *id) == Some(flight_id) {
            *slot = None;
        }
        drop(slot);

        result
    }

    /// The numeric account identity from the last accepted access token.
    ///
    /// Never blocks and never triggers a token request; fails before the
    /// first successful acquisition or after a payload decode failure.
    pub fn user_id(&self) -> Result<i64> {
        let identity = *lock(&self.inner.identity);
        identity.map(|identity| identity.user_id).ok_or_else(|| {
            ApiError::Authorization("no account identity; authorize first".to_string())
        })
    }

    /// Current bearer token, if one is stored.
    pub fn bearer_token(&self) -> Option<String> {
        self.inner.store.read().access_token
    }

    /// Snapshot of the stored token state.
    pub fn token_state(&self) -> TokenState {
        self.inner.store.read()
    }

    /// Discard all credentials so the next call starts a new-token flow.
    ///
    /// Called whenever the remote service answers an API request with an
    /// authorization failure: the stored tokens are doomed and retrying with
    /// them would only repeat the rejection.
    pub fn invalidate(&self) {
        debug!("invalidating stored credentials");
        self.inner.store.clear();
        *lock(&self.inner.identity) = None;
    }

    /// The single-flight body: decide between a new-token and a refresh
    /// grant, perform it, and commit the result.
    async fn acquire(self) -> Result<()> {
        let before = self.inner.store.read();
        if before.is_valid(Utc::now()) {
            // A previous flight committed while we were queued behind the slot.
            return Ok(());
        }

        let refreshing = before.refresh_token.is_some();
        let body = match &before.refresh_token {
            Some(refresh_token) => {
                debug!("access token expired, refreshing");
                serde_json::json!({
                    "grant_type": "refresh_token",
                    "refresh_token": refresh_token,
                    "client_id": self.inner.config.client_id,
                    "client_secret": self.inner.config.client_secret,
                })
            }
            None => {
                debug!("no refresh token, requesting a new token pair");
                serde_json::json!({
                    "grant_type": "password",
                    "client_id": self.inner.config.client_id,
                    "client_secret": self.inner.config.client_secret,
                    "username": self.inner.config.username,
                    "password": self.inner.config.password,
                })
            }
        };

        let url = format!("{}{TOKEN_PATH}", self.inner.config.base_url);
        let response = self
            .inner
            .http
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(&body)
            .timeout(self.inner.config.request_timeout)
            .send()
            .await?;
        let raw = response.bytes().await?;

        let envelope: ResponseEnvelope<TokenGrant> = ResponseEnvelope::parse(&raw)
            .map_err(|e| ApiError::Malformed(format!("token response did not decode: {e}")))?;

        match envelope.classify() {
            Classification::AuthorizationFailure => {
                // A rejected refresh token is as dead as a rejected password;
                // discard everything so the next attempt starts over.
                warn!(
                    refreshing,
                    "token request rejected: {}",
                    envelope.diagnostic()
                );
                self.invalidate();
                Err(ApiError::Authorization(envelope.diagnostic()))
            }
            Classification::NotFound => Err(ApiError::NotFound(envelope.diagnostic())),
            Classification::GenericFailure => {
                warn!("token request failed: {}", envelope.diagnostic());
                Err(ApiError::Malformed(envelope.diagnostic()))
            }
            Classification::Ok => {
                let grant = envelope
                    .data
                    .and_then(|mut data| if data.is_empty() { None } else { data.remove(0) })
                    .ok_or_else(|| {
                        ApiError::Malformed("token response contained no grant".to_string())
                    })?;
                self.commit(before, grant);
                Ok(())
            }
        }
    }

    fn commit(&self, decided_against: TokenState, grant: TokenGrant) {
        let expires_at =
            Utc::now() + Duration::seconds((grant.expires_in - EXPIRY_MARGIN_SECS).max(0));
        debug!(
            expires_in = grant.expires_in,
            "accepted token pair, expiry recorded with safety margin"
        );

        let identity = match decode_identity(&grant.access_token) {
            Ok(identity) => Some(identity),
            Err(e) => {
                // The token still authorizes plain calls; identity-dependent
                // requests will fail with an authorization error.
                warn!("access token identity did not decode: {e}");
                None
            }
        };

        let new_state = TokenState {
            access_token: Some(grant.access_token),
            refresh_token: Some(grant.refresh_token),
            expires_at,
            authorized: true,
        };

        // Only `clear` can interleave with the single flight; a freshly
        // issued grant supersedes whatever state the clear left behind.
        let mut expected = decided_against;
        while !self.inner.store.compare_and_swap(&expected, new_state.clone()) {
            expected = self.inner.store.read();
        }
        *lock(&self.inner.identity) = identity;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
