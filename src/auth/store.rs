//! In-memory token store with atomic snapshot semantics.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};

/// Immutable snapshot of the current credential pair.
///
/// `authorized` means the access token was present and unexpired the last
/// time it was validated; a present access token does not by itself imply
/// validity. States are replaced wholesale, never mutated in place, so a
/// snapshot read under concurrency is always internally consistent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenState {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub authorized: bool,
}

impl TokenState {
    /// The state a client starts in, and returns to after an auth failure.
    pub fn empty() -> Self {
        Self {
            access_token: None,
            refresh_token: None,
            expires_at: DateTime::<Utc>::UNIX_EPOCH,
            authorized: false,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Whether the access token can be attached to a request right now.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.authorized && self.access_token.is_some() && !self.is_expired(now)
    }
}

impl Default for TokenState {
    fn default() -> Self {
        Self::empty()
    }
}

/// Holder for the current [`TokenState`], shared by every caller of a client.
///
/// All operations are linearizable: `read` returns the last committed state,
/// `compare_and_swap` only commits when the state is still the one the caller
/// decided against, and no operation ever observes a partial update.
#[derive(Debug, Default)]
pub struct TokenStore {
    state: Mutex<TokenState>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TokenState::empty()),
        }
    }

    /// Snapshot of the last committed state. Never blocks on I/O.
    pub fn read(&self) -> TokenState {
        self.lock().clone()
    }

    /// Commit `new` only if the current state still equals `expected`.
    ///
    /// Returns false when another transition won, so the caller can re-read
    /// and retry its decision.
    pub fn compare_and_swap(&self, expected: &TokenState, new: TokenState) -> bool {
        let mut guard = self.lock();
        if *guard == *expected {
            *guard = new;
            true
        } else {
            false
        }
    }

    /// Unconditionally reset to the empty state. Used after any
    /// authentication failure so the next attempt starts over.
    pub fn clear(&self) {
        *self.lock() = TokenState::empty();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TokenState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
