//! Token grant payloads and access-token identity decoding.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use serde::Deserialize;

use crate::error::ApiError;

/// Token pair delivered inside `data[0]` of a `/oauth/token` envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: String,
    /// Server-declared access-token lifetime in seconds.
    pub expires_in: i64,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Numeric account identity extracted from an access token.
///
/// Recomputed on every accepted token and treated as a cache: a failed decode
/// leaves identity absent, and identity-dependent requests fail with an
/// authorization error instead of reusing a stale identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedIdentity {
    pub user_id: i64,
}

#[derive(Debug, Deserialize)]
struct TokenClaims {
    user_id: i64,
}

/// Decode the account identity from a three-segment bearer token.
///
/// The token format has no documented contract, so anything other than three
/// dot-delimited segments with a base64 JSON payload in the middle is a
/// decode failure, never a panic.
pub fn decode_identity(access_token: &str) -> Result<ParsedIdentity, ApiError> {
    let segments: Vec<&str> = access_token.split('.').collect();
    if segments.len() != 3 {
        return Err(ApiError::Malformed(format!(
            "access token has {} segments, expected 3",
            segments.len()
        )));
    }
    let payload = decode_segment(segments[1])?;
    let claims: TokenClaims = serde_json::from_slice(&payload)
        .map_err(|e| ApiError::Malformed(format!("access token payload is not valid JSON: {e}")))?;
    Ok(ParsedIdentity {
        user_id: claims.user_id,
    })
}

fn decode_segment(segment: &str) -> Result<Vec<u8>, ApiError> {
    // URL-safe alphabet first; older tokens were seen with the standard one.
    URL_SAFE_NO_PAD
        .decode(segment)
        .or_else(|_| STANDARD.decode(segment))
        .map_err(|e| ApiError::Malformed(format!("access token payload is not base64: {e}")))
}
