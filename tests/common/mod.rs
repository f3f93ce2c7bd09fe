//! Shared helpers for wiremock-backed integration tests.
#![allow(dead_code)]

use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::json;

use flume_water::{FlumeClient, FlumeConfig};

pub const TEST_USERNAME: &str = "user@example.com";
pub const TEST_PASSWORD: &str = "hunter2";
pub const TEST_CLIENT_ID: &str = "test-client-id";
pub const TEST_CLIENT_SECRET: &str = "test-client-secret";

/// A syntactically valid three-segment bearer token whose payload carries
/// the given numeric user id.
pub fn make_jwt(user_id: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(
        json!({"user_id": user_id, "type": "USER"})
            .to_string()
            .as_bytes(),
    );
    format!("{header}.{payload}.test-signature")
}

/// Successful `/oauth/token` envelope carrying one token grant.
pub fn token_envelope(user_id: i64, refresh_token: &str, expires_in: i64) -> serde_json::Value {
    success_envelope(json!([{
        "token_type": "bearer",
        "access_token": make_jwt(user_id),
        "refresh_token": refresh_token,
        "expires_in": expires_in,
    }]))
}

/// Successful envelope wrapping the given `data` array.
pub fn success_envelope(data: serde_json::Value) -> serde_json::Value {
    let count = data.as_array().map(|a| a.len()).unwrap_or(0);
    json!({
        "success": true,
        "code": 200,
        "message": "Request OK",
        "http_message": "OK",
        "detailed": null,
        "data": data,
        "count": count,
    })
}

/// Failure envelope with an HTTP-status-shaped code.
pub fn failure_envelope(code: u16, success: bool) -> serde_json::Value {
    json!({
        "success": success,
        "code": code,
        "message": "Something went wrong",
        "http_message": "ERROR",
        "detailed": ["diagnostic text"],
        "data": null,
        "count": 0,
    })
}

pub fn device_json(id: &str, device_type: i64) -> serde_json::Value {
    json!({
        "id": id,
        "type": device_type,
        "bridge_id": "bridge-1",
        "connected": true,
        "battery_level": "high",
        "last_seen": "2020-04-10 14:03:40.000",
        "product": "flume1",
    })
}

pub fn usage_envelope(value: f64) -> serde_json::Value {
    success_envelope(json!([{
        "water-usage": [{"datetime": "2020-04-10 14:00:00", "value": value}],
    }]))
}

/// Client pointed at a mock server with the standard test credentials.
pub fn test_client(base_url: &str) -> FlumeClient {
    let config = FlumeConfig::new(
        TEST_USERNAME,
        TEST_PASSWORD,
        TEST_CLIENT_ID,
        TEST_CLIENT_SECRET,
    )
    .with_base_url(base_url)
    .with_request_timeout(Duration::from_secs(2));
    FlumeClient::new(config).expect("client should build")
}
