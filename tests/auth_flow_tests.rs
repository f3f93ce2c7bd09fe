//! Token lifecycle integration tests: acquisition, refresh, single-flight,
//! invalidation, timeouts, and cancellation against a mock service.

mod common;

use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use flume_water::auth::TokenState;
use flume_water::{ApiError, RequestDescriptor};

use common::*;

const WEEK_SECS: i64 = 604_800;

async fn mount_password_grant(server: &MockServer, user_id: i64, expires_in: i64, expect: u64) {
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_partial_json(json!({
            "grant_type": "password",
            "client_id": TEST_CLIENT_ID,
            "client_secret": TEST_CLIENT_SECRET,
            "username": TEST_USERNAME,
            "password": TEST_PASSWORD,
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(token_envelope(user_id, "refresh-1", expires_in)),
        )
        .expect(expect)
        .mount(server)
        .await;
}

// ---------------------------------------------------------------------------
// Scenario A: fresh client, full flow
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fresh_client_acquires_token_then_fetches_device_with_bearer_header() {
    let server = MockServer::start().await;
    mount_password_grant(&server, 77, WEEK_SECS, 1).await;

    let bearer = format!("Bearer {}", make_jwt(77));
    Mock::given(method("GET"))
        .and(path("/77/devices/42"))
        .and(header("authorization", bearer.as_str()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(success_envelope(json!([device_json("42", 2)]))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let device = client.get_device("42").await.expect("device lookup");
    assert_eq!(device.id, "42");
    assert!(device.device_type.is_sensor());
    assert_eq!(client.authorizer().user_id().unwrap(), 77);
}

// ---------------------------------------------------------------------------
// Idempotence: Valid state performs zero extra token calls
// ---------------------------------------------------------------------------

#[tokio::test]
async fn valid_token_is_reused_without_additional_token_requests() {
    let server = MockServer::start().await;
    mount_password_grant(&server, 9, WEEK_SECS, 1).await;

    Mock::given(method("GET"))
        .and(path("/9/devices"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(success_envelope(json!([device_json("1", 2)]))),
        )
        .expect(3)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    for _ in 0..3 {
        client.list_devices().await.expect("list");
    }
    // The token mock's expect(1) is verified when the server drops.
}

// ---------------------------------------------------------------------------
// Scenario D: concurrent callers share a single token flight
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_usage_polls_from_empty_trigger_exactly_one_token_request() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_envelope(5, "refresh-1", WEEK_SECS))
                // Widen the race window so the second caller really does
                // arrive while the first flight is still pending.
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/5/devices/1/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(usage_envelope(3.5)))
        .expect(2)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let (a, b) = tokio::join!(
        client.get_water_usage("1", 5),
        client.get_water_usage("1", 5),
    );
    assert_eq!(a.expect("first poll"), 3.5);
    assert_eq!(b.expect("second poll"), 3.5);
}

// ---------------------------------------------------------------------------
// Scenario B: auth failure on an API call invalidates the store
// ---------------------------------------------------------------------------

#[tokio::test]
async fn forbidden_api_response_surfaces_authorization_and_clears_tokens() {
    let server = MockServer::start().await;
    mount_password_grant(&server, 9, WEEK_SECS, 1).await;

    Mock::given(method("GET"))
        .and(path("/9/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(failure_envelope(403, true)))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client.list_devices().await.unwrap_err();
    assert!(matches!(err, ApiError::Authorization(_)));
    assert!(err.requires_user_action());

    // Back to Empty: the next attempt must start a new-token flow.
    assert_eq!(client.authorizer().token_state(), TokenState::empty());
    assert!(client.authorizer().user_id().is_err());
}

// ---------------------------------------------------------------------------
// Scenario C: rejected refresh discards everything and starts over
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rejected_refresh_clears_store_and_next_call_uses_password_grant() {
    let server = MockServer::start().await;

    // expires_in equal to the safety margin yields a token that is already
    // expired on arrival, which forces the refresh path on the next call.
    mount_password_grant(&server, 9, 300, 2).await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_partial_json(json!({
            "grant_type": "refresh_token",
            "refresh_token": "refresh-1",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(failure_envelope(401, false)))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/9/devices"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(success_envelope(json!([device_json("1", 2)]))),
        )
        .expect(2)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());

    // First call: password grant, immediately-expired token, request still goes out.
    client.list_devices().await.expect("first poll");
    assert!(client.authorizer().token_state().refresh_token.is_some());

    // Second call: refresh is attempted and rejected with 401.
    let err = client.list_devices().await.unwrap_err();
    assert!(matches!(err, ApiError::Authorization(_)));
    assert_eq!(client.authorizer().token_state(), TokenState::empty());

    // Third call: starts over with the password grant (second hit on that mock).
    client.list_devices().await.expect("third poll");
}

// ---------------------------------------------------------------------------
// Transient refresh failure keeps the refresh token
// ---------------------------------------------------------------------------

#[tokio::test]
async fn transient_refresh_failure_leaves_state_expired_with_refresh_token() {
    let server = MockServer::start().await;
    mount_password_grant(&server, 9, 300, 1).await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_partial_json(json!({"grant_type": "refresh_token"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(failure_envelope(500, false)))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/9/devices"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(success_envelope(json!([device_json("1", 2)]))),
        )
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    client.list_devices().await.expect("seed expired token");

    let err = client.list_devices().await.unwrap_err();
    assert!(matches!(err, ApiError::Malformed(_)));
    assert!(err.is_transient());

    // Still Expired, not Empty: the refresh token survives a transient failure.
    let state = client.authorizer().token_state();
    assert_eq!(state.refresh_token.as_deref(), Some("refresh-1"));
}

// ---------------------------------------------------------------------------
// Expiry margin
// ---------------------------------------------------------------------------

#[tokio::test]
async fn server_lifetime_is_recorded_minus_the_safety_margin() {
    let server = MockServer::start().await;
    mount_password_grant(&server, 9, 600, 1).await;

    let client = test_client(&server.uri());
    client
        .authorizer()
        .ensure_authorized()
        .await
        .expect("acquisition");

    let remaining = client.authorizer().token_state().expires_at - chrono::Utc::now();
    assert!(remaining <= chrono::Duration::seconds(300));
    assert!(remaining > chrono::Duration::seconds(290));
}

// ---------------------------------------------------------------------------
// Transport: timeout and cancellation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn slow_endpoint_resolves_as_transport_timeout() {
    let server = MockServer::start().await;
    mount_password_grant(&server, 9, WEEK_SECS, 1).await;

    Mock::given(method("GET"))
        .and(path("/9/devices"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(success_envelope(json!([])))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    // Deadline shorter than the mounted delay.
    let config = flume_water::FlumeConfig::new(
        TEST_USERNAME,
        TEST_PASSWORD,
        TEST_CLIENT_ID,
        TEST_CLIENT_SECRET,
    )
    .with_base_url(server.uri())
    .with_request_timeout(Duration::from_millis(200));
    let client = flume_water::FlumeClient::new(config).expect("client");

    let err = client.list_devices().await.unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)));
    assert!(err.is_transient());
}

#[tokio::test]
async fn canceled_request_resolves_as_canceled() {
    let server = MockServer::start().await;
    mount_password_grant(&server, 9, WEEK_SECS, 1).await;

    Mock::given(method("GET"))
        .and(path("/9/devices/42"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(success_envelope(json!([device_json("42", 2)])))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    // Warm up authorization so cancellation hits the device call itself.
    client.authorizer().ensure_authorized().await.expect("auth");

    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let result: Result<flume_water::Device, _> = client
        .send_cancellable(RequestDescriptor::get("/devices/42"), &cancel)
        .await;
    assert_eq!(result.unwrap_err(), ApiError::Canceled);

    // The token store is untouched by cancellation.
    assert!(client.authorizer().token_state().authorized);
}
