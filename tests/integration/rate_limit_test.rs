//! Integration tests for rate limiting on metered routes and purchases.

mod helpers;

use http::StatusCode;
use serde_json::json;

use boxoffice_api::extractors::AuthenticatedUser;
use boxoffice_core::types::UserId;
use helpers::{ClientRequest, availability_path, purchase_body};

fn retry_after(response: &helpers::TestResponse) -> u64 {
    response
        .header("retry-after")
        .expect("Retry-After missing")
        .parse()
        .expect("Retry-After not numeric")
}

#[tokio::test]
async fn test_strict_profile_on_purchase() {
    let app = helpers::TestApp::new().await;
    let id = app.seed_on_sale(100);

    for n in 0..10 {
        let response = app
            .send(
                ClientRequest::new("POST", "/api/v1/tickets/purchase", "198.51.100.20")
                    .json(Some(purchase_body(id, 1)))
                    .header("X-TLS-Fingerprint", &format!("device-{n}")),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "attempt {n}");
        let remaining = (9 - n).to_string();
        assert_eq!(response.header("x-ratelimit-remaining"), Some(remaining.as_str()));
    }

    let response = app
        .send(
            ClientRequest::new("POST", "/api/v1/tickets/purchase", "198.51.100.20")
                .json(Some(purchase_body(id, 1)))
                .header("X-TLS-Fingerprint", "device-10"),
        )
        .await;

    assert_eq!(response.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.error_code(), "RATE_LIMIT_EXCEEDED");
    assert_eq!(response.header("x-ratelimit-limit"), Some("10"));
    assert_eq!(response.header("x-ratelimit-remaining"), Some("0"));
    assert!((1..=60).contains(&retry_after(&response)));
    assert_eq!(app.available(id).await, 90);
}

#[tokio::test]
async fn test_default_profile_on_metered_routes() {
    let app = helpers::TestApp::with_config(|config| {
        config.admission.rate_limit.default.limit = 3;
    })
    .await;
    let id = app.seed_on_sale(10);
    let path = availability_path(id, 1);

    for expected in ["2", "1", "0"] {
        let response = app.request("GET", &path, None, "198.51.100.30").await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.header("x-ratelimit-limit"), Some("3"));
        assert_eq!(response.header("x-ratelimit-remaining"), Some(expected));
    }

    let denied = app.request("GET", &path, None, "198.51.100.30").await;
    assert_eq!(denied.status, StatusCode::TOO_MANY_REQUESTS);
    assert!(retry_after(&denied) >= 1);

    // Windows are per client.
    let other = app.request("GET", &path, None, "198.51.100.31").await;
    assert_eq!(other.status, StatusCode::OK);
}

#[tokio::test]
async fn test_purchase_is_counted_once() {
    let app = helpers::TestApp::with_config(|config| {
        config.admission.rate_limit.default.limit = 1;
    })
    .await;
    let id = app.seed_on_sale(10);

    for device in ["device-a", "device-b"] {
        let response = app
            .send(
                ClientRequest::new("POST", "/api/v1/tickets/purchase", "198.51.100.40")
                    .json(Some(purchase_body(id, 1)))
                    .header("X-TLS-Fingerprint", device),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED);
    }
}

#[tokio::test]
async fn test_authenticated_user_shares_window_across_addresses() {
    let app = helpers::TestApp::with_config(|config| {
        config.admission.rate_limit.default.limit = 2;
    })
    .await;
    let id = app.seed_on_sale(10);
    let path = availability_path(id, 1);
    let user = AuthenticatedUser {
        user_id: UserId::new(),
    };

    for client in ["198.51.100.50", "198.51.100.51"] {
        let response = app
            .send(ClientRequest::new("GET", &path, client).user(user.clone()))
            .await;
        assert_eq!(response.status, StatusCode::OK);
    }

    let response = app
        .send(ClientRequest::new("GET", &path, "198.51.100.52").user(user))
        .await;
    assert_eq!(response.status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_admin_reset_clears_window() {
    let app = helpers::TestApp::with_config(|config| {
        config.admission.rate_limit.default.limit = 1;
    })
    .await;
    let id = app.seed_on_sale(10);
    let path = availability_path(id, 1);

    assert_eq!(
        app.request("GET", &path, None, "198.51.100.60").await.status,
        StatusCode::OK
    );
    assert_eq!(
        app.request("GET", &path, None, "198.51.100.60").await.status,
        StatusCode::TOO_MANY_REQUESTS
    );

    let reset = app
        .request(
            "POST",
            "/api/v1/admin/rate-limits/reset",
            Some(json!({
                "identity": "ip:198.51.100.60",
                "route": format!("/api/v1/tickets/check-availability/{id}"),
            })),
            "10.0.0.1",
        )
        .await;
    assert_eq!(reset.status, StatusCode::OK);
    assert_eq!(reset.body["reset"], true);

    assert_eq!(
        app.request("GET", &path, None, "198.51.100.60").await.status,
        StatusCode::OK
    );
}

#[tokio::test]
async fn test_admin_reset_rejects_bad_identity() {
    let app = helpers::TestApp::new().await;

    let response = app
        .request(
            "POST",
            "/api/v1/admin/rate-limits/reset",
            Some(json!({ "identity": "device:abc", "route": "/api/v1/orders" })),
            "10.0.0.1",
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_disabled_limiter_sets_no_headers() {
    let app = helpers::TestApp::with_config(|config| {
        config.admission.rate_limit.enabled = false;
    })
    .await;
    let id = app.seed_on_sale(10);

    let response = app
        .request("GET", &availability_path(id, 1), None, "198.51.100.70")
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.header("x-ratelimit-limit").is_none());
    assert!(response.header("x-ratelimit-remaining").is_none());
}
