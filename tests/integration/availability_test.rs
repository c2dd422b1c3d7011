//! Integration tests for availability and fingerprint checks.

mod helpers;

use http::StatusCode;

use boxoffice_core::config::SeedTicketType;
use boxoffice_core::types::TicketTypeId;
use helpers::{availability_path, purchase_body};

#[tokio::test]
async fn test_available_ticket_type() {
    let app = helpers::TestApp::new().await;
    let id = app.seed_on_sale(5);

    let response = app
        .request("GET", &availability_path(id, 5), None, "198.51.100.1")
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["available"], true);
    assert_eq!(response.body["quantity"], 5);
    assert_eq!(response.header("x-ratelimit-limit"), Some("100"));
    assert_eq!(response.header("x-ratelimit-remaining"), Some("99"));
}

#[tokio::test]
async fn test_quantity_defaults_to_one() {
    let app = helpers::TestApp::new().await;
    let id = app.seed_on_sale(1);

    let response = app
        .request(
            "GET",
            &format!("/api/v1/tickets/check-availability/{id}"),
            None,
            "198.51.100.1",
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["quantity"], 1);
}

#[tokio::test]
async fn test_insufficient_stock() {
    let app = helpers::TestApp::new().await;
    let id = app.seed_on_sale(2);

    let response = app
        .request("GET", &availability_path(id, 3), None, "198.51.100.1")
        .await;

    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.error_code(), "OUT_OF_STOCK");
    // Advisory only: nothing was taken.
    assert_eq!(app.available(id).await, 2);
}

#[tokio::test]
async fn test_sale_window_is_enforced() {
    let app = helpers::TestApp::new().await;
    let upcoming = app.seed(10, 10, 30, 90);
    let closed = app.seed(10, 10, -90, -30);

    let response = app
        .request("GET", &availability_path(upcoming, 1), None, "198.51.100.1")
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.error_code(), "SALE_NOT_STARTED");

    let response = app
        .request("GET", &availability_path(closed, 1), None, "198.51.100.1")
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.error_code(), "SALE_ENDED");
}

#[tokio::test]
async fn test_unknown_ticket_type() {
    let app = helpers::TestApp::new().await;

    let response = app
        .request(
            "GET",
            &availability_path(TicketTypeId::new(), 1),
            None,
            "198.51.100.1",
        )
        .await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.error_code(), "NOT_FOUND");
}

#[tokio::test]
async fn test_invalid_input_is_rejected() {
    let app = helpers::TestApp::new().await;
    let id = app.seed_on_sale(10);

    let response = app
        .request(
            "GET",
            "/api/v1/tickets/check-availability/not-a-uuid",
            None,
            "198.51.100.1",
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.error_code(), "VALIDATION_ERROR");

    for quantity in ["0", "-2", "many"] {
        let response = app
            .request(
                "GET",
                &format!("/api/v1/tickets/check-availability/{id}?quantity={quantity}"),
                None,
                "198.51.100.1",
            )
            .await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "quantity={quantity}");
    }
}

#[tokio::test]
async fn test_availability_tracks_purchases() {
    let app = helpers::TestApp::new().await;
    let id = app.seed_on_sale(2);

    // Populate the snapshot.
    let response = app
        .request("GET", &availability_path(id, 2), None, "198.51.100.1")
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let response = app
        .request(
            "POST",
            "/api/v1/tickets/purchase",
            Some(purchase_body(id, 1)),
            "198.51.100.2",
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    app.settle().await;

    let response = app
        .request("GET", &availability_path(id, 2), None, "198.51.100.1")
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.error_code(), "OUT_OF_STOCK");
}

#[tokio::test]
async fn test_configured_seed_is_served() {
    let id = TicketTypeId::new();
    let app = helpers::TestApp::with_config(|config| {
        config.admission.inventory.seed.push(SeedTicketType {
            id,
            event_id: None,
            name: "General Admission".to_string(),
            price: 45.0,
            total_quantity: 8,
            available_quantity: None,
            opens_in_minutes: -60,
            closes_in_minutes: 60,
        });
    })
    .await;

    let response = app
        .request("GET", &availability_path(id, 8), None, "198.51.100.1")
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(app.available(id).await, 8);
}

#[tokio::test]
async fn test_fingerprint_check_reflects_claims() {
    let app = helpers::TestApp::new().await;
    let id = app.seed_on_sale(10);
    let check_path = format!("/api/v1/tickets/check-fingerprint/{id}");

    let response = app.request("GET", &check_path, None, "203.0.113.7").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["already_purchased"], false);
    assert!(response.body.get("claim").is_none());

    let response = app
        .request(
            "POST",
            "/api/v1/tickets/purchase",
            Some(purchase_body(id, 1)),
            "203.0.113.7",
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);

    let response = app.request("GET", &check_path, None, "203.0.113.7").await;
    assert_eq!(response.body["already_purchased"], true);
    assert!(response.body["claim"]["claimed_at"].is_string());
    let expires_in = response.body["claim"]["expires_in_seconds"].as_u64().unwrap();
    assert!(expires_in > 0 && expires_in <= 24 * 60 * 60);

    // Same device from another address is a different fingerprint.
    let response = app.request("GET", &check_path, None, "203.0.113.8").await;
    assert_eq!(response.body["already_purchased"], false);
}

#[tokio::test]
async fn test_health_endpoints() {
    let app = helpers::TestApp::new().await;

    let response = app.request("GET", "/api/health", None, "198.51.100.1").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
    assert!(response.header("x-ratelimit-limit").is_none());

    let response = app
        .request("GET", "/api/health/detailed", None, "198.51.100.1")
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["store"], "connected");
    assert_eq!(response.body["database"], "not_configured");
    assert_eq!(response.body["admission"]["admitted"], 0);
    assert!(response.body["last_cache_sync_failure"].is_null());
}
