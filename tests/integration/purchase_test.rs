//! Integration tests for purchase admission, confirm and rollback.

mod helpers;

use std::sync::Arc;

use http::StatusCode;
use tokio::task::JoinSet;

use boxoffice_core::types::ReservationId;
use helpers::{ClientRequest, purchase_body};

const PURCHASE: &str = "/api/v1/tickets/purchase";
const CONFIRM: &str = "/api/v1/tickets/reservations/confirm";
const ROLLBACK: &str = "/api/v1/tickets/reservations/rollback";

#[tokio::test]
async fn test_purchase_reserves_stock() {
    let app = helpers::TestApp::new().await;
    let id = app.seed_on_sale(10);

    let response = app
        .request("POST", PURCHASE, Some(purchase_body(id, 3)), "198.51.100.10")
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["state"], "reserved");
    assert_eq!(response.body["reservation"]["quantity"], 3);
    assert_eq!(response.header("x-ratelimit-limit"), Some("10"));
    assert_eq!(response.header("x-ratelimit-remaining"), Some("9"));
    assert_eq!(app.available(id).await, 7);
}

#[tokio::test]
async fn test_duplicate_fingerprint_is_rejected() {
    let app = helpers::TestApp::new().await;
    let id = app.seed_on_sale(10);

    let first = app
        .request("POST", PURCHASE, Some(purchase_body(id, 1)), "198.51.100.10")
        .await;
    assert_eq!(first.status, StatusCode::CREATED);

    let second = app
        .request("POST", PURCHASE, Some(purchase_body(id, 1)), "198.51.100.10")
        .await;
    assert_eq!(second.status, StatusCode::CONFLICT);
    assert_eq!(second.error_code(), "DUPLICATE_CLAIM");
    assert_eq!(app.available(id).await, 9);
}

#[tokio::test]
async fn test_explicit_client_fingerprint_spans_requests() {
    let app = helpers::TestApp::new().await;
    let id = app.seed_on_sale(10);

    let attempt = |agent: &str| {
        ClientRequest::new("POST", PURCHASE, "198.51.100.10")
            .json(Some(purchase_body(id, 1)))
            .header("X-TLS-Fingerprint", "771,4865-4866-4867,0-23-65281")
            .header("User-Agent", agent)
    };

    let first = app.send(attempt("Mozilla/5.0")).await;
    assert_eq!(first.status, StatusCode::CREATED);

    // A changed user agent does not evade a client-supplied fingerprint.
    let second = app.send(attempt("curl/8.4.0")).await;
    assert_eq!(second.error_code(), "DUPLICATE_CLAIM");
}

#[tokio::test]
async fn test_failed_reserve_releases_claim() {
    let app = helpers::TestApp::new().await;
    let id = app.seed_on_sale(1);

    let response = app
        .request("POST", PURCHASE, Some(purchase_body(id, 2)), "198.51.100.10")
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.error_code(), "OUT_OF_STOCK");

    // The claim was released, so a smaller retry goes through.
    let response = app
        .request("POST", PURCHASE, Some(purchase_body(id, 1)), "198.51.100.10")
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(app.available(id).await, 0);
}

#[tokio::test]
async fn test_purchase_outside_sale_window() {
    let app = helpers::TestApp::new().await;
    let id = app.seed(10, 10, 15, 60);

    let response = app
        .request("POST", PURCHASE, Some(purchase_body(id, 1)), "198.51.100.10")
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.error_code(), "SALE_NOT_STARTED");
    assert_eq!(app.available(id).await, 10);
}

#[tokio::test]
async fn test_quantity_bounds() {
    let app = helpers::TestApp::new().await;
    let id = app.seed_on_sale(50);

    for quantity in [0, 11] {
        let response = app
            .request(
                "POST",
                PURCHASE,
                Some(purchase_body(id, quantity)),
                "198.51.100.10",
            )
            .await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "quantity={quantity}");
    }
    assert_eq!(app.available(id).await, 50);
}

#[tokio::test]
async fn test_quantity_limit_follows_configuration() {
    let app = helpers::TestApp::with_config(|config| {
        config.admission.inventory.max_quantity_per_attempt = 20;
    })
    .await;
    let id = app.seed_on_sale(50);

    let within = app
        .request("POST", PURCHASE, Some(purchase_body(id, 15)), "198.51.100.10")
        .await;
    assert_eq!(within.status, StatusCode::CREATED);

    let beyond = app
        .request("POST", PURCHASE, Some(purchase_body(id, 21)), "198.51.100.11")
        .await;
    assert_eq!(beyond.status, StatusCode::BAD_REQUEST);
    assert_eq!(beyond.error_code(), "VALIDATION_ERROR");
    assert_eq!(app.available(id).await, 35);
}

#[tokio::test]
async fn test_rollback_returns_stock_and_clears_claim() {
    let app = helpers::TestApp::new().await;
    let id = app.seed_on_sale(4);

    let purchase = app
        .request("POST", PURCHASE, Some(purchase_body(id, 4)), "198.51.100.10")
        .await;
    assert_eq!(purchase.status, StatusCode::CREATED);
    assert_eq!(app.available(id).await, 0);

    let rollback = app
        .request(
            "POST",
            ROLLBACK,
            Some(purchase.body["reservation"].clone()),
            "10.0.0.5",
        )
        .await;
    assert_eq!(rollback.status, StatusCode::OK);
    assert_eq!(rollback.body["state"], "rolled_back");
    assert_eq!(app.available(id).await, 4);

    let retry = app
        .request("POST", PURCHASE, Some(purchase_body(id, 4)), "198.51.100.10")
        .await;
    assert_eq!(retry.status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_confirm_commits_reservation() {
    let app = helpers::TestApp::new().await;
    let id = app.seed_on_sale(4);

    let purchase = app
        .request("POST", PURCHASE, Some(purchase_body(id, 2)), "198.51.100.10")
        .await;
    let confirm = app
        .request(
            "POST",
            CONFIRM,
            Some(purchase.body["reservation"].clone()),
            "10.0.0.5",
        )
        .await;

    assert_eq!(confirm.status, StatusCode::OK);
    assert_eq!(confirm.body["state"], "committed");
    assert_eq!(app.available(id).await, 2);

    let health = app
        .request("GET", "/api/health/detailed", None, "10.0.0.5")
        .await;
    assert_eq!(health.body["admission"]["admitted"], 1);
    assert_eq!(health.body["admission"]["confirmed"], 1);
}

#[tokio::test]
async fn test_replayed_rollback_is_rejected() {
    let app = helpers::TestApp::new().await;
    let id = app.seed_on_sale(2);

    let first = app
        .request("POST", PURCHASE, Some(purchase_body(id, 2)), "198.51.100.10")
        .await;
    let token = first.body["reservation"].clone();
    let rollback = app
        .request("POST", ROLLBACK, Some(token.clone()), "10.0.0.5")
        .await;
    assert_eq!(rollback.status, StatusCode::OK);

    let second = app
        .request("POST", PURCHASE, Some(purchase_body(id, 2)), "198.51.100.11")
        .await;
    assert_eq!(second.status, StatusCode::CREATED);

    let replay = app
        .request("POST", ROLLBACK, Some(token), "10.0.0.5")
        .await;
    assert_eq!(replay.status, StatusCode::CONFLICT);
    assert_eq!(replay.error_code(), "UNKNOWN_RESERVATION");
    assert_eq!(app.available(id).await, 0);

    let third = app
        .request("POST", PURCHASE, Some(purchase_body(id, 2)), "198.51.100.12")
        .await;
    assert_eq!(third.status, StatusCode::CONFLICT);
    assert_eq!(third.error_code(), "OUT_OF_STOCK");
}

#[tokio::test]
async fn test_rollback_after_confirm_is_rejected() {
    let app = helpers::TestApp::new().await;
    let id = app.seed_on_sale(3);

    let purchase = app
        .request("POST", PURCHASE, Some(purchase_body(id, 3)), "198.51.100.10")
        .await;
    let token = purchase.body["reservation"].clone();
    let confirm = app
        .request("POST", CONFIRM, Some(token.clone()), "10.0.0.5")
        .await;
    assert_eq!(confirm.status, StatusCode::OK);

    let rollback = app
        .request("POST", ROLLBACK, Some(token.clone()), "10.0.0.5")
        .await;
    assert_eq!(rollback.status, StatusCode::CONFLICT);
    assert_eq!(rollback.error_code(), "UNKNOWN_RESERVATION");
    assert_eq!(app.available(id).await, 0);

    let again = app
        .request("POST", CONFIRM, Some(token), "10.0.0.5")
        .await;
    assert_eq!(again.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_forged_reservation_is_rejected() {
    let app = helpers::TestApp::new().await;
    let id = app.seed_on_sale(5);

    let purchase = app
        .request("POST", PURCHASE, Some(purchase_body(id, 1)), "198.51.100.10")
        .await;
    let mut forged = purchase.body["reservation"].clone();
    forged["reservation_id"] = serde_json::json!(ReservationId::new());

    let rollback = app
        .request("POST", ROLLBACK, Some(forged), "203.0.113.99")
        .await;
    assert_eq!(rollback.status, StatusCode::CONFLICT);
    assert_eq!(app.available(id).await, 4);

    let duplicate = app
        .request("POST", PURCHASE, Some(purchase_body(id, 1)), "198.51.100.10")
        .await;
    assert_eq!(duplicate.error_code(), "DUPLICATE_CLAIM");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_purchases_never_oversell() {
    let app = Arc::new(helpers::TestApp::new().await);
    let id = app.seed_on_sale(10);

    let mut attempts = JoinSet::new();
    for n in 0..40 {
        let app = Arc::clone(&app);
        attempts.spawn(async move {
            app.request(
                "POST",
                PURCHASE,
                Some(purchase_body(id, 1)),
                &format!("192.0.2.{n}"),
            )
            .await
            .status
        });
    }

    let mut created = 0;
    let mut sold_out = 0;
    while let Some(status) = attempts.join_next().await {
        match status.expect("attempt panicked") {
            StatusCode::CREATED => created += 1,
            StatusCode::CONFLICT => sold_out += 1,
            other => panic!("unexpected status {other}"),
        }
    }

    assert_eq!(created, 10);
    assert_eq!(sold_out, 30);
    assert_eq!(app.available(id).await, 0);
}
