//! Shared test helpers for integration tests.
//!
//! Every `TestApp` runs the full router against the in-memory coordination
//! store and in-memory inventory, so no external services are needed.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use chrono::{Duration, Utc};
use http::{HeaderMap, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tokio::sync::watch;
use tower::ServiceExt;

use boxoffice_admission::{
    AdmissionCoordinator, AdmissionMetrics, FingerprintGuard, InventoryLedger, InventoryStore,
    MemoryInventoryStore, RateLimiter, ReservationRegistry,
};
use boxoffice_api::AppState;
use boxoffice_api::extractors::AuthenticatedUser;
use boxoffice_cache::{CacheSync, FailureLog, StoreManager};
use boxoffice_core::config::AppConfig;
use boxoffice_core::types::{EventId, TicketTypeId};
use boxoffice_entity::TicketType;

/// Test application context
pub struct TestApp {
    /// The Axum router for making test requests
    pub router: Router,
    /// Inventory behind the router, for seeding and inspection
    pub inventory: MemoryInventoryStore,
    /// Cache-sync worker, flushed before reading snapshots
    pub cache_sync: CacheSync,
    /// Application config
    pub config: AppConfig,
    _shutdown: watch::Sender<bool>,
}

impl TestApp {
    /// Create a test application with default configuration.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test application after adjusting the default configuration.
    pub async fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let mut config = AppConfig::default();
        config.store.provider = "memory".to_string();
        config.admission.inventory.backend = "memory".to_string();
        adjust(&mut config);

        let store = StoreManager::new(&config.store)
            .await
            .expect("Failed to init store");
        let (shutdown, cancel) = watch::channel(false);
        let (cache_sync, _handle) = CacheSync::spawn(store.clone(), &config.cache_sync, cancel);
        let (sync_failures, _listener) = FailureLog::spawn(&cache_sync);

        let inventory = MemoryInventoryStore::seeded(&config.admission.inventory.seed)
            .expect("Invalid inventory seed");
        let metrics = Arc::new(AdmissionMetrics::new());
        let limiter = RateLimiter::new(
            store.clone(),
            &config.admission.rate_limit,
            Arc::clone(&metrics),
        );
        let guard = FingerprintGuard::new(
            store.clone(),
            &config.admission.fingerprint,
            Arc::clone(&metrics),
        );
        let ledger = InventoryLedger::new(
            Arc::new(inventory.clone()),
            store.clone(),
            cache_sync.clone(),
            config.admission.inventory.clone(),
            Arc::clone(&metrics),
        );
        let reservations = ReservationRegistry::new(
            store.clone(),
            &config.admission.inventory,
            Arc::clone(&metrics),
        );
        let coordinator = AdmissionCoordinator::new(limiter, guard, ledger, reservations, metrics);

        let state = AppState::new(
            config.clone(),
            store,
            None,
            cache_sync.clone(),
            sync_failures,
            coordinator,
        );

        Self {
            router: boxoffice_api::build_router(state),
            inventory,
            cache_sync,
            config,
            _shutdown: shutdown,
        }
    }

    /// Seed a ticket type on sale now.
    pub fn seed_on_sale(&self, available: i32) -> TicketTypeId {
        self.seed(available, available, -60, 60)
    }

    /// Seed a ticket type whose sale window is offset from now, in minutes.
    pub fn seed(&self, total: i32, available: i32, start_min: i64, end_min: i64) -> TicketTypeId {
        let now = Utc::now();
        let ticket_type = TicketType {
            id: TicketTypeId::new(),
            event_id: EventId::new(),
            name: "Floor Standing".to_string(),
            price: 89.5,
            total_quantity: total,
            available_quantity: available,
            sale_start: now + Duration::minutes(start_min),
            sale_end: now + Duration::minutes(end_min),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        let id = ticket_type.id;
        self.inventory.insert(ticket_type);
        id
    }

    /// Units currently available for a seeded ticket type.
    pub async fn available(&self, id: TicketTypeId) -> i32 {
        self.inventory
            .find(id)
            .await
            .expect("Inventory lookup failed")
            .expect("Ticket type not seeded")
            .available_quantity
    }

    /// Wait for queued snapshot invalidations to land.
    pub async fn settle(&self) {
        self.cache_sync.flush().await.expect("Cache sync flush failed");
    }

    /// Send a request from `client`, an `X-Forwarded-For` address.
    pub async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        client: &str,
    ) -> TestResponse {
        self.send(ClientRequest::new(method, path, client).json(body))
            .await
    }

    /// Send a fully described request.
    pub async fn send(&self, client_request: ClientRequest) -> TestResponse {
        let body_str = client_request
            .body
            .map(|b| serde_json::to_string(&b).expect("Failed to serialize body"))
            .unwrap_or_default();

        let mut req = Request::builder()
            .method(client_request.method.as_str())
            .uri(client_request.path.as_str())
            .header("Content-Type", "application/json")
            .header("X-Forwarded-For", client_request.client.as_str());

        let custom_agent = client_request
            .headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case("user-agent"));
        if !custom_agent {
            req = req.header("User-Agent", "boxoffice-tests/1.0");
        }

        for (name, value) in &client_request.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        if let Some(user) = client_request.user {
            req = req.extension(user);
        }

        let req = req
            .body(Body::from(body_str))
            .expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes();

        let body: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

        TestResponse {
            status,
            headers,
            body,
        }
    }
}

/// A request under construction.
pub struct ClientRequest {
    method: String,
    path: String,
    client: String,
    body: Option<Value>,
    headers: Vec<(String, String)>,
    user: Option<AuthenticatedUser>,
}

impl ClientRequest {
    pub fn new(method: &str, path: &str, client: &str) -> Self {
        Self {
            method: method.to_string(),
            path: path.to_string(),
            client: client.to_string(),
            body: None,
            headers: Vec::new(),
            user: None,
        }
    }

    pub fn json(mut self, body: Option<Value>) -> Self {
        self.body = body;
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn user(mut self, user: AuthenticatedUser) -> Self {
        self.user = Some(user);
        self
    }
}

/// Test response wrapper
pub struct TestResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Parsed JSON body
    pub body: Value,
}

impl TestResponse {
    /// A header value as a string, if present.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The `error` code of a JSON error body.
    pub fn error_code(&self) -> &str {
        self.body["error"].as_str().unwrap_or_default()
    }
}

/// Path of the availability check.
pub fn availability_path(id: TicketTypeId, quantity: u32) -> String {
    format!("/api/v1/tickets/check-availability/{id}?quantity={quantity}")
}

/// Purchase body.
pub fn purchase_body(id: TicketTypeId, quantity: u32) -> Value {
    serde_json::json!({ "ticket_type_id": id, "quantity": quantity })
}
