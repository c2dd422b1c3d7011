//! Registry of outstanding reservations.
//!
//! Every successful admission records its reservation under its own key.
//! Confirm and rollback consume that key, and the store's `delete` picks
//! the single caller that gets to settle it, so a reservation returns its
//! stock at most once.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use boxoffice_cache::StoreManager;
use boxoffice_cache::keys;
use boxoffice_core::config::InventoryConfig;
use boxoffice_core::error::AppError;
use boxoffice_core::result::AppResult;
use boxoffice_core::traits::CoordinationStore;
use boxoffice_core::types::{ReservationId, TicketTypeId};

use crate::fingerprint::Fingerprint;
use crate::metrics::AdmissionMetrics;

/// What was reserved, as recorded at admission time.
///
/// Settlement acts on this record, never on the caller's copy of the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationRecord {
    pub ticket_type_id: TicketTypeId,
    pub quantity: u32,
    pub fingerprint: Fingerprint,
    pub reserved_at: DateTime<Utc>,
}

/// Issued reservations awaiting confirm or rollback.
#[derive(Debug, Clone)]
pub struct ReservationRegistry {
    store: StoreManager,
    ttl: Duration,
    metrics: Arc<AdmissionMetrics>,
}

impl ReservationRegistry {
    pub fn new(store: StoreManager, config: &InventoryConfig, metrics: Arc<AdmissionMetrics>) -> Self {
        Self {
            store,
            ttl: config.reservation_ttl(),
            metrics,
        }
    }

    /// Record a freshly issued reservation.
    pub async fn record(&self, id: ReservationId, record: &ReservationRecord) -> AppResult<()> {
        let key = keys::reservation(id);
        let value = serde_json::to_string(record)?;

        let created = self
            .store
            .set_nx(&key, &value, self.ttl)
            .await
            .inspect_err(|err| self.store_failed("record", &key, err))?;
        if !created {
            return Err(AppError::conflict(format!("Reservation {id} is already recorded")));
        }
        debug!(key = %key, "Reservation recorded");
        Ok(())
    }

    /// Remove and return the record.
    ///
    /// `None` when the id was never issued, was already settled, or has
    /// expired. Of several concurrent callers at most one gets the record.
    pub async fn consume(&self, id: ReservationId) -> AppResult<Option<ReservationRecord>> {
        let key = keys::reservation(id);

        let Some(raw) = self
            .store
            .get(&key)
            .await
            .inspect_err(|err| self.store_failed("consume", &key, err))?
        else {
            return Ok(None);
        };

        let removed = self
            .store
            .delete(&key)
            .await
            .inspect_err(|err| self.store_failed("consume", &key, err))?;
        if !removed {
            debug!(key = %key, "Reservation settled by a concurrent caller");
            return Ok(None);
        }

        Ok(Some(serde_json::from_str(&raw)?))
    }

    /// Put a consumed record back after settlement failed part-way, so the
    /// holder can retry. Best effort: a failure is logged and counted.
    pub async fn restore(&self, id: ReservationId, record: &ReservationRecord) {
        if let Err(err) = self.record(id, record).await {
            error!(
                reservation_id = %id,
                ticket_type_id = %record.ticket_type_id,
                error = %err,
                "Failed to restore reservation after unsuccessful settlement"
            );
        }
    }

    fn store_failed(&self, operation: &'static str, key: &str, err: &AppError) {
        self.metrics.record_store_failure();
        error!(operation, key, error = %err, "Reservation registry store call failed");
    }
}
