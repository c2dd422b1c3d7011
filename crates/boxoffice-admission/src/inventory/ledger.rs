//! Inventory ledger: the only component that changes ticket stock.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, warn};

use boxoffice_cache::keys;
use boxoffice_cache::{CacheSync, StoreManager};
use boxoffice_core::config::InventoryConfig;
use boxoffice_core::error::AppError;
use boxoffice_core::result::AppResult;
use boxoffice_core::traits::CoordinationStore;
use boxoffice_core::types::TicketTypeId;
use boxoffice_entity::ticket_type::TicketType;

use super::{InventoryStore, evaluate};
use crate::metrics::AdmissionMetrics;
use crate::outcome::{Rejection, Verdict};

/// Availability checks against cached snapshots, plus atomic reserve and
/// release against the authoritative store.
#[derive(Debug, Clone)]
pub struct InventoryLedger {
    inventory: Arc<dyn InventoryStore>,
    snapshots: StoreManager,
    sync: CacheSync,
    config: InventoryConfig,
    metrics: Arc<AdmissionMetrics>,
}

impl InventoryLedger {
    pub fn new(
        inventory: Arc<dyn InventoryStore>,
        snapshots: StoreManager,
        sync: CacheSync,
        config: InventoryConfig,
        metrics: Arc<AdmissionMetrics>,
    ) -> Self {
        Self {
            inventory,
            snapshots,
            sync,
            config,
            metrics,
        }
    }

    /// Reject quantities outside `1..=max_quantity_per_attempt`.
    pub fn validate_quantity(&self, quantity: u32) -> AppResult<()> {
        let max = self.config.max_quantity_per_attempt;
        if quantity == 0 || quantity > max {
            return Err(AppError::validation(format!(
                "Quantity must be between 1 and {max}"
            )));
        }
        Ok(())
    }

    /// Advisory check: does not reserve anything.
    ///
    /// Reads the cached snapshot when present; otherwise loads the row and
    /// caches it. A later `reserve` may still be rejected.
    pub async fn check_availability(
        &self,
        id: TicketTypeId,
        quantity: u32,
    ) -> AppResult<Verdict<TicketType>> {
        self.validate_quantity(quantity)?;

        let Some(ticket_type) = self.snapshot(id).await? else {
            return Ok(Err(Rejection::NotFound));
        };

        Ok(evaluate(&ticket_type, quantity, Utc::now()).map(|()| ticket_type))
    }

    /// Atomically take `quantity` units.
    pub async fn reserve(&self, id: TicketTypeId, quantity: u32) -> AppResult<Verdict<TicketType>> {
        self.validate_quantity(quantity)?;

        let verdict = self
            .inventory
            .reserve(id, quantity, Utc::now())
            .await
            .inspect_err(|err| self.store_failed("reserve", id, err))?;

        if verdict.is_ok() {
            self.sync.invalidate(keys::ticket_type_snapshot(id));
        }
        Ok(verdict)
    }

    /// Return `quantity` units, clamped at the total.
    pub async fn release(&self, id: TicketTypeId, quantity: u32) -> AppResult<Verdict<TicketType>> {
        if quantity == 0 {
            return Err(AppError::validation("Quantity must be positive"));
        }

        let released = self
            .inventory
            .release(id, quantity)
            .await
            .inspect_err(|err| self.store_failed("release", id, err))?;

        match released {
            Some(ticket_type) => {
                self.sync.invalidate(keys::ticket_type_snapshot(id));
                Ok(Ok(ticket_type))
            }
            None => Ok(Err(Rejection::NotFound)),
        }
    }

    /// Read-through snapshot lookup.
    ///
    /// After caching a freshly loaded row the row is read once more. A
    /// reserve that committed in between has already run its invalidation,
    /// so the snapshot just written is dropped and the newer row returned.
    async fn snapshot(&self, id: TicketTypeId) -> AppResult<Option<TicketType>> {
        let key = keys::ticket_type_snapshot(id);

        match self.snapshots.get_json::<TicketType>(&key).await {
            Ok(Some(cached)) => {
                debug!(ticket_type_id = %id, "Snapshot cache hit");
                return Ok(Some(cached));
            }
            Ok(None) => {}
            Err(err) => {
                warn!(ticket_type_id = %id, error = %err, "Snapshot read failed, using inventory store");
                self.metrics.record_snapshot_failure();
            }
        }

        let Some(loaded) = self.find(id).await? else {
            return Ok(None);
        };

        if let Err(err) = self
            .snapshots
            .set_json(&key, &loaded, self.config.snapshot_ttl())
            .await
        {
            warn!(ticket_type_id = %id, error = %err, "Snapshot population failed");
            self.metrics.record_snapshot_failure();
            return Ok(Some(loaded));
        }

        let current = self.find(id).await?;
        if current.as_ref().is_some_and(|row| same_version(row, &loaded)) {
            return Ok(Some(loaded));
        }

        debug!(ticket_type_id = %id, "Ticket type changed while caching, dropping snapshot");
        self.sync.invalidate(key);
        Ok(current)
    }

    async fn find(&self, id: TicketTypeId) -> AppResult<Option<TicketType>> {
        self.inventory
            .find(id)
            .await
            .inspect_err(|err| self.store_failed("find", id, err))
    }

    fn store_failed(&self, operation: &'static str, id: TicketTypeId, err: &AppError) {
        self.metrics.record_store_failure();
        error!(operation, ticket_type_id = %id, error = %err, "Inventory ledger call failed");
    }
}

fn same_version(a: &TicketType, b: &TicketType) -> bool {
    a.updated_at == b.updated_at && a.available_quantity == b.available_quantity
}
