//! In-memory inventory store using one Tokio mutex per ticket type.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info};

use boxoffice_core::config::SeedTicketType;
use boxoffice_core::error::AppError;
use boxoffice_core::result::AppResult;
use boxoffice_core::types::TicketTypeId;
use boxoffice_entity::ticket_type::TicketType;

use super::{InventoryStore, evaluate};
use crate::outcome::{Rejection, Verdict};

/// In-memory inventory store.
///
/// Suitable for single-node deployments only. Each ticket type sits behind
/// its own mutex, so contention on one ticket type never blocks another.
#[derive(Debug, Clone, Default)]
pub struct MemoryInventoryStore {
    rows: Arc<DashMap<TicketTypeId, Arc<Mutex<TicketType>>>>,
}

impl MemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding the ticket types declared in configuration, with
    /// sale windows placed relative to now.
    pub fn seeded(seeds: &[SeedTicketType]) -> AppResult<Self> {
        let store = Self::new();
        let now = Utc::now();
        for seed in seeds {
            store.insert(seed_row(seed, now)?);
        }
        Ok(store)
    }

    /// Add or replace a ticket type.
    pub fn insert(&self, ticket_type: TicketType) {
        info!(
            ticket_type_id = %ticket_type.id,
            total = ticket_type.total_quantity,
            available = ticket_type.available_quantity,
            "Ticket type loaded into memory inventory"
        );
        self.rows
            .insert(ticket_type.id, Arc::new(Mutex::new(ticket_type)));
    }

    /// Mark a ticket type as retired.
    pub async fn retire(&self, id: TicketTypeId) -> bool {
        match self.row(id) {
            Some(row) => {
                row.lock().await.deleted_at = Some(Utc::now());
                true
            }
            None => false,
        }
    }

    /// Clone the per-row handle so the map shard is not held across `.await`.
    fn row(&self, id: TicketTypeId) -> Option<Arc<Mutex<TicketType>>> {
        self.rows.get(&id).map(|entry| Arc::clone(entry.value()))
    }
}

fn seed_row(seed: &SeedTicketType, now: DateTime<Utc>) -> AppResult<TicketType> {
    let available = seed.available_quantity.unwrap_or(seed.total_quantity);
    if seed.total_quantity < 1 || available < 0 || available > seed.total_quantity {
        return Err(AppError::configuration(format!(
            "Seed '{}' needs 1 <= total_quantity and 0 <= available_quantity <= total_quantity",
            seed.name
        )));
    }
    if seed.opens_in_minutes > seed.closes_in_minutes {
        return Err(AppError::configuration(format!(
            "Seed '{}' closes before it opens",
            seed.name
        )));
    }

    Ok(TicketType {
        id: seed.id,
        event_id: seed.event_id.unwrap_or_default(),
        name: seed.name.clone(),
        price: seed.price,
        total_quantity: seed.total_quantity,
        available_quantity: available,
        sale_start: now + Duration::minutes(seed.opens_in_minutes),
        sale_end: now + Duration::minutes(seed.closes_in_minutes),
        created_at: now,
        updated_at: now,
        deleted_at: None,
    })
}

#[async_trait]
impl InventoryStore for MemoryInventoryStore {
    async fn find(&self, id: TicketTypeId) -> AppResult<Option<TicketType>> {
        let Some(row) = self.row(id) else {
            return Ok(None);
        };
        let ticket_type = row.lock().await;
        Ok((!ticket_type.is_retired()).then(|| ticket_type.clone()))
    }

    async fn reserve(
        &self,
        id: TicketTypeId,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> AppResult<Verdict<TicketType>> {
        let Some(row) = self.row(id) else {
            return Ok(Err(Rejection::NotFound));
        };

        let mut ticket_type = row.lock().await;
        if let Err(rejection) = evaluate(&ticket_type, quantity, now) {
            return Ok(Err(rejection));
        }

        // `evaluate` guarantees quantity <= available_quantity <= i32::MAX.
        ticket_type.available_quantity -= quantity as i32;
        ticket_type.updated_at = now;
        debug!(
            ticket_type_id = %id,
            quantity,
            available = ticket_type.available_quantity,
            "Stock reserved"
        );
        Ok(Ok(ticket_type.clone()))
    }

    async fn release(&self, id: TicketTypeId, quantity: u32) -> AppResult<Option<TicketType>> {
        let Some(row) = self.row(id) else {
            return Ok(None);
        };

        let mut ticket_type = row.lock().await;
        let restored = i64::from(ticket_type.available_quantity) + i64::from(quantity);
        ticket_type.available_quantity =
            restored.min(i64::from(ticket_type.total_quantity)) as i32;
        ticket_type.updated_at = Utc::now();
        debug!(
            ticket_type_id = %id,
            quantity,
            available = ticket_type.available_quantity,
            "Stock released"
        );
        Ok(Some(ticket_type.clone()))
    }
}
