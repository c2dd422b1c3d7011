//! PostgreSQL inventory store.
//!
//! Reserve locks the ticket type row with `SELECT ... FOR UPDATE`, evaluates
//! the sale window and stock on the locked row, and decrements inside the
//! same transaction. Release is a single clamped `UPDATE`.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use tracing::{debug, error};

use boxoffice_core::error::{AppError, ErrorKind};
use boxoffice_core::result::AppResult;
use boxoffice_core::types::TicketTypeId;
use boxoffice_database::repositories::TicketTypeRepository;
use boxoffice_entity::ticket_type::TicketType;

use super::{InventoryStore, evaluate};
use crate::outcome::{Rejection, Verdict};

/// Inventory store backed by the `ticket_types` table.
#[derive(Debug, Clone)]
pub struct PgInventoryStore {
    repo: TicketTypeRepository,
    operation_timeout: Duration,
}

impl PgInventoryStore {
    pub fn new(repo: TicketTypeRepository, operation_timeout: Duration) -> Self {
        Self {
            repo,
            operation_timeout,
        }
    }

    /// Reserve on a connection the caller already owns.
    ///
    /// Use this to make the reservation part of a larger transaction (for
    /// example one that also inserts the order). The row lock is held until
    /// the caller commits or rolls back; the caller decides which.
    pub async fn reserve_within(
        conn: &mut PgConnection,
        id: TicketTypeId,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> AppResult<Verdict<TicketType>> {
        let Some(locked) = TicketTypeRepository::lock_for_update(conn, id).await? else {
            return Ok(Err(Rejection::NotFound));
        };

        if let Err(rejection) = evaluate(&locked, quantity, now) {
            return Ok(Err(rejection));
        }

        let quantity = i32::try_from(quantity)
            .map_err(|_| AppError::validation("Quantity exceeds the supported range"))?;
        let updated = TicketTypeRepository::decrement_locked(conn, id, quantity).await?;
        Ok(Ok(updated))
    }

    /// Release on a connection the caller already owns.
    pub async fn release_within(
        conn: &mut PgConnection,
        id: TicketTypeId,
        quantity: u32,
    ) -> AppResult<Option<TicketType>> {
        let quantity = i32::try_from(quantity)
            .map_err(|_| AppError::validation("Quantity exceeds the supported range"))?;
        TicketTypeRepository::increment_clamped(conn, id, quantity).await
    }

    /// Run one inventory round trip, failing closed on timeout or database
    /// errors.
    async fn fail_closed<T>(
        &self,
        operation: &'static str,
        id: TicketTypeId,
        call: impl Future<Output = AppResult<T>>,
    ) -> AppResult<T> {
        match tokio::time::timeout(self.operation_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) if err.kind == ErrorKind::Database => {
                error!(operation, ticket_type_id = %id, error = %err, "Inventory store failed");
                Err(AppError::with_source(
                    ErrorKind::StoreUnavailable,
                    format!("Inventory {operation} for ticket type {id} failed"),
                    err,
                ))
            }
            Ok(Err(err)) => Err(err),
            Err(_) => {
                let timeout_ms = self.operation_timeout.as_millis() as u64;
                error!(operation, ticket_type_id = %id, timeout_ms, "Inventory store timed out");
                Err(AppError::store_unavailable(format!(
                    "Inventory {operation} for ticket type {id} exceeded {timeout_ms}ms"
                )))
            }
        }
    }
}

#[async_trait]
impl InventoryStore for PgInventoryStore {
    async fn find(&self, id: TicketTypeId) -> AppResult<Option<TicketType>> {
        self.fail_closed("find", id, self.repo.find_by_id(id)).await
    }

    async fn reserve(
        &self,
        id: TicketTypeId,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> AppResult<Verdict<TicketType>> {
        // A timeout drops the transaction, which rolls it back.
        self.fail_closed("reserve", id, async {
            let mut tx = self.repo.begin().await?;
            let verdict = Self::reserve_within(&mut tx, id, quantity, now).await?;

            match &verdict {
                Ok(updated) => {
                    tx.commit().await.map_err(|e| {
                        AppError::with_source(ErrorKind::Database, "Failed to commit reservation", e)
                    })?;
                    debug!(
                        ticket_type_id = %id,
                        quantity,
                        available = updated.available_quantity,
                        "Stock reserved"
                    );
                }
                Err(_) => {
                    tx.rollback().await.map_err(|e| {
                        AppError::with_source(ErrorKind::Database, "Failed to roll back", e)
                    })?;
                }
            }
            Ok(verdict)
        })
        .await
    }

    async fn release(&self, id: TicketTypeId, quantity: u32) -> AppResult<Option<TicketType>> {
        self.fail_closed("release", id, async {
            let mut conn = self.repo.acquire().await?;
            Self::release_within(&mut conn, id, quantity).await
        })
        .await
    }
}
