//! Ticket type repository.
//!
//! The row is the unit of locking for inventory changes: every quantity
//! mutation runs on a connection that already holds `FOR UPDATE` on the
//! row, or is a single guarded `UPDATE` statement.

use sqlx::{PgConnection, PgPool, Postgres, Transaction};

use boxoffice_core::error::{AppError, ErrorKind};
use boxoffice_core::result::AppResult;
use boxoffice_core::types::TicketTypeId;
use boxoffice_entity::ticket_type::TicketType;

const COLUMNS: &str = "id, event_id, name, price, total_quantity, available_quantity, \
                       sale_start, sale_end, created_at, updated_at, deleted_at";

/// Repository for ticket type rows.
#[derive(Debug, Clone)]
pub struct TicketTypeRepository {
    pool: PgPool,
}

impl TicketTypeRepository {
    /// Create a new ticket type repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Start a transaction on the underlying pool.
    pub async fn begin(&self) -> AppResult<Transaction<'static, Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to start transaction", e))
    }

    /// Find a live (not soft-retired) ticket type by ID.
    pub async fn find_by_id(&self, id: TicketTypeId) -> AppResult<Option<TicketType>> {
        sqlx::query_as::<_, TicketType>(&format!(
            "SELECT {COLUMNS} FROM ticket_types WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find ticket type", e))
    }

    /// Lock a live ticket type row for the rest of the surrounding transaction.
    pub async fn lock_for_update(
        conn: &mut PgConnection,
        id: TicketTypeId,
    ) -> AppResult<Option<TicketType>> {
        sqlx::query_as::<_, TicketType>(&format!(
            "SELECT {COLUMNS} FROM ticket_types WHERE id = $1 AND deleted_at IS NULL FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to lock ticket type", e))
    }

    /// Subtract `quantity` from a row previously locked on `conn`.
    ///
    /// The `available_quantity >= $2` guard keeps the statement safe even if
    /// a caller forgot to lock; zero affected rows is reported as a conflict.
    pub async fn decrement_locked(
        conn: &mut PgConnection,
        id: TicketTypeId,
        quantity: i32,
    ) -> AppResult<TicketType> {
        sqlx::query_as::<_, TicketType>(&format!(
            "UPDATE ticket_types \
             SET available_quantity = available_quantity - $2, updated_at = NOW() \
             WHERE id = $1 AND available_quantity >= $2 \
             RETURNING {COLUMNS}"
        ))
        .bind(id)
        .bind(quantity)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to decrement stock", e))?
        .ok_or_else(|| AppError::conflict(format!("Stock for ticket type {id} changed under lock")))
    }

    /// Add `quantity` back, clamped at `total_quantity`.
    ///
    /// Returns `None` when the ticket type does not exist.
    pub async fn increment_clamped(
        conn: &mut PgConnection,
        id: TicketTypeId,
        quantity: i32,
    ) -> AppResult<Option<TicketType>> {
        sqlx::query_as::<_, TicketType>(&format!(
            "UPDATE ticket_types \
             SET available_quantity = LEAST(available_quantity + $2, total_quantity), \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        ))
        .bind(id)
        .bind(quantity)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to release stock", e))
    }

    /// Acquire a pooled connection for single-statement operations.
    pub async fn acquire(&self) -> AppResult<sqlx::pool::PoolConnection<Postgres>> {
        self.pool
            .acquire()
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to acquire connection", e))
    }
}
