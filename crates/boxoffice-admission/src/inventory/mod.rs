//! Inventory ledger and its storage backends.
//!
//! Provides atomic reserve/release using either:
//! - PostgreSQL row locks (for multi-node deployments)
//! - In-memory per-ticket-type mutexes (for single-node deployments and tests)

pub mod ledger;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use boxoffice_core::result::AppResult;
use boxoffice_core::types::TicketTypeId;
use boxoffice_entity::ticket_type::{SaleWindow, TicketType};

use crate::outcome::{Rejection, Verdict};

pub use ledger::InventoryLedger;
pub use memory::MemoryInventoryStore;
pub use postgres::PgInventoryStore;

/// Authoritative per-ticket-type stock.
///
/// `reserve` must evaluate and decrement as one atomic unit; two ticket
/// types must never contend on the same lock.
#[async_trait]
pub trait InventoryStore: Send + Sync + std::fmt::Debug + 'static {
    /// Load a live ticket type.
    async fn find(&self, id: TicketTypeId) -> AppResult<Option<TicketType>>;

    /// Take `quantity` units if the sale window is open at `now` and the
    /// full amount is available. Returns the updated row.
    async fn reserve(
        &self,
        id: TicketTypeId,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> AppResult<Verdict<TicketType>>;

    /// Return `quantity` units, never exceeding the total.
    /// Returns `None` if the ticket type does not exist.
    async fn release(&self, id: TicketTypeId, quantity: u32) -> AppResult<Option<TicketType>>;
}

/// Decide whether `quantity` units of `ticket_type` can be sold at `now`.
pub fn evaluate(ticket_type: &TicketType, quantity: u32, now: DateTime<Utc>) -> Verdict<()> {
    if ticket_type.is_retired() {
        return Err(Rejection::NotFound);
    }
    match ticket_type.sale_window(now) {
        SaleWindow::NotStarted => Err(Rejection::SaleNotStarted),
        SaleWindow::Ended => Err(Rejection::SaleEnded),
        SaleWindow::Open if !ticket_type.has_stock(quantity) => Err(Rejection::OutOfStock),
        SaleWindow::Open => Ok(()),
    }
}
