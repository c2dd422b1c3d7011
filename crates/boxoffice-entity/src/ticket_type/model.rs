//! Ticket type entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use boxoffice_core::types::{EventId, TicketTypeId};

/// Where a point in time falls relative to a ticket type's sale window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleWindow {
    /// Before `sale_start`.
    NotStarted,
    /// Within `[sale_start, sale_end]`.
    Open,
    /// After `sale_end`.
    Ended,
}

/// A purchasable ticket type and its remaining capacity.
///
/// `available_quantity` stays within `[0, total_quantity]`; it is only
/// ever changed through the inventory ledger's reserve/release calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TicketType {
    /// Unique ticket type identifier.
    pub id: TicketTypeId,
    /// Owning event.
    pub event_id: EventId,
    /// Display name.
    pub name: String,
    /// Unit price.
    pub price: f64,
    /// Capacity fixed at creation.
    pub total_quantity: i32,
    /// Units not yet reserved.
    pub available_quantity: i32,
    /// Start of the sale window (inclusive).
    pub sale_start: DateTime<Utc>,
    /// End of the sale window (inclusive).
    pub sale_end: DateTime<Utc>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Soft-retirement timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TicketType {
    /// Classify `now` against the sale window.
    pub fn sale_window(&self, now: DateTime<Utc>) -> SaleWindow {
        if now < self.sale_start {
            SaleWindow::NotStarted
        } else if now > self.sale_end {
            SaleWindow::Ended
        } else {
            SaleWindow::Open
        }
    }

    /// Whether `quantity` units are currently available.
    pub fn has_stock(&self, quantity: u32) -> bool {
        i64::from(self.available_quantity) >= i64::from(quantity)
    }

    /// Whether the ticket type has been soft-retired.
    pub fn is_retired(&self) -> bool {
        self.deleted_at.is_some()
    }
}
