//! Ticket type (inventory record) entities.

pub mod model;

pub use model::{SaleWindow, TicketType};
