//! # boxoffice-entity
//!
//! Domain entity models for BoxOffice. Database entities derive
//! `sqlx::FromRow` in addition to `Serialize`/`Deserialize`.

pub mod ticket_type;

pub use ticket_type::{SaleWindow, TicketType};
