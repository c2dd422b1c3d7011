//! # boxoffice-database
//!
//! PostgreSQL connection management, migrations, and the ticket-type
//! repository used by the inventory ledger.

pub mod connection;
pub mod migration;
pub mod repositories;

pub use connection::DatabasePool;
