//! # boxoffice-api
//!
//! HTTP API layer for BoxOffice built on Axum.
//!
//! Exposes the admission pipeline over REST: availability and fingerprint
//! checks, purchase attempts, reservation confirm/rollback, rate-limit
//! administration, and health endpoints.

pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use error::ApiError;
pub use router::build_router;
pub use state::AppState;
