//! Custom Axum extractors.

pub mod client;
pub mod identity;

pub use client::{ClientAddr, ClientSignals};
pub use identity::{AuthenticatedUser, MaybeUser};
