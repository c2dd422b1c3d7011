//! # boxoffice-cache
//!
//! Coordination store implementations for BoxOffice. Two providers:
//!
//! - **memory**: in-process store using [moka](https://crates.io/crates/moka)
//!   for values and [dashmap](https://crates.io/crates/dashmap) for window counters
//! - **redis**: shared store using the [redis](https://crates.io/crates/redis) crate
//!
//! The provider is selected at runtime from configuration and wrapped in a
//! [`StoreManager`] that bounds every round trip with a timeout.

pub mod keys;
#[cfg(feature = "memory")]
pub mod memory;
pub mod provider;
#[cfg(feature = "redis-backend")]
pub mod redis;
pub mod sync;

pub use provider::StoreManager;
pub use sync::{CacheSync, FailureLog, SyncFailure};
