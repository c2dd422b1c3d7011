//! In-memory coordination store provider.

pub mod store;

pub use store::MemoryStore;
