//! Core traits defined in `boxoffice-core` and implemented by other crates.

pub mod store;

pub use store::{CoordinationStore, WindowCount};
