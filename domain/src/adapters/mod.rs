//! Adapters that live inside the domain crate for convenience.
//!
//! The in-memory store backs unit tests and local demos. Real backends
//! (SQLite) live in separate crates.

pub mod memory_store;
