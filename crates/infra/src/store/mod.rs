//! Persistence boundary for the engine.
//!
//! One trait, two adapters: an in-memory store for tests and single-process
//! hosts, and a Postgres store for durable deployments.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryInventoryStore;
pub use postgres::PostgresInventoryStore;
pub use r#trait::{Changeset, InventoryStore, StoreError, VersionedWrite};
