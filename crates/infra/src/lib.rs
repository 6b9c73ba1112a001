//! Infrastructure layer: storage adapters, per-item locking, configuration
//! and the inventory engine that ties them together.

pub mod config;
pub mod engine;
pub mod error;
pub mod locks;
pub mod store;

pub use config::EngineConfig;
pub use engine::{
    AvailabilityCalculator, Catalog, ExpirySweeper, ExpirySweeperHandle, ExpirySweeperRunner,
    InventoryEngine, ReorderAdvisor, ReservationManager, SaleRequest, SalesProcessor,
    StockLevel, StockOperations, SweepReport, SweeperStats, TransferRequest,
};
pub use error::{EngineError, EngineResult};
pub use store::{Changeset, InMemoryInventoryStore, InventoryStore, PostgresInventoryStore, StoreError};
