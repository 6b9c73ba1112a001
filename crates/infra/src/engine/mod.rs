//! Inventory engine: the concurrency-safe operations on top of an
//! [`InventoryStore`].
//!
//! Every mutation of an item's stock or holds runs under that item's lock
//! and commits through one [`Changeset`](crate::store::Changeset), so
//! availability is always checked against the state it is committed over.

mod availability;
mod catalog;
mod context;
mod reorder;
mod reservations;
mod runner;
mod sales;
mod stock;
mod sweeper;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use serde_json::Value as JsonValue;

use stockhold_core::{Clock, SystemClock};
use stockhold_events::{EventBus, EventEnvelope, InMemoryEventBus, Subscription};

pub use availability::{AvailabilityCalculator, StockLevel};
pub use catalog::Catalog;
pub use context::{EngineBus, EngineContext, ITEM_AGGREGATE, RESERVATION_AGGREGATE, TRANSFER_AGGREGATE};
pub use reorder::ReorderAdvisor;
pub use reservations::ReservationManager;
pub use runner::{ExpirySweeperHandle, ExpirySweeperRunner, SweeperStats};
pub use sales::{SaleRequest, SalesProcessor};
pub use stock::{StockOperations, TransferRequest};
pub use sweeper::{ExpirySweeper, SweepReport};

use crate::config::EngineConfig;
use crate::store::{InMemoryInventoryStore, InventoryStore};

/// Entry point wiring store, clock, locks and event feed together.
///
/// Cheap to clone; all clones share the same locks and store.
#[derive(Debug, Clone)]
pub struct InventoryEngine {
    ctx: Arc<EngineContext>,
}

impl InventoryEngine {
    pub fn new(store: Arc<dyn InventoryStore>, clock: Arc<dyn Clock>, config: EngineConfig) -> Self {
        let bus = Arc::new(InMemoryEventBus::new());
        Self {
            ctx: Arc::new(EngineContext::new(store, clock, bus, config)),
        }
    }

    /// In-memory store, wall clock, default config.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryInventoryStore::new()),
            Arc::new(SystemClock),
            EngineConfig::default(),
        )
    }

    pub fn config(&self) -> &EngineConfig {
        &self.ctx.config
    }

    pub fn context(&self) -> &Arc<EngineContext> {
        &self.ctx
    }

    pub fn catalog(&self) -> Catalog {
        Catalog::new(self.ctx.clone())
    }

    pub fn availability(&self) -> AvailabilityCalculator {
        AvailabilityCalculator::new(self.ctx.clone())
    }

    pub fn reservations(&self) -> ReservationManager {
        ReservationManager::new(self.ctx.clone())
    }

    pub fn sales(&self) -> SalesProcessor {
        SalesProcessor::new(self.ctx.clone())
    }

    pub fn stock(&self) -> StockOperations {
        StockOperations::new(self.ctx.clone())
    }

    pub fn reorder(&self) -> ReorderAdvisor {
        ReorderAdvisor::new(self.ctx.clone())
    }

    pub fn sweeper(&self) -> ExpirySweeper {
        ExpirySweeper::new(self.ctx.clone())
    }

    /// Start the background expiry sweeper using the engine's config.
    pub fn spawn_sweeper(&self) -> std::io::Result<ExpirySweeperHandle> {
        ExpirySweeperRunner::from_config(&self.ctx.config).spawn(self.sweeper())
    }

    pub fn bus(&self) -> &Arc<EngineBus> {
        &self.ctx.bus
    }

    /// Subscribe to committed engine events.
    pub fn subscribe(&self) -> Subscription<EventEnvelope<JsonValue>> {
        self.ctx.bus.subscribe()
    }
}
