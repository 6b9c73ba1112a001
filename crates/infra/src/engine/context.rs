use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::warn;
use uuid::Uuid;

use stockhold_core::{Clock, ItemId, ReservationId};
use stockhold_events::{Event, EventBus, EventEnvelope, InMemoryEventBus};
use stockhold_inventory::{InventoryError, Item, Reservation, available_to_sell};

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::locks::ItemLocks;
use crate::store::{Changeset, InventoryStore};

pub type EngineBus = InMemoryEventBus<EventEnvelope<JsonValue>>;

pub const ITEM_AGGREGATE: &str = "inventory.item";
pub const RESERVATION_AGGREGATE: &str = "inventory.reservation";
pub const TRANSFER_AGGREGATE: &str = "inventory.transfer";

/// Shared wiring for every engine component.
pub struct EngineContext {
    pub store: Arc<dyn InventoryStore>,
    pub clock: Arc<dyn Clock>,
    pub locks: ItemLocks,
    pub bus: Arc<EngineBus>,
    pub config: EngineConfig,
}

impl core::fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EngineContext")
            .field("config", &self.config)
            .field("locked_items", &self.locks.len())
            .finish_non_exhaustive()
    }
}

impl EngineContext {
    pub fn new(
        store: Arc<dyn InventoryStore>,
        clock: Arc<dyn Clock>,
        bus: Arc<EngineBus>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            clock,
            locks: ItemLocks::new(),
            bus,
            config,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn load_item(&self, item_id: ItemId) -> EngineResult<Item> {
        self.store
            .get_item(item_id)?
            .ok_or_else(|| InventoryError::item_not_found(item_id).into())
    }

    /// Item plus all of its holds. Call with the item's lock held.
    pub fn availability_snapshot(
        &self,
        item_id: ItemId,
    ) -> EngineResult<(Item, Vec<Reservation>)> {
        let item = self.load_item(item_id)?;
        let reservations = self.store.reservations_for_item(item_id)?;
        Ok((item, reservations))
    }

    pub fn available_now(&self, item_id: ItemId, exclude: Option<ReservationId>) -> EngineResult<i64> {
        let (item, reservations) = self.availability_snapshot(item_id)?;
        Ok(available_to_sell(&item, &reservations, exclude))
    }

    /// Commit atomically, then publish the feed.
    ///
    /// Publication is best-effort; a failed publish is logged, not returned.
    pub fn commit(&self, changeset: Changeset, feed: PendingEvents) -> EngineResult<()> {
        self.store.commit(changeset)?;

        for envelope in feed.0 {
            if let Err(err) = self.bus.publish(envelope) {
                warn!(error = ?err, "failed to publish engine event");
            }
        }
        Ok(())
    }
}

/// Envelopes collected during an operation, published after commit.
#[derive(Debug, Default)]
pub struct PendingEvents(Vec<EventEnvelope<JsonValue>>);

impl PendingEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<E>(&mut self, aggregate_id: Uuid, aggregate_type: &str, sequence_number: u64, event: &E)
    where
        E: Event + Serialize,
    {
        match EventEnvelope::from_typed(aggregate_id, aggregate_type, sequence_number, event) {
            Ok(envelope) => self.0.push(envelope),
            Err(err) => warn!(
                event_type = event.event_type(),
                error = %err,
                "failed to serialize engine event"
            ),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
