//! Sale commit: stock, ledger, reservation completion and statistics in one
//! changeset per order.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use stockhold_core::{Aggregate, AggregateRoot, CustomerId, DomainError, ItemId, OrderId, ReservationId};
use stockhold_inventory::{
    CompleteReservation, InventoryError, Item, LedgerEntry, OperationType, Reservation,
    ReservationCommand, SalesStatistics, available_to_sell, ensure_positive,
};

use super::context::{EngineContext, ITEM_AGGREGATE, PendingEvents, RESERVATION_AGGREGATE};
use crate::error::{EngineError, EngineResult};
use crate::store::Changeset;

/// One sale line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRequest {
    pub item_id: ItemId,
    pub quantity: i64,
    pub order_id: OrderId,
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
    /// Hold being converted into this sale, if any.
    #[serde(default)]
    pub reservation_id: Option<ReservationId>,
    /// Overrides the item's selling price (smallest currency unit).
    #[serde(default)]
    pub unit_price: Option<i64>,
    #[serde(default = "default_performed_by")]
    pub performed_by: String,
}

fn default_performed_by() -> String {
    "checkout".to_string()
}

impl SaleRequest {
    pub fn new(item_id: ItemId, quantity: i64, order_id: OrderId) -> Self {
        Self {
            item_id,
            quantity,
            order_id,
            customer_id: None,
            reservation_id: None,
            unit_price: None,
            performed_by: default_performed_by(),
        }
    }

    pub fn with_customer(mut self, customer_id: CustomerId) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    pub fn with_reservation(mut self, reservation_id: ReservationId) -> Self {
        self.reservation_id = Some(reservation_id);
        self
    }

    pub fn with_unit_price(mut self, unit_price: i64) -> Self {
        self.unit_price = Some(unit_price);
        self
    }

    pub fn performed_by(mut self, who: impl Into<String>) -> Self {
        self.performed_by = who.into();
        self
    }
}

/// Working copies for one batch. Every line validates against the state left
/// by the lines before it.
#[derive(Default)]
struct Batch {
    items: HashMap<ItemId, (Item, u64)>,
    holds: HashMap<ItemId, Vec<Reservation>>,
    completed: HashMap<ReservationId, u64>,
    statistics: HashMap<ItemId, SalesStatistics>,
    entries: Vec<LedgerEntry>,
    feed: PendingEvents,
}

#[derive(Debug, Clone)]
pub struct SalesProcessor {
    ctx: Arc<EngineContext>,
}

impl SalesProcessor {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx }
    }

    pub fn process_sale(&self, request: SaleRequest) -> EngineResult<LedgerEntry> {
        let mut entries = self.process_order(vec![request])?;
        entries
            .pop()
            .ok_or_else(|| DomainError::invariant("sale produced no ledger entry").into())
    }

    /// Commit every line or none.
    ///
    /// All touched items are locked (ascending id) for the whole batch; each
    /// line re-validates availability excluding its own hold.
    pub fn process_order(&self, requests: Vec<SaleRequest>) -> EngineResult<Vec<LedgerEntry>> {
        if requests.is_empty() {
            return Err(DomainError::validation("order has no sale lines").into());
        }
        for r in &requests {
            ensure_positive(r.quantity)?;
        }

        let ctx = &self.ctx;
        let item_ids: Vec<ItemId> = requests.iter().map(|r| r.item_id).collect();

        ctx.locks.with_items(&item_ids, || {
            let mut batch = Batch::default();
            for request in &requests {
                self.apply_line(&mut batch, request)?;
            }

            let mut changeset = Changeset::new();
            for (_, (item, expected)) in batch.items {
                changeset.put_item(item, expected);
            }
            for holds in batch.holds.into_values() {
                for hold in holds {
                    if let Some(expected) = batch.completed.get(&hold.id_typed()) {
                        changeset.put_reservation(hold, *expected);
                    }
                }
            }
            for entry in &batch.entries {
                changeset.append(entry.clone());
            }
            for stats in batch.statistics.into_values() {
                changeset.put_statistics(stats);
            }
            ctx.commit(changeset, batch.feed)?;

            info!(
                order_id = %requests[0].order_id,
                lines = batch.entries.len(),
                units = batch.entries.iter().map(LedgerEntry::units_sold).sum::<i64>(),
                "sale committed"
            );
            Ok(batch.entries)
        })
    }

    fn apply_line(&self, batch: &mut Batch, request: &SaleRequest) -> EngineResult<()> {
        let ctx = &self.ctx;
        let item_id = request.item_id;

        if !batch.items.contains_key(&item_id) {
            let item = ctx.load_item(item_id)?;
            let version = item.version();
            batch.items.insert(item_id, (item, version));
            batch
                .holds
                .insert(item_id, ctx.store.reservations_for_item(item_id)?);
        }

        // Resolve the hold before checking stock so a bad id reports as such.
        if let Some(reservation_id) = request.reservation_id {
            let held_here = batch
                .holds
                .get(&item_id)
                .is_some_and(|hs| hs.iter().any(|h| h.id_typed() == reservation_id));
            if !held_here {
                return Err(match ctx.store.get_reservation(reservation_id)? {
                    None => InventoryError::reservation_not_found(reservation_id),
                    Some(other) => InventoryError::ReservationItemMismatch {
                        reservation_id,
                        reserved_item: other.item_id(),
                        requested_item: item_id,
                    },
                }
                .into());
            }
        }

        let holds = batch.holds.get_mut(&item_id).ok_or_else(missing_working_copy)?;
        let (item, _) = batch.items.get_mut(&item_id).ok_or_else(missing_working_copy)?;

        if let Some(reservation_id) = request.reservation_id {
            let hold = holds
                .iter()
                .find(|h| h.id_typed() == reservation_id)
                .ok_or_else(|| InventoryError::reservation_not_found(reservation_id))?;
            if !hold.is_active() {
                return Err(InventoryError::ReservationNotActive {
                    reservation_id,
                    status: hold.status(),
                }
                .into());
            }
        }

        let available = available_to_sell(item, holds.iter(), request.reservation_id);
        if request.quantity > available {
            return Err(InventoryError::insufficient(item_id, request.quantity, available).into());
        }

        let unit_price = request.unit_price.unwrap_or_else(|| item.selling_price());
        if unit_price < 0 {
            return Err(DomainError::validation("unit price cannot be negative").into());
        }

        let stats = match batch.statistics.entry(item_id) {
            std::collections::hash_map::Entry::Occupied(o) => o.into_mut(),
            std::collections::hash_map::Entry::Vacant(v) => v.insert(
                ctx.store
                    .statistics(item_id)?
                    .unwrap_or_else(|| SalesStatistics::new(item_id)),
            ),
        };
        stats.check_sale(request.quantity, unit_price)?;

        let now = ctx.now();

        if let Some(reservation_id) = request.reservation_id {
            let hold = holds
                .iter_mut()
                .find(|h| h.id_typed() == reservation_id)
                .ok_or_else(|| InventoryError::reservation_not_found(reservation_id))?;
            let expected = hold.version();
            let events = hold.handle(&ReservationCommand::Complete(CompleteReservation {
                reservation_id,
                order_id: request.order_id.clone(),
                occurred_at: now,
            }))?;
            for event in &events {
                hold.apply(event);
                batch
                    .feed
                    .push(*reservation_id.as_uuid(), RESERVATION_AGGREGATE, hold.version(), event);
            }
            batch.completed.entry(reservation_id).or_insert(expected);
        }

        let entry = LedgerEntry::new(item_id, OperationType::Sale, -request.quantity, request.performed_by.clone(), now)
            .with_sale(
                request.order_id.clone(),
                request.customer_id.clone(),
                unit_price,
                request.reservation_id,
            );
        entry.validate()?;
        item.apply_entry(&entry)?;
        batch.feed.push(*item_id.as_uuid(), ITEM_AGGREGATE, item.version(), &entry);

        stats.record_entry(&entry);

        debug!(
            item_id = %item_id,
            quantity = request.quantity,
            unit_price,
            stock = item.current_stock(),
            "sale line validated"
        );
        batch.entries.push(entry);
        Ok(())
    }

    /// Maintained statistics for the item (zeroed if it never sold).
    pub fn statistics(&self, item_id: ItemId) -> EngineResult<SalesStatistics> {
        self.ctx.load_item(item_id)?;
        Ok(self
            .ctx
            .store
            .statistics(item_id)?
            .unwrap_or_else(|| SalesStatistics::new(item_id)))
    }

    /// Statistics rebuilt from the ledger (audit).
    pub fn replay_statistics(&self, item_id: ItemId) -> EngineResult<SalesStatistics> {
        self.ctx.load_item(item_id)?;
        let entries = self.ctx.store.ledger_for_item(item_id)?;
        Ok(SalesStatistics::replay(item_id, &entries))
    }
}

fn missing_working_copy() -> EngineError {
    DomainError::invariant("sale batch lost its working copy").into()
}
