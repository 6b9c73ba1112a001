use std::sync::Arc;

use tracing::{debug, info};

use stockhold_core::{AggregateRoot, ItemId};
use stockhold_inventory::{InventoryError, Item, ItemUpdate, LedgerEntry, NewItem, OperationType};

use super::context::{EngineContext, ITEM_AGGREGATE, PendingEvents};
use crate::error::EngineResult;
use crate::store::Changeset;

/// Item catalog: registration, edits and lookups. Stock only moves through
/// ledger entries, never through catalog edits.
#[derive(Debug, Clone)]
pub struct Catalog {
    ctx: Arc<EngineContext>,
}

impl Catalog {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx }
    }

    pub fn create_item(&self, new: NewItem, performed_by: &str) -> EngineResult<Item> {
        self.create_item_with_id(ItemId::new(), new, performed_by)
    }

    /// Register an item under a caller-chosen id (imports, migrations).
    ///
    /// A positive `initial_stock` is recorded as an opening INTAKE entry.
    pub fn create_item_with_id(&self, item_id: ItemId, new: NewItem, performed_by: &str) -> EngineResult<Item> {
        let ctx = &self.ctx;
        ctx.locks.with_item(item_id, || {
            if ctx.store.get_item(item_id)?.is_some() {
                return Err(InventoryError::DuplicateItem { item_id }.into());
            }

            let now = ctx.now();
            let mut item = Item::register(item_id, &new, now)?;
            let mut changeset = Changeset::new();
            let mut feed = PendingEvents::new();

            if new.initial_stock > 0 {
                let entry = LedgerEntry::new(item_id, OperationType::Intake, new.initial_stock, performed_by, now)
                    .with_notes(Some("opening stock".to_string()));
                entry.validate()?;
                item.apply_entry(&entry)?;
                feed.push(*item_id.as_uuid(), ITEM_AGGREGATE, item.version(), &entry);
                changeset.append(entry);
            }

            changeset.put_item(item.clone(), 0);
            ctx.commit(changeset, feed)?;

            info!(item_id = %item_id, name = item.name(), stock = item.current_stock(), "item registered");
            Ok(item)
        })
    }

    pub fn update_item(&self, item_id: ItemId, update: ItemUpdate) -> EngineResult<Item> {
        let ctx = &self.ctx;
        ctx.locks.with_item(item_id, || {
            let mut item = ctx.load_item(item_id)?;
            let expected = item.version();
            item.apply_update(&update, ctx.now())?;

            let mut changeset = Changeset::new();
            changeset.put_item(item.clone(), expected);
            ctx.commit(changeset, PendingEvents::new())?;

            debug!(item_id = %item_id, version = item.version(), "item updated");
            Ok(item)
        })
    }

    pub fn get_item(&self, item_id: ItemId) -> EngineResult<Item> {
        self.ctx.load_item(item_id)
    }

    pub fn list_items(&self) -> EngineResult<Vec<Item>> {
        Ok(self.ctx.store.list_items()?)
    }

    /// Items at or below their reorder point.
    pub fn low_stock_items(&self) -> EngineResult<Vec<Item>> {
        Ok(self
            .ctx
            .store
            .list_items()?
            .into_iter()
            .filter(Item::is_low_stock)
            .collect())
    }
}
