use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use stockhold_core::{AggregateRoot, CartId, ItemId, ReservationId, TransferId};
use stockhold_inventory::{Item, LedgerEntry, OperationType, Reservation, SalesStatistics, Transfer};

use super::r#trait::{Changeset, InventoryStore, StoreError, check_version};

#[derive(Debug, Default)]
struct State {
    items: HashMap<ItemId, Item>,
    reservations: HashMap<ReservationId, Reservation>,
    transfers: HashMap<TransferId, Transfer>,
    ledger: Vec<LedgerEntry>,
    statistics: HashMap<ItemId, SalesStatistics>,
}

/// In-memory inventory store.
///
/// Intended for tests/dev and single-process hosts. One `RwLock` covers all
/// state, which makes every commit trivially atomic.
#[derive(Debug, Default)]
pub struct InMemoryInventoryStore {
    state: RwLock<State>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(&self, f: impl FnOnce(&State) -> T) -> Result<T, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(f(&state))
    }
}

fn sorted_by_created(mut reservations: Vec<Reservation>) -> Vec<Reservation> {
    reservations.sort_by(|a, b| {
        a.created_at()
            .cmp(&b.created_at())
            .then_with(|| a.id_typed().cmp(&b.id_typed()))
    });
    reservations
}

impl InventoryStore for InMemoryInventoryStore {
    fn get_item(&self, item_id: ItemId) -> Result<Option<Item>, StoreError> {
        self.read(|s| s.items.get(&item_id).cloned())
    }

    fn list_items(&self) -> Result<Vec<Item>, StoreError> {
        let mut items = self.read(|s| s.items.values().cloned().collect::<Vec<_>>())?;
        items.sort_by_key(|i| i.id_typed());
        Ok(items)
    }

    fn get_reservation(&self, reservation_id: ReservationId) -> Result<Option<Reservation>, StoreError> {
        self.read(|s| s.reservations.get(&reservation_id).cloned())
    }

    fn reservations_for_item(&self, item_id: ItemId) -> Result<Vec<Reservation>, StoreError> {
        let found = self.read(|s| {
            s.reservations
                .values()
                .filter(|r| r.item_id() == item_id)
                .cloned()
                .collect()
        })?;
        Ok(sorted_by_created(found))
    }

    fn reservations_for_cart(&self, cart_id: &CartId) -> Result<Vec<Reservation>, StoreError> {
        let found = self.read(|s| {
            s.reservations
                .values()
                .filter(|r| r.cart_id() == cart_id)
                .cloned()
                .collect()
        })?;
        Ok(sorted_by_created(found))
    }

    fn active_reservations(&self) -> Result<Vec<Reservation>, StoreError> {
        let found = self.read(|s| {
            s.reservations
                .values()
                .filter(|r| r.is_active())
                .cloned()
                .collect()
        })?;
        Ok(sorted_by_created(found))
    }

    fn due_reservations(&self, now: DateTime<Utc>) -> Result<Vec<Reservation>, StoreError> {
        let found = self.read(|s| {
            s.reservations
                .values()
                .filter(|r| r.is_due(now))
                .cloned()
                .collect()
        })?;
        Ok(sorted_by_created(found))
    }

    fn ledger_for_item(&self, item_id: ItemId) -> Result<Vec<LedgerEntry>, StoreError> {
        self.read(|s| {
            s.ledger
                .iter()
                .filter(|e| e.item_id == item_id)
                .cloned()
                .collect()
        })
    }

    fn sales_since(&self, since: DateTime<Utc>) -> Result<Vec<LedgerEntry>, StoreError> {
        self.read(|s| {
            s.ledger
                .iter()
                .filter(|e| e.operation == OperationType::Sale && e.timestamp >= since)
                .cloned()
                .collect()
        })
    }

    fn statistics(&self, item_id: ItemId) -> Result<Option<SalesStatistics>, StoreError> {
        self.read(|s| s.statistics.get(&item_id).cloned())
    }

    fn get_transfer(&self, transfer_id: TransferId) -> Result<Option<Transfer>, StoreError> {
        self.read(|s| s.transfers.get(&transfer_id).cloned())
    }

    fn list_transfers(&self) -> Result<Vec<Transfer>, StoreError> {
        let mut transfers = self.read(|s| s.transfers.values().cloned().collect::<Vec<_>>())?;
        transfers.sort_by_key(|t| (t.created_at(), t.id_typed()));
        Ok(transfers)
    }

    fn commit(&self, changeset: Changeset) -> Result<(), StoreError> {
        if changeset.is_empty() {
            return Ok(());
        }

        let mut state = self.state.write().map_err(|_| StoreError::Poisoned)?;

        // Validate every versioned write before touching anything.
        for w in &changeset.items {
            let current = state.items.get(&w.record.id_typed()).map(|i| i.version());
            check_version(w, current)?;
        }
        for w in &changeset.reservations {
            let current = state
                .reservations
                .get(&w.record.id_typed())
                .map(|r| r.version());
            check_version(w, current)?;
        }
        for w in &changeset.transfers {
            let current = state.transfers.get(&w.record.id_typed()).map(|t| t.version());
            check_version(w, current)?;
        }

        for w in changeset.items {
            state.items.insert(w.record.id_typed(), w.record);
        }
        for w in changeset.reservations {
            state.reservations.insert(w.record.id_typed(), w.record);
        }
        for w in changeset.transfers {
            state.transfers.insert(w.record.id_typed(), w.record);
        }
        state.ledger.extend(changeset.ledger);
        for stats in changeset.statistics {
            state.statistics.insert(stats.item_id, stats);
        }

        Ok(())
    }
}
