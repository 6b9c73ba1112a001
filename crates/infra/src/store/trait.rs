use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use stockhold_core::{AggregateRoot, CartId, ExpectedVersion, ItemId, ReservationId, TransferId};
use stockhold_inventory::{Item, LedgerEntry, Reservation, SalesStatistics, Transfer};

/// Persistence error.
///
/// These are **infrastructure errors** (storage, concurrency) as opposed to
/// caller errors (unknown ids, insufficient stock).
#[derive(Debug, Error)]
pub enum StoreError {
    /// A versioned write found the record at a different version.
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    /// Backend unavailable or rejected the operation.
    #[error("store backend error: {0}")]
    Backend(String),

    #[error("record (de)serialization failed: {0}")]
    Serialization(String),

    #[error("store lock poisoned")]
    Poisoned,
}

/// A record write guarded by an optimistic version check.
///
/// A record that does not exist yet is at version 0, so inserts use
/// `ExpectedVersion::Exact(0)`.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedWrite<T> {
    pub record: T,
    pub expected: ExpectedVersion,
}

/// Everything one engine operation writes, committed all-or-nothing.
///
/// Stock, ledger and statistics for a sale travel in the same changeset so a
/// partial application cannot be observed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Changeset {
    pub items: Vec<VersionedWrite<Item>>,
    pub reservations: Vec<VersionedWrite<Reservation>>,
    pub transfers: Vec<VersionedWrite<Transfer>>,
    /// Appended, never rewritten.
    pub ledger: Vec<LedgerEntry>,
    pub statistics: Vec<SalesStatistics>,
}

impl Changeset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `item`, expecting the stored copy at `expected_version`.
    pub fn put_item(&mut self, item: Item, expected_version: u64) -> &mut Self {
        self.items.push(VersionedWrite {
            record: item,
            expected: ExpectedVersion::Exact(expected_version),
        });
        self
    }

    pub fn put_reservation(&mut self, reservation: Reservation, expected_version: u64) -> &mut Self {
        self.reservations.push(VersionedWrite {
            record: reservation,
            expected: ExpectedVersion::Exact(expected_version),
        });
        self
    }

    pub fn put_transfer(&mut self, transfer: Transfer, expected_version: u64) -> &mut Self {
        self.transfers.push(VersionedWrite {
            record: transfer,
            expected: ExpectedVersion::Exact(expected_version),
        });
        self
    }

    pub fn append(&mut self, entry: LedgerEntry) -> &mut Self {
        self.ledger.push(entry);
        self
    }

    pub fn put_statistics(&mut self, statistics: SalesStatistics) -> &mut Self {
        self.statistics.push(statistics);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
            && self.reservations.is_empty()
            && self.transfers.is_empty()
            && self.ledger.is_empty()
            && self.statistics.is_empty()
    }
}

/// Check a versioned write against the stored record's version (0 if absent).
pub(crate) fn check_version<T: AggregateRoot>(
    write: &VersionedWrite<T>,
    current: Option<u64>,
) -> Result<(), StoreError> {
    let actual = current.unwrap_or(0);
    if write.expected.matches(actual) {
        Ok(())
    } else {
        Err(StoreError::Concurrency(format!(
            "{:?}: expected {:?}, found {actual}",
            write.record.id(),
            write.expected
        )))
    }
}

/// Persistence boundary for the engine.
///
/// ## Requirements
///
/// Implementations must:
/// - apply a [`Changeset`] atomically (all writes or none)
/// - reject the whole changeset if any versioned write fails its check
/// - keep the ledger append-only and return entries in append order
/// - preserve every field of items, reservations, transfers and statistics
///
/// Serializing writers per item is the engine's job (see `ItemLocks`); the
/// version checks catch anything that bypasses it.
pub trait InventoryStore: Send + Sync {
    fn get_item(&self, item_id: ItemId) -> Result<Option<Item>, StoreError>;

    fn list_items(&self) -> Result<Vec<Item>, StoreError>;

    fn get_reservation(&self, reservation_id: ReservationId) -> Result<Option<Reservation>, StoreError>;

    /// All reservations (any status) holding the item.
    fn reservations_for_item(&self, item_id: ItemId) -> Result<Vec<Reservation>, StoreError>;

    /// All reservations (any status) created for the cart.
    fn reservations_for_cart(&self, cart_id: &CartId) -> Result<Vec<Reservation>, StoreError>;

    fn active_reservations(&self) -> Result<Vec<Reservation>, StoreError>;

    /// ACTIVE reservations with `expires_at <= now`.
    fn due_reservations(&self, now: DateTime<Utc>) -> Result<Vec<Reservation>, StoreError>;

    /// Ledger entries for one item, in append order.
    fn ledger_for_item(&self, item_id: ItemId) -> Result<Vec<LedgerEntry>, StoreError>;

    /// SALE entries across all items with `timestamp >= since`.
    fn sales_since(&self, since: DateTime<Utc>) -> Result<Vec<LedgerEntry>, StoreError>;

    fn statistics(&self, item_id: ItemId) -> Result<Option<SalesStatistics>, StoreError>;

    fn get_transfer(&self, transfer_id: TransferId) -> Result<Option<Transfer>, StoreError>;

    fn list_transfers(&self) -> Result<Vec<Transfer>, StoreError>;

    fn commit(&self, changeset: Changeset) -> Result<(), StoreError>;
}

impl<S> InventoryStore for Arc<S>
where
    S: InventoryStore + ?Sized,
{
    fn get_item(&self, item_id: ItemId) -> Result<Option<Item>, StoreError> {
        (**self).get_item(item_id)
    }

    fn list_items(&self) -> Result<Vec<Item>, StoreError> {
        (**self).list_items()
    }

    fn get_reservation(&self, reservation_id: ReservationId) -> Result<Option<Reservation>, StoreError> {
        (**self).get_reservation(reservation_id)
    }

    fn reservations_for_item(&self, item_id: ItemId) -> Result<Vec<Reservation>, StoreError> {
        (**self).reservations_for_item(item_id)
    }

    fn reservations_for_cart(&self, cart_id: &CartId) -> Result<Vec<Reservation>, StoreError> {
        (**self).reservations_for_cart(cart_id)
    }

    fn active_reservations(&self) -> Result<Vec<Reservation>, StoreError> {
        (**self).active_reservations()
    }

    fn due_reservations(&self, now: DateTime<Utc>) -> Result<Vec<Reservation>, StoreError> {
        (**self).due_reservations(now)
    }

    fn ledger_for_item(&self, item_id: ItemId) -> Result<Vec<LedgerEntry>, StoreError> {
        (**self).ledger_for_item(item_id)
    }

    fn sales_since(&self, since: DateTime<Utc>) -> Result<Vec<LedgerEntry>, StoreError> {
        (**self).sales_since(since)
    }

    fn statistics(&self, item_id: ItemId) -> Result<Option<SalesStatistics>, StoreError> {
        (**self).statistics(item_id)
    }

    fn get_transfer(&self, transfer_id: TransferId) -> Result<Option<Transfer>, StoreError> {
        (**self).get_transfer(transfer_id)
    }

    fn list_transfers(&self) -> Result<Vec<Transfer>, StoreError> {
        (**self).list_transfers()
    }

    fn commit(&self, changeset: Changeset) -> Result<(), StoreError> {
        (**self).commit(changeset)
    }
}
