//! Operation ledger: append-only record of every stock-affecting event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockhold_core::{CustomerId, DomainError, ItemId, LedgerEntryId, OrderId, ReservationId, TransferId};
use stockhold_events::Event;

use crate::error::{InventoryError, InventoryResult};

/// Kind of stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationType {
    Intake,
    Adjustment,
    Transfer,
    Sale,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Intake => "INTAKE",
            OperationType::Adjustment => "ADJUSTMENT",
            OperationType::Transfer => "TRANSFER",
            OperationType::Sale => "SALE",
        }
    }
}

impl core::fmt::Display for OperationType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable stock movement.
///
/// `quantity` is signed: positive adds stock, negative removes it. SALE and
/// outbound TRANSFER entries are always negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: LedgerEntryId,
    pub item_id: ItemId,
    pub operation: OperationType,
    pub quantity: i64,
    pub timestamp: DateTime<Utc>,
    pub performed_by: String,
    pub notes: Option<String>,
    pub reason: Option<String>,
    pub order_id: Option<OrderId>,
    pub customer_id: Option<CustomerId>,
    /// Smallest currency unit; set on SALE entries.
    pub unit_price: Option<i64>,
    pub reservation_id: Option<ReservationId>,
    pub transfer_id: Option<TransferId>,
}

impl LedgerEntry {
    pub fn new(
        item_id: ItemId,
        operation: OperationType,
        quantity: i64,
        performed_by: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: LedgerEntryId::new(),
            item_id,
            operation,
            quantity,
            timestamp,
            performed_by: performed_by.into(),
            notes: None,
            reason: None,
            order_id: None,
            customer_id: None,
            unit_price: None,
            reservation_id: None,
            transfer_id: None,
        }
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }

    pub fn with_reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason;
        self
    }

    pub fn with_sale(
        mut self,
        order_id: OrderId,
        customer_id: Option<CustomerId>,
        unit_price: i64,
        reservation_id: Option<ReservationId>,
    ) -> Self {
        self.order_id = Some(order_id);
        self.customer_id = customer_id;
        self.unit_price = Some(unit_price);
        self.reservation_id = reservation_id;
        self
    }

    pub fn with_transfer(mut self, transfer_id: TransferId) -> Self {
        self.transfer_id = Some(transfer_id);
        self
    }

    /// Units removed by a sale (zero for other operations).
    pub fn units_sold(&self) -> i64 {
        match self.operation {
            OperationType::Sale => self.quantity.abs(),
            _ => 0,
        }
    }

    /// Enforce the sign convention for the operation type.
    pub fn validate(&self) -> InventoryResult<()> {
        let ok = match self.operation {
            OperationType::Intake => self.quantity > 0,
            OperationType::Adjustment => self.quantity != 0,
            OperationType::Transfer | OperationType::Sale => self.quantity < 0,
        };
        if !ok {
            return Err(InventoryError::InvalidQuantity {
                quantity: self.quantity,
            });
        }
        if self.operation == OperationType::Sale && self.unit_price.is_none() {
            return Err(DomainError::invariant("sale entry without unit price").into());
        }
        Ok(())
    }
}

impl Event for LedgerEntry {
    fn event_type(&self) -> &'static str {
        match self.operation {
            OperationType::Intake => "inventory.stock.received",
            OperationType::Adjustment => "inventory.stock.adjusted",
            OperationType::Transfer => "inventory.stock.transferred_out",
            OperationType::Sale => "inventory.stock.sold",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Stock level implied by replaying entries from genesis (opening stock is an
/// INTAKE entry, so genesis is zero).
pub fn replay_stock<'a>(entries: impl IntoIterator<Item = &'a LedgerEntry>) -> i64 {
    entries.into_iter().map(|e| e.quantity).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_convention_is_enforced() {
        let item = ItemId::new();
        let now = Utc::now();

        assert!(LedgerEntry::new(item, OperationType::Intake, 3, "a", now).validate().is_ok());
        assert!(LedgerEntry::new(item, OperationType::Intake, -3, "a", now).validate().is_err());
        assert!(LedgerEntry::new(item, OperationType::Adjustment, -2, "a", now).validate().is_ok());
        assert!(LedgerEntry::new(item, OperationType::Adjustment, 0, "a", now).validate().is_err());
        assert!(LedgerEntry::new(item, OperationType::Transfer, 4, "a", now).validate().is_err());
    }

    #[test]
    fn sale_requires_unit_price_and_negative_quantity() {
        let item = ItemId::new();
        let now = Utc::now();

        let bare = LedgerEntry::new(item, OperationType::Sale, -2, "pos-1", now);
        assert!(bare.validate().is_err());

        let priced = bare.with_sale(OrderId::new("O1"), None, 5_000, None);
        assert!(priced.validate().is_ok());
        assert_eq!(priced.units_sold(), 2);
    }

    #[test]
    fn replay_sums_signed_quantities() {
        let item = ItemId::new();
        let now = Utc::now();
        let entries = vec![
            LedgerEntry::new(item, OperationType::Intake, 10, "a", now),
            LedgerEntry::new(item, OperationType::Adjustment, -1, "a", now),
            LedgerEntry::new(item, OperationType::Sale, -4, "a", now)
                .with_sale(OrderId::new("O1"), None, 100, None),
        ];
        assert_eq!(replay_stock(&entries), 5);
    }

    #[test]
    fn event_type_follows_operation() {
        let entry = LedgerEntry::new(ItemId::new(), OperationType::Transfer, -1, "a", Utc::now());
        assert_eq!(entry.event_type(), "inventory.stock.transferred_out");
    }
}
