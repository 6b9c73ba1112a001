use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockhold_core::{AggregateRoot, DomainError, ItemId, SupplierId};

use crate::error::{InventoryError, InventoryResult};
use crate::ledger::LedgerEntry;

/// Catalog record for a sellable item.
///
/// `current_stock` only moves through [`Item::apply_entry`], so every change
/// has a matching ledger entry. Reservations never touch it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    id: ItemId,
    name: String,
    current_stock: i64,
    reorder_point: i64,
    /// Prices in smallest currency unit (e.g., cents).
    cost_price: i64,
    selling_price: i64,
    supplier_id: Option<SupplierId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: u64,
}

/// Input for registering an item in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    pub name: String,
    /// Recorded as an opening INTAKE entry, not written directly.
    #[serde(default)]
    pub initial_stock: i64,
    #[serde(default)]
    pub reorder_point: i64,
    pub cost_price: i64,
    pub selling_price: i64,
    #[serde(default)]
    pub supplier_id: Option<SupplierId>,
}

/// Partial catalog update. Stock is deliberately absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemUpdate {
    pub name: Option<String>,
    pub reorder_point: Option<i64>,
    pub cost_price: Option<i64>,
    pub selling_price: Option<i64>,
    pub supplier_id: Option<SupplierId>,
}

impl Item {
    /// Build a new catalog record with zero stock.
    pub fn register(id: ItemId, new: &NewItem, now: DateTime<Utc>) -> InventoryResult<Self> {
        validate_name(&new.name)?;
        validate_non_negative("reorder_point", new.reorder_point)?;
        validate_non_negative("cost_price", new.cost_price)?;
        validate_non_negative("selling_price", new.selling_price)?;
        validate_non_negative("initial_stock", new.initial_stock)?;

        Ok(Self {
            id,
            name: new.name.trim().to_string(),
            current_stock: 0,
            reorder_point: new.reorder_point,
            cost_price: new.cost_price,
            selling_price: new.selling_price,
            supplier_id: new.supplier_id.clone(),
            created_at: now,
            updated_at: now,
            version: 1,
        })
    }

    pub fn id_typed(&self) -> ItemId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn current_stock(&self) -> i64 {
        self.current_stock
    }

    pub fn reorder_point(&self) -> i64 {
        self.reorder_point
    }

    pub fn cost_price(&self) -> i64 {
        self.cost_price
    }

    pub fn selling_price(&self) -> i64 {
        self.selling_price
    }

    pub fn supplier_id(&self) -> Option<&SupplierId> {
        self.supplier_id.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_low_stock(&self) -> bool {
        self.current_stock <= self.reorder_point
    }

    /// Apply catalog edits (never stock).
    pub fn apply_update(&mut self, update: &ItemUpdate, now: DateTime<Utc>) -> InventoryResult<()> {
        if let Some(name) = &update.name {
            validate_name(name)?;
        }
        if let Some(v) = update.reorder_point {
            validate_non_negative("reorder_point", v)?;
        }
        if let Some(v) = update.cost_price {
            validate_non_negative("cost_price", v)?;
        }
        if let Some(v) = update.selling_price {
            validate_non_negative("selling_price", v)?;
        }

        if let Some(name) = &update.name {
            self.name = name.trim().to_string();
        }
        if let Some(v) = update.reorder_point {
            self.reorder_point = v;
        }
        if let Some(v) = update.cost_price {
            self.cost_price = v;
        }
        if let Some(v) = update.selling_price {
            self.selling_price = v;
        }
        if let Some(s) = &update.supplier_id {
            self.supplier_id = Some(s.clone());
        }

        self.updated_at = now;
        self.version += 1;
        Ok(())
    }

    /// Stock level after applying `delta`, refusing to go negative or
    /// past `i64::MAX`.
    pub fn stock_after(&self, delta: i64) -> InventoryResult<i64> {
        let next = self.current_stock.checked_add(delta).ok_or_else(|| {
            DomainError::validation(format!(
                "stock of item {} would overflow (current {}, delta {delta})",
                self.id, self.current_stock
            ))
        })?;
        if next < 0 {
            return Err(InventoryError::insufficient(
                self.id,
                delta.saturating_neg(),
                self.current_stock,
            ));
        }
        Ok(next)
    }

    /// Evolve stock from a ledger entry.
    ///
    /// Callers validate with [`Item::stock_after`] first; applying an entry
    /// for another item is an invariant violation.
    pub fn apply_entry(&mut self, entry: &LedgerEntry) -> InventoryResult<()> {
        if entry.item_id != self.id {
            return Err(DomainError::invariant("ledger entry item_id mismatch").into());
        }
        self.current_stock = self.stock_after(entry.quantity)?;
        self.updated_at = entry.timestamp;
        self.version += 1;
        Ok(())
    }
}

impl AggregateRoot for Item {
    type Id = ItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

fn validate_name(name: &str) -> InventoryResult<()> {
    if name.trim().is_empty() {
        return Err(DomainError::validation("name cannot be empty").into());
    }
    Ok(())
}

fn validate_non_negative(field: &str, value: i64) -> InventoryResult<()> {
    if value < 0 {
        return Err(DomainError::validation(format!("{field} cannot be negative")).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::OperationType;

    fn new_item() -> NewItem {
        NewItem {
            name: "Espresso beans 1kg".to_string(),
            initial_stock: 5,
            reorder_point: 2,
            cost_price: 1_200,
            selling_price: 2_500,
            supplier_id: Some(SupplierId::new("roastery")),
        }
    }

    #[test]
    fn register_starts_with_zero_stock() {
        let item = Item::register(ItemId::new(), &new_item(), Utc::now()).unwrap();
        assert_eq!(item.current_stock(), 0);
        assert_eq!(item.reorder_point(), 2);
        assert_eq!(item.version(), 1);
    }

    #[test]
    fn blank_name_is_rejected() {
        let mut input = new_item();
        input.name = "   ".to_string();
        let err = Item::register(ItemId::new(), &input, Utc::now()).unwrap_err();
        match err {
            InventoryError::Domain(DomainError::Validation(msg)) if msg.contains("name") => {}
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn negative_prices_are_rejected() {
        let mut input = new_item();
        input.selling_price = -1;
        assert!(Item::register(ItemId::new(), &input, Utc::now()).is_err());
    }

    #[test]
    fn apply_entry_moves_stock_and_version() {
        let id = ItemId::new();
        let mut item = Item::register(id, &new_item(), Utc::now()).unwrap();
        let entry = LedgerEntry::new(id, OperationType::Intake, 7, "admin", Utc::now());
        item.apply_entry(&entry).unwrap();
        assert_eq!(item.current_stock(), 7);
        assert_eq!(item.version(), 2);
    }

    #[test]
    fn stock_cannot_go_negative() {
        let id = ItemId::new();
        let item = Item::register(id, &new_item(), Utc::now()).unwrap();
        let err = item.stock_after(-1).unwrap_err();
        assert_eq!(err, InventoryError::insufficient(id, 1, 0));
    }

    #[test]
    fn entry_for_other_item_is_rejected() {
        let mut item = Item::register(ItemId::new(), &new_item(), Utc::now()).unwrap();
        let entry = LedgerEntry::new(ItemId::new(), OperationType::Intake, 1, "admin", Utc::now());
        assert!(item.apply_entry(&entry).is_err());
        assert_eq!(item.current_stock(), 0);
    }

    #[test]
    fn update_leaves_stock_untouched() {
        let id = ItemId::new();
        let mut item = Item::register(id, &new_item(), Utc::now()).unwrap();
        item.apply_entry(&LedgerEntry::new(id, OperationType::Intake, 4, "admin", Utc::now()))
            .unwrap();

        let update = ItemUpdate {
            selling_price: Some(2_900),
            reorder_point: Some(10),
            ..ItemUpdate::default()
        };
        item.apply_update(&update, Utc::now()).unwrap();

        assert_eq!(item.selling_price(), 2_900);
        assert_eq!(item.reorder_point(), 10);
        assert_eq!(item.current_stock(), 4);
        assert!(item.is_low_stock());
    }
}
