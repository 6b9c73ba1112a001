//! Per-item running sales totals.
//!
//! Updated incrementally in the same commit as each SALE ledger entry, and
//! reconstructible from the ledger with [`SalesStatistics::replay`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockhold_core::{DomainError, ItemId};

use crate::calendar::CalendarBuckets;
use crate::error::InventoryResult;
use crate::ledger::{LedgerEntry, OperationType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesStatistics {
    pub item_id: ItemId,
    pub total_quantity_sold: i64,
    /// Smallest currency unit.
    pub total_revenue: i64,
    /// `total_revenue / total_quantity_sold`, zero before the first sale.
    pub average_price: f64,
    pub last_sale_date: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub buckets: CalendarBuckets,
}

impl SalesStatistics {
    pub fn new(item_id: ItemId) -> Self {
        Self {
            item_id,
            total_quantity_sold: 0,
            total_revenue: 0,
            average_price: 0.0,
            last_sale_date: None,
            buckets: CalendarBuckets::new(),
        }
    }

    /// Reject a sale whose revenue or running totals would not fit in `i64`.
    ///
    /// Callers check before committing; [`SalesStatistics::record_sale`]
    /// saturates rather than panicking on anything that slipped through.
    pub fn check_sale(&self, quantity: i64, unit_price: i64) -> InventoryResult<()> {
        let fits = quantity
            .checked_mul(unit_price)
            .and_then(|line| self.total_revenue.checked_add(line))
            .and(self.total_quantity_sold.checked_add(quantity));
        if fits.is_none() {
            return Err(DomainError::validation(format!(
                "sale of {quantity} x {unit_price} for item {} overflows revenue totals",
                self.item_id
            ))
            .into());
        }
        Ok(())
    }

    pub fn record_sale(&mut self, quantity: i64, unit_price: i64, at: DateTime<Utc>) {
        self.total_quantity_sold = self.total_quantity_sold.saturating_add(quantity);
        self.total_revenue = self
            .total_revenue
            .saturating_add(quantity.saturating_mul(unit_price));
        self.average_price = if self.total_quantity_sold > 0 {
            self.total_revenue as f64 / self.total_quantity_sold as f64
        } else {
            0.0
        };
        self.last_sale_date = Some(match self.last_sale_date {
            Some(prev) if prev > at => prev,
            _ => at,
        });
        self.buckets.record(at, quantity);
    }

    /// Fold one ledger entry in; non-SALE entries and other items are ignored.
    pub fn record_entry(&mut self, entry: &LedgerEntry) {
        if entry.item_id != self.item_id || entry.operation != OperationType::Sale {
            return;
        }
        self.record_sale(
            entry.units_sold(),
            entry.unit_price.unwrap_or(0),
            entry.timestamp,
        );
    }

    pub fn replay<'a>(item_id: ItemId, entries: impl IntoIterator<Item = &'a LedgerEntry>) -> Self {
        let mut stats = Self::new(item_id);
        for entry in entries {
            stats.record_entry(entry);
        }
        stats
    }

    pub fn daily_total(&self, at: DateTime<Utc>) -> i64 {
        self.buckets.day(at)
    }

    pub fn weekly_total(&self, at: DateTime<Utc>) -> i64 {
        self.buckets.week(at)
    }

    pub fn monthly_total(&self, at: DateTime<Utc>) -> i64 {
        self.buckets.month(at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;
    use stockhold_core::OrderId;

    fn sale(item: ItemId, qty: i64, price: i64, at: DateTime<Utc>) -> LedgerEntry {
        LedgerEntry::new(item, OperationType::Sale, -qty, "pos", at)
            .with_sale(OrderId::new("O"), None, price, None)
    }

    #[test]
    fn average_price_is_revenue_over_units() {
        let item = ItemId::new();
        let at = Utc.with_ymd_and_hms(2024, 2, 1, 12, 0, 0).unwrap();
        let mut stats = SalesStatistics::new(item);
        stats.record_sale(2, 1_000, at);
        stats.record_sale(1, 2_500, at + Duration::hours(1));

        assert_eq!(stats.total_quantity_sold, 3);
        assert_eq!(stats.total_revenue, 4_500);
        assert!((stats.average_price - 1_500.0).abs() < f64::EPSILON);
        assert_eq!(stats.last_sale_date, Some(at + Duration::hours(1)));
        assert_eq!(stats.daily_total(at), 3);
        assert_eq!(stats.monthly_total(at), 3);
    }

    #[test]
    fn replay_ignores_non_sales() {
        let item = ItemId::new();
        let at = Utc::now();
        let entries = vec![
            LedgerEntry::new(item, OperationType::Intake, 20, "a", at),
            sale(item, 4, 300, at),
            LedgerEntry::new(item, OperationType::Adjustment, -1, "a", at),
            sale(ItemId::new(), 9, 300, at),
        ];
        let stats = SalesStatistics::replay(item, &entries);
        assert_eq!(stats.total_quantity_sold, 4);
        assert_eq!(stats.total_revenue, 1_200);
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 256, .. ProptestConfig::default() })]

        #[test]
        fn incremental_matches_replay(
            sales in prop::collection::vec((1i64..20, 1i64..10_000, 0i64..90), 1..30),
        ) {
            let item = ItemId::new();
            let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

            let mut incremental = SalesStatistics::new(item);
            let mut entries = Vec::new();
            for (qty, price, day) in sales {
                let at = start + Duration::days(day);
                incremental.record_sale(qty, price, at);
                entries.push(sale(item, qty, price, at));
            }

            let replayed = SalesStatistics::replay(item, &entries);
            prop_assert_eq!(&incremental, &replayed);
            let bucket_sum: i64 = replayed.buckets.daily.values().sum();
            prop_assert_eq!(bucket_sum, replayed.total_quantity_sold);
        }
    }
}
