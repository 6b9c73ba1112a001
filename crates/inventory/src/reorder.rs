//! Restock suggestions derived from stock, reorder points and sales velocity.

use core::cmp::Ordering;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use stockhold_core::{ItemId, SupplierId};

use crate::item::Item;
use crate::ledger::{LedgerEntry, OperationType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReorderPriority {
    Low,
    Medium,
    High,
}

/// Thresholds for the advisor. Defaults: 30-day window, 30 days of cover,
/// trigger at 80% of the reorder point, HIGH at 30% and MEDIUM at 60%.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReorderPolicy {
    pub velocity_window_days: i64,
    pub cover_days: i64,
    pub trigger_ratio: f64,
    pub high_priority_ratio: f64,
    pub medium_priority_ratio: f64,
}

impl Default for ReorderPolicy {
    fn default() -> Self {
        Self {
            velocity_window_days: 30,
            cover_days: 30,
            trigger_ratio: 0.8,
            high_priority_ratio: 0.3,
            medium_priority_ratio: 0.6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReorderSuggestion {
    pub item_id: ItemId,
    pub item_name: String,
    pub supplier_id: Option<SupplierId>,
    pub current_stock: i64,
    pub reorder_point: i64,
    /// Units per day.
    pub sales_velocity: f64,
    pub suggested_quantity: i64,
    pub priority: ReorderPriority,
    /// `suggested_quantity * cost_price`.
    pub estimated_cost: i64,
}

/// Average units sold per day over the trailing window ending at `now`.
///
/// Falls back to 1.0 when nothing sold in the window.
pub fn sales_velocity<'a>(
    entries: impl IntoIterator<Item = &'a LedgerEntry>,
    now: DateTime<Utc>,
    window_days: i64,
) -> f64 {
    let window_days = window_days.max(1);
    let since = now - Duration::days(window_days);
    let sold: i64 = entries
        .into_iter()
        .filter(|e| e.operation == OperationType::Sale)
        .filter(|e| e.timestamp >= since && e.timestamp <= now)
        .map(|e| e.quantity.abs())
        .sum();

    if sold == 0 {
        1.0
    } else {
        sold as f64 / window_days as f64
    }
}

impl ReorderPolicy {
    /// Suggestion for one item, or `None` if it does not qualify.
    ///
    /// Items without a reorder point (zero) are never suggested.
    pub fn evaluate(&self, item: &Item, velocity: f64) -> Option<ReorderSuggestion> {
        let reorder_point = item.reorder_point();
        if reorder_point <= 0 {
            return None;
        }

        let stock = item.current_stock();
        if stock as f64 > reorder_point as f64 * self.trigger_ratio {
            return None;
        }

        let ratio = stock as f64 / reorder_point as f64;
        let priority = if ratio <= self.high_priority_ratio {
            ReorderPriority::High
        } else if ratio <= self.medium_priority_ratio {
            ReorderPriority::Medium
        } else {
            ReorderPriority::Low
        };

        let suggested_quantity = (velocity * self.cover_days as f64).ceil() as i64;

        Some(ReorderSuggestion {
            item_id: item.id_typed(),
            item_name: item.name().to_string(),
            supplier_id: item.supplier_id().cloned(),
            current_stock: stock,
            reorder_point,
            sales_velocity: velocity,
            suggested_quantity,
            priority,
            estimated_cost: suggested_quantity * item.cost_price(),
        })
    }
}

/// Priority descending, ties broken by item id.
pub fn sort_suggestions(suggestions: &mut [ReorderSuggestion]) {
    sort_suggestions_by(suggestions, |a, b| a.item_id.cmp(&b.item_id));
}

/// Priority descending, ties broken by `tie_break`.
pub fn sort_suggestions_by<F>(suggestions: &mut [ReorderSuggestion], mut tie_break: F)
where
    F: FnMut(&ReorderSuggestion, &ReorderSuggestion) -> Ordering,
{
    suggestions.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| tie_break(a, b)));
}
