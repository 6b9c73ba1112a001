use serde::{Deserialize, Serialize};

use crate::item::Item;

/// Stock valued at cost and at retail (smallest currency unit).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryValuation {
    pub total_cost_value: i64,
    pub total_retail_value: i64,
    pub item_count: usize,
    pub total_units: i64,
}

impl InventoryValuation {
    pub fn of<'a>(items: impl IntoIterator<Item = &'a Item>) -> Self {
        items.into_iter().fold(Self::default(), |mut acc, item| {
            acc.total_cost_value += item.current_stock() * item.cost_price();
            acc.total_retail_value += item.current_stock() * item.selling_price();
            acc.total_units += item.current_stock();
            acc.item_count += 1;
            acc
        })
    }

    pub fn potential_margin(&self) -> i64 {
        self.total_retail_value - self.total_cost_value
    }
}
