use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;
use tracing::debug;

use stockhold_core::ItemId;
use stockhold_inventory::{
    InventoryValuation, LedgerEntry, ReorderSuggestion, sales_velocity, sort_suggestions,
    sort_suggestions_by,
};

use super::context::EngineContext;
use crate::error::EngineResult;

/// Reorder suggestions and stock valuation over the whole catalog.
#[derive(Debug, Clone)]
pub struct ReorderAdvisor {
    ctx: Arc<EngineContext>,
}

impl ReorderAdvisor {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx }
    }

    /// Items at or under the trigger ratio, most urgent first.
    pub fn suggest_reorders(&self) -> EngineResult<Vec<ReorderSuggestion>> {
        let mut suggestions = self.collect()?;
        sort_suggestions(&mut suggestions);
        Ok(suggestions)
    }

    /// Same as [`suggest_reorders`](Self::suggest_reorders) with a custom
    /// ordering among equal priorities.
    pub fn suggest_reorders_by<F>(&self, tie_break: F) -> EngineResult<Vec<ReorderSuggestion>>
    where
        F: FnMut(&ReorderSuggestion, &ReorderSuggestion) -> Ordering,
    {
        let mut suggestions = self.collect()?;
        sort_suggestions_by(&mut suggestions, tie_break);
        Ok(suggestions)
    }

    /// Average daily units sold over the configured window.
    pub fn sales_velocity(&self, item_id: ItemId) -> EngineResult<f64> {
        let ctx = &self.ctx;
        ctx.load_item(item_id)?;
        let entries = ctx.store.ledger_for_item(item_id)?;
        Ok(sales_velocity(
            &entries,
            ctx.now(),
            ctx.config.velocity_window_days,
        ))
    }

    pub fn valuation(&self) -> EngineResult<InventoryValuation> {
        let items = self.ctx.store.list_items()?;
        Ok(InventoryValuation::of(&items))
    }

    fn collect(&self) -> EngineResult<Vec<ReorderSuggestion>> {
        let ctx = &self.ctx;
        let now = ctx.now();
        let window = ctx.config.velocity_window_days;
        let policy = ctx.config.reorder_policy();

        // One scan of recent sales instead of one ledger read per item.
        let mut sales: HashMap<ItemId, Vec<LedgerEntry>> = HashMap::new();
        for entry in ctx.store.sales_since(now - Duration::days(window.max(1)))? {
            sales.entry(entry.item_id).or_default().push(entry);
        }

        let suggestions: Vec<ReorderSuggestion> = ctx
            .store
            .list_items()?
            .iter()
            .filter_map(|item| {
                let entries = sales.get(&item.id_typed()).map(Vec::as_slice).unwrap_or_default();
                policy.evaluate(item, sales_velocity(entries, now, window))
            })
            .collect();

        debug!(suggestions = suggestions.len(), "reorder scan finished");
        Ok(suggestions)
    }
}
