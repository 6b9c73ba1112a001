use std::sync::Arc;

use serde::Serialize;

use stockhold_core::{ItemId, ReservationId};
use stockhold_inventory::reserved_quantity;

use super::context::EngineContext;
use crate::error::EngineResult;

/// Stock, held units and availability read under one lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StockLevel {
    pub item_id: ItemId,
    pub current_stock: i64,
    pub reserved: i64,
    pub available_to_sell: i64,
}

/// Read-side availability queries.
///
/// Each query takes the item's lock, so the answer reflects a state some
/// writer actually committed.
#[derive(Debug, Clone)]
pub struct AvailabilityCalculator {
    ctx: Arc<EngineContext>,
}

impl AvailabilityCalculator {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx }
    }

    pub fn available_to_sell(&self, item_id: ItemId) -> EngineResult<i64> {
        self.available_to_sell_excluding(item_id, None)
    }

    /// Availability as if `exclude` did not exist.
    pub fn available_to_sell_excluding(
        &self,
        item_id: ItemId,
        exclude: Option<ReservationId>,
    ) -> EngineResult<i64> {
        let ctx = &self.ctx;
        ctx.locks
            .with_item(item_id, || ctx.available_now(item_id, exclude))
    }

    /// Units currently held by ACTIVE reservations.
    pub fn reserved(&self, item_id: ItemId) -> EngineResult<i64> {
        let ctx = &self.ctx;
        ctx.locks.with_item(item_id, || {
            let (item, reservations) = ctx.availability_snapshot(item_id)?;
            Ok(reserved_quantity(&item, &reservations, None))
        })
    }

    pub fn stock_level(&self, item_id: ItemId) -> EngineResult<StockLevel> {
        let ctx = &self.ctx;
        ctx.locks.with_item(item_id, || {
            let (item, reservations) = ctx.availability_snapshot(item_id)?;
            let reserved = reserved_quantity(&item, &reservations, None);
            Ok(StockLevel {
                item_id,
                current_stock: item.current_stock(),
                reserved,
                available_to_sell: item.current_stock() - reserved,
            })
        })
    }
}
