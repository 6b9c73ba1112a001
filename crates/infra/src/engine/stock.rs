use std::sync::Arc;

use tracing::{debug, info};

use stockhold_core::{Aggregate, AggregateRoot, ItemId, LocationId, TransferId};
use stockhold_inventory::{
    CancelTransfer, CompleteTransfer, DispatchTransfer, InventoryError, Item, LedgerEntry,
    OperationType, RequestTransfer, Transfer, TransferCommand, available_to_sell, ensure_positive,
};

use super::context::{EngineContext, ITEM_AGGREGATE, PendingEvents, TRANSFER_AGGREGATE};
use crate::error::EngineResult;
use crate::store::Changeset;

/// Non-sale stock movements: receiving, manual corrections and
/// inter-location transfers.
#[derive(Debug, Clone)]
pub struct StockOperations {
    ctx: Arc<EngineContext>,
}

/// Input for [`StockOperations::create_transfer`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TransferRequest {
    pub item_id: ItemId,
    pub quantity: i64,
    pub from_location: LocationId,
    pub to_location: LocationId,
    pub requested_by: String,
    #[serde(default)]
    pub notes: Option<String>,
}

impl StockOperations {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx }
    }

    /// Receive goods (purchase order arrival, returns to shelf).
    pub fn intake(
        &self,
        item_id: ItemId,
        quantity: i64,
        performed_by: &str,
        notes: Option<String>,
    ) -> EngineResult<Item> {
        ensure_positive(quantity)?;
        let ctx = &self.ctx;
        ctx.locks.with_item(item_id, || {
            let entry = LedgerEntry::new(item_id, OperationType::Intake, quantity, performed_by, ctx.now())
                .with_notes(notes);
            let item = self.record(item_id, entry)?;
            info!(item_id = %item_id, quantity, stock = item.current_stock(), "stock received");
            Ok(item)
        })
    }

    /// Manual correction (count discrepancy, damage, shrinkage).
    ///
    /// A negative delta may not dip into units held by ACTIVE reservations.
    pub fn adjust(
        &self,
        item_id: ItemId,
        delta: i64,
        performed_by: &str,
        reason: Option<String>,
    ) -> EngineResult<Item> {
        if delta == 0 {
            return Err(InventoryError::InvalidQuantity { quantity: delta }.into());
        }
        let ctx = &self.ctx;
        ctx.locks.with_item(item_id, || {
            if delta < 0 {
                let removed = delta.saturating_neg();
                let available = ctx.available_now(item_id, None)?;
                if removed > available {
                    return Err(InventoryError::insufficient(item_id, removed, available).into());
                }
            }

            let entry = LedgerEntry::new(item_id, OperationType::Adjustment, delta, performed_by, ctx.now())
                .with_reason(reason);
            let item = self.record(item_id, entry)?;
            info!(item_id = %item_id, delta, stock = item.current_stock(), "stock adjusted");
            Ok(item)
        })
    }

    /// Apply one entry to the item and commit both. Caller holds the lock.
    fn record(&self, item_id: ItemId, entry: LedgerEntry) -> EngineResult<Item> {
        let ctx = &self.ctx;
        entry.validate()?;

        let mut item = ctx.load_item(item_id)?;
        let expected = item.version();
        item.apply_entry(&entry)?;

        let mut feed = PendingEvents::new();
        feed.push(*item_id.as_uuid(), ITEM_AGGREGATE, item.version(), &entry);

        let mut changeset = Changeset::new();
        changeset.put_item(item.clone(), expected).append(entry);
        ctx.commit(changeset, feed)?;
        Ok(item)
    }

    /// Open a PENDING transfer. Stock is not checked or moved until completion.
    pub fn create_transfer(&self, request: TransferRequest) -> EngineResult<Transfer> {
        let ctx = &self.ctx;
        ctx.load_item(request.item_id)?;

        let transfer_id = TransferId::new();
        let command = TransferCommand::Request(RequestTransfer {
            transfer_id,
            item_id: request.item_id,
            quantity: request.quantity,
            from_location: request.from_location,
            to_location: request.to_location,
            requested_by: request.requested_by,
            notes: request.notes,
            occurred_at: ctx.now(),
        });
        let transfer = self.execute_transfer(Transfer::empty(transfer_id), &command, None)?;
        info!(
            transfer_id = %transfer_id,
            item_id = %transfer.item_id(),
            quantity = transfer.quantity(),
            from = %transfer.from_location(),
            to = %transfer.to_location(),
            "transfer requested"
        );
        Ok(transfer)
    }

    pub fn dispatch_transfer(&self, transfer_id: TransferId) -> EngineResult<Transfer> {
        let current = self.get_transfer(transfer_id)?;
        let command = TransferCommand::Dispatch(DispatchTransfer {
            transfer_id,
            occurred_at: self.ctx.now(),
        });
        let transfer = self.execute_transfer(current, &command, None)?;
        debug!(transfer_id = %transfer_id, "transfer dispatched");
        Ok(transfer)
    }

    /// Finish the transfer and deduct the units from the item.
    ///
    /// Availability is re-checked at this point: the units may have been sold
    /// or reserved since the transfer was requested.
    pub fn complete_transfer(&self, transfer_id: TransferId, performed_by: &str) -> EngineResult<Transfer> {
        let ctx = &self.ctx;
        let item_id = self.get_transfer(transfer_id)?.item_id();

        ctx.locks.with_item(item_id, || {
            let current = self.get_transfer(transfer_id)?;
            let now = ctx.now();
            let command = TransferCommand::Complete(CompleteTransfer {
                transfer_id,
                occurred_at: now,
            });
            // Status check first so a bad transition is reported before stock.
            current.handle(&command)?;

            let (mut item, holds) = ctx.availability_snapshot(item_id)?;
            let available = available_to_sell(&item, &holds, None);
            if current.quantity() > available {
                return Err(InventoryError::insufficient(item_id, current.quantity(), available).into());
            }

            let entry = LedgerEntry::new(item_id, OperationType::Transfer, -current.quantity(), performed_by, now)
                .with_transfer(transfer_id)
                .with_notes(Some(format!(
                    "{} -> {}",
                    current.from_location(),
                    current.to_location()
                )));
            entry.validate()?;
            let item_expected = item.version();
            item.apply_entry(&entry)?;

            let mut feed = PendingEvents::new();
            feed.push(*item_id.as_uuid(), ITEM_AGGREGATE, item.version(), &entry);

            let mut stock_changes = Changeset::new();
            stock_changes.put_item(item.clone(), item_expected).append(entry);

            let transfer = self.execute_transfer(current, &command, Some((stock_changes, feed)))?;
            info!(
                transfer_id = %transfer_id,
                item_id = %item_id,
                quantity = transfer.quantity(),
                stock = item.current_stock(),
                "transfer completed"
            );
            Ok(transfer)
        })
    }

    pub fn cancel_transfer(&self, transfer_id: TransferId, reason: Option<String>) -> EngineResult<Transfer> {
        let current = self.get_transfer(transfer_id)?;
        let command = TransferCommand::Cancel(CancelTransfer {
            transfer_id,
            reason,
            occurred_at: self.ctx.now(),
        });
        let transfer = self.execute_transfer(current, &command, None)?;
        debug!(transfer_id = %transfer_id, "transfer cancelled");
        Ok(transfer)
    }

    pub fn get_transfer(&self, transfer_id: TransferId) -> EngineResult<Transfer> {
        self.ctx
            .store
            .get_transfer(transfer_id)?
            .ok_or_else(|| InventoryError::TransferNotFound { transfer_id }.into())
    }

    pub fn list_transfers(&self) -> EngineResult<Vec<Transfer>> {
        Ok(self.ctx.store.list_transfers()?)
    }

    /// Full ledger for one item, oldest first.
    pub fn ledger(&self, item_id: ItemId) -> EngineResult<Vec<LedgerEntry>> {
        self.ctx.load_item(item_id)?;
        Ok(self.ctx.store.ledger_for_item(item_id)?)
    }

    /// Handle, apply and commit a transfer command, optionally together with
    /// stock changes that must land in the same commit.
    fn execute_transfer(
        &self,
        mut transfer: Transfer,
        command: &TransferCommand,
        with: Option<(Changeset, PendingEvents)>,
    ) -> EngineResult<Transfer> {
        let events = transfer.handle(command)?;
        let expected = transfer.version();
        let (mut changeset, mut feed) = with.unwrap_or_default();

        for event in &events {
            transfer.apply(event);
            feed.push(
                *transfer.id_typed().as_uuid(),
                TRANSFER_AGGREGATE,
                transfer.version(),
                event,
            );
        }

        changeset.put_transfer(transfer.clone(), expected);
        self.ctx.commit(changeset, feed)?;
        Ok(transfer)
    }
}
