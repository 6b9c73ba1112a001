//! Inventory ledger and reservation domain.
//!
//! This crate contains the business rules for stock, holds and sales,
//! implemented purely as deterministic domain logic (no IO, no locking, no
//! storage). The infra crate wires these rules to a store under a per-item
//! single-writer discipline.

pub mod availability;
pub mod calendar;
pub mod error;
pub mod item;
pub mod ledger;
pub mod reorder;
pub mod reservation;
pub mod statistics;
pub mod transfer;
pub mod valuation;

pub use availability::{available_to_sell, reserved_quantity};
pub use calendar::{CalendarBuckets, day_key, month_key, week_key, week_number};
pub use error::{InventoryError, InventoryResult, ensure_positive};
pub use item::{Item, ItemUpdate, NewItem};
pub use ledger::{LedgerEntry, OperationType, replay_stock};
pub use reorder::{
    ReorderPolicy, ReorderPriority, ReorderSuggestion, sales_velocity, sort_suggestions,
    sort_suggestions_by,
};
pub use reservation::{
    CancelReservation, ChangeQuantity, CompleteReservation, ExpireReservation, PlaceReservation,
    Reservation, ReservationCommand, ReservationEvent, ReservationStatus,
};
pub use statistics::SalesStatistics;
pub use transfer::{
    CancelTransfer, CompleteTransfer, DispatchTransfer, RequestTransfer, Transfer, TransferCommand,
    TransferEvent, TransferStatus,
};
pub use valuation::InventoryValuation;
