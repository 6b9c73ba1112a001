//! Caller-recoverable engine errors.
//!
//! Every variant carries enough context (ids, requested vs available) for the
//! caller to present a message or retry.

use thiserror::Error;

use stockhold_core::{DomainError, ItemId, ReservationId, TransferId};

use crate::reservation::ReservationStatus;
use crate::transfer::TransferStatus;

pub type InventoryResult<T> = Result<T, InventoryError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InventoryError {
    #[error("item {item_id} not found")]
    ItemNotFound { item_id: ItemId },

    #[error("item {item_id} already exists")]
    DuplicateItem { item_id: ItemId },

    #[error("reservation {reservation_id} not found")]
    ReservationNotFound { reservation_id: ReservationId },

    /// Attempted to mutate, complete or expire a reservation in a terminal state.
    #[error("reservation {reservation_id} is not active (status: {status})")]
    ReservationNotActive {
        reservation_id: ReservationId,
        status: ReservationStatus,
    },

    #[error("insufficient stock for item {item_id}: requested {requested}, available {available}")]
    InsufficientStock {
        item_id: ItemId,
        requested: i64,
        available: i64,
    },

    #[error("invalid quantity {quantity}")]
    InvalidQuantity { quantity: i64 },

    #[error("reservation {reservation_id} holds item {reserved_item}, not {requested_item}")]
    ReservationItemMismatch {
        reservation_id: ReservationId,
        reserved_item: ItemId,
        requested_item: ItemId,
    },

    #[error("transfer {transfer_id} not found")]
    TransferNotFound { transfer_id: TransferId },

    #[error("transfer {transfer_id} cannot move from {from} to {to}")]
    InvalidTransferTransition {
        transfer_id: TransferId,
        from: TransferStatus,
        to: TransferStatus,
    },

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl InventoryError {
    pub fn item_not_found(item_id: ItemId) -> Self {
        Self::ItemNotFound { item_id }
    }

    pub fn reservation_not_found(reservation_id: ReservationId) -> Self {
        Self::ReservationNotFound { reservation_id }
    }

    pub fn insufficient(item_id: ItemId, requested: i64, available: i64) -> Self {
        Self::InsufficientStock {
            item_id,
            requested,
            available,
        }
    }

    /// Short stable code, used for logs and remote error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            InventoryError::ItemNotFound { .. } => "item_not_found",
            InventoryError::DuplicateItem { .. } => "duplicate_item",
            InventoryError::ReservationNotFound { .. } => "reservation_not_found",
            InventoryError::ReservationNotActive { .. } => "reservation_not_active",
            InventoryError::InsufficientStock { .. } => "insufficient_stock",
            InventoryError::InvalidQuantity { .. } => "invalid_quantity",
            InventoryError::ReservationItemMismatch { .. } => "reservation_item_mismatch",
            InventoryError::TransferNotFound { .. } => "transfer_not_found",
            InventoryError::InvalidTransferTransition { .. } => "invalid_transfer_transition",
            InventoryError::Domain(DomainError::Validation(_)) => "validation_error",
            InventoryError::Domain(DomainError::InvariantViolation(_)) => "invariant_violation",
            InventoryError::Domain(DomainError::InvalidId(_)) => "invalid_id",
        }
    }
}

/// Reject zero or negative quantities.
pub fn ensure_positive(quantity: i64) -> InventoryResult<()> {
    if quantity <= 0 {
        return Err(InventoryError::InvalidQuantity { quantity });
    }
    Ok(())
}
