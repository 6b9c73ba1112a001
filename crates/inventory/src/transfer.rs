use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockhold_core::{Aggregate, AggregateRoot, DomainError, ItemId, LocationId, TransferId};
use stockhold_events::Event;

use crate::error::{InventoryError, ensure_positive};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferStatus {
    Pending,
    InTransit,
    Completed,
    Cancelled,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "PENDING",
            TransferStatus::InTransit => "IN_TRANSIT",
            TransferStatus::Completed => "COMPLETED",
            TransferStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferStatus::Completed | TransferStatus::Cancelled)
    }
}

impl core::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate root: movement of units from one location to another.
///
/// Only completion touches stock (one outbound TRANSFER ledger entry on the
/// source item).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    id: TransferId,
    item_id: ItemId,
    quantity: i64,
    from_location: LocationId,
    to_location: LocationId,
    status: TransferStatus,
    requested_by: String,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    dispatched_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Transfer {
    pub fn empty(id: TransferId) -> Self {
        let epoch = DateTime::<Utc>::UNIX_EPOCH;
        Self {
            id,
            item_id: ItemId::from_uuid(Uuid::nil()),
            quantity: 0,
            from_location: LocationId::new(""),
            to_location: LocationId::new(""),
            status: TransferStatus::Pending,
            requested_by: String::new(),
            notes: None,
            created_at: epoch,
            updated_at: epoch,
            dispatched_at: None,
            completed_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> TransferId {
        self.id
    }

    pub fn item_id(&self) -> ItemId {
        self.item_id
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn from_location(&self) -> &LocationId {
        &self.from_location
    }

    pub fn to_location(&self) -> &LocationId {
        &self.to_location
    }

    pub fn status(&self) -> TransferStatus {
        self.status
    }

    pub fn requested_by(&self) -> &str {
        &self.requested_by
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn dispatched_at(&self) -> Option<DateTime<Utc>> {
        self.dispatched_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }
}

impl AggregateRoot for Transfer {
    type Id = TransferId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestTransfer {
    pub transfer_id: TransferId,
    pub item_id: ItemId,
    pub quantity: i64,
    pub from_location: LocationId,
    pub to_location: LocationId,
    pub requested_by: String,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchTransfer {
    pub transfer_id: TransferId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteTransfer {
    pub transfer_id: TransferId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelTransfer {
    pub transfer_id: TransferId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferCommand {
    Request(RequestTransfer),
    Dispatch(DispatchTransfer),
    Complete(CompleteTransfer),
    Cancel(CancelTransfer),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransferEvent {
    Requested {
        transfer_id: TransferId,
        item_id: ItemId,
        quantity: i64,
        from_location: LocationId,
        to_location: LocationId,
        requested_by: String,
        notes: Option<String>,
        occurred_at: DateTime<Utc>,
    },
    Dispatched {
        transfer_id: TransferId,
        occurred_at: DateTime<Utc>,
    },
    Completed {
        transfer_id: TransferId,
        item_id: ItemId,
        quantity: i64,
        occurred_at: DateTime<Utc>,
    },
    Cancelled {
        transfer_id: TransferId,
        reason: Option<String>,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for TransferEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TransferEvent::Requested { .. } => "inventory.transfer.requested",
            TransferEvent::Dispatched { .. } => "inventory.transfer.dispatched",
            TransferEvent::Completed { .. } => "inventory.transfer.completed",
            TransferEvent::Cancelled { .. } => "inventory.transfer.cancelled",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            TransferEvent::Requested { occurred_at, .. }
            | TransferEvent::Dispatched { occurred_at, .. }
            | TransferEvent::Completed { occurred_at, .. }
            | TransferEvent::Cancelled { occurred_at, .. } => *occurred_at,
        }
    }
}

impl Aggregate for Transfer {
    type Command = TransferCommand;
    type Event = TransferEvent;
    type Error = InventoryError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            TransferEvent::Requested {
                transfer_id,
                item_id,
                quantity,
                from_location,
                to_location,
                requested_by,
                notes,
                occurred_at,
            } => {
                self.id = *transfer_id;
                self.item_id = *item_id;
                self.quantity = *quantity;
                self.from_location = from_location.clone();
                self.to_location = to_location.clone();
                self.requested_by = requested_by.clone();
                self.notes = notes.clone();
                self.status = TransferStatus::Pending;
                self.created_at = *occurred_at;
                self.updated_at = *occurred_at;
                self.created = true;
            }
            TransferEvent::Dispatched { occurred_at, .. } => {
                self.status = TransferStatus::InTransit;
                self.dispatched_at = Some(*occurred_at);
                self.updated_at = *occurred_at;
            }
            TransferEvent::Completed { occurred_at, .. } => {
                self.status = TransferStatus::Completed;
                self.completed_at = Some(*occurred_at);
                self.updated_at = *occurred_at;
            }
            TransferEvent::Cancelled {
                reason,
                occurred_at,
                ..
            } => {
                self.status = TransferStatus::Cancelled;
                if reason.is_some() {
                    self.notes = reason.clone();
                }
                self.updated_at = *occurred_at;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            TransferCommand::Request(cmd) => self.handle_request(cmd),
            TransferCommand::Dispatch(cmd) => {
                self.ensure_exists(cmd.transfer_id)?;
                self.ensure_transition(TransferStatus::InTransit)?;
                Ok(vec![TransferEvent::Dispatched {
                    transfer_id: self.id,
                    occurred_at: cmd.occurred_at,
                }])
            }
            TransferCommand::Complete(cmd) => {
                self.ensure_exists(cmd.transfer_id)?;
                self.ensure_transition(TransferStatus::Completed)?;
                Ok(vec![TransferEvent::Completed {
                    transfer_id: self.id,
                    item_id: self.item_id,
                    quantity: self.quantity,
                    occurred_at: cmd.occurred_at,
                }])
            }
            TransferCommand::Cancel(cmd) => {
                self.ensure_exists(cmd.transfer_id)?;
                self.ensure_transition(TransferStatus::Cancelled)?;
                Ok(vec![TransferEvent::Cancelled {
                    transfer_id: self.id,
                    reason: cmd.reason.clone(),
                    occurred_at: cmd.occurred_at,
                }])
            }
        }
    }
}

impl Transfer {
    fn ensure_exists(&self, transfer_id: TransferId) -> Result<(), InventoryError> {
        if !self.created || self.id != transfer_id {
            return Err(InventoryError::TransferNotFound { transfer_id });
        }
        Ok(())
    }

    fn ensure_transition(&self, to: TransferStatus) -> Result<(), InventoryError> {
        let allowed = matches!(
            (self.status, to),
            (TransferStatus::Pending, TransferStatus::InTransit)
                | (TransferStatus::InTransit, TransferStatus::Completed)
                | (TransferStatus::Pending, TransferStatus::Cancelled)
                | (TransferStatus::InTransit, TransferStatus::Cancelled)
        );
        if !allowed {
            return Err(InventoryError::InvalidTransferTransition {
                transfer_id: self.id,
                from: self.status,
                to,
            });
        }
        Ok(())
    }

    fn handle_request(&self, cmd: &RequestTransfer) -> Result<Vec<TransferEvent>, InventoryError> {
        if self.created {
            return Err(DomainError::invariant("transfer already exists").into());
        }
        ensure_positive(cmd.quantity)?;
        if cmd.from_location.as_str().trim().is_empty() || cmd.to_location.as_str().trim().is_empty() {
            return Err(DomainError::validation("transfer locations cannot be empty").into());
        }
        if cmd.from_location == cmd.to_location {
            return Err(DomainError::validation("transfer source and destination must differ").into());
        }

        Ok(vec![TransferEvent::Requested {
            transfer_id: cmd.transfer_id,
            item_id: cmd.item_id,
            quantity: cmd.quantity,
            from_location: cmd.from_location.clone(),
            to_location: cmd.to_location.clone(),
            requested_by: cmd.requested_by.clone(),
            notes: cmd.notes.clone(),
            occurred_at: cmd.occurred_at,
        }])
    }
}
