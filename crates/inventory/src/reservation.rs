use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockhold_core::{Aggregate, AggregateRoot, CartId, DomainError, ItemId, OrderId, ReservationId};
use stockhold_events::Event;

use crate::error::{InventoryError, ensure_positive};

/// Reservation lifecycle. ACTIVE is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Active,
    Completed,
    Cancelled,
    Expired,
}

impl ReservationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReservationStatus::Active)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Active => "ACTIVE",
            ReservationStatus::Completed => "COMPLETED",
            ReservationStatus::Cancelled => "CANCELLED",
            ReservationStatus::Expired => "EXPIRED",
        }
    }
}

impl core::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate root: a time-bounded hold against an item's stock.
///
/// Holds consume availability headroom only; they never change the item's
/// stock counter. Terminal states are immutable and kept for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    id: ReservationId,
    item_id: ItemId,
    quantity: i64,
    cart_id: CartId,
    status: ReservationStatus,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    /// Order that consumed the hold (set on completion).
    order_id: Option<OrderId>,
    version: u64,
    created: bool,
}

impl Reservation {
    /// Create an empty, not-yet-placed aggregate instance.
    pub fn empty(id: ReservationId) -> Self {
        let epoch = DateTime::<Utc>::UNIX_EPOCH;
        Self {
            id,
            item_id: ItemId::from_uuid(Uuid::nil()),
            quantity: 0,
            cart_id: CartId::new(""),
            status: ReservationStatus::Active,
            created_at: epoch,
            expires_at: epoch,
            updated_at: epoch,
            order_id: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ReservationId {
        self.id
    }

    pub fn item_id(&self) -> ItemId {
        self.item_id
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn cart_id(&self) -> &CartId {
        &self.cart_id
    }

    pub fn status(&self) -> ReservationStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn order_id(&self) -> Option<&OrderId> {
        self.order_id.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.created && self.status == ReservationStatus::Active
    }

    /// Active and past its expiry instant (eligible for the sweeper).
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && self.expires_at <= now
    }
}

impl AggregateRoot for Reservation {
    type Id = ReservationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: PlaceReservation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceReservation {
    pub reservation_id: ReservationId,
    pub item_id: ItemId,
    pub cart_id: CartId,
    pub quantity: i64,
    pub ttl: Duration,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeQuantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeQuantity {
    pub reservation_id: ReservationId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelReservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelReservation {
    pub reservation_id: ReservationId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ExpireReservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpireReservation {
    pub reservation_id: ReservationId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CompleteReservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteReservation {
    pub reservation_id: ReservationId,
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReservationCommand {
    Place(PlaceReservation),
    ChangeQuantity(ChangeQuantity),
    Cancel(CancelReservation),
    Expire(ExpireReservation),
    Complete(CompleteReservation),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReservationEvent {
    Placed {
        reservation_id: ReservationId,
        item_id: ItemId,
        cart_id: CartId,
        quantity: i64,
        expires_at: DateTime<Utc>,
        occurred_at: DateTime<Utc>,
    },
    QuantityChanged {
        reservation_id: ReservationId,
        item_id: ItemId,
        previous_quantity: i64,
        quantity: i64,
        occurred_at: DateTime<Utc>,
    },
    Cancelled {
        reservation_id: ReservationId,
        item_id: ItemId,
        occurred_at: DateTime<Utc>,
    },
    Expired {
        reservation_id: ReservationId,
        item_id: ItemId,
        occurred_at: DateTime<Utc>,
    },
    Completed {
        reservation_id: ReservationId,
        item_id: ItemId,
        order_id: OrderId,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for ReservationEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ReservationEvent::Placed { .. } => "inventory.reservation.created",
            ReservationEvent::QuantityChanged { .. } => "inventory.reservation.quantity_changed",
            ReservationEvent::Cancelled { .. } => "inventory.reservation.cancelled",
            ReservationEvent::Expired { .. } => "inventory.reservation.expired",
            ReservationEvent::Completed { .. } => "inventory.reservation.completed",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ReservationEvent::Placed { occurred_at, .. }
            | ReservationEvent::QuantityChanged { occurred_at, .. }
            | ReservationEvent::Cancelled { occurred_at, .. }
            | ReservationEvent::Expired { occurred_at, .. }
            | ReservationEvent::Completed { occurred_at, .. } => *occurred_at,
        }
    }
}

impl Aggregate for Reservation {
    type Command = ReservationCommand;
    type Event = ReservationEvent;
    type Error = InventoryError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ReservationEvent::Placed {
                reservation_id,
                item_id,
                cart_id,
                quantity,
                expires_at,
                occurred_at,
            } => {
                self.id = *reservation_id;
                self.item_id = *item_id;
                self.cart_id = cart_id.clone();
                self.quantity = *quantity;
                self.status = ReservationStatus::Active;
                self.created_at = *occurred_at;
                self.expires_at = *expires_at;
                self.updated_at = *occurred_at;
                self.created = true;
            }
            ReservationEvent::QuantityChanged {
                quantity,
                occurred_at,
                ..
            } => {
                self.quantity = *quantity;
                self.updated_at = *occurred_at;
            }
            ReservationEvent::Cancelled { occurred_at, .. } => {
                self.status = ReservationStatus::Cancelled;
                self.updated_at = *occurred_at;
            }
            ReservationEvent::Expired { occurred_at, .. } => {
                self.status = ReservationStatus::Expired;
                self.updated_at = *occurred_at;
            }
            ReservationEvent::Completed {
                order_id,
                occurred_at,
                ..
            } => {
                self.status = ReservationStatus::Completed;
                self.order_id = Some(order_id.clone());
                self.updated_at = *occurred_at;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ReservationCommand::Place(cmd) => self.handle_place(cmd),
            ReservationCommand::ChangeQuantity(cmd) => self.handle_change_quantity(cmd),
            ReservationCommand::Cancel(cmd) => self.handle_cancel(cmd),
            ReservationCommand::Expire(cmd) => self.handle_expire(cmd),
            ReservationCommand::Complete(cmd) => self.handle_complete(cmd),
        }
    }
}

impl Reservation {
    fn ensure_exists(&self, reservation_id: ReservationId) -> Result<(), InventoryError> {
        if !self.created || self.id != reservation_id {
            return Err(InventoryError::reservation_not_found(reservation_id));
        }
        Ok(())
    }

    fn ensure_active(&self) -> Result<(), InventoryError> {
        if self.status.is_terminal() {
            return Err(InventoryError::ReservationNotActive {
                reservation_id: self.id,
                status: self.status,
            });
        }
        Ok(())
    }

    fn handle_place(&self, cmd: &PlaceReservation) -> Result<Vec<ReservationEvent>, InventoryError> {
        if self.created {
            return Err(DomainError::invariant("reservation already exists").into());
        }
        ensure_positive(cmd.quantity)?;
        if cmd.ttl <= Duration::zero() {
            return Err(DomainError::validation("reservation ttl must be positive").into());
        }
        let expires_at = cmd
            .occurred_at
            .checked_add_signed(cmd.ttl)
            .ok_or_else(|| DomainError::validation("reservation ttl overflows the calendar"))?;

        Ok(vec![ReservationEvent::Placed {
            reservation_id: cmd.reservation_id,
            item_id: cmd.item_id,
            cart_id: cmd.cart_id.clone(),
            quantity: cmd.quantity,
            expires_at,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_change_quantity(
        &self,
        cmd: &ChangeQuantity,
    ) -> Result<Vec<ReservationEvent>, InventoryError> {
        self.ensure_exists(cmd.reservation_id)?;
        self.ensure_active()?;
        ensure_positive(cmd.quantity)?;

        if cmd.quantity == self.quantity {
            return Ok(vec![]);
        }

        Ok(vec![ReservationEvent::QuantityChanged {
            reservation_id: self.id,
            item_id: self.item_id,
            previous_quantity: self.quantity,
            quantity: cmd.quantity,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_cancel(&self, cmd: &CancelReservation) -> Result<Vec<ReservationEvent>, InventoryError> {
        self.ensure_exists(cmd.reservation_id)?;

        // Cancelling a finished hold is an idempotent no-op.
        if self.status.is_terminal() {
            return Ok(vec![]);
        }

        Ok(vec![ReservationEvent::Cancelled {
            reservation_id: self.id,
            item_id: self.item_id,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_expire(&self, cmd: &ExpireReservation) -> Result<Vec<ReservationEvent>, InventoryError> {
        self.ensure_exists(cmd.reservation_id)?;
        self.ensure_active()?;

        if self.expires_at > cmd.occurred_at {
            return Err(DomainError::invariant(format!(
                "reservation {} does not expire until {}",
                self.id, self.expires_at
            ))
            .into());
        }

        Ok(vec![ReservationEvent::Expired {
            reservation_id: self.id,
            item_id: self.item_id,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_complete(
        &self,
        cmd: &CompleteReservation,
    ) -> Result<Vec<ReservationEvent>, InventoryError> {
        self.ensure_exists(cmd.reservation_id)?;
        self.ensure_active()?;

        Ok(vec![ReservationEvent::Completed {
            reservation_id: self.id,
            item_id: self.item_id,
            order_id: cmd.order_id.clone(),
            occurred_at: cmd.occurred_at,
        }])
    }
}
