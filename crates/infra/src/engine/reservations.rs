use std::sync::Arc;

use tracing::{debug, info};

use stockhold_core::{Aggregate, AggregateRoot, CartId, ItemId, ReservationId};
use stockhold_inventory::{
    CancelReservation, ChangeQuantity, InventoryError, PlaceReservation, Reservation,
    ReservationCommand, available_to_sell, ensure_positive,
};

use super::context::{EngineContext, PendingEvents, RESERVATION_AGGREGATE};
use crate::error::EngineResult;
use crate::store::Changeset;

/// Creates, resizes and releases holds.
///
/// Every mutation runs under the held item's lock: read item and holds,
/// validate availability, commit.
#[derive(Debug, Clone)]
pub struct ReservationManager {
    ctx: Arc<EngineContext>,
}

impl ReservationManager {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx }
    }

    pub fn reserve(&self, item_id: ItemId, quantity: i64, cart_id: CartId) -> EngineResult<Reservation> {
        ensure_positive(quantity)?;
        let ctx = &self.ctx;

        ctx.locks.with_item(item_id, || {
            let (item, holds) = ctx.availability_snapshot(item_id)?;
            let available = available_to_sell(&item, &holds, None);
            if quantity > available {
                return Err(InventoryError::insufficient(item_id, quantity, available).into());
            }

            let reservation_id = ReservationId::new();
            let command = ReservationCommand::Place(PlaceReservation {
                reservation_id,
                item_id,
                cart_id,
                quantity,
                ttl: ctx.config.reservation_ttl_chrono(),
                occurred_at: ctx.now(),
            });
            let reservation = execute(ctx, Reservation::empty(reservation_id), &command)?;

            debug!(
                item_id = %item_id,
                reservation_id = %reservation_id,
                quantity,
                available = available - quantity,
                "reservation placed"
            );
            Ok(reservation)
        })
    }

    /// Resize an ACTIVE hold in place; status and expiry are untouched.
    pub fn update_quantity(&self, reservation_id: ReservationId, quantity: i64) -> EngineResult<Reservation> {
        ensure_positive(quantity)?;
        let ctx = &self.ctx;
        let item_id = self.get(reservation_id)?.item_id();

        ctx.locks.with_item(item_id, || {
            let current = load(ctx, reservation_id)?;
            if !current.is_active() {
                return Err(InventoryError::ReservationNotActive {
                    reservation_id,
                    status: current.status(),
                }
                .into());
            }

            let (item, holds) = ctx.availability_snapshot(item_id)?;
            let available = available_to_sell(&item, &holds, Some(reservation_id));
            if quantity > available {
                return Err(InventoryError::insufficient(item_id, quantity, available).into());
            }

            let command = ReservationCommand::ChangeQuantity(ChangeQuantity {
                reservation_id,
                quantity,
                occurred_at: ctx.now(),
            });
            let reservation = execute(ctx, current, &command)?;

            debug!(
                item_id = %item_id,
                reservation_id = %reservation_id,
                quantity,
                available = available - quantity,
                "reservation resized"
            );
            Ok(reservation)
        })
    }

    /// Release a hold. Cancelling a terminal reservation is a no-op.
    pub fn cancel(&self, reservation_id: ReservationId) -> EngineResult<Reservation> {
        let ctx = &self.ctx;
        let item_id = self.get(reservation_id)?.item_id();

        ctx.locks.with_item(item_id, || {
            let current = load(ctx, reservation_id)?;
            let command = ReservationCommand::Cancel(CancelReservation {
                reservation_id,
                occurred_at: ctx.now(),
            });
            let reservation = execute(ctx, current, &command)?;
            debug!(reservation_id = %reservation_id, status = %reservation.status(), "reservation cancelled");
            Ok(reservation)
        })
    }

    pub fn get(&self, reservation_id: ReservationId) -> EngineResult<Reservation> {
        load(&self.ctx, reservation_id)
    }

    /// ACTIVE holds, optionally limited to one cart.
    pub fn list_active(&self, cart_id: Option<&CartId>) -> EngineResult<Vec<Reservation>> {
        let store = &self.ctx.store;
        Ok(match cart_id {
            Some(cart) => store
                .reservations_for_cart(cart)?
                .into_iter()
                .filter(Reservation::is_active)
                .collect(),
            None => store.active_reservations()?,
        })
    }

    /// Every reservation (any status) created for the cart.
    pub fn list_for_cart(&self, cart_id: &CartId) -> EngineResult<Vec<Reservation>> {
        Ok(self.ctx.store.reservations_for_cart(cart_id)?)
    }

    /// Release every ACTIVE hold in the cart (abandoned checkout).
    pub fn cancel_cart(&self, cart_id: &CartId) -> EngineResult<Vec<Reservation>> {
        let active = self.list_active(Some(cart_id))?;
        let mut released = Vec::with_capacity(active.len());
        for reservation in active {
            released.push(self.cancel(reservation.id_typed())?);
        }
        if !released.is_empty() {
            info!(cart_id = %cart_id, released = released.len(), "cart released");
        }
        Ok(released)
    }
}

pub(crate) fn load(ctx: &EngineContext, reservation_id: ReservationId) -> EngineResult<Reservation> {
    ctx.store
        .get_reservation(reservation_id)?
        .ok_or_else(|| InventoryError::reservation_not_found(reservation_id).into())
}

/// Handle a command, apply its events and commit the result.
///
/// Commands that emit nothing (idempotent cancel, unchanged quantity) skip
/// the commit and return the reservation as stored.
pub(crate) fn execute(
    ctx: &EngineContext,
    mut reservation: Reservation,
    command: &ReservationCommand,
) -> EngineResult<Reservation> {
    let events = reservation.handle(command)?;
    if events.is_empty() {
        return Ok(reservation);
    }

    let expected = reservation.version();
    let mut feed = PendingEvents::new();
    for event in &events {
        reservation.apply(event);
        feed.push(
            *reservation.id_typed().as_uuid(),
            RESERVATION_AGGREGATE,
            reservation.version(),
            event,
        );
    }

    let mut changeset = Changeset::new();
    changeset.put_reservation(reservation.clone(), expected);
    ctx.commit(changeset, feed)?;
    Ok(reservation)
}
