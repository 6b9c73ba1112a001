//! Available-to-sell computation.
//!
//! Pure functions over an item snapshot and its reservations. Callers must
//! hold the item's write lock (or a consistent snapshot) so the result is not
//! stale by the time it is acted on.

use stockhold_core::ReservationId;

use crate::item::Item;
use crate::reservation::Reservation;

/// Sum of ACTIVE hold quantities for the item, optionally ignoring one hold.
pub fn reserved_quantity<'a>(
    item: &Item,
    reservations: impl IntoIterator<Item = &'a Reservation>,
    exclude: Option<ReservationId>,
) -> i64 {
    let item_id = item.id_typed();
    reservations
        .into_iter()
        .filter(|r| r.item_id() == item_id && r.is_active())
        .filter(|r| Some(r.id_typed()) != exclude)
        .map(|r| r.quantity())
        .sum()
}

/// `current_stock - reserved_quantity`.
///
/// `exclude` computes availability as if that hold did not exist, which is
/// how in-place quantity updates and reservation-backed sales re-validate.
pub fn available_to_sell<'a>(
    item: &Item,
    reservations: impl IntoIterator<Item = &'a Reservation>,
    exclude: Option<ReservationId>,
) -> i64 {
    item.current_stock() - reserved_quantity(item, reservations, exclude)
}
