//! End-to-end engine tests over the in-memory store.
//!
//! Covers the checkout flows (reserve, sell, expire), the concurrency
//! guarantees (no oversell under racing threads) and the ledger/statistics
//! consistency properties.

use std::collections::HashSet;
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration as StdDuration;

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

use stockhold_core::{
    AggregateRoot, CartId, Clock, CustomerId, DomainError, ItemId, LocationId, ManualClock, OrderId,
    ReservationId, TransferId,
};
use stockhold_inventory::{
    InventoryError, Item, LedgerEntry, NewItem, OperationType, ReorderPriority, Reservation,
    ReservationStatus, SalesStatistics, Transfer, TransferStatus, replay_stock,
};

use super::*;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::store::{Changeset, InMemoryInventoryStore, InventoryStore, StoreError};

fn setup() -> (InventoryEngine, Arc<ManualClock>) {
    setup_with(EngineConfig::default())
}

fn setup_with(config: EngineConfig) -> (InventoryEngine, Arc<ManualClock>) {
    let start = Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap();
    let clock = Arc::new(ManualClock::new(start));
    let engine = InventoryEngine::new(
        Arc::new(InMemoryInventoryStore::new()),
        clock.clone(),
        config,
    );
    (engine, clock)
}

fn stocked(engine: &InventoryEngine, name: &str, stock: i64, reorder_point: i64) -> Item {
    engine
        .catalog()
        .create_item(
            NewItem {
                name: name.to_string(),
                initial_stock: stock,
                reorder_point,
                cost_price: 2_000,
                selling_price: 5_000,
                supplier_id: None,
            },
            "admin",
        )
        .unwrap()
}

fn inventory_err(err: EngineError) -> InventoryError {
    match err {
        EngineError::Inventory(e) => e,
        other => panic!("expected inventory error, got {other:?}"),
    }
}

#[test]
fn reserve_cancel_then_sell_on_cancelled_hold() {
    let (engine, _) = setup();
    let a = stocked(&engine, "A", 5, 2).id_typed();
    let availability = engine.availability();
    let reservations = engine.reservations();

    let c1 = reservations.reserve(a, 3, CartId::new("c1")).unwrap();
    assert_eq!(availability.available_to_sell(a).unwrap(), 2);

    let err = inventory_err(reservations.reserve(a, 3, CartId::new("c2")).unwrap_err());
    assert_eq!(err, InventoryError::insufficient(a, 3, 2));

    reservations.cancel(c1.id_typed()).unwrap();
    assert_eq!(availability.available_to_sell(a).unwrap(), 5);

    let err = engine
        .sales()
        .process_sale(SaleRequest::new(a, 3, OrderId::new("O1")).with_reservation(c1.id_typed()))
        .unwrap_err();
    assert!(matches!(
        inventory_err(err),
        InventoryError::ReservationNotActive {
            status: ReservationStatus::Cancelled,
            ..
        }
    ));
    assert_eq!(engine.catalog().get_item(a).unwrap().current_stock(), 5);
}

#[test]
fn elapsed_hold_is_expired_by_sweep() {
    let (engine, clock) = setup();
    let b = stocked(&engine, "B", 10, 0).id_typed();

    let hold = engine.reservations().reserve(b, 10, CartId::new("c3")).unwrap();
    assert_eq!(engine.availability().available_to_sell(b).unwrap(), 0);

    clock.advance(Duration::minutes(31));
    let report = engine.sweeper().sweep().unwrap();
    assert_eq!(report.expired, 1);

    let hold = engine.reservations().get(hold.id_typed()).unwrap();
    assert_eq!(hold.status(), ReservationStatus::Expired);
    assert_eq!(engine.availability().available_to_sell(b).unwrap(), 10);
    assert_eq!(engine.catalog().get_item(b).unwrap().current_stock(), 10);
}

#[test]
fn repeated_sales_accumulate_statistics() {
    let (engine, _) = setup();
    let c = stocked(&engine, "C", 10, 0).id_typed();
    let sales = engine.sales();

    for order in ["O1", "O2"] {
        sales
            .process_sale(SaleRequest::new(c, 2, OrderId::new(order)).with_unit_price(5_000))
            .unwrap();
    }

    let stats = sales.statistics(c).unwrap();
    assert_eq!(stats.total_quantity_sold, 4);
    assert_eq!(stats.total_revenue, 20_000);
    assert!((stats.average_price - 5_000.0).abs() < f64::EPSILON);
    assert_eq!(stats.buckets.daily.values().sum::<i64>(), 4);

    let sale_rows: Vec<_> = engine
        .stock()
        .ledger(c)
        .unwrap()
        .into_iter()
        .filter(|e| e.operation == OperationType::Sale)
        .collect();
    assert_eq!(sale_rows.len(), 2);
    assert!(sale_rows.iter().all(|e| e.quantity == -2));

    assert_eq!(sales.replay_statistics(c).unwrap(), stats);
}

#[test]
fn last_unit_goes_to_exactly_one_racer() {
    let (engine, _) = setup();
    let item = stocked(&engine, "last one", 1, 0).id_typed();

    let racers = 8;
    let barrier = Arc::new(Barrier::new(racers));
    let handles: Vec<_> = (0..racers)
        .map(|i| {
            let engine = engine.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                engine.reservations().reserve(item, 1, CartId::new(format!("cart-{i}")))
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for err in results.into_iter().filter_map(Result::err) {
        assert!(matches!(inventory_err(err), InventoryError::InsufficientStock { .. }));
    }
    assert_eq!(engine.availability().available_to_sell(item).unwrap(), 0);
}

#[test]
fn concurrent_sales_never_oversell() {
    let (engine, _) = setup();
    let item = stocked(&engine, "popular", 10, 0).id_typed();

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let engine = engine.clone();
            thread::spawn(move || {
                engine
                    .sales()
                    .process_sale(SaleRequest::new(item, 1, OrderId::new(format!("O{i}"))))
            })
        })
        .collect();

    let sold = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(Result::is_ok)
        .count();
    assert_eq!(sold, 10);

    let stored = engine.catalog().get_item(item).unwrap();
    assert_eq!(stored.current_stock(), 0);
    assert_eq!(replay_stock(&engine.stock().ledger(item).unwrap()), 0);
    assert_eq!(engine.sales().statistics(item).unwrap().total_quantity_sold, 10);
}

#[test]
fn sweep_twice_equals_sweep_once() {
    let (engine, clock) = setup();
    let item = stocked(&engine, "D", 6, 0).id_typed();
    for cart in ["x", "y", "z"] {
        engine.reservations().reserve(item, 2, CartId::new(cart)).unwrap();
    }
    clock.advance(Duration::hours(1));

    let first = engine.sweeper().sweep().unwrap();
    let after_first = engine.reservations().list_for_cart(&CartId::new("x")).unwrap();
    let second = engine.sweeper().sweep().unwrap();
    let after_second = engine.reservations().list_for_cart(&CartId::new("x")).unwrap();

    assert_eq!(first.expired, 3);
    assert_eq!(second, SweepReport::default());
    assert_eq!(after_first, after_second);
}

#[test]
fn sale_before_sweep_wins_over_expiry() {
    let (engine, clock) = setup();
    let item = stocked(&engine, "E", 3, 0).id_typed();
    let hold = engine.reservations().reserve(item, 2, CartId::new("late")).unwrap();

    // Past TTL but not yet swept: the hold is still ACTIVE and can be sold.
    clock.advance(Duration::minutes(45));
    engine
        .sales()
        .process_sale(SaleRequest::new(item, 2, OrderId::new("O9")).with_reservation(hold.id_typed()))
        .unwrap();

    let report = engine.sweeper().sweep().unwrap();
    assert_eq!(report.examined, 0);

    let hold = engine.reservations().get(hold.id_typed()).unwrap();
    assert_eq!(hold.status(), ReservationStatus::Completed);
    assert_eq!(hold.order_id(), Some(&OrderId::new("O9")));
    assert_eq!(engine.availability().available_to_sell(item).unwrap(), 1);
}

#[test]
fn reservation_backed_sale_revalidates_against_current_stock() {
    let (engine, clock) = setup();
    let item = stocked(&engine, "F", 4, 0).id_typed();
    let hold = engine.reservations().reserve(item, 3, CartId::new("c")).unwrap();

    // A write that bypasses the engine shrinks stock under the hold.
    let mut row = engine.catalog().get_item(item).unwrap();
    let expected = row.version();
    let entry = LedgerEntry::new(item, OperationType::Adjustment, -3, "import", clock.now());
    row.apply_entry(&entry).unwrap();
    let mut changeset = Changeset::new();
    changeset.put_item(row, expected).append(entry);
    engine.context().store.commit(changeset).unwrap();

    let err = engine
        .sales()
        .process_sale(SaleRequest::new(item, 3, OrderId::new("O1")).with_reservation(hold.id_typed()))
        .unwrap_err();
    assert_eq!(inventory_err(err), InventoryError::insufficient(item, 3, 1));
    assert!(engine.reservations().get(hold.id_typed()).unwrap().is_active());
}

#[test]
fn failing_line_rolls_back_whole_order() {
    let (engine, _) = setup();
    let first = stocked(&engine, "first", 5, 0).id_typed();
    let second = stocked(&engine, "second", 1, 0).id_typed();
    let hold = engine.reservations().reserve(first, 2, CartId::new("cart")).unwrap();

    let err = engine
        .sales()
        .process_order(vec![
            SaleRequest::new(first, 2, OrderId::new("O1")).with_reservation(hold.id_typed()),
            SaleRequest::new(second, 2, OrderId::new("O1")),
        ])
        .unwrap_err();
    assert!(matches!(inventory_err(err), InventoryError::InsufficientStock { .. }));

    assert_eq!(engine.catalog().get_item(first).unwrap().current_stock(), 5);
    assert_eq!(engine.stock().ledger(first).unwrap().len(), 1);
    assert!(engine.reservations().get(hold.id_typed()).unwrap().is_active());
    assert_eq!(engine.sales().statistics(first).unwrap().total_quantity_sold, 0);
}

#[test]
fn order_lines_for_same_item_validate_cumulatively() {
    let (engine, _) = setup();
    let item = stocked(&engine, "G", 3, 0).id_typed();
    let sales = engine.sales();

    let err = sales
        .process_order(vec![
            SaleRequest::new(item, 2, OrderId::new("O1")),
            SaleRequest::new(item, 2, OrderId::new("O1")),
        ])
        .unwrap_err();
    assert_eq!(inventory_err(err), InventoryError::insufficient(item, 2, 1));

    let entries = sales
        .process_order(vec![
            SaleRequest::new(item, 2, OrderId::new("O2")).with_customer(CustomerId::new("cust-1")),
            SaleRequest::new(item, 1, OrderId::new("O2")),
        ])
        .unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(engine.catalog().get_item(item).unwrap().current_stock(), 0);
}

#[test]
fn sale_with_hold_for_other_item_is_rejected() {
    let (engine, _) = setup();
    let a = stocked(&engine, "a", 5, 0).id_typed();
    let b = stocked(&engine, "b", 5, 0).id_typed();
    let hold = engine.reservations().reserve(a, 1, CartId::new("c")).unwrap();

    let err = engine
        .sales()
        .process_sale(SaleRequest::new(b, 1, OrderId::new("O1")).with_reservation(hold.id_typed()))
        .unwrap_err();
    assert!(matches!(
        inventory_err(err),
        InventoryError::ReservationItemMismatch { .. }
    ));
}

#[test]
fn zero_quantity_is_invalid_everywhere() {
    let (engine, _) = setup();
    let item = stocked(&engine, "H", 5, 0).id_typed();

    let err = engine.reservations().reserve(item, 0, CartId::new("c")).unwrap_err();
    assert_eq!(inventory_err(err), InventoryError::InvalidQuantity { quantity: 0 });

    let err = engine
        .sales()
        .process_sale(SaleRequest::new(item, -1, OrderId::new("O1")))
        .unwrap_err();
    assert_eq!(inventory_err(err), InventoryError::InvalidQuantity { quantity: -1 });

    let err = engine.stock().adjust(item, 0, "admin", None).unwrap_err();
    assert_eq!(inventory_err(err), InventoryError::InvalidQuantity { quantity: 0 });
}

#[test]
fn unknown_ids_are_reported() {
    let (engine, _) = setup();
    let missing = ItemId::new();

    let err = engine.reservations().reserve(missing, 1, CartId::new("c")).unwrap_err();
    assert_eq!(inventory_err(err), InventoryError::item_not_found(missing));

    let missing_hold = ReservationId::new();
    let err = engine.reservations().cancel(missing_hold).unwrap_err();
    assert_eq!(inventory_err(err), InventoryError::reservation_not_found(missing_hold));
}

#[test]
fn resize_excludes_own_hold_and_rejects_terminal() {
    let (engine, _) = setup();
    let item = stocked(&engine, "I", 5, 0).id_typed();
    let reservations = engine.reservations();
    let hold = reservations.reserve(item, 3, CartId::new("c")).unwrap();

    let resized = reservations.update_quantity(hold.id_typed(), 5).unwrap();
    assert_eq!(resized.quantity(), 5);
    assert_eq!(resized.expires_at(), hold.expires_at());

    let err = reservations.update_quantity(hold.id_typed(), 6).unwrap_err();
    assert_eq!(inventory_err(err), InventoryError::insufficient(item, 6, 5));

    reservations.cancel(hold.id_typed()).unwrap();
    let err = reservations.update_quantity(hold.id_typed(), 1).unwrap_err();
    assert!(matches!(inventory_err(err), InventoryError::ReservationNotActive { .. }));
}

#[test]
fn cancel_is_idempotent() {
    let (engine, _) = setup();
    let item = stocked(&engine, "J", 2, 0).id_typed();
    let hold = engine.reservations().reserve(item, 2, CartId::new("c")).unwrap();

    let once = engine.reservations().cancel(hold.id_typed()).unwrap();
    let twice = engine.reservations().cancel(hold.id_typed()).unwrap();
    assert_eq!(once, twice);
    assert_eq!(twice.status(), ReservationStatus::Cancelled);
}

#[test]
fn cancel_cart_releases_only_active_holds() {
    let (engine, _) = setup();
    let item = stocked(&engine, "K", 10, 0).id_typed();
    let cart = CartId::new("abandoned");
    let reservations = engine.reservations();

    let sold = reservations.reserve(item, 1, cart.clone()).unwrap();
    reservations.reserve(item, 2, cart.clone()).unwrap();
    reservations.reserve(item, 3, cart.clone()).unwrap();
    engine
        .sales()
        .process_sale(SaleRequest::new(item, 1, OrderId::new("O1")).with_reservation(sold.id_typed()))
        .unwrap();

    let released = reservations.cancel_cart(&cart).unwrap();
    assert_eq!(released.len(), 2);
    assert!(reservations.list_active(Some(&cart)).unwrap().is_empty());
    assert_eq!(reservations.list_for_cart(&cart).unwrap().len(), 3);
    assert_eq!(engine.availability().available_to_sell(item).unwrap(), 9);
}

#[test]
fn adjustment_cannot_take_reserved_units() {
    let (engine, _) = setup();
    let item = stocked(&engine, "L", 5, 0).id_typed();
    engine.reservations().reserve(item, 4, CartId::new("c")).unwrap();

    let err = engine.stock().adjust(item, -2, "auditor", None).unwrap_err();
    assert_eq!(inventory_err(err), InventoryError::insufficient(item, 2, 1));

    let item_row = engine.stock().adjust(item, -1, "auditor", Some("breakage".into())).unwrap();
    assert_eq!(item_row.current_stock(), 4);

    let item_row = engine.stock().intake(item, 6, "receiving", None).unwrap();
    assert_eq!(item_row.current_stock(), 10);
    assert_eq!(replay_stock(&engine.stock().ledger(item).unwrap()), 10);
}

#[test]
fn transfer_moves_stock_only_on_completion() {
    let (engine, _) = setup();
    let item = stocked(&engine, "M", 8, 0).id_typed();
    let stock = engine.stock();

    let transfer = stock
        .create_transfer(TransferRequest {
            item_id: item,
            quantity: 3,
            from_location: LocationId::new("main"),
            to_location: LocationId::new("kiosk"),
            requested_by: "ops".to_string(),
            notes: None,
        })
        .unwrap();
    assert_eq!(transfer.status(), TransferStatus::Pending);

    stock.dispatch_transfer(transfer.id_typed()).unwrap();
    assert_eq!(engine.catalog().get_item(item).unwrap().current_stock(), 8);

    let done = stock.complete_transfer(transfer.id_typed(), "ops").unwrap();
    assert_eq!(done.status(), TransferStatus::Completed);
    assert_eq!(engine.catalog().get_item(item).unwrap().current_stock(), 5);

    let ledger = stock.ledger(item).unwrap();
    let last = ledger.last().unwrap();
    assert_eq!(last.operation, OperationType::Transfer);
    assert_eq!(last.quantity, -3);
    assert_eq!(last.transfer_id, Some(transfer.id_typed()));

    let err = stock.cancel_transfer(transfer.id_typed(), None).unwrap_err();
    assert!(matches!(
        inventory_err(err),
        InventoryError::InvalidTransferTransition { .. }
    ));
}

#[test]
fn transfer_completion_respects_holds() {
    let (engine, _) = setup();
    let item = stocked(&engine, "N", 4, 0).id_typed();
    let stock = engine.stock();
    let transfer = stock
        .create_transfer(TransferRequest {
            item_id: item,
            quantity: 3,
            from_location: LocationId::new("main"),
            to_location: LocationId::new("outlet"),
            requested_by: "ops".to_string(),
            notes: Some("weekend promo".to_string()),
        })
        .unwrap();
    stock.dispatch_transfer(transfer.id_typed()).unwrap();
    engine.reservations().reserve(item, 2, CartId::new("c")).unwrap();

    let err = stock.complete_transfer(transfer.id_typed(), "ops").unwrap_err();
    assert_eq!(inventory_err(err), InventoryError::insufficient(item, 3, 2));
    assert_eq!(stock.get_transfer(transfer.id_typed()).unwrap().status(), TransferStatus::InTransit);

    let cancelled = stock
        .cancel_transfer(transfer.id_typed(), Some("stock committed to carts".into()))
        .unwrap();
    assert_eq!(cancelled.status(), TransferStatus::Cancelled);
}

#[test]
fn committed_changes_reach_subscribers() {
    let (engine, clock) = setup();
    let feed = engine.subscribe();
    let item = stocked(&engine, "O", 2, 0).id_typed();
    let hold = engine.reservations().reserve(item, 1, CartId::new("c")).unwrap();
    clock.advance(Duration::minutes(31));
    engine.sweeper().sweep().unwrap();

    let types: Vec<String> = feed
        .drain()
        .iter()
        .map(|e| e.event_type().to_string())
        .collect();
    assert_eq!(
        types,
        vec![
            "inventory.stock.received",
            "inventory.reservation.created",
            "inventory.reservation.expired",
        ]
    );

    // Failed operations publish nothing.
    let _ = engine.reservations().update_quantity(hold.id_typed(), 1);
    assert!(feed.try_recv().is_err());
}

#[test]
fn reorder_suggestions_are_ranked_by_urgency() {
    let (engine, clock) = setup();
    let urgent = stocked(&engine, "urgent", 17, 10).id_typed();
    let mild = stocked(&engine, "mild", 7, 10).id_typed();
    let untracked = stocked(&engine, "untracked", 0, 0).id_typed();
    stocked(&engine, "healthy", 50, 10);

    // 15 units sold over a 30 day window: half a unit a day.
    engine
        .sales()
        .process_sale(SaleRequest::new(urgent, 15, OrderId::new("O1")))
        .unwrap();
    clock.advance(Duration::days(1));

    let suggestions = engine.reorder().suggest_reorders().unwrap();
    let ids: Vec<ItemId> = suggestions.iter().map(|s| s.item_id).collect();
    assert_eq!(ids, vec![urgent, mild]);

    // Out of stock, but without a reorder point it is only reported as low.
    let low: Vec<ItemId> = engine.catalog().low_stock_items().unwrap().iter().map(|i| i.id_typed()).collect();
    assert!(low.contains(&untracked));

    assert_eq!(suggestions[0].priority, ReorderPriority::High);
    assert_eq!(suggestions[0].suggested_quantity, 15);
    assert_eq!(suggestions[0].estimated_cost, 15 * 2_000);
    assert_eq!(suggestions[1].priority, ReorderPriority::Low);
    // Never sold: velocity falls back to one unit a day.
    assert_eq!(suggestions[1].suggested_quantity, 30);

    let velocity = engine.reorder().sales_velocity(urgent).unwrap();
    assert!((velocity - 0.5).abs() < 1e-9);
}

#[test]
fn valuation_covers_whole_catalog() {
    let (engine, _) = setup();
    stocked(&engine, "P", 3, 0);
    stocked(&engine, "Q", 2, 0);

    let valuation = engine.reorder().valuation().unwrap();
    assert_eq!(valuation.item_count, 2);
    assert_eq!(valuation.total_units, 5);
    assert_eq!(valuation.total_cost_value, 5 * 2_000);
    assert_eq!(valuation.potential_margin(), 5 * 3_000);
}

#[test]
fn runner_sweeps_on_trigger_and_stops() {
    let config = EngineConfig::default()
        .with_sweep_interval(StdDuration::from_secs(3_600))
        .with_reservation_ttl(StdDuration::from_secs(60));
    let (engine, clock) = setup_with(config);
    let item = stocked(&engine, "R", 1, 0).id_typed();
    let hold = engine.reservations().reserve(item, 1, CartId::new("c")).unwrap();

    let handle = engine.spawn_sweeper().unwrap();
    clock.advance(Duration::minutes(2));
    handle.trigger();

    let mut expired = false;
    for _ in 0..100 {
        if engine.reservations().get(hold.id_typed()).unwrap().status() == ReservationStatus::Expired {
            expired = true;
            break;
        }
        thread::sleep(StdDuration::from_millis(20));
    }
    assert!(expired, "runner never expired the hold");

    let stats = handle.stats();
    assert!(stats.runs >= 1);
    assert_eq!(stats.failed_runs, 0);
    handle.shutdown();
}

#[test]
fn duplicate_item_id_is_rejected() {
    let (engine, _) = setup();
    let id = ItemId::new();
    let new = NewItem {
        name: "S".to_string(),
        initial_stock: 0,
        reorder_point: 0,
        cost_price: 1,
        selling_price: 2,
        supplier_id: None,
    };
    engine.catalog().create_item_with_id(id, new.clone(), "admin").unwrap();
    let err = engine.catalog().create_item_with_id(id, new, "admin").unwrap_err();
    assert_eq!(inventory_err(err), InventoryError::DuplicateItem { item_id: id });
    assert!(engine.stock().ledger(id).unwrap().is_empty());
}

#[test]
fn oversized_intake_is_rejected_without_touching_stock() {
    let (engine, _) = setup();
    let item = stocked(&engine, "Big", 5, 0).id_typed();

    let err = engine.stock().intake(item, i64::MAX, "admin", None).unwrap_err();
    assert!(matches!(
        inventory_err(err),
        InventoryError::Domain(DomainError::Validation(_))
    ));

    let err = engine.stock().adjust(item, i64::MIN, "admin", None).unwrap_err();
    assert_eq!(inventory_err(err), InventoryError::insufficient(item, i64::MAX, 5));

    assert_eq!(engine.catalog().get_item(item).unwrap().current_stock(), 5);
    assert_eq!(engine.stock().ledger(item).unwrap().len(), 1);
}

#[test]
fn sale_price_that_overflows_revenue_is_rejected() {
    let (engine, _) = setup();
    let item = stocked(&engine, "Gold", 10, 0).id_typed();
    let hold = engine.reservations().reserve(item, 3, CartId::new("c")).unwrap();

    let err = engine
        .sales()
        .process_sale(
            SaleRequest::new(item, 3, OrderId::new("O1"))
                .with_reservation(hold.id_typed())
                .with_unit_price(i64::MAX / 2),
        )
        .unwrap_err();
    assert!(matches!(
        inventory_err(err),
        InventoryError::Domain(DomainError::Validation(_))
    ));
    assert!(engine.reservations().get(hold.id_typed()).unwrap().is_active());
    assert_eq!(engine.catalog().get_item(item).unwrap().current_stock(), 10);

    // Each line fits on its own; the running total does not.
    let price = i64::MAX / 4;
    engine
        .sales()
        .process_sale(SaleRequest::new(item, 2, OrderId::new("O2")).with_unit_price(price))
        .unwrap();
    let err = engine
        .sales()
        .process_sale(SaleRequest::new(item, 3, OrderId::new("O3")).with_unit_price(price))
        .unwrap_err();
    assert!(matches!(
        inventory_err(err),
        InventoryError::Domain(DomainError::Validation(_))
    ));

    let stats = engine.sales().statistics(item).unwrap();
    assert_eq!(stats.total_quantity_sold, 2);
    assert_eq!(stats.total_revenue, 2 * price);
    assert_eq!(stats, engine.sales().replay_statistics(item).unwrap());
}

#[test]
fn ttl_past_the_calendar_fails_reserve_cleanly() {
    let mut config = EngineConfig::default();
    config.reservation_ttl = StdDuration::from_secs(u64::MAX);
    let (engine, _) = setup_with(config);
    let item = stocked(&engine, "T", 3, 0).id_typed();

    let err = engine.reservations().reserve(item, 1, CartId::new("c")).unwrap_err();
    assert!(matches!(
        inventory_err(err),
        InventoryError::Domain(DomainError::Validation(_))
    ));
    assert_eq!(engine.availability().available_to_sell(item).unwrap(), 3);
}

/// In-memory store whose commits fail for chosen reservations.
#[derive(Debug, Default)]
struct FlakyStore {
    inner: InMemoryInventoryStore,
    failing: Mutex<HashSet<ReservationId>>,
}

impl FlakyStore {
    fn fail_for(&self, ids: &[ReservationId]) {
        let mut failing = self.failing.lock().unwrap();
        failing.clear();
        failing.extend(ids.iter().copied());
    }
}

impl InventoryStore for FlakyStore {
    fn get_item(&self, item_id: ItemId) -> Result<Option<Item>, StoreError> {
        self.inner.get_item(item_id)
    }

    fn list_items(&self) -> Result<Vec<Item>, StoreError> {
        self.inner.list_items()
    }

    fn get_reservation(&self, reservation_id: ReservationId) -> Result<Option<Reservation>, StoreError> {
        self.inner.get_reservation(reservation_id)
    }

    fn reservations_for_item(&self, item_id: ItemId) -> Result<Vec<Reservation>, StoreError> {
        self.inner.reservations_for_item(item_id)
    }

    fn reservations_for_cart(&self, cart_id: &CartId) -> Result<Vec<Reservation>, StoreError> {
        self.inner.reservations_for_cart(cart_id)
    }

    fn active_reservations(&self) -> Result<Vec<Reservation>, StoreError> {
        self.inner.active_reservations()
    }

    fn due_reservations(&self, now: chrono::DateTime<Utc>) -> Result<Vec<Reservation>, StoreError> {
        self.inner.due_reservations(now)
    }

    fn ledger_for_item(&self, item_id: ItemId) -> Result<Vec<LedgerEntry>, StoreError> {
        self.inner.ledger_for_item(item_id)
    }

    fn sales_since(&self, since: chrono::DateTime<Utc>) -> Result<Vec<LedgerEntry>, StoreError> {
        self.inner.sales_since(since)
    }

    fn statistics(&self, item_id: ItemId) -> Result<Option<SalesStatistics>, StoreError> {
        self.inner.statistics(item_id)
    }

    fn get_transfer(&self, transfer_id: TransferId) -> Result<Option<Transfer>, StoreError> {
        self.inner.get_transfer(transfer_id)
    }

    fn list_transfers(&self) -> Result<Vec<Transfer>, StoreError> {
        self.inner.list_transfers()
    }

    fn commit(&self, changeset: Changeset) -> Result<(), StoreError> {
        let failing = self.failing.lock().unwrap();
        if changeset
            .reservations
            .iter()
            .any(|w| failing.contains(&w.record.id_typed()))
        {
            return Err(StoreError::Backend("disk full".to_string()));
        }
        drop(failing);
        self.inner.commit(changeset)
    }
}

fn flaky_engine(config: EngineConfig) -> (InventoryEngine, Arc<ManualClock>, Arc<FlakyStore>) {
    let start = Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap();
    let clock = Arc::new(ManualClock::new(start));
    let store = Arc::new(FlakyStore::default());
    let engine = InventoryEngine::new(store.clone(), clock.clone(), config);
    (engine, clock, store)
}

#[test]
fn sweep_counts_record_failures_and_fails_when_all_do() {
    let (engine, clock, store) = flaky_engine(EngineConfig::default());
    let item = stocked(&engine, "Sw", 10, 0).id_typed();
    let good = engine.reservations().reserve(item, 2, CartId::new("a")).unwrap();
    let bad = engine.reservations().reserve(item, 3, CartId::new("b")).unwrap();
    clock.advance(Duration::minutes(31));

    store.fail_for(&[bad.id_typed()]);
    let report = engine.sweeper().sweep().unwrap();
    assert_eq!(
        report,
        SweepReport {
            examined: 2,
            expired: 1,
            skipped: 0,
            failed: 1,
        }
    );
    let reservations = engine.reservations();
    assert_eq!(reservations.get(good.id_typed()).unwrap().status(), ReservationStatus::Expired);
    assert!(reservations.get(bad.id_typed()).unwrap().is_active());

    // Only the bad hold is left; it failing is every examined record.
    let err = engine.sweeper().sweep().unwrap_err();
    assert!(matches!(err, EngineError::SweepFailed { failed: 1 }));
    assert_eq!(engine.availability().available_to_sell(item).unwrap(), 7);

    store.fail_for(&[]);
    let report = engine.sweeper().sweep().unwrap();
    assert_eq!(report.expired, 1);
    assert_eq!(engine.availability().available_to_sell(item).unwrap(), 10);
}

#[test]
fn runner_backs_off_on_failed_sweeps_then_recovers() {
    let config = EngineConfig::default()
        .with_sweep_interval(StdDuration::from_secs(3_600))
        .with_sweep_retries(2, StdDuration::from_millis(10));
    let (engine, clock, store) = flaky_engine(config);
    let item = stocked(&engine, "Rb", 2, 0).id_typed();
    let hold = engine.reservations().reserve(item, 2, CartId::new("c")).unwrap();
    store.fail_for(&[hold.id_typed()]);
    clock.advance(Duration::minutes(31));

    let handle = engine.spawn_sweeper().unwrap();
    let mut failed_runs = 0;
    for _ in 0..100 {
        failed_runs = handle.stats().failed_runs;
        if failed_runs >= 1 {
            break;
        }
        thread::sleep(StdDuration::from_millis(20));
    }
    assert!(failed_runs >= 1, "runner never recorded the failed sweep");
    assert!(handle.stats().last_error.is_some());
    assert!(engine.reservations().get(hold.id_typed()).unwrap().is_active());

    store.fail_for(&[]);
    handle.trigger();
    let mut expired = false;
    for _ in 0..100 {
        if engine.reservations().get(hold.id_typed()).unwrap().status() == ReservationStatus::Expired {
            expired = true;
            break;
        }
        thread::sleep(StdDuration::from_millis(20));
    }
    assert!(expired, "runner never recovered after the store healed");

    let stats = handle.stats();
    assert!(stats.failed_runs >= 1);
    assert_eq!(stats.total_expired, 1);
    handle.shutdown();
}

#[derive(Debug, Clone)]
enum Op {
    Reserve(i64),
    Resize(usize, i64),
    Cancel(usize),
    Sell(i64, Option<usize>),
    Intake(i64),
    Adjust(i64),
    Elapse(i64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1i64..6).prop_map(Op::Reserve),
        (0usize..8, 1i64..6).prop_map(|(i, q)| Op::Resize(i, q)),
        (0usize..8).prop_map(Op::Cancel),
        (1i64..6, proptest::option::of(0usize..8)).prop_map(|(q, r)| Op::Sell(q, r)),
        (1i64..6).prop_map(Op::Intake),
        (-4i64..4).prop_map(Op::Adjust),
        (1i64..40).prop_map(Op::Elapse),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, ..ProptestConfig::default() })]

    #[test]
    fn any_operation_sequence_keeps_books_consistent(ops in proptest::collection::vec(op(), 1..40)) {
        let (engine, clock) = setup();
        let item = stocked(&engine, "prop", 10, 3).id_typed();
        let mut holds = Vec::new();

        for (n, op) in ops.into_iter().enumerate() {
            // Caller errors are expected; only the invariants matter.
            match op {
                Op::Reserve(q) => {
                    if let Ok(r) = engine.reservations().reserve(item, q, CartId::new(format!("c{n}"))) {
                        holds.push(r.id_typed());
                    }
                }
                Op::Resize(i, q) => {
                    if let Some(id) = holds.get(i) {
                        let _ = engine.reservations().update_quantity(*id, q);
                    }
                }
                Op::Cancel(i) => {
                    if let Some(id) = holds.get(i) {
                        let _ = engine.reservations().cancel(*id);
                    }
                }
                Op::Sell(q, r) => {
                    let mut req = SaleRequest::new(item, q, OrderId::new(format!("O{n}")));
                    if let Some(id) = r.and_then(|i| holds.get(i)) {
                        req = req.with_reservation(*id);
                    }
                    let _ = engine.sales().process_sale(req);
                }
                Op::Intake(q) => {
                    let _ = engine.stock().intake(item, q, "prop", None);
                }
                Op::Adjust(d) => {
                    let _ = engine.stock().adjust(item, d, "prop", None);
                }
                Op::Elapse(minutes) => {
                    clock.advance(Duration::minutes(minutes));
                    engine.sweeper().sweep().unwrap();
                }
            }

            let stored = engine.catalog().get_item(item).unwrap();
            prop_assert!(stored.current_stock() >= 0);
            prop_assert!(engine.availability().available_to_sell(item).unwrap() >= 0);

            let ledger = engine.stock().ledger(item).unwrap();
            prop_assert_eq!(replay_stock(&ledger), stored.current_stock());

            let stats = engine.sales().statistics(item).unwrap();
            prop_assert_eq!(&stats, &engine.sales().replay_statistics(item).unwrap());
            if stats.total_quantity_sold > 0 {
                let expected = stats.total_revenue as f64 / stats.total_quantity_sold as f64;
                prop_assert!((stats.average_price - expected).abs() < 1e-6);
            }
            prop_assert_eq!(stats.buckets.daily.values().sum::<i64>(), stats.total_quantity_sold);
        }
        prop_assert!(clock.now() >= Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap());
    }
}
