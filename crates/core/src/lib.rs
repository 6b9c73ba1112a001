//! `stockhold-core`: identifiers, errors, the aggregate contract and clocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the aggregate contract, the domain error model and the
//! injectable clock.

pub mod aggregate;
pub mod clock;
pub mod error;
pub mod id;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{DomainError, DomainResult};
pub use id::{
    CartId, CustomerId, ItemId, LedgerEntryId, LocationId, OrderId, ReservationId, SupplierId,
    TransferId,
};
