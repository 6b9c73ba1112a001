//! Engine event feed: event contract, envelope and pub/sub mechanics.
//!
//! The engine publishes an envelope after every committed change so reporting
//! consumers can follow stock and reservation activity without polling the store.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
