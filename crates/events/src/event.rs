use chrono::{DateTime, Utc};

/// Something the engine committed and wants consumers to hear about.
///
/// Implemented by the ledger entry and by the reservation and transfer
/// event enums. The name (e.g. `"inventory.reservation.expired"`) is what
/// SSE clients filter on.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    fn event_type(&self) -> &'static str;

    /// When the change took effect, per the engine clock.
    fn occurred_at(&self) -> DateTime<Utc>;

    /// Payload layout revision; bump when a field changes meaning.
    fn schema_version(&self) -> u32 {
        1
    }
}
