use thiserror::Error;

use stockhold_core::DomainError;
use stockhold_inventory::InventoryError;

use crate::store::StoreError;

pub type EngineResult<T> = Result<T, EngineError>;

/// Error returned by engine operations.
///
/// `Inventory` errors are the caller's to handle (unknown ids, insufficient
/// stock, terminal reservations). `Store` errors are systemic and belong to
/// the host's error path.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Every due reservation in a sweep failed to transition.
    #[error("expiry sweep failed for all {failed} due reservations")]
    SweepFailed { failed: usize },
}

impl From<DomainError> for EngineError {
    fn from(value: DomainError) -> Self {
        EngineError::Inventory(InventoryError::Domain(value))
    }
}

impl EngineError {
    pub fn is_caller_error(&self) -> bool {
        matches!(self, EngineError::Inventory(_))
    }

    pub fn as_inventory(&self) -> Option<&InventoryError> {
        match self {
            EngineError::Inventory(e) => Some(e),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Inventory(e) => e.code(),
            EngineError::Store(StoreError::Concurrency(_)) => "concurrent_modification",
            EngineError::Store(_) => "store_unavailable",
            EngineError::SweepFailed { .. } => "sweep_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockhold_core::ItemId;

    #[test]
    fn inventory_errors_are_caller_errors() {
        let err: EngineError = InventoryError::item_not_found(ItemId::new()).into();
        assert!(err.is_caller_error());
        assert_eq!(err.code(), "item_not_found");

        let err: EngineError = StoreError::Backend("down".to_string()).into();
        assert!(!err.is_caller_error());
        assert_eq!(err.code(), "store_unavailable");
    }
}
