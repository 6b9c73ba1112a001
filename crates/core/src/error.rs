use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// Failures raised by the pure domain layer before anything is persisted.
///
/// Stock shortfalls and lifecycle conflicts have their own variants in the
/// inventory crate; this covers malformed input and broken bookkeeping.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Rejected input: empty names, negative prices, empty orders.
    #[error("invalid input: {0}")]
    Validation(String),

    /// Books that no longer add up (e.g. stock below zero, ledger drift).
    #[error("bookkeeping invariant broken: {0}")]
    InvariantViolation(String),

    #[error("malformed id: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    /// Caller error (400-class) as opposed to a broken invariant.
    pub fn is_caller_error(&self) -> bool {
        !matches!(self, Self::InvariantViolation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_invariants_are_internal() {
        assert!(DomainError::validation("empty name").is_caller_error());
        assert!(DomainError::invalid_id("ItemId: x").is_caller_error());
        assert!(!DomainError::invariant("negative stock").is_caller_error());
        assert_eq!(
            DomainError::invariant("negative stock").to_string(),
            "bookkeeping invariant broken: negative stock"
        );
    }
}
