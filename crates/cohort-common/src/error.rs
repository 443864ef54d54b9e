//! Error types for the Cohort ledger
//!
//! Provides a unified error type and the ledger's domain-specific variants

use crate::types::insured_id::InsuredId;
use rust_decimal::Decimal;
use thiserror::Error;

/// Result type alias using CohortError
pub type Result<T> = std::result::Result<T, CohortError>;

/// Unified error type for Cohort operations
#[derive(Debug, Error)]
pub enum CohortError {
    // Ledger errors
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CohortError {
    /// Ledger error category, if this is a ledger error
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            CohortError::Ledger(err) => Some(err.kind()),
            _ => None,
        }
    }
}

/// Broad category of a ledger failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller supplied a value the ledger never accepts
    InvalidArgument,
    /// Operation does not apply to the current ledger state
    IllegalState,
    /// Operation requires a reconciliation to run first
    PrematureOperation,
}

/// Ledger operation errors
///
/// Every ledger entry point validates before it mutates, so returning one of
/// these leaves batches, totals and the partial round untouched.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LedgerError {
    #[error("Round count must be positive")]
    ZeroRounds,

    #[error("Invalid round limits: min {min}, max {max}, over {over}")]
    InvalidRoundLimits { min: u32, max: u32, over: u32 },

    #[error("Unit size must be positive")]
    InvalidUnitSize,

    #[error("Amount must not be negative: {amount}")]
    NegativeAmount { amount: Decimal },

    #[error("Premium rate must not be negative: {rate}")]
    NegativeRate { rate: Decimal },

    #[error("Demand of {rounds} rounds exceeds what the ledger can represent")]
    DemandTooLarge { rounds: u64 },

    #[error("Insured not registered: {0}")]
    UnknownInsured(InsuredId),

    #[error("Insured already registered: {0}")]
    DuplicateInsured(InsuredId),

    #[error("Insured has been removed: {0}")]
    RemovedInsured(InsuredId),

    #[error("Insured {insured} still holds {uncovered} uncovered and {available} unreceived coverage")]
    OutstandingCoverage {
        insured: InsuredId,
        uncovered: Decimal,
        available: Decimal,
    },

    #[error("Insufficient excess coverage: requested {requested}, held {held}")]
    InsufficientExcess { requested: Decimal, held: Decimal },

    #[error("Coverage must be received before cancellation: {insured} has {available} available")]
    UnreceivedCoverage {
        insured: InsuredId,
        available: Decimal,
    },
}

impl LedgerError {
    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::ZeroRounds
            | LedgerError::InvalidRoundLimits { .. }
            | LedgerError::InvalidUnitSize
            | LedgerError::NegativeAmount { .. }
            | LedgerError::NegativeRate { .. }
            | LedgerError::DemandTooLarge { .. } => ErrorKind::InvalidArgument,

            LedgerError::UnknownInsured(_)
            | LedgerError::DuplicateInsured(_)
            | LedgerError::RemovedInsured(_)
            | LedgerError::OutstandingCoverage { .. }
            | LedgerError::InsufficientExcess { .. } => ErrorKind::IllegalState,

            LedgerError::UnreceivedCoverage { .. } => ErrorKind::PrematureOperation,
        }
    }
}

// Implement From for common external error types
impl From<serde_json::Error> for CohortError {
    fn from(err: serde_json::Error) -> Self {
        CohortError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for CohortError {
    fn from(err: anyhow::Error) -> Self {
        CohortError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_error_display() {
        let err = CohortError::Ledger(LedgerError::UnknownInsured(InsuredId::from("insured-7")));
        assert!(err.to_string().contains("insured-7"));
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(LedgerError::ZeroRounds.kind(), ErrorKind::InvalidArgument);
        assert_eq!(
            LedgerError::InsufficientExcess {
                requested: dec!(5),
                held: dec!(1),
            }
            .kind(),
            ErrorKind::IllegalState
        );
        let premature = LedgerError::UnreceivedCoverage {
            insured: InsuredId::from("a"),
            available: dec!(10),
        };
        assert_eq!(premature.kind(), ErrorKind::PrematureOperation);
        assert_eq!(
            CohortError::from(premature).kind(),
            Some(ErrorKind::PrematureOperation)
        );
    }

    #[test]
    fn test_round_limits_message() {
        let err = LedgerError::InvalidRoundLimits {
            min: 3,
            max: 2,
            over: 1,
        };
        assert!(err.to_string().contains("min 3, max 2, over 1"));
    }
}
