//! # Cohort Common
//!
//! Shared types, errors, and time sources for the Cohort coverage ledger.
//!
//! ## Core Types
//!
//! - [`InsuredId`]: identifier of a party demanding coverage
//! - [`Clock`]: source of ledger time (Unix seconds)
//! - [`LedgerError`]: argument, state and ordering violations raised by the ledger
//!
//! ## Time
//!
//! - [`clock::SystemClock`]: wall-clock time via `chrono`
//! - [`clock::ManualClock`]: externally driven time for simulations and tests

pub mod clock;
pub mod error;
pub mod types;

// Re-export commonly used types at crate root
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CohortError, ErrorKind, LedgerError, Result};
pub use types::insured_id::InsuredId;

/// Cohort version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Value of one coverage unit when nothing else is configured
pub const DEFAULT_UNIT_SIZE: u64 = 1;

/// Default minimum units a round must exceed before it can receive coverage
pub const DEFAULT_MIN_UNITS_PER_ROUND: u32 = 1;

/// Default units per round above which batches stop splitting for newcomers
pub const DEFAULT_MAX_UNITS_PER_ROUND: u32 = 2;

/// Default hard ceiling of units per round
pub const DEFAULT_OVER_UNITS_PER_ROUND: u32 = 3;

/// Iteration cap meaning "walk everything"
pub const UNBOUNDED_ITERATIONS: usize = usize::MAX;
