//! # Cohort Pool
//!
//! Risk pool facade over the coverage ledger.
//!
//! A [`CoveragePool`] owns one [`cohort_ledger::CoverageLedger`] behind a
//! `parking_lot::RwLock` and gives collaborators a cloneable handle:
//!
//! - Collateral supply reports capital through `add_coverage` and
//!   `withdraw_excess`
//! - The premium balancer reads a [`PremiumReport`]
//! - Insured-facing code places, cancels and reconciles demand
//!
//! Access control is the caller's concern; every entry point assumes an
//! authorized caller.

pub mod config;
pub mod pool;

pub use config::{PoolConfig, RoundSettings};
pub use pool::{CoveragePool, PremiumReport};
