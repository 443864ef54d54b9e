//! Pool configuration

use anyhow::{Context, Result};
use cohort_common::LedgerError;
use cohort_ledger::RoundLimits;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Risk pool configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Display name of the pool
    pub name: String,
    /// Value of one coverage unit
    pub unit_size: Decimal,
    /// Round limits applied to new and joined batches
    pub rounds: RoundSettings,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            unit_size: Decimal::from(cohort_common::DEFAULT_UNIT_SIZE),
            rounds: RoundSettings::default(),
        }
    }
}

impl PoolConfig {
    /// Load configuration from environment and `.env`
    pub fn load() -> Result<Self> {
        // Try to load .env file
        let _ = dotenvy::dotenv();

        let mut cfg = Self::default();

        if let Ok(name) = std::env::var("COHORT_POOL_NAME") {
            cfg.name = name;
        }
        if let Ok(val) = std::env::var("COHORT_UNIT_SIZE") {
            cfg.unit_size = val
                .parse()
                .with_context(|| format!("COHORT_UNIT_SIZE is not a decimal: {val}"))?;
        }

        // Round limits
        if let Ok(val) = std::env::var("COHORT_MIN_UNITS_PER_ROUND") {
            if let Ok(v) = val.parse() {
                cfg.rounds.min_units_per_round = v;
            }
        }
        if let Ok(val) = std::env::var("COHORT_MAX_UNITS_PER_ROUND") {
            if let Ok(v) = val.parse() {
                cfg.rounds.max_units_per_round = v;
            }
        }
        if let Ok(val) = std::env::var("COHORT_OVER_UNITS_PER_ROUND") {
            if let Ok(v) = val.parse() {
                cfg.rounds.over_units_per_round = v;
            }
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Check the unit size and round limits
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.unit_size <= Decimal::ZERO {
            return Err(LedgerError::InvalidUnitSize);
        }
        self.limits().map(|_| ())
    }

    /// Round limits described by this configuration
    pub fn limits(&self) -> Result<RoundLimits, LedgerError> {
        RoundLimits::new(
            self.rounds.min_units_per_round,
            self.rounds.max_units_per_round,
            self.rounds.over_units_per_round,
        )
    }
}

/// Units-per-round settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundSettings {
    /// Units a round must exceed before it can be covered
    pub min_units_per_round: u32,
    /// Units below which batches split to take newcomers
    pub max_units_per_round: u32,
    /// Hard ceiling of units per round
    pub over_units_per_round: u32,
}

impl Default for RoundSettings {
    fn default() -> Self {
        Self {
            min_units_per_round: cohort_common::DEFAULT_MIN_UNITS_PER_ROUND,
            max_units_per_round: cohort_common::DEFAULT_MAX_UNITS_PER_ROUND,
            over_units_per_round: cohort_common::DEFAULT_OVER_UNITS_PER_ROUND,
        }
    }
}
