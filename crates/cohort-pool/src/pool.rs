//! Coverage pool - one locked ledger per risk pool

use crate::config::PoolConfig;
use cohort_common::{Clock, InsuredId, Result, SystemClock};
use cohort_ledger::{
    CancelledDemand, CoverageApplied, CoverageLedger, DemandPlacement, LedgerDump,
    ReceivableCoverage, ReceivedCoverage, RoundLimits, Totals,
};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Premium figures consumed by the premium balancer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PremiumReport {
    pub pool_id: Uuid,
    /// Premium earned per second by all covered units
    pub premium_rate: Decimal,
    /// Premium accrued up to `premium_updated_at`
    pub total_premium: Decimal,
    pub premium_rate_updated_at: i64,
    pub premium_updated_at: i64,
}

/// Shared handle to a risk pool's ledger
///
/// Mutations take the write lock, views the read lock, so every call observes
/// and leaves a consistent ledger.
#[derive(Clone)]
pub struct CoveragePool {
    id: Uuid,
    config: PoolConfig,
    ledger: Arc<RwLock<CoverageLedger>>,
}

impl CoveragePool {
    /// Create a pool with an injected clock
    pub fn new(config: PoolConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        let ledger = CoverageLedger::new(config.unit_size, config.limits()?, clock)?;
        let id = Uuid::now_v7();
        info!(pool_id = %id, name = %config.name, "Coverage pool created");
        Ok(Self {
            id,
            config,
            ledger: Arc::new(RwLock::new(ledger)),
        })
    }

    /// Create a pool on wall-clock time
    pub fn with_system_clock(config: PoolConfig) -> Result<Self> {
        Self::new(config, Arc::new(SystemClock))
    }

    /// Create a pool from `COHORT_*` environment settings
    pub fn from_env() -> anyhow::Result<Self> {
        let config = PoolConfig::load()?;
        Ok(Self::with_system_clock(config)?)
    }

    #[inline]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[inline]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    // ============ INSUREDS ============

    pub fn add_insured(&self, insured: InsuredId) -> Result<()> {
        Ok(self.ledger.write().add_insured(insured)?)
    }

    pub fn remove_insured(&self, insured: &InsuredId) -> Result<()> {
        Ok(self.ledger.write().remove_insured(insured)?)
    }

    pub fn is_active_insured(&self, insured: &InsuredId) -> bool {
        self.ledger.read().is_active_insured(insured)
    }

    // ============ DEMAND ============

    pub fn add_coverage_demand(
        &self,
        insured: &InsuredId,
        rounds: u64,
        premium_rate: Decimal,
        extend: bool,
    ) -> Result<DemandPlacement> {
        Ok(self
            .ledger
            .write()
            .add_coverage_demand(insured, rounds, premium_rate, extend)?)
    }

    pub fn cancel_coverage_demand(
        &self,
        insured: &InsuredId,
        max_rounds: u64,
    ) -> Result<CancelledDemand> {
        Ok(self
            .ledger
            .write()
            .cancel_coverage_demand(insured, max_rounds)?)
    }

    // ============ COVERAGE ============

    pub fn add_coverage(&self, amount: Decimal) -> Result<CoverageApplied> {
        Ok(self.ledger.write().add_coverage(amount)?)
    }

    pub fn push_coverage_excess(&self) -> CoverageApplied {
        self.ledger.write().push_coverage_excess()
    }

    pub fn withdraw_excess(&self, amount: Decimal) -> Result<Decimal> {
        Ok(self.ledger.write().withdraw_excess(amount)?)
    }

    pub fn excess_coverage(&self) -> Decimal {
        self.ledger.read().excess_coverage()
    }

    // ============ RECONCILIATION ============

    pub fn receivable_coverage_demand(
        &self,
        insured: &InsuredId,
        fuse: Option<usize>,
    ) -> Result<ReceivableCoverage> {
        Ok(self.ledger.read().receivable_coverage_demand(insured, fuse)?)
    }

    pub fn receive_demanded_coverage(
        &self,
        insured: &InsuredId,
        max_iterations: usize,
    ) -> Result<ReceivedCoverage> {
        Ok(self
            .ledger
            .write()
            .receive_demanded_coverage(insured, max_iterations)?)
    }

    // ============ ADMINISTRATION & VIEWS ============

    /// Replace the round limits; callers are expected to be authorized
    #[instrument(skip(self), fields(pool_id = %self.id))]
    pub fn set_round_limits(&self, min: u32, max: u32, over: u32) -> Result<()> {
        Ok(self.ledger.write().set_round_limits(min, max, over)?)
    }

    pub fn round_limits(&self) -> RoundLimits {
        self.ledger.read().round_limits()
    }

    pub fn get_totals(&self) -> Totals {
        self.ledger.read().get_totals()
    }

    pub fn dump(&self) -> LedgerDump {
        self.ledger.read().dump()
    }

    /// Premium figures for the balancer, projected to now
    pub fn premium_report(&self) -> PremiumReport {
        let totals = self.get_totals();
        PremiumReport {
            pool_id: self.id,
            premium_rate: totals.premium_rate,
            total_premium: totals.total_premium,
            premium_rate_updated_at: totals.premium_rate_updated_at,
            premium_updated_at: totals.premium_updated_at,
        }
    }
}

impl std::fmt::Debug for CoveragePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoveragePool")
            .field("id", &self.id)
            .field("name", &self.config.name)
            .finish()
    }
}
