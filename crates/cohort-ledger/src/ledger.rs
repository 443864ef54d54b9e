//! Coverage ledger - state shared by the allocator, settler and cursor
//!
//! One [`CoverageLedger`] exists per risk pool. Entry points live next to the
//! component they belong to (`demand`, `coverage`, `reconcile`, `dump`); this
//! module owns the state, the insured registry, and the capacity bookkeeping
//! every component goes through when it touches a batch.

use crate::batch::{BatchNo, BatchStore};
use crate::demand::{InsuredRecord, InsuredStatus};
use crate::limits::RoundLimits;
use crate::premium::{CoverageHistory, PremiumAccrual};
use cohort_common::{Clock, InsuredId, LedgerError};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Decimal places of an even share of the in-flight round
const SHARE_DP: u32 = 12;

/// Coverage frontier: the round currently being filled
///
/// Every round before `(batch_no, round_no)` in list order is covered.
/// `round_coverage` is value already applied to round `round_no` and is always
/// below that round's full value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PartialRound {
    pub batch_no: BatchNo,
    pub round_no: u64,
    pub round_coverage: Decimal,
}

/// Pool-wide aggregates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    /// Batches ever created, the empty tail included
    pub batch_count: usize,
    /// Uncovered rounds in all batches
    pub open_rounds: u64,
    /// Uncovered rounds in coverable batches
    pub usable_rounds: u64,
    /// Value still needed to fill every usable round
    pub total_coverable: Decimal,
    pub total_demand: Decimal,
    pub total_covered: Decimal,
    /// Value applied to the in-flight round
    pub pending_covered: Decimal,
    pub premium_rate: Decimal,
    pub total_premium: Decimal,
    pub premium_rate_updated_at: i64,
    pub premium_updated_at: i64,
}

/// Capacity a single batch contributes to the totals
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct Contribution {
    open_rounds: u64,
    usable_rounds: u64,
    usable_value: Decimal,
}

/// Running capacity and value counters
#[derive(Debug, Clone, Default)]
pub(crate) struct Counters {
    pub(crate) open_rounds: u64,
    pub(crate) usable_rounds: u64,
    pub(crate) usable_value: Decimal,
    pub(crate) total_demand: Decimal,
    pub(crate) total_covered: Decimal,
}

/// Round-batch coverage allocation ledger
pub struct CoverageLedger {
    pub(crate) unit_size: Decimal,
    pub(crate) limits: RoundLimits,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) batches: BatchStore,
    /// First batch that may still take insureds; never before the frontier
    pub(crate) first_open: BatchNo,
    pub(crate) partial: PartialRound,
    pub(crate) insureds: HashMap<InsuredId, InsuredRecord>,
    pub(crate) counters: Counters,
    pub(crate) premium: PremiumAccrual,
    pub(crate) history: CoverageHistory,
    pub(crate) excess: Decimal,
}

impl CoverageLedger {
    /// Create an empty ledger
    pub fn new(
        unit_size: Decimal,
        limits: RoundLimits,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, LedgerError> {
        if unit_size <= Decimal::ZERO {
            return Err(LedgerError::InvalidUnitSize);
        }
        let now = clock.now();
        let batches = BatchStore::new();
        let head = batches.head();

        info!(%unit_size, %limits, "Coverage ledger created");
        Ok(Self {
            unit_size,
            limits,
            clock,
            batches,
            first_open: head,
            partial: PartialRound {
                batch_no: head,
                round_no: 0,
                round_coverage: Decimal::ZERO,
            },
            insureds: HashMap::new(),
            counters: Counters::default(),
            premium: PremiumAccrual::new(now),
            history: CoverageHistory::new(now),
            excess: Decimal::ZERO,
        })
    }

    #[inline]
    pub fn unit_size(&self) -> Decimal {
        self.unit_size
    }

    #[inline]
    pub fn round_limits(&self) -> RoundLimits {
        self.limits
    }

    /// Replace the round limits
    ///
    /// Existing batches keep their state until they are next joined or
    /// cancelled from.
    #[instrument(skip(self))]
    pub fn set_round_limits(&mut self, min: u32, max: u32, over: u32) -> Result<(), LedgerError> {
        self.limits = RoundLimits::new(min, max, over)?;
        info!(limits = %self.limits, "Round limits updated");
        Ok(())
    }

    /// Capital held beyond what usable rounds could absorb
    #[inline]
    pub fn excess_coverage(&self) -> Decimal {
        self.excess
    }

    /// Current frontier state
    #[inline]
    pub fn partial_round(&self) -> PartialRound {
        self.partial
    }

    /// Pool totals with premium projected to now
    pub fn get_totals(&self) -> Totals {
        let now = self.clock.now();
        Totals {
            batch_count: self.batches.len(),
            open_rounds: self.counters.open_rounds,
            usable_rounds: self.counters.usable_rounds,
            total_coverable: self.counters.usable_value - self.partial.round_coverage,
            total_demand: self.counters.total_demand,
            total_covered: self.counters.total_covered,
            pending_covered: self.partial.round_coverage,
            premium_rate: self.premium.premium_rate,
            total_premium: self.premium.projected(now),
            premium_rate_updated_at: self.premium.premium_rate_updated_at,
            premium_updated_at: now.max(self.premium.premium_updated_at),
        }
    }

    // ============ INSURED REGISTRY ============

    /// Register an insured
    #[instrument(skip(self), fields(insured = %insured))]
    pub fn add_insured(&mut self, insured: InsuredId) -> Result<(), LedgerError> {
        if self.insureds.contains_key(&insured) {
            return Err(LedgerError::DuplicateInsured(insured));
        }
        let now = self.clock.now();
        self.insureds.insert(insured, InsuredRecord::new(now));
        debug!("Insured registered");
        Ok(())
    }

    /// Whether `insured` is registered and not removed
    pub fn is_active_insured(&self, insured: &InsuredId) -> bool {
        self.insureds
            .get(insured)
            .is_some_and(|r| r.status == InsuredStatus::Active)
    }

    /// Number of registered insureds, removed ones included
    pub fn insured_count(&self) -> usize {
        self.insureds.len()
    }

    /// Registered insured ids, removed ones included
    pub fn insured_ids(&self) -> impl Iterator<Item = &InsuredId> {
        self.insureds.keys()
    }

    /// Retire an insured that has nothing uncovered and nothing left to receive
    ///
    /// The record is kept so covered units keep reporting premium.
    #[instrument(skip(self), fields(insured = %insured))]
    pub fn remove_insured(&mut self, insured: &InsuredId) -> Result<(), LedgerError> {
        self.active_record(insured)?;
        let receivable = self.receivable_coverage_demand(insured, None)?;
        let coverage = &receivable.coverage;
        let uncovered = coverage.total_demand - coverage.total_covered;
        if !uncovered.is_zero() || !receivable.available_coverage.is_zero() {
            return Err(LedgerError::OutstandingCoverage {
                insured: insured.clone(),
                uncovered,
                available: receivable.available_coverage,
            });
        }
        if let Some(record) = self.insureds.get_mut(insured) {
            record.status = InsuredStatus::Removed;
        }
        info!("Insured removed");
        Ok(())
    }

    pub(crate) fn record(&self, insured: &InsuredId) -> Result<&InsuredRecord, LedgerError> {
        self.insureds
            .get(insured)
            .ok_or_else(|| LedgerError::UnknownInsured(insured.clone()))
    }

    pub(crate) fn active_record(&self, insured: &InsuredId) -> Result<&InsuredRecord, LedgerError> {
        let record = self.record(insured)?;
        if record.status == InsuredStatus::Removed {
            return Err(LedgerError::RemovedInsured(insured.clone()));
        }
        Ok(record)
    }

    // ============ FRONTIER ============

    /// Global ordinal of the in-flight round
    #[inline]
    pub(crate) fn frontier(&self) -> u64 {
        self.batches.get(self.partial.batch_no).round_offset + self.partial.round_no
    }

    /// Lowest ordinal whose participants may still change
    #[inline]
    pub(crate) fn mutable_from(&self) -> u64 {
        let frontier = self.frontier();
        if self.partial.round_coverage.is_zero() {
            frontier
        } else {
            frontier + 1
        }
    }

    /// Move the frontier off exhausted or empty batches
    pub(crate) fn normalize_partial(&mut self) {
        loop {
            let no = self.partial.batch_no;
            let batch = self.batches.get(no);
            let Some(next) = batch.next else { break };
            if self.partial.round_no < batch.rounds {
                break;
            }
            debug_assert!(self.partial.round_coverage.is_zero());
            if self.first_open == no {
                self.first_open = next;
            }
            self.partial = PartialRound {
                batch_no: next,
                round_no: 0,
                round_coverage: Decimal::ZERO,
            };
        }
    }

    /// `insured`'s share of the value applied to the in-flight round
    ///
    /// Participants get equal shares truncated to `SHARE_DP` places, and the
    /// latest joiner takes the remainder, so the shares sum to
    /// `round_coverage` exactly.
    pub(crate) fn pending_share(&self, insured: &InsuredId) -> Decimal {
        let coverage = self.partial.round_coverage;
        let batch = self.batches.get(self.partial.batch_no);
        if coverage.is_zero() || batch.unit_per_round == 0 {
            return Decimal::ZERO;
        }
        let upr = batch.unit_per_round;
        let share = (coverage / Decimal::from(upr))
            .round_dp_with_strategy(SHARE_DP, RoundingStrategy::ToZero);
        if batch.participants.last() == Some(insured) {
            coverage - share * Decimal::from(upr - 1)
        } else {
            share
        }
    }

    // ============ CAPACITY BOOKKEEPING ============

    /// Uncovered rounds of a batch
    pub(crate) fn uncovered_rounds(&self, no: BatchNo) -> u64 {
        let batch = self.batches.get(no);
        let covered = self
            .frontier()
            .saturating_sub(batch.round_offset)
            .min(batch.rounds);
        batch.rounds - covered
    }

    fn contribution(&self, no: BatchNo) -> Contribution {
        let batch = self.batches.get(no);
        let open_rounds = self.uncovered_rounds(no);
        if !batch.state.is_coverable() || open_rounds == 0 {
            return Contribution {
                open_rounds,
                ..Contribution::default()
            };
        }
        Contribution {
            open_rounds,
            usable_rounds: open_rounds,
            usable_value: Decimal::from(open_rounds)
                * Decimal::from(batch.unit_per_round)
                * self.unit_size,
        }
    }

    /// Remove a batch's capacity from the counters before mutating it
    pub(crate) fn retract(&mut self, no: BatchNo) {
        let c = self.contribution(no);
        self.counters.open_rounds -= c.open_rounds;
        self.counters.usable_rounds -= c.usable_rounds;
        self.counters.usable_value -= c.usable_value;
    }

    /// Add a batch's capacity back after mutating it
    pub(crate) fn account(&mut self, no: BatchNo) {
        let c = self.contribution(no);
        self.counters.open_rounds += c.open_rounds;
        self.counters.usable_rounds += c.usable_rounds;
        self.counters.usable_value += c.usable_value;
    }

    /// Value of `rounds` single units
    #[inline]
    pub(crate) fn value_of(&self, rounds: u64) -> Decimal {
        Decimal::from(rounds) * self.unit_size
    }
}

impl std::fmt::Debug for CoverageLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoverageLedger")
            .field("unit_size", &self.unit_size)
            .field("limits", &self.limits)
            .field("batches", &self.batches.len())
            .field("partial", &self.partial)
            .field("insureds", &self.insureds.len())
            .field("excess", &self.excess)
            .finish()
    }
}
