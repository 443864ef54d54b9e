//! Coverage settler - turning capital into covered rounds
//!
//! Capital fills rounds strictly in list order from the frontier. A round
//! completes once it holds `unit_per_round * unit_size`; until then its value
//! sits in the partial round. Completing a round credits one unit to every
//! participant and raises the premium rate by the batch's rate sum.
//!
//! The walk passes over drained zero batches and stops at the first batch that
//! cannot take coverage yet, or at the tail. Whatever is left becomes excess.

use crate::ledger::{CoverageLedger, PartialRound};
use cohort_common::LedgerError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

/// Outcome of applying capital
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageApplied {
    /// Value that went into rounds, partial round included
    pub absorbed: Decimal,
    /// Value left over and held as excess
    pub excess: Decimal,
    /// Rounds completed by this call
    pub rounds_completed: u64,
    /// Premium rate gained by this call
    pub premium_rate_added: Decimal,
}

impl CoverageLedger {
    /// Apply incoming capital to open rounds
    #[instrument(skip(self))]
    pub fn add_coverage(&mut self, amount: Decimal) -> Result<CoverageApplied, LedgerError> {
        if amount < Decimal::ZERO {
            return Err(LedgerError::NegativeAmount { amount });
        }
        let applied = self.apply_coverage(amount);
        self.excess += applied.excess;
        if !applied.excess.is_zero() {
            debug!(excess = %applied.excess, held = %self.excess, "Coverage exceeds usable demand");
        }
        Ok(applied)
    }

    /// Re-apply held excess to demand that became usable since
    #[instrument(skip(self))]
    pub fn push_coverage_excess(&mut self) -> CoverageApplied {
        let held = std::mem::take(&mut self.excess);
        let applied = self.apply_coverage(held);
        self.excess = applied.excess;
        info!(absorbed = %applied.absorbed, held = %self.excess, "Excess coverage pushed");
        applied
    }

    /// Hand excess capital back to its supplier
    #[instrument(skip(self))]
    pub fn withdraw_excess(&mut self, amount: Decimal) -> Result<Decimal, LedgerError> {
        if amount < Decimal::ZERO {
            return Err(LedgerError::NegativeAmount { amount });
        }
        if amount > self.excess {
            warn!(held = %self.excess, "Excess withdrawal above holdings");
            return Err(LedgerError::InsufficientExcess {
                requested: amount,
                held: self.excess,
            });
        }
        self.excess -= amount;
        debug!(held = %self.excess, "Excess coverage withdrawn");
        Ok(self.excess)
    }

    /// FIFO round filling shared by `add_coverage` and `push_coverage_excess`
    fn apply_coverage(&mut self, amount: Decimal) -> CoverageApplied {
        let now = self.clock.now();
        self.premium.settle(now);

        let mut remaining = amount;
        let mut rounds_completed = 0u64;
        let mut rate_added = Decimal::ZERO;

        loop {
            self.normalize_partial();
            let no = self.partial.batch_no;
            let batch = self.batches.get(no);
            if batch.is_tail() || !batch.state.is_coverable() || remaining.is_zero() {
                break;
            }

            let round_value = Decimal::from(batch.unit_per_round) * self.unit_size;
            let open = batch.rounds - self.partial.round_no;
            let rate_sum = batch.round_premium_rate_sum;
            let available = remaining + self.partial.round_coverage;
            let full = (available / round_value)
                .floor()
                .to_u64()
                .unwrap_or(u64::MAX)
                .min(open);
            let completed = Decimal::from(full) * round_value;

            self.retract(no);
            let leftover = available - completed;
            if full == open {
                self.partial = PartialRound {
                    batch_no: no,
                    round_no: self.partial.round_no + full,
                    round_coverage: Decimal::ZERO,
                };
                remaining = leftover;
            } else {
                self.partial = PartialRound {
                    batch_no: no,
                    round_no: self.partial.round_no + full,
                    round_coverage: leftover,
                };
                remaining = Decimal::ZERO;
            }
            self.account(no);

            if full > 0 {
                self.counters.total_covered += completed;
                rate_added += rate_sum * Decimal::from(full);
                rounds_completed += full;
            }
        }

        self.premium.increase_rate(rate_added, now);
        self.history.record(self.frontier(), now);

        if rounds_completed > 0 {
            debug!(
                rounds_completed,
                frontier = self.frontier(),
                %rate_added,
                "Rounds covered"
            );
        }
        CoverageApplied {
            absorbed: amount - remaining,
            excess: remaining,
            rounds_completed,
            premium_rate_added: rate_added,
        }
    }
}
