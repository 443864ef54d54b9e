//! Reconciliation cursor - bounded per-insured settlement
//!
//! An insured may accumulate any number of demand entries over a pool's
//! life. Views and reconciliation walk entries from the insured's cursor and
//! stop at the first entry the frontier has not reached, so the work per call
//! is proportional to the entries covered since the last reconciliation.
//! Callers cap it further with `fuse` / `max_iterations`.
//!
//! Reconciliation folds fully covered entries into fixed aggregates and moves
//! the cursor past them. Repeating small reconciliations reaches exactly the
//! state one unbounded reconciliation would.

use crate::demand::{DemandEntry, InsuredRecord, PendingAdjustments};
use crate::ledger::CoverageLedger;
use cohort_common::{InsuredId, LedgerError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// An insured's aggregate coverage position
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DemandedCoverage {
    pub total_demand: Decimal,
    pub total_covered: Decimal,
    /// Share of the in-flight round's applied value
    pub pending_covered: Decimal,
    pub premium_rate: Decimal,
    pub total_premium: Decimal,
    pub premium_updated_at: i64,
}

/// Result of [`CoverageLedger::receivable_coverage_demand`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReceivableCoverage {
    pub coverage: DemandedCoverage,
    /// Covered value not yet received
    pub available_coverage: Decimal,
    /// Demand a cancellation left in the in-flight round
    pub pending_adjustments: Option<PendingAdjustments>,
    /// Last time this insured reconciled
    pub reconciled_at: i64,
    /// False when `fuse` cut the walk short and figures are partial
    pub exhaustive: bool,
}

/// Result of [`CoverageLedger::receive_demanded_coverage`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReceivedCoverage {
    /// Value newly marked as received by this call
    pub received: Decimal,
    /// Entries visited
    pub iterations: usize,
    /// Whether the cursor reached the first entry not fully covered
    pub caught_up: bool,
}

/// Running sums over an insured's entries
#[derive(Debug, Clone, Default)]
struct Tally {
    covered_rounds: u64,
    rate: Decimal,
    weighted_time: Decimal,
    pending_covered: Decimal,
}

impl CoverageLedger {
    /// Coverage position of `insured`, walking at most `fuse` entries
    pub fn receivable_coverage_demand(
        &self,
        insured: &InsuredId,
        fuse: Option<usize>,
    ) -> Result<ReceivableCoverage, LedgerError> {
        let record = self.record(insured)?;
        let now = self.clock.now();
        let frontier = self.frontier();
        let limit = fuse.unwrap_or(usize::MAX);

        let mut tally = Tally {
            covered_rounds: record.folded.rounds,
            rate: record.folded.rate,
            weighted_time: record.folded.weighted_time,
            pending_covered: Decimal::ZERO,
        };
        let mut exhaustive = true;
        for (walked, entry) in record.entries[record.cursor..].iter().enumerate() {
            if entry.round_offset > frontier {
                break;
            }
            if walked >= limit {
                exhaustive = false;
                break;
            }
            self.tally_entry(&mut tally, insured, entry, frontier);
        }

        let received = record.received_rounds.min(tally.covered_rounds);
        Ok(ReceivableCoverage {
            coverage: DemandedCoverage {
                total_demand: self.value_of(record.demand_rounds),
                total_covered: self.value_of(tally.covered_rounds),
                pending_covered: tally.pending_covered,
                premium_rate: tally.rate,
                total_premium: premium_at(&tally, now),
                premium_updated_at: now,
            },
            available_coverage: self.value_of(tally.covered_rounds - received),
            pending_adjustments: self.live_pending(record, frontier),
            reconciled_at: record.reconciled_at,
            exhaustive,
        })
    }

    /// Mark covered value as received, visiting at most `max_iterations` entries
    #[instrument(skip(self), fields(insured = %insured))]
    pub fn receive_demanded_coverage(
        &mut self,
        insured: &InsuredId,
        max_iterations: usize,
    ) -> Result<ReceivedCoverage, LedgerError> {
        self.record(insured)?;
        let now = self.clock.now();
        self.premium.settle(now);
        if max_iterations == 0 {
            return Ok(ReceivedCoverage::default());
        }

        let frontier = self.frontier();
        let cover_times: Vec<(u64, Decimal)> = {
            let record = self.record(insured)?;
            record.entries[record.cursor..]
                .iter()
                .take(max_iterations)
                .take_while(|e| e.round_offset <= frontier)
                .map(|e| {
                    let covered = e.covered_below(frontier);
                    let times = self.history.time_sum(e.round_offset, e.round_offset + covered);
                    (covered, times)
                })
                .collect()
        };

        let unit_size = self.unit_size;
        let record = self
            .insureds
            .get_mut(insured)
            .ok_or_else(|| LedgerError::UnknownInsured(insured.clone()))?;

        let mut partial_rounds = 0u64;
        let mut iterations = 0usize;
        for (covered, times) in cover_times {
            iterations += 1;
            let entry = &record.entries[record.cursor];
            if covered < entry.rounds {
                partial_rounds = covered;
                break;
            }
            record.folded.rounds += entry.rounds;
            record.folded.rate += entry.premium_rate * Decimal::from(entry.rounds);
            record.folded.weighted_time += entry.premium_rate * times;
            record.cursor += 1;
        }

        let reached = record.folded.rounds + partial_rounds;
        let newly = reached.saturating_sub(record.received_rounds);
        record.received_rounds = record.received_rounds.max(reached);
        record.reconciled_at = now;
        if record.pending.as_ref().is_some_and(|p| p.round < frontier) {
            record.pending = None;
        }

        // a partly covered cursor entry counts once its covered rounds are received
        let caught_up = match record.entries.get(record.cursor) {
            None => true,
            Some(entry) => {
                entry.round_end() > frontier
                    && record.received_rounds
                        >= record.folded.rounds + entry.covered_below(frontier)
            }
        };
        let received = Decimal::from(newly) * unit_size;
        debug!(%received, iterations, cursor = record.cursor, caught_up, "Demanded coverage received");
        Ok(ReceivedCoverage {
            received,
            iterations,
            caught_up,
        })
    }

    fn tally_entry(
        &self,
        tally: &mut Tally,
        insured: &InsuredId,
        entry: &DemandEntry,
        frontier: u64,
    ) {
        let covered = entry.covered_below(frontier);
        if covered > 0 {
            let times = self
                .history
                .time_sum(entry.round_offset, entry.round_offset + covered);
            tally.covered_rounds += covered;
            tally.rate += entry.premium_rate * Decimal::from(covered);
            tally.weighted_time += entry.premium_rate * times;
        }
        if entry.contains(frontier) {
            tally.pending_covered += self.pending_share(insured);
        }
    }

    fn live_pending(&self, record: &InsuredRecord, frontier: u64) -> Option<PendingAdjustments> {
        record
            .pending
            .as_ref()
            .filter(|p| p.round >= frontier)
            .map(|p| p.adjustments.clone())
    }
}

/// Premium earned by every tallied unit up to `now`
fn premium_at(tally: &Tally, now: i64) -> Decimal {
    let earned = tally.rate * Decimal::from(now) - tally.weighted_time;
    earned.max(Decimal::ZERO)
}
