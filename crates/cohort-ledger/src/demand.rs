//! Demand allocator - placing and cancelling insured demand
//!
//! An insured demanding `n` rounds contributes one unit to each of `n`
//! uncovered rounds. Placement walks batches from the first open batch,
//! joining batches whole and splitting the last one it needs, and sends
//! whatever is left to the tail as a new batch.
//!
//! Each placement is recorded as [`DemandEntry`] runs. An entry always covers
//! whole batches with contiguous round ordinals, so how much of it is covered
//! follows from the frontier alone, without visiting its batches.

use crate::batch::BatchNo;
use crate::ledger::CoverageLedger;
use cohort_common::{InsuredId, LedgerError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

/// Registration status of an insured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsuredStatus {
    Active,
    Removed,
}

/// A contiguous run of rounds holding one unit of an insured's demand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandEntry {
    /// First batch of the run
    pub start_batch: BatchNo,
    /// Global ordinal of the first round
    pub round_offset: u64,
    pub rounds: u64,
    /// Premium per covered unit per second
    pub premium_rate: Decimal,
}

impl DemandEntry {
    #[inline]
    pub fn round_end(&self) -> u64 {
        self.round_offset + self.rounds
    }

    /// Rounds of this entry below `frontier`
    #[inline]
    pub fn covered_below(&self, frontier: u64) -> u64 {
        frontier.saturating_sub(self.round_offset).min(self.rounds)
    }

    /// Whether the run contains ordinal `round`
    #[inline]
    pub fn contains(&self, round: u64) -> bool {
        self.round_offset <= round && round < self.round_end()
    }
}

/// Demand a cancellation could not remove because it sits in the in-flight round
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PendingAdjustments {
    /// Demand value left in place
    pub pending_demand: Decimal,
    /// Share of the in-flight round's applied value attributed to that demand
    pub pending_covered: Decimal,
}

/// Pending adjustments tagged with the round that must complete to clear them
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PendingCancellation {
    pub(crate) round: u64,
    pub(crate) adjustments: PendingAdjustments,
}

/// Aggregates of entries the cursor has already folded away
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct FoldedCoverage {
    pub(crate) rounds: u64,
    /// Sum of `rate * rounds`
    pub(crate) rate: Decimal,
    /// Sum of `rate * cover time` over every folded unit
    pub(crate) weighted_time: Decimal,
}

/// Per-insured demand record
#[derive(Debug, Clone)]
pub(crate) struct InsuredRecord {
    pub(crate) status: InsuredStatus,
    pub(crate) entries: Vec<DemandEntry>,
    /// Index of the first entry not yet folded
    pub(crate) cursor: usize,
    pub(crate) demand_rounds: u64,
    pub(crate) folded: FoldedCoverage,
    pub(crate) received_rounds: u64,
    pub(crate) pending: Option<PendingCancellation>,
    pub(crate) reconciled_at: i64,
}

impl InsuredRecord {
    pub(crate) fn new(now: i64) -> Self {
        Self {
            status: InsuredStatus::Active,
            entries: Vec::new(),
            cursor: 0,
            demand_rounds: 0,
            folded: FoldedCoverage::default(),
            received_rounds: 0,
            pending: None,
            reconciled_at: now,
        }
    }

    /// One past the last round this insured holds
    fn demand_end(&self) -> Option<u64> {
        self.entries.last().map(DemandEntry::round_end)
    }
}

/// Where a demand landed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DemandPlacement {
    pub rounds: u64,
    /// Existing batches the insured joined
    pub batches_joined: usize,
    /// Batches created by splits and by filling the tail
    pub batches_created: usize,
    /// Separate runs the demand was spread over
    pub runs: usize,
}

/// Result of a cancellation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CancelledDemand {
    pub cancelled_rounds: u64,
    pub cancelled_value: Decimal,
    /// Demand held back by the in-flight round, if any
    pub pending: Option<PendingAdjustments>,
}

/// A run being assembled during placement
struct Run {
    start_batch: BatchNo,
    round_offset: u64,
    rounds: u64,
}

impl CoverageLedger {
    /// Add `rounds` units of demand for `insured` at `premium_rate` per unit
    ///
    /// With `extend` the first run merges into the insured's latest entry when
    /// it continues it at the same rate.
    #[instrument(skip(self), fields(insured = %insured))]
    pub fn add_coverage_demand(
        &mut self,
        insured: &InsuredId,
        rounds: u64,
        premium_rate: Decimal,
        extend: bool,
    ) -> Result<DemandPlacement, LedgerError> {
        if rounds == 0 {
            return Err(LedgerError::ZeroRounds);
        }
        if premium_rate < Decimal::ZERO {
            return Err(LedgerError::NegativeRate { rate: premium_rate });
        }
        let demand_end = self.active_record(insured)?.demand_end();

        let now = self.clock.now();
        self.check_demand_fits(rounds, premium_rate, now)?;
        self.premium.settle(now);

        let batches_before = self.batches.len();
        let start = self.demand_start(demand_end);

        let mut runs: Vec<Run> = Vec::new();
        let mut batches_joined = 0usize;
        let mut remaining = rounds;
        let mut cur = start;

        while remaining > 0 {
            let batch = self.batches.get(cur);
            let Some(next) = batch.next else {
                let state = self.limits.state_for(1);
                let filled = self.batches.fill_tail(insured, remaining, premium_rate, state);
                self.account(filled);
                push_run(&mut runs, filled, self.batches.get(filled).round_offset, remaining);
                break;
            };

            if batch.rounds == 0 {
                cur = next;
                continue;
            }

            let needs_split = batch.rounds > remaining;
            if !self.limits.accepts(batch.unit_per_round, needs_split) {
                cur = next;
                continue;
            }

            self.retract(cur);
            if needs_split {
                let rest = self.batches.split(cur, remaining);
                self.account(rest);
            }
            let upr = {
                let batch = self.batches.get_mut(cur);
                batch.unit_per_round += 1;
                batch.round_premium_rate_sum += premium_rate;
                batch.participants.push(insured.clone());
                batch.unit_per_round
            };
            self.batches.get_mut(cur).state = self.limits.state_for(upr);
            self.account(cur);

            let joined = self.batches.get(cur);
            let (offset, taken, after) = (joined.round_offset, joined.rounds, joined.next);
            push_run(&mut runs, cur, offset, taken);
            batches_joined += 1;
            remaining -= taken;

            match after {
                Some(after) => cur = after,
                None => break,
            }
        }

        self.advance_first_open();

        let run_count = runs.len();
        let value = self.value_of(rounds);
        self.counters.total_demand += value;

        let record = self
            .insureds
            .get_mut(insured)
            .ok_or_else(|| LedgerError::UnknownInsured(insured.clone()))?;
        record.demand_rounds += rounds;
        for (i, run) in runs.into_iter().enumerate() {
            let merged = i == 0
                && extend
                && record.entries.len() > record.cursor
                && record.entries.last().is_some_and(|last| {
                    last.round_end() == run.round_offset && last.premium_rate == premium_rate
                });
            if merged {
                if let Some(last) = record.entries.last_mut() {
                    last.rounds += run.rounds;
                }
            } else {
                record.entries.push(DemandEntry {
                    start_batch: run.start_batch,
                    round_offset: run.round_offset,
                    rounds: run.rounds,
                    premium_rate,
                });
            }
        }

        let placement = DemandPlacement {
            rounds,
            batches_joined,
            batches_created: self.batches.len() - batches_before,
            runs: run_count,
        };
        debug!(
            rounds,
            %premium_rate,
            joined = placement.batches_joined,
            created = placement.batches_created,
            runs = placement.runs,
            "Coverage demand added"
        );
        Ok(placement)
    }

    /// Reject demand whose rounds, value or premium would overflow the ledger
    fn check_demand_fits(
        &self,
        rounds: u64,
        premium_rate: Decimal,
        now: i64,
    ) -> Result<(), LedgerError> {
        let too_large = || LedgerError::DemandTooLarge { rounds };
        let tail = self.batches.get(self.batches.tail());
        tail.round_offset.checked_add(rounds).ok_or_else(too_large)?;

        let units = Decimal::from(rounds);
        let value = units.checked_mul(self.unit_size).ok_or_else(too_large)?;
        self.counters
            .total_demand
            .checked_add(value)
            .ok_or_else(too_large)?;
        value
            .checked_mul(Decimal::from(self.limits.over))
            .and_then(|capacity| capacity.checked_add(self.counters.usable_value))
            .ok_or_else(too_large)?;
        units
            .checked_mul(premium_rate)
            .and_then(|rate| rate.checked_mul(Decimal::from(now.max(1))))
            .ok_or_else(too_large)?;
        Ok(())
    }

    /// First batch a new demand may join
    ///
    /// Splits the frontier batch so joins never touch covered or in-flight
    /// rounds, and skips past the insured's own latest batch.
    fn demand_start(&mut self, demand_end: Option<u64>) -> BatchNo {
        let mut start = self.first_open;

        if start == self.partial.batch_no {
            let boundary = self.partial.round_no
                + u64::from(!self.partial.round_coverage.is_zero());
            let batch = self.batches.get(start);
            if boundary > 0 {
                if boundary < batch.rounds {
                    self.retract(start);
                    let rest = self.batches.split(start, boundary);
                    self.account(start);
                    self.account(rest);
                    start = rest;
                } else if let Some(next) = batch.next {
                    start = next;
                }
                self.first_open = start;
                self.normalize_partial();
            }
        }

        if let Some(end) = demand_end {
            loop {
                let batch = self.batches.get(start);
                match batch.next {
                    Some(next) if batch.round_offset < end => start = next,
                    _ => break,
                }
            }
        }
        start
    }

    /// Skip the first open pointer past batches that can take nobody
    fn advance_first_open(&mut self) {
        loop {
            let batch = self.batches.get(self.first_open);
            let Some(next) = batch.next else { break };
            if batch.rounds > 0 && batch.unit_per_round < self.limits.over {
                break;
            }
            self.first_open = next;
        }
    }

    /// Cancel up to `max_rounds` of the insured's uncovered demand, latest first
    ///
    /// Covered units, premium rates and pending coverage are unaffected. The
    /// insured must have received all covered value first.
    #[instrument(skip(self), fields(insured = %insured))]
    pub fn cancel_coverage_demand(
        &mut self,
        insured: &InsuredId,
        max_rounds: u64,
    ) -> Result<CancelledDemand, LedgerError> {
        let receivable = self.receivable_coverage_demand(insured, None)?;
        self.active_record(insured)?;
        if !receivable.available_coverage.is_zero() {
            warn!(available = %receivable.available_coverage, "Cancellation before receiving coverage");
            return Err(LedgerError::UnreceivedCoverage {
                insured: insured.clone(),
                available: receivable.available_coverage,
            });
        }

        let now = self.clock.now();
        self.premium.settle(now);
        if max_rounds == 0 {
            return Ok(CancelledDemand::default());
        }

        let frontier = self.frontier();
        let lowest = self.mutable_from();
        let entry_count = self.record(insured)?.entries.len();

        let mut remaining = max_rounds;
        let mut kept = entry_count;
        let mut trimmed: Option<u64> = None;

        for idx in (0..entry_count).rev() {
            if remaining == 0 {
                break;
            }
            let entry = self.record(insured)?.entries[idx].clone();
            let low = entry.round_offset.max(lowest);
            let end = entry.round_end();
            if end <= low {
                break;
            }
            let take = remaining.min(end - low);
            let cut = end - take;
            self.remove_units(insured, &entry, cut);

            remaining -= take;
            if cut == entry.round_offset {
                kept -= 1;
            } else {
                trimmed = Some(cut - entry.round_offset);
                break;
            }
        }

        let cancelled = max_rounds - remaining;
        self.normalize_partial();
        let value = self.value_of(cancelled);
        self.counters.total_demand -= value;

        let round_coverage = self.partial.round_coverage;
        let share = self.pending_share(insured);
        let unit_size = self.unit_size;

        let record = self
            .insureds
            .get_mut(insured)
            .ok_or_else(|| LedgerError::UnknownInsured(insured.clone()))?;
        record.entries.truncate(kept);
        if let Some(rounds) = trimmed {
            if let Some(last) = record.entries.last_mut() {
                last.rounds = rounds;
            }
        }
        record.cursor = record.cursor.min(record.entries.len());
        record.demand_rounds -= cancelled;

        // demand stuck in the in-flight round
        let in_flight = !round_coverage.is_zero()
            && remaining > 0
            && record.entries.last().is_some_and(|e| e.contains(frontier));
        let pending = in_flight.then(|| PendingAdjustments {
            pending_demand: unit_size,
            pending_covered: share,
        });
        if let Some(adjustments) = &pending {
            record.pending = Some(PendingCancellation {
                round: frontier,
                adjustments: adjustments.clone(),
            });
        }

        info!(cancelled, requested = max_rounds, pending = pending.is_some(), "Coverage demand cancelled");
        Ok(CancelledDemand {
            cancelled_rounds: cancelled,
            cancelled_value: value,
            pending,
        })
    }

    /// Take `insured`'s unit out of every round of `entry` in `[cut, end)`
    fn remove_units(&mut self, insured: &InsuredId, entry: &DemandEntry, cut: u64) {
        let end = entry.round_end();

        let mut cur = entry.start_batch;
        loop {
            let batch = self.batches.get(cur);
            if batch.round_end() > cut {
                break;
            }
            match batch.next {
                Some(next) => cur = next,
                None => return,
            }
        }

        let offset = self.batches.get(cur).round_offset;
        if offset < cut {
            self.retract(cur);
            let rest = self.batches.split(cur, cut - offset);
            self.account(cur);
            self.account(rest);
            cur = rest;
        }

        loop {
            let batch = self.batches.get(cur);
            if batch.round_offset >= end {
                break;
            }
            let next = batch.next;
            if batch.rounds > 0 {
                self.retract(cur);
                let upr = {
                    let batch = self.batches.get_mut(cur);
                    batch.unit_per_round -= 1;
                    batch.round_premium_rate_sum -= entry.premium_rate;
                    if let Some(pos) = batch.participants.iter().position(|p| p == insured) {
                        batch.participants.remove(pos);
                    }
                    if batch.unit_per_round == 0 {
                        batch.rounds = 0;
                        batch.round_premium_rate_sum = Decimal::ZERO;
                    }
                    batch.unit_per_round
                };
                self.batches.get_mut(cur).state = self.limits.state_for(upr);
                self.account(cur);
                if upr == 0 {
                    debug!(batch = %cur, "Batch drained to zero rounds");
                }
            }
            match next {
                Some(next) => cur = next,
                None => break,
            }
        }
    }
}

/// Append a batch to the current run, or start a new run at a discontinuity
fn push_run(runs: &mut Vec<Run>, batch: BatchNo, round_offset: u64, rounds: u64) {
    if let Some(run) = runs.last_mut() {
        if run.round_offset + run.rounds == round_offset {
            run.rounds += rounds;
            return;
        }
    }
    runs.push(Run {
        start_batch: batch,
        round_offset,
        rounds,
    });
}
