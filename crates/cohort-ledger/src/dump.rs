//! Diagnostic snapshot of the batch list

use crate::batch::BatchNo;
use crate::ledger::{CoverageLedger, PartialRound};
use crate::limits::{BatchState, RoundLimits};
use cohort_common::{CohortError, InsuredId};
use rust_decimal::Decimal;
use serde::Serialize;

/// One batch as seen in a [`LedgerDump`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSnapshot {
    pub batch_no: BatchNo,
    pub unit_per_round: u32,
    pub rounds: u64,
    pub round_premium_rate_sum: Decimal,
    pub state: BatchState,
    pub next: Option<BatchNo>,
    pub round_offset: u64,
    pub is_tail: bool,
    pub participants: Vec<InsuredId>,
}

/// Full ledger layout in round order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerDump {
    pub unit_size: Decimal,
    pub limits: RoundLimits,
    pub batches: Vec<BatchSnapshot>,
    pub partial: PartialRound,
    pub first_open: BatchNo,
    /// The empty tail batch
    pub latest: BatchNo,
    pub frontier: u64,
    pub excess: Decimal,
}

impl LedgerDump {
    /// Pretty-printed JSON
    pub fn to_json(&self) -> Result<String, CohortError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl CoverageLedger {
    /// Snapshot every batch in round order, zero batches included
    pub fn dump(&self) -> LedgerDump {
        let batches = self
            .batches
            .iter()
            .map(|(no, b)| BatchSnapshot {
                batch_no: no,
                unit_per_round: b.unit_per_round,
                rounds: b.rounds,
                round_premium_rate_sum: b.round_premium_rate_sum,
                state: b.state,
                next: b.next,
                round_offset: b.round_offset,
                is_tail: b.is_tail(),
                participants: b.participants.clone(),
            })
            .collect();

        LedgerDump {
            unit_size: self.unit_size,
            limits: self.limits,
            batches,
            partial: self.partial,
            first_open: self.first_open,
            latest: self.batches.tail(),
            frontier: self.frontier(),
            excess: self.excess,
        }
    }
}
