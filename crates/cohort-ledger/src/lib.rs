//! # Cohort Ledger
//!
//! Round-batch coverage allocation ledger for a shared risk pool.
//!
//! ## Components
//!
//! - **Batches**: linked runs of rounds sharing the same insured participants
//! - **Demand allocator**: places and cancels insured demand
//! - **Coverage settler**: fills rounds with capital in FIFO order
//! - **Premium accrual**: lazily integrated premium, pool-wide and per insured
//! - **Reconciliation cursor**: bounded per-insured settlement
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       CoverageLedger                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │  demand ──► [batch]─►[batch]─►[batch]─► … ─►[tail]           │
//! │                 ▲                                            │
//! │  capital ──► partial round (frontier)                        │
//! │                                                              │
//! │  insured ──► entries ──► cursor ──► folded coverage          │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every operation is synchronous and bounded; callers that share a ledger
//! wrap it in a lock.

pub mod batch;
pub mod coverage;
pub mod demand;
pub mod dump;
pub mod ledger;
pub mod limits;
pub mod premium;
pub mod reconcile;

pub use batch::{Batch, BatchNo, BatchStore};
pub use coverage::CoverageApplied;
pub use demand::{CancelledDemand, DemandEntry, DemandPlacement, InsuredStatus, PendingAdjustments};
pub use dump::{BatchSnapshot, LedgerDump};
pub use ledger::{CoverageLedger, PartialRound, Totals};
pub use limits::{BatchState, RoundLimits};
pub use premium::{CoverageHistory, PremiumAccrual};
pub use reconcile::{DemandedCoverage, ReceivableCoverage, ReceivedCoverage};

#[cfg(test)]
pub(crate) mod testing {
    use crate::{CoverageLedger, RoundLimits};
    use cohort_common::ManualClock;
    use rust_decimal::Decimal;
    use std::sync::Arc;

    pub(crate) fn ledger_with(
        unit_size: Decimal,
        min: u32,
        max: u32,
        over: u32,
    ) -> (CoverageLedger, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_700_000_000));
        let limits = RoundLimits::new(min, max, over).unwrap();
        let ledger = CoverageLedger::new(unit_size, limits, clock.clone()).unwrap();
        (ledger, clock)
    }
}
