//! Scenario tests for the coverage ledger
//!
//! - Weighted rounds: shared batches, splits and FIFO settlement
//! - Cancellation: reconciliation first, covered value kept
//! - Inlined zero batches never block settlement

use cohort_common::{ErrorKind, InsuredId, ManualClock, UNBOUNDED_ITERATIONS};
use cohort_ledger::{CoverageLedger, RoundLimits};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

const RATE: Decimal = dec!(0.5);

fn ledger(min: u32, max: u32, over: u32) -> (CoverageLedger, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(1_700_000_000));
    let limits = RoundLimits::new(min, max, over).unwrap();
    let ledger = CoverageLedger::new(dec!(1), limits, clock.clone()).unwrap();
    (ledger, clock)
}

fn insureds(ledger: &mut CoverageLedger, names: &[&str]) -> Vec<InsuredId> {
    names
        .iter()
        .map(|name| {
            let id = InsuredId::from(*name);
            ledger.add_insured(id.clone()).unwrap();
            id
        })
        .collect()
}

fn covered(ledger: &CoverageLedger, insured: &InsuredId) -> Decimal {
    ledger
        .receivable_coverage_demand(insured, None)
        .unwrap()
        .coverage
        .total_covered
}

#[cfg(test)]
mod weighted_rounds {
    use super::*;

    #[test]
    fn test_demand_layout_and_shared_coverage() {
        let (mut ledger, _clock) = ledger(1, 2, 3);
        let ids = insureds(&mut ledger, &["insured1", "insured2", "insured3"]);

        ledger.add_coverage_demand(&ids[0], 1000, RATE, false).unwrap();
        let totals = ledger.get_totals();
        assert_eq!(totals.batch_count, 2);
        assert_eq!(totals.open_rounds, 1000);
        assert_eq!(totals.usable_rounds, 0);

        ledger.add_coverage_demand(&ids[1], 100, RATE, false).unwrap();
        let totals = ledger.get_totals();
        assert_eq!(totals.batch_count, 3);
        assert_eq!(totals.open_rounds, 1000);
        assert_eq!(totals.usable_rounds, 100);
        assert_eq!(totals.total_coverable, dec!(200));

        ledger.add_coverage_demand(&ids[2], 100, RATE, false).unwrap();
        let before: Vec<Decimal> = ids.iter().map(|id| covered(&ledger, id)).collect();

        let applied = ledger.add_coverage(dec!(30)).unwrap();
        assert_eq!(applied.rounds_completed, 10);
        for (id, was) in ids.iter().zip(before) {
            assert_eq!(covered(&ledger, id), was + dec!(10));
        }

        let totals = ledger.get_totals();
        assert_eq!(totals.total_covered, dec!(30));
        assert_eq!(totals.premium_rate, RATE * dec!(30));
        assert_eq!(totals.total_demand, dec!(1200));
    }

    #[test]
    fn test_settlement_stops_at_open_batch() {
        let (mut ledger, _clock) = ledger(1, 2, 3);
        let ids = insureds(&mut ledger, &["insured1", "insured2"]);
        ledger.add_coverage_demand(&ids[0], 1000, RATE, false).unwrap();
        ledger.add_coverage_demand(&ids[1], 100, RATE, false).unwrap();

        // 100 shared rounds take 200, the rest of insured1's demand is still open
        let applied = ledger.add_coverage(dec!(250)).unwrap();
        assert_eq!(applied.absorbed, dec!(200));
        assert_eq!(ledger.excess_coverage(), dec!(50));
        assert_eq!(covered(&ledger, &ids[0]), dec!(100));
        assert_eq!(ledger.get_totals().usable_rounds, 0);
        assert_eq!(ledger.get_totals().open_rounds, 900);
    }
}

#[cfg(test)]
mod cancellation {
    use super::*;

    #[test]
    fn test_cancel_everything_keeps_covered_value() {
        let (mut ledger, clock) = ledger(1, 2, 3);
        let ids = insureds(&mut ledger, &["insured1", "insured2", "insured3"]);
        for id in &ids {
            ledger.add_coverage_demand(id, 100, RATE, false).unwrap();
        }
        ledger.add_coverage(dec!(30)).unwrap();
        clock.advance(60);

        let err = ledger
            .cancel_coverage_demand(&ids[1], 1_000_000_000)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PrematureOperation);

        let received = ledger
            .receive_demanded_coverage(&ids[1], UNBOUNDED_ITERATIONS)
            .unwrap();
        assert_eq!(received.received, dec!(10));

        let before = ledger.receivable_coverage_demand(&ids[1], None).unwrap();
        let totals_before = ledger.get_totals();

        let cancelled = ledger.cancel_coverage_demand(&ids[1], 1_000_000_000).unwrap();
        assert_eq!(cancelled.cancelled_rounds, 90);
        assert!(cancelled.pending.is_none());

        let after = ledger.receivable_coverage_demand(&ids[1], None).unwrap();
        assert_eq!(after.coverage.total_covered, before.coverage.total_covered);
        assert_eq!(after.coverage.premium_rate, before.coverage.premium_rate);
        assert_eq!(after.coverage.total_demand, after.coverage.total_covered);

        let totals = ledger.get_totals();
        assert_eq!(totals.premium_rate, totals_before.premium_rate);
        assert_eq!(totals.total_covered, totals_before.total_covered);
        assert_eq!(totals.total_demand, totals_before.total_demand - dec!(90));

        // nothing left: only premium keeps moving
        clock.advance(60);
        let repeat = ledger.cancel_coverage_demand(&ids[1], 1_000_000_000).unwrap();
        assert_eq!(repeat.cancelled_rounds, 0);
        let totals_repeat = ledger.get_totals();
        assert_eq!(totals_repeat.total_demand, totals.total_demand);
        assert_eq!(totals_repeat.premium_rate, totals.premium_rate);
        assert!(totals_repeat.total_premium > totals.total_premium);
    }

    #[test]
    fn test_in_flight_unit_is_pending() {
        let (mut ledger, _clock) = ledger(0, 4, 4);
        let ids = insureds(&mut ledger, &["a", "b"]);
        ledger.add_coverage_demand(&ids[0], 10, RATE, false).unwrap();
        ledger.add_coverage_demand(&ids[1], 10, RATE, false).unwrap();

        // two full rounds of 2 and half of the third
        ledger.add_coverage(dec!(5)).unwrap();
        ledger
            .receive_demanded_coverage(&ids[1], UNBOUNDED_ITERATIONS)
            .unwrap();

        let cancelled = ledger.cancel_coverage_demand(&ids[1], 100).unwrap();
        assert_eq!(cancelled.cancelled_rounds, 7);
        let pending = cancelled.pending.unwrap();
        assert_eq!(pending.pending_demand, dec!(1));
        assert_eq!(pending.pending_covered, dec!(0.5));

        let view = ledger.receivable_coverage_demand(&ids[1], None).unwrap();
        assert_eq!(view.pending_adjustments, Some(pending));
        assert_eq!(view.coverage.total_demand, dec!(3));
        assert_eq!(view.coverage.pending_covered, dec!(0.5));

        // completing the in-flight round clears the adjustment on reconciliation
        ledger.add_coverage(dec!(1)).unwrap();
        ledger
            .receive_demanded_coverage(&ids[1], UNBOUNDED_ITERATIONS)
            .unwrap();
        let view = ledger.receivable_coverage_demand(&ids[1], None).unwrap();
        assert_eq!(view.pending_adjustments, None);
        assert_eq!(view.coverage.total_covered, dec!(3));
        assert_eq!(view.coverage.total_demand, dec!(3));
    }

    #[test]
    fn test_remove_insured_after_full_cancel() {
        let (mut ledger, _clock) = ledger(0, 2, 3);
        let ids = insureds(&mut ledger, &["a"]);
        ledger.add_coverage_demand(&ids[0], 10, RATE, false).unwrap();

        let err = ledger.remove_insured(&ids[0]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalState);

        ledger.cancel_coverage_demand(&ids[0], 10).unwrap();
        ledger.remove_insured(&ids[0]).unwrap();
        assert!(!ledger.is_active_insured(&ids[0]));

        let err = ledger
            .add_coverage_demand(&ids[0], 1, RATE, false)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalState);
    }
}

#[cfg(test)]
mod zero_batches {
    use super::*;

    #[test]
    fn test_inlined_zero_batch_does_not_block_coverage() {
        // one unit per round: every insured gets a batch of its own
        let (mut ledger, _clock) = ledger(0, 1, 1);
        let ids = insureds(&mut ledger, &["a", "b", "c"]);
        for id in &ids {
            ledger.add_coverage_demand(id, 10, RATE, false).unwrap();
        }

        let cancelled = ledger.cancel_coverage_demand(&ids[1], 1_000_000_000).unwrap();
        assert_eq!(cancelled.cancelled_rounds, 10);

        let dump = ledger.dump();
        let rounds: Vec<u64> = dump.batches.iter().map(|b| b.rounds).collect();
        assert_eq!(rounds, vec![10, 0, 10, 0]);
        assert_eq!(ledger.get_totals().open_rounds, 20);

        let applied = ledger.add_coverage(dec!(30)).unwrap();
        assert_eq!(applied.rounds_completed, 20);
        assert_eq!(applied.excess, dec!(10));
        assert_eq!(covered(&ledger, &ids[0]), dec!(10));
        assert_eq!(covered(&ledger, &ids[2]), dec!(10));
        assert_eq!(covered(&ledger, &ids[1]), dec!(0));
        assert!(ledger.dump().batches[ledger.dump().batches.len() - 1].is_tail);
    }

    #[test]
    fn test_new_demand_after_zero_batch_is_covered() {
        let (mut ledger, _clock) = ledger(0, 1, 1);
        let ids = insureds(&mut ledger, &["a", "b", "c", "d"]);
        for id in &ids[..3] {
            ledger.add_coverage_demand(id, 5, RATE, false).unwrap();
        }
        ledger.cancel_coverage_demand(&ids[1], 5).unwrap();
        ledger.add_coverage(dec!(10)).unwrap();
        assert_eq!(ledger.excess_coverage(), dec!(0));

        ledger.add_coverage_demand(&ids[3], 5, RATE, false).unwrap();
        let pushed = ledger.push_coverage_excess();
        assert_eq!(pushed.absorbed, dec!(0));
        ledger.add_coverage(dec!(5)).unwrap();
        assert_eq!(covered(&ledger, &ids[3]), dec!(5));
        assert_eq!(ledger.get_totals().open_rounds, 0);
    }
}
