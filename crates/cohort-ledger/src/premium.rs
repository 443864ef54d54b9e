//! Premium accrual
//!
//! Premium accrues continuously on covered units. Totals integrate lazily:
//! every entry point settles `rate * elapsed` into the running total before
//! anything changes the rate.
//!
//! Individual insureds are never touched when rounds complete, so their
//! premium is derived in closed form instead. A unit covered at time `t` with
//! per-unit rate `r` has earned `r * (now - t)`. [`CoverageHistory`] records
//! when the coverage frontier passed each round ordinal, so the sum of cover
//! times over any range of rounds costs one binary search per endpoint.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Lazily integrated premium for the whole pool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PremiumAccrual {
    /// Premium earned per second by all covered units
    pub premium_rate: Decimal,
    /// Premium integrated up to `premium_updated_at`
    pub total_premium: Decimal,
    /// Last time the rate changed
    pub premium_rate_updated_at: i64,
    /// Last time `total_premium` was brought up to date
    pub premium_updated_at: i64,
}

impl PremiumAccrual {
    /// Start accruing at `now` with a zero rate
    pub fn new(now: i64) -> Self {
        Self {
            premium_rate: Decimal::ZERO,
            total_premium: Decimal::ZERO,
            premium_rate_updated_at: now,
            premium_updated_at: now,
        }
    }

    /// Premium that would be reported at `now`, without mutating
    pub fn projected(&self, now: i64) -> Decimal {
        let elapsed = now - self.premium_updated_at;
        if elapsed <= 0 {
            return self.total_premium;
        }
        self.total_premium + self.premium_rate * Decimal::from(elapsed)
    }

    /// Integrate elapsed time into the total
    pub fn settle(&mut self, now: i64) {
        if now > self.premium_updated_at {
            self.total_premium = self.projected(now);
            self.premium_updated_at = now;
        }
    }

    /// Settle, then raise the rate
    pub fn increase_rate(&mut self, delta: Decimal, now: i64) {
        self.settle(now);
        if delta.is_zero() {
            return;
        }
        self.premium_rate += delta;
        self.premium_rate_updated_at = now;
    }
}

/// One frontier advance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Frontier ordinal after the advance
    pub frontier: u64,
    /// Time of the advance
    pub at: i64,
    /// Sum of cover times of every ordinal below `frontier`
    pub cumulative: Decimal,
}

/// Cover-time history of the coverage frontier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageHistory {
    checkpoints: Vec<Checkpoint>,
}

impl CoverageHistory {
    pub fn new(now: i64) -> Self {
        Self {
            checkpoints: vec![Checkpoint {
                frontier: 0,
                at: now,
                cumulative: Decimal::ZERO,
            }],
        }
    }

    /// Frontier as of the latest checkpoint
    pub fn frontier(&self) -> u64 {
        self.last().frontier
    }

    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }

    fn last(&self) -> &Checkpoint {
        // never empty: constructed with the origin checkpoint
        &self.checkpoints[self.checkpoints.len() - 1]
    }

    /// Record that the frontier reached `frontier` at `at`
    ///
    /// Advances at the same timestamp collapse into one checkpoint.
    pub fn record(&mut self, frontier: u64, at: i64) {
        let last = *self.last();
        if frontier <= last.frontier {
            return;
        }
        let cumulative =
            last.cumulative + Decimal::from(frontier - last.frontier) * Decimal::from(at);
        let checkpoint = Checkpoint {
            frontier,
            at,
            cumulative,
        };
        if last.at == at {
            let idx = self.checkpoints.len() - 1;
            self.checkpoints[idx] = checkpoint;
        } else {
            self.checkpoints.push(checkpoint);
        }
    }

    /// Sum of cover times of ordinals in `[0, ordinal)`
    ///
    /// `ordinal` is clamped to the recorded frontier.
    pub fn cumulative_at(&self, ordinal: u64) -> Decimal {
        let idx = self.checkpoints.partition_point(|c| c.frontier < ordinal);
        if idx == 0 {
            // the origin checkpoint absorbed advances made at creation time
            let first = &self.checkpoints[0];
            return Decimal::from(ordinal) * Decimal::from(first.at);
        }
        if idx == self.checkpoints.len() {
            return self.last().cumulative;
        }
        let prev = &self.checkpoints[idx - 1];
        let cur = &self.checkpoints[idx];
        prev.cumulative + Decimal::from(ordinal - prev.frontier) * Decimal::from(cur.at)
    }

    /// Sum of cover times of ordinals in `[from, to)`
    pub fn time_sum(&self, from: u64, to: u64) -> Decimal {
        if to <= from {
            return Decimal::ZERO;
        }
        self.cumulative_at(to) - self.cumulative_at(from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_settle_before_rate_change() {
        let mut accrual = PremiumAccrual::new(100);
        accrual.increase_rate(dec!(3), 100);
        accrual.increase_rate(dec!(2), 110);
        // 10s at rate 3 settled before the rate moved to 5
        assert_eq!(accrual.total_premium, dec!(30));
        assert_eq!(accrual.projected(120), dec!(80));
        assert_eq!(accrual.premium_rate_updated_at, 110);
    }

    #[test]
    fn test_projection_ignores_clock_going_back() {
        let mut accrual = PremiumAccrual::new(100);
        accrual.increase_rate(dec!(1), 100);
        accrual.settle(150);
        assert_eq!(accrual.projected(120), dec!(50));
    }

    #[test]
    fn test_history_time_sums() {
        let mut history = CoverageHistory::new(0);
        history.record(10, 100);
        history.record(15, 200);
        // same-timestamp advances merge
        history.record(20, 200);
        assert_eq!(history.len(), 3);
        assert_eq!(history.frontier(), 20);

        assert_eq!(history.time_sum(0, 10), dec!(1000));
        assert_eq!(history.time_sum(5, 12), dec!(5) * dec!(100) + dec!(2) * dec!(200));
        assert_eq!(history.time_sum(10, 20), dec!(2000));
        assert_eq!(history.time_sum(7, 7), Decimal::ZERO);
    }

    #[test]
    fn test_advance_at_creation_time() {
        let mut history = CoverageHistory::new(50);
        history.record(4, 50);
        assert_eq!(history.len(), 1);
        assert_eq!(history.time_sum(0, 2), dec!(100));
        assert_eq!(history.time_sum(1, 4), dec!(150));
    }

    #[test]
    fn test_stale_record_is_ignored() {
        let mut history = CoverageHistory::new(0);
        history.record(10, 100);
        history.record(4, 300);
        assert_eq!(history.frontier(), 10);
        assert_eq!(history.cumulative_at(10), dec!(1000));
    }
}
