//! Round limits - how many insured units may share one round
//!
//! Three thresholds govern every batch:
//! - `min`: a batch must hold more than `min` units per round before its rounds
//!   can receive coverage
//! - `max`: below `max` a batch accepts newcomers even if it has to split
//! - `over`: between `max` and `over` a batch only accepts a newcomer that takes
//!   every one of its rounds, so no further splitting happens

use cohort_common::LedgerError;
use serde::{Deserialize, Serialize};

/// Unit-per-round bounds applied to batches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundLimits {
    pub min: u32,
    pub max: u32,
    pub over: u32,
}

impl RoundLimits {
    /// Validate and build limits (`min <= max <= over`, `max >= 1`)
    pub fn new(min: u32, max: u32, over: u32) -> Result<Self, LedgerError> {
        if max == 0 || min > max || max > over {
            return Err(LedgerError::InvalidRoundLimits { min, max, over });
        }
        Ok(Self { min, max, over })
    }

    /// State of a batch holding `unit_per_round` units in each round
    pub fn state_for(&self, unit_per_round: u32) -> BatchState {
        if unit_per_round <= self.min {
            BatchState::Open
        } else if unit_per_round < self.max {
            BatchState::ReadyMin
        } else if unit_per_round < self.over {
            BatchState::Ready
        } else {
            BatchState::Full
        }
    }

    /// Whether a batch with `unit_per_round` may take one more insured
    #[inline]
    pub fn accepts(&self, unit_per_round: u32, needs_split: bool) -> bool {
        unit_per_round < self.max || (unit_per_round < self.over && !needs_split)
    }
}

impl Default for RoundLimits {
    fn default() -> Self {
        Self {
            min: cohort_common::DEFAULT_MIN_UNITS_PER_ROUND,
            max: cohort_common::DEFAULT_MAX_UNITS_PER_ROUND,
            over: cohort_common::DEFAULT_OVER_UNITS_PER_ROUND,
        }
    }
}

impl std::fmt::Display for RoundLimits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RoundLimits(min={}, max={}, over={})", self.min, self.max, self.over)
    }
}

/// Lifecycle state of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    /// Still collecting insureds; rounds cannot receive coverage yet
    Open,
    /// Coverable, and still splits to take newcomers
    ReadyMin,
    /// Coverable, takes only newcomers that need no split
    Ready,
    /// Coverable, takes no more insureds
    Full,
}

impl BatchState {
    /// Whether rounds in this state may receive coverage
    #[inline]
    pub fn is_coverable(&self) -> bool {
        !matches!(self, BatchState::Open)
    }
}
