//! Batch store - arena of batches linked in round order
//!
//! A batch is a run of rounds that share the same participants. Batches live
//! in a `Vec` and link to their successor by index, so splitting inserts a new
//! arena entry without moving anything. Nothing is ever removed: a batch
//! drained by cancellation keeps its place with zero rounds.
//!
//! Every batch carries `round_offset`, the global ordinal of its first round.
//! Offsets never change once assigned and strictly increase along the list
//! for non-empty batches, which lets callers compare positions without walking.

use crate::limits::BatchState;
use cohort_common::InsuredId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Handle of a batch inside the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchNo(pub usize);

impl std::fmt::Display for BatchNo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A homogeneous block of rounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    /// Insured units sharing each round
    pub unit_per_round: u32,
    /// Number of rounds
    pub rounds: u64,
    /// Sum of the per-unit premium rates of all participants
    pub round_premium_rate_sum: Decimal,
    /// Lifecycle state, derived from `unit_per_round` when last touched
    pub state: BatchState,
    /// Successor in round order
    pub next: Option<BatchNo>,
    /// Global ordinal of the first round
    pub round_offset: u64,
    /// Insureds holding a unit in every round, in joining order
    pub participants: Vec<InsuredId>,
}

impl Batch {
    fn empty(round_offset: u64) -> Self {
        Self {
            unit_per_round: 0,
            rounds: 0,
            round_premium_rate_sum: Decimal::ZERO,
            state: BatchState::Open,
            next: None,
            round_offset,
            participants: Vec::new(),
        }
    }

    /// One past the global ordinal of the last round
    #[inline]
    pub fn round_end(&self) -> u64 {
        self.round_offset + self.rounds
    }

    /// Whether this is the empty tail that takes brand-new rounds
    #[inline]
    pub fn is_tail(&self) -> bool {
        self.next.is_none()
    }
}

/// Arena of batches
#[derive(Debug, Clone)]
pub struct BatchStore {
    batches: Vec<Batch>,
    head: BatchNo,
    tail: BatchNo,
}

impl BatchStore {
    /// Create a store holding only the empty tail
    pub fn new() -> Self {
        Self {
            batches: vec![Batch::empty(0)],
            head: BatchNo(0),
            tail: BatchNo(0),
        }
    }

    /// Number of batches ever created, the tail included
    #[inline]
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    #[inline]
    pub fn head(&self) -> BatchNo {
        self.head
    }

    #[inline]
    pub fn tail(&self) -> BatchNo {
        self.tail
    }

    #[inline]
    pub fn get(&self, no: BatchNo) -> &Batch {
        &self.batches[no.0]
    }

    #[inline]
    pub fn get_mut(&mut self, no: BatchNo) -> &mut Batch {
        &mut self.batches[no.0]
    }

    /// Split `no` after its first `at` rounds, returning the new second half
    ///
    /// Both halves keep the participants, rate sum and state of the split batch.
    pub fn split(&mut self, no: BatchNo, at: u64) -> BatchNo {
        let new_no = BatchNo(self.batches.len());
        let batch = &mut self.batches[no.0];
        debug_assert!(at > 0 && at < batch.rounds, "split point inside batch");

        let second = Batch {
            unit_per_round: batch.unit_per_round,
            rounds: batch.rounds - at,
            round_premium_rate_sum: batch.round_premium_rate_sum,
            state: batch.state,
            next: batch.next,
            round_offset: batch.round_offset + at,
            participants: batch.participants.clone(),
        };
        batch.rounds = at;
        batch.next = Some(new_no);

        self.batches.push(second);
        new_no
    }

    /// Turn the tail into a batch of `rounds` rounds held by `insured` alone
    /// and append a fresh tail
    pub fn fill_tail(
        &mut self,
        insured: &InsuredId,
        rounds: u64,
        rate: Decimal,
        state: BatchState,
    ) -> BatchNo {
        let filled = self.tail;
        let new_tail = BatchNo(self.batches.len());
        let batch = &mut self.batches[filled.0];
        batch.unit_per_round = 1;
        batch.rounds = rounds;
        batch.round_premium_rate_sum = rate;
        batch.state = state;
        batch.next = Some(new_tail);
        batch.participants = vec![insured.clone()];

        let offset = batch.round_end();
        self.batches.push(Batch::empty(offset));
        self.tail = new_tail;
        filled
    }

    /// Iterate batches in round order, starting from the head
    pub fn iter(&self) -> BatchIter<'_> {
        BatchIter {
            store: self,
            cursor: Some(self.head),
        }
    }
}

impl Default for BatchStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Linked-order iterator over a [`BatchStore`]
pub struct BatchIter<'a> {
    store: &'a BatchStore,
    cursor: Option<BatchNo>,
}

impl<'a> Iterator for BatchIter<'a> {
    type Item = (BatchNo, &'a Batch);

    fn next(&mut self) -> Option<Self::Item> {
        let no = self.cursor?;
        let batch = self.store.get(no);
        self.cursor = batch.next;
        Some((no, batch))
    }
}
