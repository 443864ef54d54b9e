//! Core data types for the Cohort ledger

pub mod insured_id;
