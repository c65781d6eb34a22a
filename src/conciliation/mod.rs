//! Reconciliation of incoming payments against ledger transactions

pub mod ranking;
pub mod workflow;

pub use ranking::{canonical_order, sort_candidates};
pub use workflow::{MatchPhase, MatchWorkflow};
