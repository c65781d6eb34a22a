//! Core types and data structures for the settlement system

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Lifecycle states of a disbursement record
///
/// Owned by the backend ledger. A record is created as `Init` when a
/// transaction matures, moves to `Pending` when scheduled for the next
/// payout run, and ends in `Payed` or `Failed`. The client may request
/// `Pending` <-> `Init` transitions; `Payed` is only reachable through
/// the batch submission path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisbursementStatus {
    /// Created server-side, not yet scheduled for payout
    Init,
    /// Scheduled for the next payout run
    Pending,
    /// Settled through a confirmed batch submission
    Payed,
    /// Settlement attempt failed server-side
    Failed,
}

/// One payable transaction awaiting settlement
///
/// The client holds a read-mostly cache of these; status is always
/// server-sourced truth and is never derived locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisbursementRecord {
    /// Unique identifier of the disbursement
    pub id: String,
    /// Supplier/merchant this disbursement is owed to
    pub payee_id: String,
    /// Display name of the payee
    pub payee_name: String,
    /// Underlying ledger transaction being settled
    pub transaction_id: String,
    /// Non-negative payable amount
    pub amount: BigDecimal,
    /// Date the payout was scheduled for
    pub scheduled_date: NaiveDate,
    /// Date the payout actually took effect, once known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_date: Option<NaiveDate>,
    /// Current lifecycle state
    pub status: DisbursementStatus,
}

impl DisbursementRecord {
    /// Whether this record is eligible for the next payout run
    pub fn is_pending(&self) -> bool {
        self.status == DisbursementStatus::Pending
    }
}

/// Pending disbursements owed to one payee, with their aggregate amount
///
/// Derived view-model, never persisted. Groups are recomputed from the
/// current record set on every build rather than patched incrementally,
/// so `total_amount` always equals the sum over the current member set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayeeGroup {
    /// Payee all members are owed to
    pub payee_id: String,
    /// Display name taken from the first member
    pub payee_name: String,
    /// Pending records for this payee, in input order
    pub members: Vec<DisbursementRecord>,
    /// Left-to-right sum of member amounts
    pub total_amount: BigDecimal,
}

impl PayeeGroup {
    /// Transaction ids of all members, in canonical (sorted) order
    pub fn transaction_ids(&self) -> BTreeSet<String> {
        self.members
            .iter()
            .map(|m| m.transaction_id.clone())
            .collect()
    }
}

/// Reconciliation states of an incoming payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConciliationStatus {
    /// No amount has been attributed yet (remaining == amount)
    NotReconciled,
    /// Some amount attributed, some outstanding
    PartiallyReconciled,
    /// Fully attributed (remaining == 0)
    FullyReconciled,
}

/// One incoming payment awaiting attribution to ledger transactions
///
/// Status and `remaining_amount` are ground truth returned by the
/// server; the client validates their consistency on ingest and
/// re-fetches after every committed match instead of deriving the next
/// status locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConciliationRecord {
    /// Unique identifier of the payment
    pub id: String,
    /// Total payment amount
    pub amount: BigDecimal,
    /// Amount not yet attributed, between zero and `amount`
    pub remaining_amount: BigDecimal,
    /// Client number the payment was received from
    pub client_number: String,
    /// Account the payment landed on
    pub account: String,
    /// Date the payment was received
    pub date: NaiveDate,
    /// Current reconciliation state
    pub status: ConciliationStatus,
}

/// A ranked transaction suggested as a probable counterpart for a payment
///
/// Ephemeral: recomputed on every lookup, never persisted. Canonical
/// ordering is descending score with ties broken by ascending
/// transaction id, enforced client-side so fixtures stay reproducible
/// even when the backend returns candidates unsorted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchCandidate {
    /// Suggested counterpart transaction
    pub transaction_id: String,
    /// Likelihood score, higher means more probable
    pub score: f64,
    /// Merchant the transaction belongs to
    pub merchant_name: String,
    /// Contact phone of the merchant
    pub phone: String,
    /// When the transaction was created
    pub created_date: NaiveDateTime,
    /// Transaction amount
    pub amount: BigDecimal,
}

/// Errors that can occur in the settlement system
#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    /// Submitting a batch that pays nothing is not a valid operation
    #[error("Selection is empty: a batch must pay at least one transaction")]
    EmptySelection,
    /// The selection references transactions outside the open group
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),
    /// A match commit was attempted without a selected payment row
    #[error("No active conciliation: select a payment before committing a match")]
    NoActiveConciliation,
    /// The payee has no pending disbursements (stale list view)
    #[error("Payee not found or has no pending disbursements: {0}")]
    PayeeNotFound(String),
    /// A submission is already in flight for the open session
    #[error("A submission is already in progress")]
    SubmissionInProgress,
    /// A session command was issued with no open session
    #[error("No open batch session")]
    SessionClosed,
    /// Network-level failure reaching the backend
    #[error("Transport error: {0}")]
    Transport(String),
    /// Application-level failure reported by the backend
    #[error("Backend error (status {status}): {message}")]
    Backend { status: u16, message: String },
    /// The backend returned a payload violating the wire contract
    #[error("Invalid response shape: {0}")]
    InvalidResponse(String),
}

impl SettlementError {
    /// Raised before any network call; recoverable by correcting input
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::EmptySelection | Self::InvalidSelection(_) | Self::NoActiveConciliation
        )
    }

    /// The local view is stale relative to server state; the caller
    /// should refetch rather than retry blindly
    pub fn is_stale_view(&self) -> bool {
        matches!(self, Self::PayeeNotFound(_) | Self::SubmissionInProgress)
    }

    /// Network or backend failure; operator input is preserved for retry
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Backend { .. } | Self::InvalidResponse(_)
        )
    }
}

/// Result type for settlement operations
pub type SettlementResult<T> = Result<T, SettlementError>;
