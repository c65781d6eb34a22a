//! Traits for the ledger gateway boundary and extensibility

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::types::*;

/// Partial update for a disbursement record
///
/// Sent as the body of `PATCH /disbursements/{id}`. Only the fields
/// present are touched server-side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisbursementPatch {
    /// Requested lifecycle state, if changing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DisbursementStatus>,
    /// Requested effective date, if changing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_date: Option<NaiveDate>,
}

/// Payout request for one payee, sent to `POST /disbursements/process`
///
/// `tx_ids` is the exclusion list: the backend pays every pending
/// disbursement of the supplier except the listed transactions. The
/// backend API is defined around "pay everything except", so the
/// client submits the complement of the operator's selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessBatchRequest {
    /// Payee whose pending disbursements are settled
    pub supplier_id: String,
    /// Transactions to withhold from this run, in canonical order
    pub tx_ids: Vec<String>,
}

/// Match commit for one payment, sent to `POST /conciliation/process`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitMatchRequest {
    /// Payment (conciliation record) being attributed
    pub id_julaya: String,
    /// Transaction the payment is matched against
    pub reference_id: String,
    /// Amount attributed by this match
    pub amount: BigDecimal,
}

/// Typed request/response boundary to the backend ledger
///
/// Pure transport plus shape validation; no business logic. Every
/// method is a suspension point: implementations must not block.
/// Application-level failures (`success: false` envelopes) surface as
/// [`SettlementError::Backend`], network failures as
/// [`SettlementError::Transport`].
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Fetch all disbursement records currently awaiting payout
    async fn list_pending_disbursements(&self) -> SettlementResult<Vec<DisbursementRecord>>;

    /// Apply a partial update to one disbursement record
    async fn update_disbursement(
        &self,
        disbursement_id: &str,
        patch: &DisbursementPatch,
    ) -> SettlementResult<DisbursementRecord>;

    /// Submit a payout run for one payee with an exclusion list
    async fn process_disbursements(&self, request: &ProcessBatchRequest) -> SettlementResult<()>;

    /// Fetch all incoming payments awaiting attribution
    async fn list_repayments(&self) -> SettlementResult<Vec<ConciliationRecord>>;

    /// Fetch ranked match candidates for one payment
    async fn match_candidates(
        &self,
        conciliation_id: &str,
    ) -> SettlementResult<Vec<MatchCandidate>>;

    /// Fetch match candidates by transaction id (ad-hoc lookup variant)
    async fn match_candidates_by_transaction(
        &self,
        transaction_id: &str,
    ) -> SettlementResult<Vec<MatchCandidate>>;

    /// Commit one payment-to-transaction match
    async fn commit_match(&self, request: &CommitMatchRequest) -> SettlementResult<()>;
}

/// Trait for validating a batch selection before submission
pub trait SelectionValidator: Send + Sync {
    /// Validate the selection against the open group before any
    /// network call is made
    fn validate_submission(
        &self,
        group_ids: &BTreeSet<String>,
        selected_ids: &BTreeSet<String>,
    ) -> SettlementResult<()>;
}

/// Default selection validator enforcing the batch invariants
pub struct DefaultSelectionValidator;

impl SelectionValidator for DefaultSelectionValidator {
    fn validate_submission(
        &self,
        group_ids: &BTreeSet<String>,
        selected_ids: &BTreeSet<String>,
    ) -> SettlementResult<()> {
        if selected_ids.is_empty() {
            return Err(SettlementError::EmptySelection);
        }

        if !selected_ids.is_subset(group_ids) {
            let stale: Vec<&str> = selected_ids
                .difference(group_ids)
                .map(String::as_str)
                .collect();
            return Err(SettlementError::InvalidSelection(format!(
                "Selection references transactions outside the group: {}",
                stale.join(", ")
            )));
        }

        Ok(())
    }
}

/// Trait for validating a match commit before submission
pub trait MatchValidator: Send + Sync {
    /// Validate a commit against the cached payment record, when one
    /// is available
    fn validate_commit(
        &self,
        record: Option<&ConciliationRecord>,
        candidate_transaction_id: &str,
        amount: &BigDecimal,
    ) -> SettlementResult<()>;
}

/// Default match validator with basic amount and id checks
pub struct DefaultMatchValidator;

impl MatchValidator for DefaultMatchValidator {
    fn validate_commit(
        &self,
        record: Option<&ConciliationRecord>,
        candidate_transaction_id: &str,
        amount: &BigDecimal,
    ) -> SettlementResult<()> {
        if candidate_transaction_id.trim().is_empty() {
            return Err(SettlementError::InvalidSelection(
                "Candidate transaction id cannot be empty".to_string(),
            ));
        }

        if *amount <= BigDecimal::from(0) {
            return Err(SettlementError::InvalidSelection(
                "Match amount must be positive".to_string(),
            ));
        }

        if let Some(record) = record {
            if *amount > record.remaining_amount {
                return Err(SettlementError::InvalidSelection(format!(
                    "Match amount {} exceeds remaining amount {} of payment '{}'",
                    amount, record.remaining_amount, record.id
                )));
            }
        }

        Ok(())
    }
}
