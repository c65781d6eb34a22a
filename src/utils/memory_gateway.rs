//! In-memory ledger gateway for testing and development

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::traits::*;
use crate::types::*;

/// Per-endpoint call counters, for interaction assertions in tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub list_disbursements: usize,
    pub update_disbursement: usize,
    pub process_batch: usize,
    pub list_repayments: usize,
    pub match_candidates: usize,
    pub commit_match: usize,
}

/// In-memory gateway implementation for testing and development
///
/// Plays the backend's role: payout runs settle the non-excluded
/// pending records, match commits reduce the payment's remaining
/// amount and recompute its status. Per-endpoint failure injection
/// simulates transport errors for retry paths.
#[derive(Debug, Clone, Default)]
pub struct MemoryGateway {
    disbursements: Arc<RwLock<Vec<DisbursementRecord>>>,
    repayments: Arc<RwLock<Vec<ConciliationRecord>>>,
    candidates: Arc<RwLock<HashMap<String, Vec<MatchCandidate>>>>,
    transaction_candidates: Arc<RwLock<HashMap<String, Vec<MatchCandidate>>>>,
    calls: Arc<RwLock<CallCounts>>,
    last_process: Arc<RwLock<Option<ProcessBatchRequest>>>,
    last_commit: Arc<RwLock<Option<CommitMatchRequest>>>,
    fail_process: Arc<RwLock<Option<String>>>,
    fail_candidates: Arc<RwLock<Option<String>>>,
    fail_commit: Arc<RwLock<Option<String>>>,
    fail_list: Arc<RwLock<Option<String>>>,
}

impl MemoryGateway {
    /// Create a new, empty gateway
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all data and counters (useful between test cases)
    pub fn clear(&self) {
        self.disbursements.write().unwrap().clear();
        self.repayments.write().unwrap().clear();
        self.candidates.write().unwrap().clear();
        self.transaction_candidates.write().unwrap().clear();
        *self.calls.write().unwrap() = CallCounts::default();
        *self.last_process.write().unwrap() = None;
        *self.last_commit.write().unwrap() = None;
    }

    /// Seed the disbursement ledger
    pub fn seed_disbursements(&self, records: Vec<DisbursementRecord>) {
        self.disbursements.write().unwrap().extend(records);
    }

    /// Seed the repayment ledger
    pub fn seed_repayments(&self, records: Vec<ConciliationRecord>) {
        self.repayments.write().unwrap().extend(records);
    }

    /// Seed ranked candidates for one conciliation id
    pub fn seed_candidates(&self, conciliation_id: &str, candidates: Vec<MatchCandidate>) {
        self.candidates
            .write()
            .unwrap()
            .insert(conciliation_id.to_string(), candidates);
    }

    /// Seed candidates for the lookup-by-transaction variant
    pub fn seed_transaction_candidates(
        &self,
        transaction_id: &str,
        candidates: Vec<MatchCandidate>,
    ) {
        self.transaction_candidates
            .write()
            .unwrap()
            .insert(transaction_id.to_string(), candidates);
    }

    /// Snapshot of the per-endpoint call counters
    pub fn calls(&self) -> CallCounts {
        *self.calls.read().unwrap()
    }

    /// Last payout request received, if any
    pub fn last_process_request(&self) -> Option<ProcessBatchRequest> {
        self.last_process.read().unwrap().clone()
    }

    /// Last match commit received, if any
    pub fn last_commit_request(&self) -> Option<CommitMatchRequest> {
        self.last_commit.read().unwrap().clone()
    }

    /// One disbursement by id, regardless of status
    pub fn disbursement(&self, disbursement_id: &str) -> Option<DisbursementRecord> {
        self.disbursements
            .read()
            .unwrap()
            .iter()
            .find(|r| r.id == disbursement_id)
            .cloned()
    }

    /// Fail the next payout submission with a transport error
    pub fn fail_next_process(&self, message: &str) {
        *self.fail_process.write().unwrap() = Some(message.to_string());
    }

    /// Fail the next candidate lookup with a transport error
    pub fn fail_next_candidates(&self, message: &str) {
        *self.fail_candidates.write().unwrap() = Some(message.to_string());
    }

    /// Fail the next match commit with a transport error
    pub fn fail_next_commit(&self, message: &str) {
        *self.fail_commit.write().unwrap() = Some(message.to_string());
    }

    /// Fail the next listing call with a transport error
    pub fn fail_next_list(&self, message: &str) {
        *self.fail_list.write().unwrap() = Some(message.to_string());
    }

    fn take_failure(slot: &Arc<RwLock<Option<String>>>) -> SettlementResult<()> {
        if let Some(message) = slot.write().unwrap().take() {
            return Err(SettlementError::Transport(message));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerGateway for MemoryGateway {
    async fn list_pending_disbursements(&self) -> SettlementResult<Vec<DisbursementRecord>> {
        self.calls.write().unwrap().list_disbursements += 1;
        Self::take_failure(&self.fail_list)?;

        Ok(self
            .disbursements
            .read()
            .unwrap()
            .iter()
            .filter(|r| r.is_pending())
            .cloned()
            .collect())
    }

    async fn update_disbursement(
        &self,
        disbursement_id: &str,
        patch: &DisbursementPatch,
    ) -> SettlementResult<DisbursementRecord> {
        self.calls.write().unwrap().update_disbursement += 1;

        let mut records = self.disbursements.write().unwrap();
        let record = records
            .iter_mut()
            .find(|r| r.id == disbursement_id)
            .ok_or_else(|| SettlementError::Backend {
                status: 404,
                message: format!("Disbursement '{}' not found", disbursement_id),
            })?;

        if let Some(status) = patch.status {
            record.status = status;
        }
        if let Some(effective_date) = patch.effective_date {
            record.effective_date = Some(effective_date);
        }
        Ok(record.clone())
    }

    async fn process_disbursements(&self, request: &ProcessBatchRequest) -> SettlementResult<()> {
        self.calls.write().unwrap().process_batch += 1;
        *self.last_process.write().unwrap() = Some(request.clone());
        Self::take_failure(&self.fail_process)?;

        // Settle everything pending for the supplier except the
        // excluded transactions, as the backend would
        let mut records = self.disbursements.write().unwrap();
        for record in records.iter_mut() {
            if record.payee_id == request.supplier_id
                && record.is_pending()
                && !request.tx_ids.contains(&record.transaction_id)
            {
                record.status = DisbursementStatus::Payed;
                record.effective_date = Some(record.scheduled_date);
            }
        }
        Ok(())
    }

    async fn list_repayments(&self) -> SettlementResult<Vec<ConciliationRecord>> {
        self.calls.write().unwrap().list_repayments += 1;
        Self::take_failure(&self.fail_list)?;

        Ok(self.repayments.read().unwrap().clone())
    }

    async fn match_candidates(
        &self,
        conciliation_id: &str,
    ) -> SettlementResult<Vec<MatchCandidate>> {
        self.calls.write().unwrap().match_candidates += 1;
        Self::take_failure(&self.fail_candidates)?;

        Ok(self
            .candidates
            .read()
            .unwrap()
            .get(conciliation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn match_candidates_by_transaction(
        &self,
        transaction_id: &str,
    ) -> SettlementResult<Vec<MatchCandidate>> {
        self.calls.write().unwrap().match_candidates += 1;
        Self::take_failure(&self.fail_candidates)?;

        Ok(self
            .transaction_candidates
            .read()
            .unwrap()
            .get(transaction_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn commit_match(&self, request: &CommitMatchRequest) -> SettlementResult<()> {
        self.calls.write().unwrap().commit_match += 1;
        *self.last_commit.write().unwrap() = Some(request.clone());
        Self::take_failure(&self.fail_commit)?;

        let mut repayments = self.repayments.write().unwrap();
        let record = repayments
            .iter_mut()
            .find(|r| r.id == request.id_julaya)
            .ok_or_else(|| SettlementError::Backend {
                status: 404,
                message: format!("Payment '{}' not found", request.id_julaya),
            })?;

        if request.amount > record.remaining_amount {
            return Err(SettlementError::Backend {
                status: 422,
                message: format!(
                    "Match amount {} exceeds remaining amount {}",
                    request.amount, record.remaining_amount
                ),
            });
        }

        record.remaining_amount = &record.remaining_amount - &request.amount;
        record.status = if record.remaining_amount == BigDecimal::from(0) {
            ConciliationStatus::FullyReconciled
        } else if record.remaining_amount == record.amount {
            ConciliationStatus::NotReconciled
        } else {
            ConciliationStatus::PartiallyReconciled
        };
        Ok(())
    }
}
