//! Reconciliation match workflow for incoming payments

use bigdecimal::BigDecimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::{debug, info, warn};

use crate::conciliation::ranking::sort_candidates;
use crate::traits::*;
use crate::types::*;
use crate::utils::validation::validate_conciliation_record;

/// Phases of a candidate lookup
///
/// `Idle -> Loading -> {CandidatesReady, NoCandidates, Error}`. A
/// commit is only valid from `CandidatesReady`. `NoCandidates` is a
/// valid terminal outcome, not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchPhase {
    /// Nothing loaded
    Idle,
    /// A candidate lookup is in flight
    Loading,
    /// A non-empty ranked candidate list is available
    CandidatesReady,
    /// The lookup succeeded but ranked nothing
    NoCandidates,
    /// The lookup or commit failed; operator input is preserved
    Error,
}

struct WorkflowState {
    phase: MatchPhase,
    records: BTreeMap<String, ConciliationRecord>,
    active_conciliation: Option<String>,
    candidates: Vec<MatchCandidate>,
}

/// Workflow for attributing incoming payments to ledger transactions
///
/// Retrieves ranked candidates for a payment, lets the operator commit
/// one match, and then invalidates the affected caches. The payment's
/// reconciliation status is never recomputed locally: partial-amount
/// matches make the next status non-derivable client-side, so a
/// re-fetch after every commit is the only source of truth.
pub struct MatchWorkflow<G: LedgerGateway> {
    gateway: G,
    validator: Box<dyn MatchValidator>,
    state: Mutex<WorkflowState>,
}

impl<G: LedgerGateway> MatchWorkflow<G> {
    /// Create a new workflow over the given gateway
    pub fn new(gateway: G) -> Self {
        Self::with_validator(gateway, Box::new(DefaultMatchValidator))
    }

    /// Create a new workflow with a custom commit validator
    pub fn with_validator(gateway: G, validator: Box<dyn MatchValidator>) -> Self {
        Self {
            gateway,
            validator,
            state: Mutex::new(WorkflowState {
                phase: MatchPhase::Idle,
                records: BTreeMap::new(),
                active_conciliation: None,
                candidates: Vec::new(),
            }),
        }
    }

    /// Reload the payment cache from the ledger
    ///
    /// Each record's shape invariants (remaining within bounds, status
    /// consistent with remaining) are checked on ingest; a violation
    /// surfaces as [`SettlementError::InvalidResponse`] and leaves the
    /// cache untouched.
    pub async fn refresh(&self) -> SettlementResult<Vec<ConciliationRecord>> {
        let records = self.gateway.list_repayments().await?;
        for record in &records {
            validate_conciliation_record(record)?;
        }

        let mut state = self.state.lock().unwrap();
        state.records = records
            .iter()
            .map(|r| (r.id.clone(), r.clone()))
            .collect();
        debug!(count = records.len(), "refreshed repayment cache");
        Ok(records)
    }

    /// Cached payment record, when present
    pub fn record(&self, conciliation_id: &str) -> Option<ConciliationRecord> {
        self.state
            .lock()
            .unwrap()
            .records
            .get(conciliation_id)
            .cloned()
    }

    /// Current workflow phase
    pub fn phase(&self) -> MatchPhase {
        self.state.lock().unwrap().phase
    }

    /// Payment currently selected for matching, if any
    pub fn active_conciliation(&self) -> Option<String> {
        self.state.lock().unwrap().active_conciliation.clone()
    }

    /// Ranked candidates from the last successful lookup
    pub fn candidates(&self) -> Vec<MatchCandidate> {
        self.state.lock().unwrap().candidates.clone()
    }

    /// Load ranked match candidates for one payment
    ///
    /// Selects the payment as the active conciliation context and
    /// re-sorts the returned candidates into canonical order. An empty
    /// result is `NoCandidates`; a transport failure is `Error` with
    /// the active context preserved for retry.
    pub async fn load_candidates_for(
        &self,
        conciliation_id: &str,
    ) -> SettlementResult<MatchPhase> {
        {
            let mut state = self.state.lock().unwrap();
            state.phase = MatchPhase::Loading;
            state.active_conciliation = Some(conciliation_id.to_string());
        }

        let result = self.gateway.match_candidates(conciliation_id).await;
        self.finish_lookup(result, &format!("conciliation '{}'", conciliation_id))
    }

    /// Load match candidates by transaction id (ad-hoc search)
    ///
    /// Populates the same candidate list as
    /// [`load_candidates_for`](Self::load_candidates_for) so the commit
    /// path is uniform, but does not select an active conciliation:
    /// committing still requires a payment picked from the list.
    pub async fn lookup_by_transaction(
        &self,
        transaction_id: &str,
    ) -> SettlementResult<MatchPhase> {
        {
            let mut state = self.state.lock().unwrap();
            state.phase = MatchPhase::Loading;
        }

        let result = self
            .gateway
            .match_candidates_by_transaction(transaction_id)
            .await;
        self.finish_lookup(result, &format!("transaction '{}'", transaction_id))
    }

    /// Commit one match for the active payment
    ///
    /// Rejected client-side, before any network call, when no payment
    /// is selected or `conciliation_id` disagrees with the selection
    /// ([`SettlementError::NoActiveConciliation`]), when no candidate
    /// list is ready, or when the candidate is not in it. On success
    /// the cached record and candidate list for the payment are
    /// evicted and the workflow returns to `Idle`; the caller must
    /// re-fetch to observe the new reconciliation status.
    pub async fn commit(
        &self,
        conciliation_id: &str,
        candidate_transaction_id: &str,
        amount: &BigDecimal,
    ) -> SettlementResult<()> {
        let request = {
            let state = self.state.lock().unwrap();

            match state.active_conciliation.as_deref() {
                Some(active) if active == conciliation_id => {}
                _ => return Err(SettlementError::NoActiveConciliation),
            }

            if state.phase != MatchPhase::CandidatesReady {
                return Err(SettlementError::InvalidSelection(
                    "No candidate list is ready for the selected payment".to_string(),
                ));
            }

            if !state
                .candidates
                .iter()
                .any(|c| c.transaction_id == candidate_transaction_id)
            {
                return Err(SettlementError::InvalidSelection(format!(
                    "Transaction '{}' is not among the ranked candidates",
                    candidate_transaction_id
                )));
            }

            self.validator.validate_commit(
                state.records.get(conciliation_id),
                candidate_transaction_id,
                amount,
            )?;

            CommitMatchRequest {
                id_julaya: conciliation_id.to_string(),
                reference_id: candidate_transaction_id.to_string(),
                amount: amount.clone(),
            }
        };

        let result = self.gateway.commit_match(&request).await;

        let mut state = self.state.lock().unwrap();
        match result {
            Ok(()) => {
                // Evict instead of patching: the next status value is
                // server truth and must be re-fetched.
                state.records.remove(conciliation_id);
                state.candidates.clear();
                state.active_conciliation = None;
                state.phase = MatchPhase::Idle;
                info!(
                    conciliation = conciliation_id,
                    transaction = candidate_transaction_id,
                    "match committed; cached record invalidated"
                );
                Ok(())
            }
            Err(err) => {
                state.phase = MatchPhase::Error;
                warn!(
                    conciliation = conciliation_id,
                    error = %err,
                    "match commit failed; candidate list preserved"
                );
                Err(err)
            }
        }
    }

    fn finish_lookup(
        &self,
        result: SettlementResult<Vec<MatchCandidate>>,
        context: &str,
    ) -> SettlementResult<MatchPhase> {
        let mut state = self.state.lock().unwrap();
        match result {
            Ok(mut candidates) => {
                sort_candidates(&mut candidates);
                state.phase = if candidates.is_empty() {
                    MatchPhase::NoCandidates
                } else {
                    MatchPhase::CandidatesReady
                };
                debug!(count = candidates.len(), "ranked candidates for {}", context);
                state.candidates = candidates;
                Ok(state.phase)
            }
            Err(err) => {
                state.phase = MatchPhase::Error;
                warn!(error = %err, "candidate lookup failed for {}", context);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::memory_gateway::MemoryGateway;
    use chrono::NaiveDate;

    fn repayment(id: &str, amount: i64, remaining: i64) -> ConciliationRecord {
        let status = if remaining == 0 {
            ConciliationStatus::FullyReconciled
        } else if remaining == amount {
            ConciliationStatus::NotReconciled
        } else {
            ConciliationStatus::PartiallyReconciled
        };
        ConciliationRecord {
            id: id.to_string(),
            amount: BigDecimal::from(amount),
            remaining_amount: BigDecimal::from(remaining),
            client_number: "C-77".to_string(),
            account: "ACC-1".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 2, 10).unwrap(),
            status,
        }
    }

    fn candidate(transaction_id: &str, score: f64) -> MatchCandidate {
        MatchCandidate {
            transaction_id: transaction_id.to_string(),
            score,
            merchant_name: "Merchant".to_string(),
            phone: "+22100000000".to_string(),
            created_date: NaiveDate::from_ymd_opt(2024, 2, 1)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
            amount: BigDecimal::from(100),
        }
    }

    fn seeded_gateway() -> MemoryGateway {
        let gateway = MemoryGateway::new();
        gateway.seed_repayments(vec![repayment("R1", 1000, 1000), repayment("R2", 500, 200)]);
        gateway.seed_candidates(
            "R1",
            vec![
                candidate("4", 10.0),
                candidate("2", 30.0),
                candidate("3", 30.0),
                candidate("1", 5.0),
            ],
        );
        gateway
    }

    #[tokio::test]
    async fn test_load_candidates_sorts_into_canonical_order() {
        let workflow = MatchWorkflow::new(seeded_gateway());
        workflow.refresh().await.unwrap();

        let phase = workflow.load_candidates_for("R1").await.unwrap();
        assert_eq!(phase, MatchPhase::CandidatesReady);
        assert_eq!(workflow.active_conciliation().as_deref(), Some("R1"));

        let order: Vec<String> = workflow
            .candidates()
            .iter()
            .map(|c| c.transaction_id.clone())
            .collect();
        assert_eq!(order, vec!["2", "3", "4", "1"]);
    }

    #[tokio::test]
    async fn test_empty_candidate_list_is_not_an_error() {
        let workflow = MatchWorkflow::new(seeded_gateway());

        let phase = workflow.load_candidates_for("R2").await.unwrap();
        assert_eq!(phase, MatchPhase::NoCandidates);
        assert!(workflow.candidates().is_empty());
    }

    #[tokio::test]
    async fn test_lookup_failure_preserves_context_for_retry() {
        let gateway = seeded_gateway();
        let workflow = MatchWorkflow::new(gateway.clone());

        gateway.fail_next_candidates("gateway timeout");
        let err = workflow.load_candidates_for("R1").await.unwrap_err();
        assert!(matches!(err, SettlementError::Transport(_)));
        assert_eq!(workflow.phase(), MatchPhase::Error);
        assert_eq!(workflow.active_conciliation().as_deref(), Some("R1"));

        // Retry with the preserved context succeeds
        let phase = workflow.load_candidates_for("R1").await.unwrap();
        assert_eq!(phase, MatchPhase::CandidatesReady);
    }

    #[tokio::test]
    async fn test_commit_without_active_conciliation_never_reaches_gateway() {
        let gateway = seeded_gateway();
        let workflow = MatchWorkflow::new(gateway.clone());
        workflow.refresh().await.unwrap();

        let err = workflow
            .commit("R1", "2", &BigDecimal::from(100))
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::NoActiveConciliation));
        assert!(err.is_validation());
        assert_eq!(gateway.calls().commit_match, 0);
    }

    #[tokio::test]
    async fn test_commit_with_mismatched_id_is_rejected() {
        let gateway = seeded_gateway();
        let workflow = MatchWorkflow::new(gateway.clone());
        workflow.refresh().await.unwrap();
        workflow.load_candidates_for("R1").await.unwrap();

        let err = workflow
            .commit("R2", "2", &BigDecimal::from(100))
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::NoActiveConciliation));
        assert_eq!(gateway.calls().commit_match, 0);
    }

    #[tokio::test]
    async fn test_commit_rejects_candidate_outside_ranked_list() {
        let gateway = seeded_gateway();
        let workflow = MatchWorkflow::new(gateway.clone());
        workflow.refresh().await.unwrap();
        workflow.load_candidates_for("R1").await.unwrap();

        let err = workflow
            .commit("R1", "T404", &BigDecimal::from(100))
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::InvalidSelection(_)));
        assert_eq!(gateway.calls().commit_match, 0);
    }

    #[tokio::test]
    async fn test_commit_evicts_cache_and_forces_refetch() {
        let gateway = seeded_gateway();
        let workflow = MatchWorkflow::new(gateway.clone());
        workflow.refresh().await.unwrap();
        workflow.load_candidates_for("R1").await.unwrap();

        workflow
            .commit("R1", "2", &BigDecimal::from(400))
            .await
            .unwrap();

        // Status is not flipped locally: the cached record is gone
        assert!(workflow.record("R1").is_none());
        assert!(workflow.candidates().is_empty());
        assert_eq!(workflow.phase(), MatchPhase::Idle);
        assert!(workflow.active_conciliation().is_none());

        let request = gateway.last_commit_request().unwrap();
        assert_eq!(request.id_julaya, "R1");
        assert_eq!(request.reference_id, "2");

        // The re-fetch observes the server-computed status
        workflow.refresh().await.unwrap();
        let updated = workflow.record("R1").unwrap();
        assert_eq!(updated.remaining_amount, BigDecimal::from(600));
        assert_eq!(updated.status, ConciliationStatus::PartiallyReconciled);
    }

    #[tokio::test]
    async fn test_commit_failure_preserves_candidates() {
        let gateway = seeded_gateway();
        let workflow = MatchWorkflow::new(gateway.clone());
        workflow.refresh().await.unwrap();
        workflow.load_candidates_for("R1").await.unwrap();

        gateway.fail_next_commit("connection reset");
        let err = workflow
            .commit("R1", "2", &BigDecimal::from(400))
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::Transport(_)));
        assert_eq!(workflow.phase(), MatchPhase::Error);
        assert_eq!(workflow.candidates().len(), 4);
        assert_eq!(workflow.active_conciliation().as_deref(), Some("R1"));
    }

    #[tokio::test]
    async fn test_lookup_by_transaction_does_not_select_a_payment() {
        let gateway = seeded_gateway();
        gateway.seed_transaction_candidates("9", vec![candidate("9", 42.0)]);
        let workflow = MatchWorkflow::new(gateway.clone());
        workflow.refresh().await.unwrap();

        let phase = workflow.lookup_by_transaction("9").await.unwrap();
        assert_eq!(phase, MatchPhase::CandidatesReady);
        assert!(workflow.active_conciliation().is_none());

        // The uniform commit path still demands an active payment
        let err = workflow
            .commit("R1", "9", &BigDecimal::from(10))
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::NoActiveConciliation));
    }

    #[tokio::test]
    async fn test_commit_amount_above_remaining_is_rejected() {
        let gateway = seeded_gateway();
        let workflow = MatchWorkflow::new(gateway.clone());
        workflow.refresh().await.unwrap();
        workflow.load_candidates_for("R1").await.unwrap();

        let err = workflow
            .commit("R1", "2", &BigDecimal::from(5000))
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::InvalidSelection(_)));
        assert_eq!(gateway.calls().commit_match, 0);
    }

    #[tokio::test]
    async fn test_refresh_rejects_inconsistent_records() {
        let gateway = MemoryGateway::new();
        let mut bad = repayment("R9", 1000, 0);
        bad.status = ConciliationStatus::NotReconciled;
        gateway.seed_repayments(vec![bad]);

        let workflow = MatchWorkflow::new(gateway);
        let err = workflow.refresh().await.unwrap_err();
        assert!(matches!(err, SettlementError::InvalidResponse(_)));
        assert!(workflow.record("R9").is_none());
    }
}
