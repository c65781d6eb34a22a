//! Batch submission coordinator for payee-scoped payout runs

use bigdecimal::BigDecimal;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::disbursement::selection::{complement, group_by_payee};
use crate::traits::*;
use crate::types::*;

/// Phases of a payee-scoped batch session
///
/// `Closed -> Open -> Submitting -> {Confirmed, Failed}`. A confirmed
/// session only leaves through `close`/`open` (which refetches);
/// a failed session keeps its selection so the operator can retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionPhase {
    /// No session is open
    Closed,
    /// Selection is editable
    Open,
    /// A submission is in flight; commands are rejected until it resolves
    Submitting,
    /// The server acknowledged the payout run
    Confirmed,
    /// The submission failed; the selection is preserved for retry
    Failed,
}

/// Read-only snapshot of the open session, for list and modal views
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    /// Client-side identifier of this session, carried in logs
    pub session_id: Uuid,
    /// Payee the session is scoped to
    pub payee_id: String,
    /// Display name of the payee
    pub payee_name: String,
    /// Current phase
    pub phase: SessionPhase,
    /// Transaction ids of every pending disbursement in the group
    pub all_ids: BTreeSet<String>,
    /// Transaction ids currently marked for inclusion in the payout
    pub selected_ids: BTreeSet<String>,
    /// Aggregate amount of the whole group
    pub group_total: BigDecimal,
    /// Aggregate amount of the current selection
    pub selected_total: BigDecimal,
}

/// Server-acknowledged outcome of one payout run
///
/// `paid` is the server-confirmed subset (everything not excluded);
/// excluded transactions remain pending on the ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReceipt {
    /// Session that produced this run
    pub session_id: Uuid,
    /// Payee that was paid
    pub payee_id: String,
    /// Display name of the payee
    pub payee_name: String,
    /// Transactions confirmed as moving toward settlement
    pub paid: BTreeSet<String>,
    /// Transactions withheld from this run
    pub excluded: BTreeSet<String>,
    /// Aggregate amount of the paid transactions
    pub total_paid: BigDecimal,
}

/// One open payee session: the group snapshot plus the editable selection
struct BatchSession {
    session_id: Uuid,
    payee_id: String,
    payee_name: String,
    members: Vec<DisbursementRecord>,
    all_ids: BTreeSet<String>,
    selected_ids: BTreeSet<String>,
    phase: SessionPhase,
}

impl BatchSession {
    /// Open a session over a payee group, defaulting to full payout
    fn open(group: PayeeGroup) -> Self {
        let all_ids = group.transaction_ids();
        Self {
            session_id: Uuid::new_v4(),
            payee_id: group.payee_id,
            payee_name: group.payee_name,
            members: group.members,
            selected_ids: all_ids.clone(),
            all_ids,
            phase: SessionPhase::Open,
        }
    }

    /// Left-to-right sum of the selected members' amounts
    fn selected_total(&self) -> BigDecimal {
        let mut total = BigDecimal::from(0);
        for member in &self.members {
            if self.selected_ids.contains(&member.transaction_id) {
                total += &member.amount;
            }
        }
        total
    }

    /// Left-to-right sum over the whole group
    fn group_total(&self) -> BigDecimal {
        let mut total = BigDecimal::from(0);
        for member in &self.members {
            total += &member.amount;
        }
        total
    }

    fn view(&self) -> SessionView {
        SessionView {
            session_id: self.session_id,
            payee_id: self.payee_id.clone(),
            payee_name: self.payee_name.clone(),
            phase: self.phase,
            all_ids: self.all_ids.clone(),
            selected_ids: self.selected_ids.clone(),
            group_total: self.group_total(),
            selected_total: self.selected_total(),
        }
    }
}

/// Coordinator for disbursement payout runs, one payee session at a time
///
/// Exposes a narrow command interface (`open`/`toggle`/`submit`/`close`)
/// instead of mutable session fields, so the selection invariants hold
/// at the boundary. The local cache is never mutated optimistically:
/// record state only changes on the ledger, and `open` refetches it.
pub struct BatchCoordinator<G: LedgerGateway> {
    gateway: G,
    validator: Box<dyn SelectionValidator>,
    session: Mutex<Option<BatchSession>>,
}

impl<G: LedgerGateway> BatchCoordinator<G> {
    /// Create a new coordinator over the given gateway
    pub fn new(gateway: G) -> Self {
        Self {
            gateway,
            validator: Box::new(DefaultSelectionValidator),
            session: Mutex::new(None),
        }
    }

    /// Create a new coordinator with a custom selection validator
    pub fn with_validator(gateway: G, validator: Box<dyn SelectionValidator>) -> Self {
        Self {
            gateway,
            validator,
            session: Mutex::new(None),
        }
    }

    /// Open a session for one payee, selecting every pending record
    ///
    /// Always refetches the pending disbursements through the gateway,
    /// so a session reopened after a confirmed run observes the
    /// settled state. Fails with [`SettlementError::PayeeNotFound`]
    /// when the payee has no pending records anymore (e.g. paid
    /// concurrently by another operator), and with
    /// [`SettlementError::SubmissionInProgress`] while a submission is
    /// in flight.
    pub async fn open(&self, payee_id: &str) -> SettlementResult<SessionView> {
        self.reject_if_submitting()?;

        let records = self.gateway.list_pending_disbursements().await?;
        let group = group_by_payee(&records)
            .into_iter()
            .find(|g| g.payee_id == payee_id)
            .ok_or_else(|| SettlementError::PayeeNotFound(payee_id.to_string()))?;

        let session = BatchSession::open(group);
        let view = session.view();

        let mut guard = self.session.lock().unwrap();
        if matches!(guard.as_ref(), Some(s) if s.phase == SessionPhase::Submitting) {
            return Err(SettlementError::SubmissionInProgress);
        }
        info!(
            session = %view.session_id,
            payee = %view.payee_id,
            members = view.all_ids.len(),
            "opened batch session"
        );
        *guard = Some(session);

        Ok(view)
    }

    /// Flip one transaction in or out of the payout selection
    ///
    /// Ids outside the open group are ignored without error: the view
    /// driving this may lag a background refresh. Rejected while a
    /// submission is in flight.
    pub fn toggle(&self, transaction_id: &str) -> SettlementResult<()> {
        let mut guard = self.session.lock().unwrap();
        let session = guard.as_mut().ok_or(SettlementError::SessionClosed)?;

        match session.phase {
            SessionPhase::Submitting => Err(SettlementError::SubmissionInProgress),
            SessionPhase::Closed | SessionPhase::Confirmed => Err(SettlementError::SessionClosed),
            SessionPhase::Open | SessionPhase::Failed => {
                if !session.all_ids.contains(transaction_id) {
                    debug!(
                        transaction = transaction_id,
                        "ignoring toggle for transaction outside the open group"
                    );
                    return Ok(());
                }
                if !session.selected_ids.remove(transaction_id) {
                    session.selected_ids.insert(transaction_id.to_string());
                }
                Ok(())
            }
        }
    }

    /// Submit the payout run for the open session
    ///
    /// Computes the exclusion list as the complement of the selection
    /// and posts it to the ledger. The cache is not touched before the
    /// server acknowledges: on success the returned receipt names the
    /// confirmed subset, on transport failure the session moves to
    /// `Failed` with the full selection preserved, so a retry submits
    /// the same exclusion list unless the operator re-toggles.
    pub async fn submit(&self) -> SettlementResult<BatchReceipt> {
        let (request, session_id, payee_name, paid, total_paid) = {
            let mut guard = self.session.lock().unwrap();
            let session = guard.as_mut().ok_or(SettlementError::SessionClosed)?;

            match session.phase {
                SessionPhase::Submitting => return Err(SettlementError::SubmissionInProgress),
                SessionPhase::Closed | SessionPhase::Confirmed => {
                    return Err(SettlementError::SessionClosed)
                }
                SessionPhase::Open | SessionPhase::Failed => {}
            }

            self.validator
                .validate_submission(&session.all_ids, &session.selected_ids)?;
            let excluded = complement(&session.all_ids, &session.selected_ids)?;

            session.phase = SessionPhase::Submitting;
            let request = ProcessBatchRequest {
                supplier_id: session.payee_id.clone(),
                tx_ids: excluded.into_iter().collect(),
            };
            (
                request,
                session.session_id,
                session.payee_name.clone(),
                session.selected_ids.clone(),
                session.selected_total(),
            )
        };

        debug!(
            session = %session_id,
            payee = %request.supplier_id,
            excluded = request.tx_ids.len(),
            "submitting payout batch"
        );
        let result = self.gateway.process_disbursements(&request).await;

        let mut guard = self.session.lock().unwrap();
        match result {
            Ok(()) => {
                if let Some(session) = guard.as_mut() {
                    session.phase = SessionPhase::Confirmed;
                }
                info!(
                    session = %session_id,
                    payee = %request.supplier_id,
                    paid = paid.len(),
                    "payout batch confirmed"
                );
                Ok(BatchReceipt {
                    session_id,
                    payee_id: request.supplier_id,
                    payee_name,
                    paid,
                    excluded: request.tx_ids.into_iter().collect(),
                    total_paid,
                })
            }
            Err(err) => {
                if let Some(session) = guard.as_mut() {
                    session.phase = SessionPhase::Failed;
                }
                warn!(
                    session = %session_id,
                    payee = %request.supplier_id,
                    error = %err,
                    "payout batch failed; selection preserved"
                );
                Err(err)
            }
        }
    }

    /// Discard the open session and its selection
    ///
    /// Safe from any phase except `Submitting`: once a request to move
    /// money is in flight, the session must wait for resolution.
    /// Closing with no open session is a no-op.
    pub fn close(&self) -> SettlementResult<()> {
        let mut guard = self.session.lock().unwrap();
        if matches!(guard.as_ref(), Some(s) if s.phase == SessionPhase::Submitting) {
            return Err(SettlementError::SubmissionInProgress);
        }
        if let Some(session) = guard.take() {
            debug!(session = %session.session_id, payee = %session.payee_id, "closed batch session");
        }
        Ok(())
    }

    /// Current phase of the coordinator
    pub fn phase(&self) -> SessionPhase {
        self.session
            .lock()
            .unwrap()
            .as_ref()
            .map(|s| s.phase)
            .unwrap_or(SessionPhase::Closed)
    }

    /// Snapshot of the open session, when there is one
    pub fn session(&self) -> Option<SessionView> {
        self.session.lock().unwrap().as_ref().map(|s| s.view())
    }

    fn reject_if_submitting(&self) -> SettlementResult<()> {
        let guard = self.session.lock().unwrap();
        if matches!(guard.as_ref(), Some(s) if s.phase == SessionPhase::Submitting) {
            return Err(SettlementError::SubmissionInProgress);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::memory_gateway::MemoryGateway;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::Arc;
    use tokio::sync::Notify;

    fn pending(payee_id: &str, transaction_id: &str, amount: &str) -> DisbursementRecord {
        DisbursementRecord {
            id: format!("d-{}", transaction_id),
            payee_id: payee_id.to_string(),
            payee_name: format!("Payee {}", payee_id),
            transaction_id: transaction_id.to_string(),
            amount: amount.parse().unwrap(),
            scheduled_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            effective_date: None,
            status: DisbursementStatus::Pending,
        }
    }

    fn seeded_gateway() -> MemoryGateway {
        let gateway = MemoryGateway::new();
        gateway.seed_disbursements(vec![
            pending("p1", "T1", "1000"),
            pending("p1", "T2", "2000"),
            pending("p1", "T3", "500"),
            pending("p2", "T9", "750"),
        ]);
        gateway
    }

    /// Gateway that parks every payout submission until released,
    /// simulating an in-flight network request.
    struct GatedGateway {
        inner: MemoryGateway,
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl LedgerGateway for GatedGateway {
        async fn list_pending_disbursements(&self) -> SettlementResult<Vec<DisbursementRecord>> {
            self.inner.list_pending_disbursements().await
        }

        async fn update_disbursement(
            &self,
            disbursement_id: &str,
            patch: &DisbursementPatch,
        ) -> SettlementResult<DisbursementRecord> {
            self.inner.update_disbursement(disbursement_id, patch).await
        }

        async fn process_disbursements(
            &self,
            request: &ProcessBatchRequest,
        ) -> SettlementResult<()> {
            self.gate.notified().await;
            self.inner.process_disbursements(request).await
        }

        async fn list_repayments(&self) -> SettlementResult<Vec<ConciliationRecord>> {
            self.inner.list_repayments().await
        }

        async fn match_candidates(
            &self,
            conciliation_id: &str,
        ) -> SettlementResult<Vec<MatchCandidate>> {
            self.inner.match_candidates(conciliation_id).await
        }

        async fn match_candidates_by_transaction(
            &self,
            transaction_id: &str,
        ) -> SettlementResult<Vec<MatchCandidate>> {
            self.inner.match_candidates_by_transaction(transaction_id).await
        }

        async fn commit_match(&self, request: &CommitMatchRequest) -> SettlementResult<()> {
            self.inner.commit_match(request).await
        }
    }

    #[tokio::test]
    async fn test_open_defaults_to_full_selection() {
        let coordinator = BatchCoordinator::new(seeded_gateway());

        let view = coordinator.open("p1").await.unwrap();

        assert_eq!(view.phase, SessionPhase::Open);
        assert_eq!(view.all_ids.len(), 3);
        assert_eq!(view.selected_ids, view.all_ids);
        assert_eq!(view.group_total, BigDecimal::from(3500));
        assert_eq!(view.selected_total, view.group_total);
    }

    #[tokio::test]
    async fn test_open_unknown_payee_fails() {
        let coordinator = BatchCoordinator::new(seeded_gateway());

        let err = coordinator.open("ghost").await.unwrap_err();
        assert!(matches!(err, SettlementError::PayeeNotFound(_)));
        assert!(err.is_stale_view());
        assert_eq!(coordinator.phase(), SessionPhase::Closed);
    }

    #[tokio::test]
    async fn test_open_transport_failure_leaves_session_closed() {
        let gateway = seeded_gateway();
        let coordinator = BatchCoordinator::new(gateway.clone());

        gateway.fail_next_list("dns failure");
        let err = coordinator.open("p1").await.unwrap_err();
        assert!(matches!(err, SettlementError::Transport(_)));
        assert_eq!(coordinator.phase(), SessionPhase::Closed);
    }

    #[tokio::test]
    async fn test_toggle_flips_and_ignores_unknown_ids() {
        let coordinator = BatchCoordinator::new(seeded_gateway());
        coordinator.open("p1").await.unwrap();

        coordinator.toggle("T2").unwrap();
        assert!(!coordinator.session().unwrap().selected_ids.contains("T2"));

        coordinator.toggle("T2").unwrap();
        assert!(coordinator.session().unwrap().selected_ids.contains("T2"));

        // Unknown ids are a silent no-op: the UI may lag a refresh
        coordinator.toggle("T404").unwrap();
        assert_eq!(coordinator.session().unwrap().selected_ids.len(), 3);
    }

    #[tokio::test]
    async fn test_toggle_without_session_fails() {
        let coordinator = BatchCoordinator::new(seeded_gateway());
        let err = coordinator.toggle("T1").unwrap_err();
        assert!(matches!(err, SettlementError::SessionClosed));
    }

    #[tokio::test]
    async fn test_submit_full_payout_sends_empty_exclusion_list() {
        let gateway = seeded_gateway();
        let coordinator = BatchCoordinator::new(gateway.clone());
        coordinator.open("p1").await.unwrap();

        let receipt = coordinator.submit().await.unwrap();

        let request = gateway.last_process_request().unwrap();
        assert_eq!(request.supplier_id, "p1");
        assert!(request.tx_ids.is_empty());

        assert_eq!(receipt.paid.len(), 3);
        assert!(receipt.excluded.is_empty());
        assert_eq!(receipt.total_paid, BigDecimal::from(3500));
        assert_eq!(coordinator.phase(), SessionPhase::Confirmed);
    }

    #[tokio::test]
    async fn test_submit_partial_payout_excludes_deselected() {
        let gateway = seeded_gateway();
        let coordinator = BatchCoordinator::new(gateway.clone());
        coordinator.open("p1").await.unwrap();

        coordinator.toggle("T2").unwrap();
        let receipt = coordinator.submit().await.unwrap();

        let request = gateway.last_process_request().unwrap();
        assert_eq!(request.tx_ids, vec!["T2".to_string()]);

        assert_eq!(
            receipt.paid,
            ["T1", "T3"].iter().map(|s| s.to_string()).collect::<BTreeSet<_>>()
        );
        assert_eq!(
            receipt.excluded,
            ["T2"].iter().map(|s| s.to_string()).collect::<BTreeSet<_>>()
        );
        assert_eq!(receipt.total_paid, BigDecimal::from(1500));

        // Only the confirmed subset left the pending pool
        let still_pending = gateway.list_pending_disbursements().await.unwrap();
        let pending_for_p1: Vec<&str> = still_pending
            .iter()
            .filter(|r| r.payee_id == "p1")
            .map(|r| r.transaction_id.as_str())
            .collect();
        assert_eq!(pending_for_p1, vec!["T2"]);
    }

    #[tokio::test]
    async fn test_submit_empty_selection_never_reaches_gateway() {
        let gateway = seeded_gateway();
        let coordinator = BatchCoordinator::new(gateway.clone());
        coordinator.open("p1").await.unwrap();

        coordinator.toggle("T1").unwrap();
        coordinator.toggle("T2").unwrap();
        coordinator.toggle("T3").unwrap();

        let err = coordinator.submit().await.unwrap_err();
        assert!(matches!(err, SettlementError::EmptySelection));
        assert_eq!(gateway.calls().process_batch, 0);

        // The session stays editable
        assert_eq!(coordinator.phase(), SessionPhase::Open);
    }

    #[tokio::test]
    async fn test_submit_failure_preserves_selection_for_retry() {
        let gateway = seeded_gateway();
        let coordinator = BatchCoordinator::new(gateway.clone());
        coordinator.open("p1").await.unwrap();
        coordinator.toggle("T2").unwrap();

        gateway.fail_next_process("connection reset");
        let err = coordinator.submit().await.unwrap_err();
        assert!(matches!(err, SettlementError::Transport(_)));
        assert_eq!(coordinator.phase(), SessionPhase::Failed);

        let view = coordinator.session().unwrap();
        assert_eq!(
            view.selected_ids,
            ["T1", "T3"].iter().map(|s| s.to_string()).collect::<BTreeSet<_>>()
        );

        // The retry submits the same exclusion list
        coordinator.submit().await.unwrap();
        let request = gateway.last_process_request().unwrap();
        assert_eq!(request.tx_ids, vec!["T2".to_string()]);
        assert_eq!(gateway.calls().process_batch, 2);
    }

    #[tokio::test]
    async fn test_double_submit_is_rejected_while_in_flight() {
        let gate = Arc::new(Notify::new());
        let gateway = GatedGateway {
            inner: seeded_gateway(),
            gate: gate.clone(),
        };
        let coordinator = Arc::new(BatchCoordinator::new(gateway));
        coordinator.open("p1").await.unwrap();

        let first = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.submit().await })
        };

        // Let the first submission reach its in-flight suspension point
        while coordinator.phase() != SessionPhase::Submitting {
            tokio::task::yield_now().await;
        }

        let err = coordinator.submit().await.unwrap_err();
        assert!(matches!(err, SettlementError::SubmissionInProgress));

        // Toggling and closing are also rejected mid-flight
        assert!(matches!(
            coordinator.toggle("T1").unwrap_err(),
            SettlementError::SubmissionInProgress
        ));
        assert!(matches!(
            coordinator.close().unwrap_err(),
            SettlementError::SubmissionInProgress
        ));

        gate.notify_one();
        let receipt = first.await.unwrap().unwrap();
        assert_eq!(receipt.paid.len(), 3);
        assert_eq!(coordinator.phase(), SessionPhase::Confirmed);
    }

    #[tokio::test]
    async fn test_close_discards_selection() {
        let coordinator = BatchCoordinator::new(seeded_gateway());
        coordinator.open("p1").await.unwrap();
        coordinator.toggle("T1").unwrap();

        coordinator.close().unwrap();
        assert_eq!(coordinator.phase(), SessionPhase::Closed);
        assert!(coordinator.session().is_none());

        // Reopening refetches and reseeds the default full selection
        let view = coordinator.open("p1").await.unwrap();
        assert_eq!(view.selected_ids.len(), 3);
    }

    #[tokio::test]
    async fn test_reopen_after_confirmed_observes_settled_state() {
        let gateway = seeded_gateway();
        let coordinator = BatchCoordinator::new(gateway.clone());
        coordinator.open("p1").await.unwrap();
        coordinator.submit().await.unwrap();

        // Everything for p1 was paid; reopening must see the fresh state
        let err = coordinator.open("p1").await.unwrap_err();
        assert!(matches!(err, SettlementError::PayeeNotFound(_)));

        // Other payees are untouched
        let view = coordinator.open("p2").await.unwrap();
        assert_eq!(view.all_ids.len(), 1);
    }
}
