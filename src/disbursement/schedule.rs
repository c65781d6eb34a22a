//! Hold/release scheduling for individual disbursements

use chrono::NaiveDate;
use tracing::info;

use crate::traits::*;
use crate::types::*;
use crate::utils::validation::validate_record_id;

/// Manager for taking single disbursements in and out of the payout pool
///
/// Wraps the partial-update endpoint: `hold` requests a
/// `Pending -> Init` transition (withdraw from the next run), `release`
/// requests `Init -> Pending`. The server decides whether a transition
/// is legal; the returned record is its acknowledged state and replaces
/// whatever the caller had cached.
pub struct ScheduleManager<G: LedgerGateway> {
    gateway: G,
}

impl<G: LedgerGateway> ScheduleManager<G> {
    /// Create a new schedule manager over the given gateway
    pub fn new(gateway: G) -> Self {
        Self { gateway }
    }

    /// Withdraw a disbursement from the next payout run
    pub async fn hold(&self, disbursement_id: &str) -> SettlementResult<DisbursementRecord> {
        validate_record_id(disbursement_id)?;

        let patch = DisbursementPatch {
            status: Some(DisbursementStatus::Init),
            effective_date: None,
        };
        let record = self.gateway.update_disbursement(disbursement_id, &patch).await?;
        info!(disbursement = disbursement_id, "disbursement put on hold");
        Ok(record)
    }

    /// Put a held disbursement back into the payout pool
    ///
    /// An `effective_date` may be supplied to reschedule the payout at
    /// the same time.
    pub async fn release(
        &self,
        disbursement_id: &str,
        effective_date: Option<NaiveDate>,
    ) -> SettlementResult<DisbursementRecord> {
        validate_record_id(disbursement_id)?;

        let patch = DisbursementPatch {
            status: Some(DisbursementStatus::Pending),
            effective_date,
        };
        let record = self.gateway.update_disbursement(disbursement_id, &patch).await?;
        info!(disbursement = disbursement_id, "disbursement released for payout");
        Ok(record)
    }
}
