//! Validation utilities

use bigdecimal::BigDecimal;

use crate::types::*;

/// Validate a client-supplied record id
pub fn validate_record_id(record_id: &str) -> SettlementResult<()> {
    if record_id.trim().is_empty() {
        return Err(SettlementError::InvalidSelection(
            "Record id cannot be empty".to_string(),
        ));
    }

    if record_id.len() > 64 {
        return Err(SettlementError::InvalidSelection(
            "Record id cannot exceed 64 characters".to_string(),
        ));
    }

    Ok(())
}

/// Validate the shape of a disbursement record received from the ledger
pub fn validate_disbursement_record(record: &DisbursementRecord) -> SettlementResult<()> {
    if record.id.trim().is_empty() || record.transaction_id.trim().is_empty() {
        return Err(SettlementError::InvalidResponse(
            "Disbursement record with empty id".to_string(),
        ));
    }

    if record.amount < BigDecimal::from(0) {
        return Err(SettlementError::InvalidResponse(format!(
            "Disbursement '{}' has negative amount {}",
            record.id, record.amount
        )));
    }

    Ok(())
}

/// Validate the shape of a conciliation record received from the ledger
///
/// The status/remaining relationship is server truth; a payload where
/// the two disagree is a wire-contract violation, not something to
/// repair locally.
pub fn validate_conciliation_record(record: &ConciliationRecord) -> SettlementResult<()> {
    if record.id.trim().is_empty() {
        return Err(SettlementError::InvalidResponse(
            "Conciliation record with empty id".to_string(),
        ));
    }

    let zero = BigDecimal::from(0);
    if record.remaining_amount < zero || record.remaining_amount > record.amount {
        return Err(SettlementError::InvalidResponse(format!(
            "Payment '{}' has remaining amount {} outside [0, {}]",
            record.id, record.remaining_amount, record.amount
        )));
    }

    let expected = if record.remaining_amount == zero {
        ConciliationStatus::FullyReconciled
    } else if record.remaining_amount == record.amount {
        ConciliationStatus::NotReconciled
    } else {
        ConciliationStatus::PartiallyReconciled
    };

    if record.status != expected {
        return Err(SettlementError::InvalidResponse(format!(
            "Payment '{}' reports status {:?} but its remaining amount implies {:?}",
            record.id, record.status, expected
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(amount: i64, remaining: i64, status: ConciliationStatus) -> ConciliationRecord {
        ConciliationRecord {
            id: "R1".to_string(),
            amount: BigDecimal::from(amount),
            remaining_amount: BigDecimal::from(remaining),
            client_number: "C-1".to_string(),
            account: "ACC-1".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 2, 10).unwrap(),
            status,
        }
    }

    #[test]
    fn test_validate_record_id() {
        assert!(validate_record_id("d-42").is_ok());
        assert!(validate_record_id("  ").is_err());
        assert!(validate_record_id(&"x".repeat(65)).is_err());
    }

    #[test]
    fn test_consistent_records_pass() {
        assert!(validate_conciliation_record(&record(
            1000,
            1000,
            ConciliationStatus::NotReconciled
        ))
        .is_ok());
        assert!(validate_conciliation_record(&record(
            1000,
            400,
            ConciliationStatus::PartiallyReconciled
        ))
        .is_ok());
        assert!(validate_conciliation_record(&record(
            1000,
            0,
            ConciliationStatus::FullyReconciled
        ))
        .is_ok());
    }

    #[test]
    fn test_status_disagreeing_with_remaining_is_rejected() {
        let err = validate_conciliation_record(&record(
            1000,
            0,
            ConciliationStatus::NotReconciled,
        ))
        .unwrap_err();
        assert!(matches!(err, SettlementError::InvalidResponse(_)));
    }

    #[test]
    fn test_remaining_out_of_bounds_is_rejected() {
        let err = validate_conciliation_record(&record(
            1000,
            1500,
            ConciliationStatus::PartiallyReconciled,
        ))
        .unwrap_err();
        assert!(matches!(err, SettlementError::InvalidResponse(_)));
    }
}
