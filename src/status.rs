//! Status projection for list and table views
//!
//! Pure mapping from the status enumerations to display labels. The
//! matches are exhaustive, so adding a status without a label is a
//! compile error rather than a runtime fallback string.

use serde::Serialize;

use crate::types::{ConciliationStatus, DisbursementStatus};

/// Severity bucket a status renders with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Not yet actionable
    Muted,
    /// In progress, nothing required
    Info,
    /// Work remains for the operator
    Warning,
    /// Completed successfully
    Success,
    /// Needs attention
    Danger,
}

/// Display label plus severity for one status value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusLabel {
    /// Human-readable text
    pub text: &'static str,
    /// Rendering severity
    pub severity: Severity,
}

/// Project a disbursement status onto its display label
pub fn disbursement_status_label(status: DisbursementStatus) -> StatusLabel {
    match status {
        DisbursementStatus::Init => StatusLabel {
            text: "Scheduled",
            severity: Severity::Muted,
        },
        DisbursementStatus::Pending => StatusLabel {
            text: "Awaiting payout",
            severity: Severity::Info,
        },
        DisbursementStatus::Payed => StatusLabel {
            text: "Paid",
            severity: Severity::Success,
        },
        DisbursementStatus::Failed => StatusLabel {
            text: "Failed",
            severity: Severity::Danger,
        },
    }
}

/// Project a conciliation status onto its display label
pub fn conciliation_status_label(status: ConciliationStatus) -> StatusLabel {
    match status {
        ConciliationStatus::NotReconciled => StatusLabel {
            text: "Not reconciled",
            severity: Severity::Warning,
        },
        ConciliationStatus::PartiallyReconciled => StatusLabel {
            text: "Partially reconciled",
            severity: Severity::Info,
        },
        ConciliationStatus::FullyReconciled => StatusLabel {
            text: "Reconciled",
            severity: Severity::Success,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disbursement_labels() {
        assert_eq!(
            disbursement_status_label(DisbursementStatus::Payed).text,
            "Paid"
        );
        assert_eq!(
            disbursement_status_label(DisbursementStatus::Failed).severity,
            Severity::Danger
        );
        assert_eq!(
            disbursement_status_label(DisbursementStatus::Pending).severity,
            Severity::Info
        );
    }

    #[test]
    fn test_conciliation_labels() {
        assert_eq!(
            conciliation_status_label(ConciliationStatus::NotReconciled).severity,
            Severity::Warning
        );
        assert_eq!(
            conciliation_status_label(ConciliationStatus::FullyReconciled).text,
            "Reconciled"
        );
    }
}
