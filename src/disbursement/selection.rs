//! Selection-set arithmetic for payout batches
//!
//! Pure functions, no I/O. Grouping and complement computation feed the
//! batch coordinator; nothing here touches the gateway.

use bigdecimal::BigDecimal;
use std::collections::{BTreeMap, BTreeSet};

use crate::types::*;

/// Group pending disbursements by payee and aggregate their amounts
///
/// Filters to `Pending` records, so a payee with nothing awaiting
/// payout never appears. The returned groups partition the pending
/// records: disjoint, exhaustive, ordered by payee id. Totals are
/// summed left-to-right in input order, which with decimal arithmetic
/// makes repeated calls on the same input bit-identical.
///
/// Never fails; empty input yields empty output.
pub fn group_by_payee(records: &[DisbursementRecord]) -> Vec<PayeeGroup> {
    let mut groups: BTreeMap<String, PayeeGroup> = BTreeMap::new();

    for record in records.iter().filter(|r| r.is_pending()) {
        let group = groups
            .entry(record.payee_id.clone())
            .or_insert_with(|| PayeeGroup {
                payee_id: record.payee_id.clone(),
                payee_name: record.payee_name.clone(),
                members: Vec::new(),
                total_amount: BigDecimal::from(0),
            });
        group.total_amount += &record.amount;
        group.members.push(record.clone());
    }

    groups.into_values().collect()
}

/// Compute the exclusion list: `all_ids \ selected_ids`
///
/// The result is what the backend receives as "withhold these from the
/// payout run". Selecting everything excludes nothing; selecting
/// nothing excludes everything (a degenerate case the coordinator
/// rejects before submission).
///
/// Fails with [`SettlementError::InvalidSelection`] when the selection
/// references ids outside `all_ids` (a stale selection pointing at a
/// since-removed record); the caller must re-fetch and reopen.
pub fn complement(
    all_ids: &BTreeSet<String>,
    selected_ids: &BTreeSet<String>,
) -> SettlementResult<BTreeSet<String>> {
    if !selected_ids.is_subset(all_ids) {
        let stale: Vec<&str> = selected_ids
            .difference(all_ids)
            .map(String::as_str)
            .collect();
        return Err(SettlementError::InvalidSelection(format!(
            "Selection references transactions not in the group: {}",
            stale.join(", ")
        )));
    }

    Ok(all_ids.difference(selected_ids).cloned().collect())
}
