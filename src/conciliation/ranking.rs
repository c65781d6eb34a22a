//! Canonical ordering of match candidates
//!
//! Pure functions, no I/O. The backend may return candidates in any
//! order; the client always re-sorts so the same input produces the
//! same ranked list.

use std::cmp::Ordering;

use crate::types::MatchCandidate;

/// Compare two candidates in canonical order
///
/// Descending by score; equal scores break ties by ascending
/// transaction id. `total_cmp` keeps the order total even for
/// pathological score values.
pub fn canonical_order(a: &MatchCandidate, b: &MatchCandidate) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.transaction_id.cmp(&b.transaction_id))
}

/// Sort candidates in place into canonical order
pub fn sort_candidates(candidates: &mut [MatchCandidate]) {
    candidates.sort_by(canonical_order);
}
