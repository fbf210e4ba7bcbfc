//! Balance delta computation.
//!
//! An envelope's stored balance equals the sum of amounts over its visible,
//! non-duplicate transactions. The functions here turn a row mutation into
//! the balance delta (or deltas) that keep that equation true. Callers apply
//! each returned delta in the same database transaction as the row change.

use rust_decimal::Decimal;
use uuid::Uuid;

/// A single balance adjustment to apply to one envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceDelta {
    /// Envelope to adjust.
    pub envelope_id: Uuid,
    /// Signed amount to add to the stored balance.
    pub amount: Decimal,
}

/// Whether a transaction contributes to its envelope's balance.
///
/// Hidden rows and duplicates are kept for audit but sum to nothing.
#[must_use]
pub const fn counts_toward_balance(is_visible: bool, is_duplicate: bool) -> bool {
    is_visible && !is_duplicate
}

/// Delta for inserting a transaction.
///
/// Returns `None` when the row is unassigned or does not count.
#[must_use]
pub fn insert_delta(envelope_id: Option<Uuid>, amount: Decimal, counts: bool) -> Option<BalanceDelta> {
    if !counts {
        return None;
    }
    envelope_id.map(|envelope_id| BalanceDelta {
        envelope_id,
        amount,
    })
}

/// Delta for removing a transaction: the exact opposite of its insert.
#[must_use]
pub fn removal_delta(envelope_id: Option<Uuid>, amount: Decimal, counts: bool) -> Option<BalanceDelta> {
    insert_delta(envelope_id, -amount, counts)
}

/// Deltas for moving a counting transaction from one envelope to another.
///
/// Produces up to two deltas: the amount leaves the old envelope and enters
/// the new one. Reassigning a row that does not count produces nothing, and
/// reassigning to the same envelope is a no-op.
#[must_use]
pub fn reassignment_deltas(
    old_envelope_id: Option<Uuid>,
    new_envelope_id: Option<Uuid>,
    amount: Decimal,
    counts: bool,
) -> Vec<BalanceDelta> {
    if !counts || old_envelope_id == new_envelope_id {
        return Vec::new();
    }

    let mut deltas = Vec::with_capacity(2);
    if let Some(delta) = removal_delta(old_envelope_id, amount, true) {
        deltas.push(delta);
    }
    if let Some(delta) = insert_delta(new_envelope_id, amount, true) {
        deltas.push(delta);
    }
    deltas
}

/// Delta for flipping a visibility or duplicate flag.
///
/// A row that starts counting adds its amount; a row that stops counting
/// withdraws it. No change in counting status means no delta.
#[must_use]
pub fn flip_delta(
    envelope_id: Option<Uuid>,
    amount: Decimal,
    counted_before: bool,
    counted_after: bool,
) -> Option<BalanceDelta> {
    match (counted_before, counted_after) {
        (false, true) => insert_delta(envelope_id, amount, true),
        (true, false) => removal_delta(envelope_id, amount, true),
        _ => None,
    }
}

/// Balance adjustment for writing a budget entry.
///
/// A fresh budget row adds its full amount; overwriting an existing row
/// adds only the difference between the new and old amounts.
#[must_use]
pub fn budget_upsert_delta(previous_amount: Option<Decimal>, new_amount: Decimal) -> Decimal {
    new_amount - previous_amount.unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn envelope() -> Uuid {
        Uuid::new_v4()
    }

    // ========================================================================
    // counts_toward_balance
    // ========================================================================

    #[test]
    fn only_visible_non_duplicates_count() {
        assert!(counts_toward_balance(true, false));
        assert!(!counts_toward_balance(true, true));
        assert!(!counts_toward_balance(false, false));
        assert!(!counts_toward_balance(false, true));
    }

    // ========================================================================
    // Insert and removal
    // ========================================================================

    #[test]
    fn insert_produces_full_amount() {
        let id = envelope();
        let delta = insert_delta(Some(id), dec!(-42.50), true).unwrap();
        assert_eq!(delta.envelope_id, id);
        assert_eq!(delta.amount, dec!(-42.50));
    }

    #[test]
    fn insert_of_duplicate_produces_nothing() {
        assert_eq!(insert_delta(Some(envelope()), dec!(-42.50), false), None);
    }

    #[test]
    fn insert_unassigned_produces_nothing() {
        assert_eq!(insert_delta(None, dec!(-42.50), true), None);
    }

    #[test]
    fn removal_negates_insert() {
        let id = envelope();
        let inserted = insert_delta(Some(id), dec!(-30), true).unwrap();
        let removed = removal_delta(Some(id), dec!(-30), true).unwrap();
        assert_eq!(inserted.amount + removed.amount, Decimal::ZERO);
    }

    // ========================================================================
    // Reassignment
    // ========================================================================

    #[test]
    fn reassignment_moves_amount_between_envelopes() {
        let from = envelope();
        let to = envelope();
        let deltas = reassignment_deltas(Some(from), Some(to), dec!(-25), true);
        assert_eq!(deltas.len(), 2);
        assert_eq!(deltas[0], BalanceDelta { envelope_id: from, amount: dec!(25) });
        assert_eq!(deltas[1], BalanceDelta { envelope_id: to, amount: dec!(-25) });
    }

    #[test]
    fn reassignment_from_unassigned_only_credits_target() {
        let to = envelope();
        let deltas = reassignment_deltas(None, Some(to), dec!(-25), true);
        assert_eq!(deltas, vec![BalanceDelta { envelope_id: to, amount: dec!(-25) }]);
    }

    #[test]
    fn reassignment_to_unassigned_only_debits_source() {
        let from = envelope();
        let deltas = reassignment_deltas(Some(from), None, dec!(-25), true);
        assert_eq!(deltas, vec![BalanceDelta { envelope_id: from, amount: dec!(25) }]);
    }

    #[test]
    fn reassignment_of_non_counting_row_is_silent() {
        assert!(reassignment_deltas(Some(envelope()), Some(envelope()), dec!(-25), false).is_empty());
    }

    #[test]
    fn reassignment_to_same_envelope_is_silent() {
        let id = envelope();
        assert!(reassignment_deltas(Some(id), Some(id), dec!(-25), true).is_empty());
    }

    // ========================================================================
    // Flag flips
    // ========================================================================

    #[test]
    fn marking_duplicate_withdraws_amount() {
        let id = envelope();
        let delta = flip_delta(Some(id), dec!(-42.50), true, false).unwrap();
        assert_eq!(delta.amount, dec!(42.50));
    }

    #[test]
    fn unmarking_duplicate_restores_amount() {
        let id = envelope();
        let delta = flip_delta(Some(id), dec!(-42.50), false, true).unwrap();
        assert_eq!(delta.amount, dec!(-42.50));
    }

    #[test]
    fn flip_without_counting_change_is_silent() {
        assert_eq!(flip_delta(Some(envelope()), dec!(-10), true, true), None);
        assert_eq!(flip_delta(Some(envelope()), dec!(-10), false, false), None);
    }

    // ========================================================================
    // Budget upsert
    // ========================================================================

    #[test]
    fn fresh_budget_adds_full_amount() {
        assert_eq!(budget_upsert_delta(None, dec!(500)), dec!(500));
    }

    #[test]
    fn budget_overwrite_adds_only_the_difference() {
        assert_eq!(budget_upsert_delta(Some(dec!(500)), dec!(300)), dec!(-200));
    }

    #[test]
    fn unchanged_budget_adds_nothing() {
        assert_eq!(budget_upsert_delta(Some(dec!(500)), dec!(500)), Decimal::ZERO);
    }
}
