//! Change-set container and the apply-order contract.
//!
//! The order in which a run applies its three record lists is load-bearing:
//! pending-to-posted pairing must see both the new added record and the old
//! removed record before either side is durably deleted, so removals come
//! after additions. Modifications are independent remove-then-insert
//! operations and come last. The order is a named constant, not an artifact
//! of statement order at the call site.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One record arriving from the provider or an import feed.
///
/// Added and modified records share this shape. `provider_id` becomes the
/// local row's reference number on insert; see [`Self::stored_reference`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingRecord {
    /// Provider-assigned identifier for this record.
    pub provider_id: String,
    /// Provider-side identifier of the account the record belongs to.
    pub provider_account_id: String,
    /// Provider id of the pending record this one supersedes, when posted.
    pub pending_predecessor_id: Option<String>,
    /// Signed amount, debit negative.
    pub amount: Decimal,
    /// Date the record posted.
    pub posted_on: NaiveDate,
    /// Free-text description.
    pub description: String,
    /// Institution-supplied reference number (a check number, say), when
    /// the provider passes one through. Compared during duplicate
    /// detection; never the stored lookup key.
    pub reference_number: Option<String>,
}

impl IncomingRecord {
    /// The reference number the local row will carry.
    ///
    /// Always the provider id. Removed and modified records identify
    /// their local row by provider id alone, so an institution-supplied
    /// reference number must not displace it as the lookup key.
    #[must_use]
    pub fn stored_reference(&self) -> &str {
        &self.provider_id
    }
}

/// A record the provider has withdrawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovedRecord {
    /// Provider-assigned identifier of the withdrawn record.
    pub provider_id: String,
}

/// The phases of one reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyPhase {
    /// New records to insert (or pair with a pending row).
    Added,
    /// Withdrawn records to delete, unless consumed by a pairing.
    Removed,
    /// Changed records, applied as delete-then-reinsert.
    Modified,
}

/// Accumulated change-sets across all pages of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Records to insert.
    pub added: Vec<IncomingRecord>,
    /// Records to delete.
    pub removed: Vec<RemovedRecord>,
    /// Records to replace.
    pub modified: Vec<IncomingRecord>,
}

impl ChangeSet {
    /// The contractual application order of the three phases.
    pub const APPLY_ORDER: [ApplyPhase; 3] =
        [ApplyPhase::Added, ApplyPhase::Removed, ApplyPhase::Modified];

    /// Creates an empty change-set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one page's worth of records, preserving arrival order.
    pub fn extend(
        &mut self,
        added: Vec<IncomingRecord>,
        modified: Vec<IncomingRecord>,
        removed: Vec<RemovedRecord>,
    ) {
        self.added.extend(added);
        self.modified.extend(modified);
        self.removed.extend(removed);
    }

    /// The phases in the order the pipeline must apply them.
    #[must_use]
    pub const fn in_apply_order(&self) -> [ApplyPhase; 3] {
        Self::APPLY_ORDER
    }

    /// Total number of records across all three lists.
    #[must_use]
    pub fn total_records(&self) -> usize {
        self.added.len() + self.removed.len() + self.modified.len()
    }

    /// True when no phase has any records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total_records() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn record(provider_id: &str) -> IncomingRecord {
        IncomingRecord {
            provider_id: provider_id.to_string(),
            provider_account_id: "acct-1".to_string(),
            pending_predecessor_id: None,
            amount: dec!(-10),
            posted_on: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            description: "COFFEE SHOP".to_string(),
            reference_number: None,
        }
    }

    #[test]
    fn apply_order_is_added_removed_modified() {
        let set = ChangeSet::new();
        assert_eq!(
            set.in_apply_order(),
            [ApplyPhase::Added, ApplyPhase::Removed, ApplyPhase::Modified]
        );
    }

    #[test]
    fn extend_preserves_arrival_order_across_pages() {
        let mut set = ChangeSet::new();
        set.extend(vec![record("a1")], vec![], vec![]);
        set.extend(
            vec![record("a2")],
            vec![record("m1")],
            vec![RemovedRecord { provider_id: "r1".to_string() }],
        );

        assert_eq!(set.added[0].provider_id, "a1");
        assert_eq!(set.added[1].provider_id, "a2");
        assert_eq!(set.modified[0].provider_id, "m1");
        assert_eq!(set.removed[0].provider_id, "r1");
        assert_eq!(set.total_records(), 4);
    }

    #[test]
    fn empty_set_reports_empty() {
        assert!(ChangeSet::new().is_empty());
    }

    #[test]
    fn institution_reference_never_displaces_the_stored_key() {
        let mut r = record("txn-9");
        assert_eq!(r.stored_reference(), "txn-9");
        r.reference_number = Some("chk-105".to_string());
        assert_eq!(r.stored_reference(), "txn-9");
    }
}
