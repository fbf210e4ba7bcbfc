//! Pairing posted records with the pending records they replace.
//!
//! A provider first reports a provisional "pending" record, then later
//! withdraws it and adds a "posted" record that names the pending one as
//! its predecessor. When both sides appear in the same run, the pair is
//! handled as one in-place update instead of a delete plus an insert, so
//! the local row keeps its id, envelope assignment, and balance
//! contribution.

use std::collections::{HashMap, HashSet};

use super::changeset::{IncomingRecord, RemovedRecord};

/// The pairing computed for one run's change-sets.
#[derive(Debug, Clone, Default)]
pub struct PendingPairs {
    by_added: HashMap<usize, usize>,
    consumed_removed: HashSet<usize>,
}

impl PendingPairs {
    /// Index into the removed list of the pending record this added record
    /// supersedes, when the pair exists in this run.
    #[must_use]
    pub fn predecessor_of(&self, added_index: usize) -> Option<usize> {
        self.by_added.get(&added_index).copied()
    }

    /// True when the removed record at this index was consumed by a pair
    /// and must not be deleted on its own.
    #[must_use]
    pub fn consumed(&self, removed_index: usize) -> bool {
        self.consumed_removed.contains(&removed_index)
    }

    /// Number of pairs found.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_added.len()
    }

    /// True when no pairs were found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_added.is_empty()
    }
}

/// Pairs each added record carrying a pending predecessor with the removed
/// record bearing that provider id.
///
/// Each removed record pairs at most once; a second added record naming the
/// same predecessor falls through to the ordinary insert path.
#[must_use]
pub fn pending_pairs(added: &[IncomingRecord], removed: &[RemovedRecord]) -> PendingPairs {
    let mut by_provider_id: HashMap<&str, usize> = HashMap::with_capacity(removed.len());
    for (index, record) in removed.iter().enumerate() {
        by_provider_id.entry(record.provider_id.as_str()).or_insert(index);
    }

    let mut pairs = PendingPairs::default();
    for (added_index, record) in added.iter().enumerate() {
        let Some(predecessor) = record.pending_predecessor_id.as_deref() else {
            continue;
        };
        if let Some(&removed_index) = by_provider_id.get(predecessor) {
            if pairs.consumed_removed.insert(removed_index) {
                pairs.by_added.insert(added_index, removed_index);
            }
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn added(provider_id: &str, predecessor: Option<&str>) -> IncomingRecord {
        IncomingRecord {
            provider_id: provider_id.to_string(),
            provider_account_id: "acct-1".to_string(),
            pending_predecessor_id: predecessor.map(ToString::to_string),
            amount: dec!(-12.40),
            posted_on: NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
            description: "GROCERY".to_string(),
            reference_number: None,
        }
    }

    fn removed(provider_id: &str) -> RemovedRecord {
        RemovedRecord { provider_id: provider_id.to_string() }
    }

    #[test]
    fn pairs_added_with_its_removed_predecessor() {
        let added_set = vec![added("posted-1", Some("p1"))];
        let removed_set = vec![removed("p1")];

        let pairs = pending_pairs(&added_set, &removed_set);
        assert_eq!(pairs.predecessor_of(0), Some(0));
        assert!(pairs.consumed(0));
        assert_eq!(pairs.len(), 1);
    }

    #[test]
    fn unrelated_records_stay_unpaired() {
        let added_set = vec![added("posted-1", None), added("posted-2", Some("elsewhere"))];
        let removed_set = vec![removed("p1")];

        let pairs = pending_pairs(&added_set, &removed_set);
        assert!(pairs.is_empty());
        assert_eq!(pairs.predecessor_of(0), None);
        assert_eq!(pairs.predecessor_of(1), None);
        assert!(!pairs.consumed(0));
    }

    #[test]
    fn a_removed_record_pairs_at_most_once() {
        let added_set = vec![added("posted-1", Some("p1")), added("posted-2", Some("p1"))];
        let removed_set = vec![removed("p1")];

        let pairs = pending_pairs(&added_set, &removed_set);
        assert_eq!(pairs.predecessor_of(0), Some(0));
        assert_eq!(pairs.predecessor_of(1), None);
        assert_eq!(pairs.len(), 1);
    }

    #[test]
    fn pairing_is_positional_not_order_dependent() {
        let added_set = vec![added("posted-2", Some("p2")), added("posted-1", Some("p1"))];
        let removed_set = vec![removed("p1"), removed("p2")];

        let pairs = pending_pairs(&added_set, &removed_set);
        assert_eq!(pairs.predecessor_of(0), Some(1));
        assert_eq!(pairs.predecessor_of(1), Some(0));
    }
}
