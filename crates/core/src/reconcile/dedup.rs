//! Duplicate detection over existing rows.
//!
//! An incoming record is a duplicate when an existing transaction on the
//! same account and date matches it by reference number, or, for records
//! without a reference number, by exact amount and description. The store
//! layer narrows candidates to the account and date; the predicate here
//! makes the call. Duplicates are still inserted for audit but never
//! contribute to an envelope balance.

use rust_decimal::Decimal;

/// The comparable fields of an incoming record.
///
/// Account and date are equal by construction: the candidate query already
/// filtered on them.
#[derive(Debug, Clone, Copy)]
pub struct DuplicateProbe<'a> {
    /// Reference number of the incoming record, when present.
    pub reference_number: Option<&'a str>,
    /// Signed amount.
    pub amount: Decimal,
    /// Description text; an empty string counts as absent.
    pub description: &'a str,
}

/// The comparable fields of an existing row.
#[derive(Debug, Clone, Copy)]
pub struct ExistingRow<'a> {
    /// Stored reference number, when present.
    pub reference_number: Option<&'a str>,
    /// Signed amount.
    pub amount: Decimal,
    /// Stored description.
    pub description: &'a str,
}

/// Decides whether the probe duplicates any of the candidate rows.
///
/// With neither a reference number nor a description there is nothing to
/// compare against, so the record is never a duplicate.
pub fn is_duplicate<'a, I>(probe: DuplicateProbe<'_>, candidates: I) -> bool
where
    I: IntoIterator<Item = ExistingRow<'a>>,
{
    if probe.reference_number.is_none() && probe.description.is_empty() {
        return false;
    }

    candidates.into_iter().any(|row| matches_row(probe, row))
}

fn matches_row(probe: DuplicateProbe<'_>, row: ExistingRow<'_>) -> bool {
    match probe.reference_number {
        Some(reference) => row.reference_number == Some(reference),
        None => row.amount == probe.amount && row.description == probe.description,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn probe<'a>(reference: Option<&'a str>, description: &'a str) -> DuplicateProbe<'a> {
        DuplicateProbe { reference_number: reference, amount: dec!(-42.50), description }
    }

    fn row<'a>(reference: Option<&'a str>, description: &'a str) -> ExistingRow<'a> {
        ExistingRow { reference_number: reference, amount: dec!(-42.50), description }
    }

    #[test]
    fn nothing_to_compare_is_never_a_duplicate() {
        let candidates = vec![row(Some("chk-105"), "COFFEE")];
        assert!(!is_duplicate(probe(None, ""), candidates));
    }

    #[test]
    fn matching_reference_number_is_a_duplicate() {
        let candidates = vec![row(Some("chk-105"), "SOMETHING ELSE")];
        assert!(is_duplicate(probe(Some("chk-105"), "COFFEE"), candidates));
    }

    #[test]
    fn differing_reference_numbers_do_not_match() {
        let candidates = vec![row(Some("chk-106"), "COFFEE")];
        assert!(!is_duplicate(probe(Some("chk-105"), "COFFEE"), candidates));
    }

    #[test]
    fn without_reference_amount_and_description_must_both_match() {
        let candidates = vec![row(None, "COFFEE")];
        assert!(is_duplicate(probe(None, "COFFEE"), candidates.clone()));
        assert!(!is_duplicate(probe(None, "TEA"), candidates));
    }

    #[test]
    fn amount_mismatch_defeats_description_match() {
        let candidates = vec![ExistingRow {
            reference_number: None,
            amount: dec!(-42.51),
            description: "COFFEE",
        }];
        assert!(!is_duplicate(probe(None, "COFFEE"), candidates));
    }

    #[rstest]
    #[case::empty_candidates(vec![])]
    #[case::reference_only_rows(vec![("r1", "COFFEE")])]
    fn no_amount_description_match_means_unique(#[case] rows: Vec<(&str, &str)>) {
        let candidates: Vec<ExistingRow<'_>> = rows
            .iter()
            .map(|(reference, description)| ExistingRow {
                reference_number: Some(reference),
                amount: dec!(0),
                description,
            })
            .collect();
        assert!(!is_duplicate(probe(None, "UNSEEN"), candidates));
    }
}
