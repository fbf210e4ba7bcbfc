//! Validation of flat-file import records.
//!
//! An upstream collaborator normalizes OFX/CSV/tab-delimited payloads into
//! textual records before they reach the pipeline. Rows with malformed
//! dates or empty or malformed amounts are skipped here with a reason, not
//! rejected upstream.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];

/// One normalized row from an import feed, still textual.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRecord {
    /// Label identifying the account within the imported file.
    pub account_label: String,
    /// Date text.
    pub date: String,
    /// Amount text, signed, debit negative.
    pub amount: String,
    /// Free-text description.
    pub description: String,
    /// Reference number, when the file carries one.
    pub reference_number: Option<String>,
}

/// A validated import record ready for the reconciliation pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedImport {
    /// Label identifying the account within the imported file.
    pub account_label: String,
    /// Parsed posting date.
    pub posted_on: NaiveDate,
    /// Parsed signed amount.
    pub amount: Decimal,
    /// Free-text description.
    pub description: String,
    /// Reference number, when present.
    pub reference_number: Option<String>,
}

/// Why an import row was skipped.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImportSkip {
    /// The date text matched none of the accepted formats.
    #[error("Unparseable date '{0}'")]
    BadDate(String),
    /// The amount field was empty after trimming.
    #[error("Empty amount")]
    EmptyAmount,
    /// The amount text was not a decimal number.
    #[error("Unparseable amount '{0}'")]
    BadAmount(String),
}

/// Validates one import row.
///
/// # Errors
///
/// Returns the skip reason for rows the pipeline must drop.
pub fn parse_import(record: &ImportRecord) -> Result<ParsedImport, ImportSkip> {
    let date_text = record.date.trim();
    let posted_on = DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(date_text, format).ok())
        .ok_or_else(|| ImportSkip::BadDate(record.date.clone()))?;

    let amount_text = record.amount.trim();
    if amount_text.is_empty() {
        return Err(ImportSkip::EmptyAmount);
    }
    let amount = Decimal::from_str_exact(amount_text)
        .map_err(|_| ImportSkip::BadAmount(record.amount.clone()))?;

    Ok(ParsedImport {
        account_label: record.account_label.clone(),
        posted_on,
        amount,
        description: record.description.trim().to_string(),
        reference_number: record.reference_number.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn record(date: &str, amount: &str) -> ImportRecord {
        ImportRecord {
            account_label: "Checking".to_string(),
            date: date.to_string(),
            amount: amount.to_string(),
            description: " UTILITY CO ".to_string(),
            reference_number: None,
        }
    }

    #[rstest]
    #[case::iso("2024-03-01")]
    #[case::us("03/01/2024")]
    fn accepts_both_date_formats(#[case] date: &str) {
        let parsed = parse_import(&record(date, "-42.50")).unwrap();
        assert_eq!(parsed.posted_on, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }

    #[test]
    fn parses_amount_and_trims_description() {
        let parsed = parse_import(&record("2024-03-01", " -42.50 ")).unwrap();
        assert_eq!(parsed.amount, dec!(-42.50));
        assert_eq!(parsed.description, "UTILITY CO");
    }

    #[test]
    fn malformed_date_is_skipped() {
        let result = parse_import(&record("March 1st", "-42.50"));
        assert_eq!(result.unwrap_err(), ImportSkip::BadDate("March 1st".to_string()));
    }

    #[test]
    fn empty_amount_is_skipped() {
        let result = parse_import(&record("2024-03-01", "   "));
        assert_eq!(result.unwrap_err(), ImportSkip::EmptyAmount);
    }

    #[test]
    fn malformed_amount_is_skipped() {
        let result = parse_import(&record("2024-03-01", "12x"));
        assert_eq!(result.unwrap_err(), ImportSkip::BadAmount("12x".to_string()));
    }
}
