//! Error types for ledger operations.

use thiserror::Error;

/// Errors that can occur while planning ledger mutations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// A split must produce at least one child transaction.
    #[error("Split must produce at least one child transaction")]
    EmptySplit,
}
