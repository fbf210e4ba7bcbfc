//! Error types for sync runs.

use thiserror::Error;

use tally_db::repositories::{AccountError, KeywordRuleError, TransactionError};

use crate::provider::ProviderError;

/// Errors that abort a sync, backfill, or import run.
///
/// Any of these rolls the current record's database transaction back and
/// stops the run; the progress sentinel and cursor handling are the
/// engine's responsibility.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A provider page or range fetch failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// An account operation failed.
    #[error(transparent)]
    Account(#[from] AccountError),

    /// A transaction operation failed.
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    /// A keyword rule operation failed.
    #[error(transparent)]
    Rule(#[from] KeywordRuleError),
}
