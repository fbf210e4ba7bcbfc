//! Sync engine for Tally.
//!
//! Orchestrates the reconciliation of provider change-sets and flat-file
//! imports against the local ledger:
//! - `provider` - the [`SyncProvider`] trait, wire types, HTTP client
//! - `resolver` - per-run account resolution cache
//! - `pipeline` - change-set application in contract order
//! - `engine` - cursor loop, backfill, import, detached workers
//!
//! Workers are detached tasks: callers get a [`tally_shared::SessionToken`]
//! back immediately and observe completion through the progress tracker.

pub mod engine;
pub mod error;
pub mod pipeline;
pub mod provider;
pub mod resolver;

pub use engine::SyncEngine;
pub use error::SyncError;
pub use provider::{
    HttpSyncProvider, ProviderError, ProviderTransaction, RangePage, RemovedTransaction,
    SyncPage, SyncProvider,
};
