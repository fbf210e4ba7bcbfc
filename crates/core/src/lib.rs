//! Core reconciliation and ledger logic for Tally.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! All decisions about balance deltas, duplicate detection, pending-transaction
//! matching, and categorization live here; the store layer only executes what
//! this crate computes.
//!
//! # Modules
//!
//! - `ledger` - Envelope balance deltas and split planning
//! - `reconcile` - Change-set ordering, pending matching, duplicate detection
//! - `categorize` - Keyword rule matching
//! - `progress` - Keyed progress store for background runs

pub mod categorize;
pub mod ledger;
pub mod progress;
pub mod reconcile;
