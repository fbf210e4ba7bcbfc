//! Envelope balance maintenance logic.
//!
//! Every transaction mutation pairs with an equal-and-opposite envelope
//! balance delta. This module computes those deltas as values; the store
//! layer executes them in the same database transaction as the row
//! mutation they belong to:
//! - Balance delta commands for insert, delete, reassign, and flag flips
//! - Split planning (one parent replaced by N children)
//! - Budget upsert delta arithmetic
//! - Error types for ledger operations

pub mod delta;
pub mod error;
pub mod split;

#[cfg(test)]
mod props;

pub use delta::{
    BalanceDelta, budget_upsert_delta, counts_toward_balance, flip_delta, insert_delta,
    reassignment_deltas, removal_delta,
};
pub use error::LedgerError;
pub use split::{SplitChild, SplitParent, SplitPlan, plan_split};
