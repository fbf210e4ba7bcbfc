//! Split planning: replacing one transaction with N children.
//!
//! A split deletes the parent row and inserts one row per child. Children
//! carry their own amounts and envelope assignments; the sum of child
//! amounts is not required to equal the parent amount. Every child records
//! the ultimate ancestor of the split chain, so splitting a split child
//! still points back at the original transaction.

use rust_decimal::Decimal;
use uuid::Uuid;

use super::delta::{BalanceDelta, insert_delta, removal_delta};
use super::error::LedgerError;

/// The transaction being split.
#[derive(Debug, Clone, Copy)]
pub struct SplitParent {
    /// Row id of the parent.
    pub id: Uuid,
    /// Ancestor recorded on the parent if it is itself a split child.
    pub origin_transaction_id: Option<Uuid>,
    /// Envelope the parent is assigned to.
    pub envelope_id: Option<Uuid>,
    /// Signed parent amount.
    pub amount: Decimal,
    /// Whether the parent currently contributes to its envelope balance.
    pub counts: bool,
}

/// One child produced by a split.
#[derive(Debug, Clone, Copy)]
pub struct SplitChild {
    /// Signed child amount.
    pub amount: Decimal,
    /// Envelope the child is assigned to.
    pub envelope_id: Option<Uuid>,
}

/// The planned outcome of a split: which ancestor the children record and
/// which balance deltas accompany the row changes.
#[derive(Debug, Clone)]
pub struct SplitPlan {
    /// Ancestor id every child records.
    pub origin_transaction_id: Uuid,
    /// Compensating delta for deleting the parent, when it counted.
    pub parent_delta: Option<BalanceDelta>,
    /// Delta per child, index-aligned with the input children.
    pub child_deltas: Vec<Option<BalanceDelta>>,
}

/// Plans a split of `parent` into `children`.
///
/// Children are inserted visible and non-duplicate, so each assigned child
/// contributes its amount. The recorded ancestor is the parent's own
/// ancestor when the parent was already a split child, otherwise the
/// parent itself.
///
/// # Errors
///
/// Returns [`LedgerError::EmptySplit`] when `children` is empty.
pub fn plan_split(parent: &SplitParent, children: &[SplitChild]) -> Result<SplitPlan, LedgerError> {
    if children.is_empty() {
        return Err(LedgerError::EmptySplit);
    }

    let origin_transaction_id = parent.origin_transaction_id.unwrap_or(parent.id);
    let parent_delta = removal_delta(parent.envelope_id, parent.amount, parent.counts);
    let child_deltas = children
        .iter()
        .map(|child| insert_delta(child.envelope_id, child.amount, true))
        .collect();

    Ok(SplitPlan {
        origin_transaction_id,
        parent_delta,
        child_deltas,
    })
}
