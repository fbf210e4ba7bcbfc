//! Transaction repository.
//!
//! Every mutation here pairs its row change with the envelope balance
//! delta the core layer computes, inside one database transaction: insert,
//! delete, envelope reassignment, visibility and duplicate flips, splits,
//! and budget upserts. The pending-to-posted update is the deliberate
//! exception: the row already contributed its amount, so it is rewritten
//! in place with no delta.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    DbErr, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::{debug, info};
use uuid::Uuid;

use tally_core::ledger::{
    BalanceDelta, LedgerError, SplitChild, SplitParent, budget_upsert_delta,
    counts_toward_balance, flip_delta, insert_delta, plan_split, reassignment_deltas,
    removal_delta,
};
use tally_core::reconcile::{DuplicateProbe, ExistingRow, is_duplicate};

use crate::entities::transactions;

use super::envelope::{EnvelopeError, EnvelopeRepository};

/// Error types for transaction operations.
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    /// Transaction not found.
    #[error("Transaction not found: {0}")]
    NotFound(Uuid),

    /// Ledger planning error.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Envelope balance error.
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// Input for inserting a transaction.
#[derive(Debug, Clone)]
pub struct NewTransactionInput {
    /// Owning user.
    pub user_id: Uuid,
    /// Account the row belongs to; `None` for pure manual entries.
    pub account_id: Option<Uuid>,
    /// Envelope assignment; `None` leaves the row unassigned.
    pub envelope_id: Option<Uuid>,
    /// Signed amount, debit negative.
    pub amount: Decimal,
    /// Posting date.
    pub posted_on: NaiveDate,
    /// Free-text description.
    pub description: String,
    /// Provider idempotency key, when present.
    pub reference_number: Option<String>,
    /// Whether the duplicate detector flagged this record.
    pub is_duplicate: bool,
}

/// Replacement values for a pending row superseded by its posted record.
#[derive(Debug, Clone)]
pub struct PostedUpdateInput {
    /// New reference number.
    pub reference_number: String,
    /// New signed amount.
    pub amount: Decimal,
    /// New posting date.
    pub posted_on: NaiveDate,
    /// New description.
    pub description: String,
}

/// One child of a split.
#[derive(Debug, Clone)]
pub struct SplitChildInput {
    /// Signed child amount.
    pub amount: Decimal,
    /// Envelope assignment.
    pub envelope_id: Option<Uuid>,
    /// Child description.
    pub description: String,
}

/// Transaction repository; the invariant-preserving core of the store.
#[derive(Debug, Clone)]
pub struct TransactionRepository {
    db: DatabaseConnection,
}

impl TransactionRepository {
    /// Creates a new transaction repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Inserts a visible transaction, applying its balance delta.
    ///
    /// Duplicates are inserted for audit but contribute nothing.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure; row and delta roll back
    /// together.
    pub async fn insert_transaction(
        &self,
        input: NewTransactionInput,
    ) -> Result<transactions::Model, TransactionError> {
        let counts = counts_toward_balance(true, input.is_duplicate);
        let delta = insert_delta(input.envelope_id, input.amount, counts);

        let txn = self.db.begin().await?;
        let row = Self::insert_row(&txn, &input, false, false, None).await?;
        Self::apply(&txn, delta).await?;
        txn.commit().await?;

        debug!(transaction_id = %row.id, amount = %row.amount, "Inserted transaction");
        Ok(row)
    }

    /// Deletes a transaction, withdrawing its balance contribution.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionError::NotFound`] when no such row exists.
    pub async fn delete_transaction(&self, id: Uuid) -> Result<(), TransactionError> {
        let row = self.find_by_id(id).await?;
        let counts = counts_toward_balance(row.is_visible, row.is_duplicate);
        let delta = removal_delta(row.envelope_id, row.amount, counts);

        let txn = self.db.begin().await?;
        transactions::Entity::delete_by_id(id).exec(&txn).await?;
        Self::apply(&txn, delta).await?;
        txn.commit().await?;

        debug!(transaction_id = %id, "Deleted transaction");
        Ok(())
    }

    /// Deletes the user's row matching a provider reference.
    ///
    /// Removed change-set records carry only the provider id, so the
    /// lookup is user-scoped. Returns the deleted row's id, or `None` when
    /// nothing matched — the caller decides whether that is worth a
    /// warning.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub async fn delete_by_reference(
        &self,
        user_id: Uuid,
        reference_number: &str,
    ) -> Result<Option<Uuid>, TransactionError> {
        let Some(row) = transactions::Entity::find()
            .filter(transactions::Column::UserId.eq(user_id))
            .filter(transactions::Column::ReferenceNumber.eq(reference_number))
            .one(&self.db)
            .await?
        else {
            return Ok(None);
        };
        let counts = counts_toward_balance(row.is_visible, row.is_duplicate);
        let delta = removal_delta(row.envelope_id, row.amount, counts);

        let txn = self.db.begin().await?;
        transactions::Entity::delete_by_id(row.id).exec(&txn).await?;
        Self::apply(&txn, delta).await?;
        txn.commit().await?;
        Ok(Some(row.id))
    }

    /// Rewrites a pending row with its posted record's values, in place.
    ///
    /// No balance delta: the row already contributed its amount, and the
    /// envelope assignment is untouched. Returns `None` when the expected
    /// row is missing so the caller can degrade to a fresh insert.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub async fn update_posted(
        &self,
        account_id: Uuid,
        old_reference: &str,
        update: PostedUpdateInput,
    ) -> Result<Option<transactions::Model>, TransactionError> {
        let Some(row) = self.find_by_reference(account_id, old_reference).await? else {
            return Ok(None);
        };

        let mut active: transactions::ActiveModel = row.into();
        active.reference_number = Set(Some(update.reference_number));
        active.amount = Set(update.amount);
        active.posted_on = Set(update.posted_on);
        active.description = Set(update.description);
        let updated = active.update(&self.db).await?;

        debug!(transaction_id = %updated.id, "Posted record replaced pending row in place");
        Ok(Some(updated))
    }

    /// Reassigns a transaction's envelope, moving its contribution.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionError::NotFound`] when no such row exists.
    pub async fn reassign_envelope(
        &self,
        id: Uuid,
        new_envelope_id: Option<Uuid>,
    ) -> Result<transactions::Model, TransactionError> {
        let row = self.find_by_id(id).await?;
        let counts = counts_toward_balance(row.is_visible, row.is_duplicate);
        let deltas = reassignment_deltas(row.envelope_id, new_envelope_id, row.amount, counts);

        let txn = self.db.begin().await?;
        let mut active: transactions::ActiveModel = row.into();
        active.envelope_id = Set(new_envelope_id);
        let updated = active.update(&txn).await?;
        for delta in deltas {
            Self::apply(&txn, Some(delta)).await?;
        }
        txn.commit().await?;
        Ok(updated)
    }

    /// Sets the duplicate flag, adjusting the balance when the row starts
    /// or stops counting.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionError::NotFound`] when no such row exists.
    pub async fn set_duplicate(
        &self,
        id: Uuid,
        is_duplicate: bool,
    ) -> Result<transactions::Model, TransactionError> {
        let row = self.find_by_id(id).await?;
        let before = counts_toward_balance(row.is_visible, row.is_duplicate);
        let after = counts_toward_balance(row.is_visible, is_duplicate);
        let delta = flip_delta(row.envelope_id, row.amount, before, after);

        let txn = self.db.begin().await?;
        let mut active: transactions::ActiveModel = row.into();
        active.is_duplicate = Set(is_duplicate);
        let updated = active.update(&txn).await?;
        Self::apply(&txn, delta).await?;
        txn.commit().await?;
        Ok(updated)
    }

    /// Sets the visibility flag, adjusting the balance when the row starts
    /// or stops counting.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionError::NotFound`] when no such row exists.
    pub async fn set_visible(
        &self,
        id: Uuid,
        is_visible: bool,
    ) -> Result<transactions::Model, TransactionError> {
        let row = self.find_by_id(id).await?;
        let before = counts_toward_balance(row.is_visible, row.is_duplicate);
        let after = counts_toward_balance(is_visible, row.is_duplicate);
        let delta = flip_delta(row.envelope_id, row.amount, before, after);

        let txn = self.db.begin().await?;
        let mut active: transactions::ActiveModel = row.into();
        active.is_visible = Set(is_visible);
        let updated = active.update(&txn).await?;
        Self::apply(&txn, delta).await?;
        txn.commit().await?;
        Ok(updated)
    }

    /// Replaces a transaction with child transactions.
    ///
    /// Children inherit the parent's account and date, are inserted
    /// visible and non-duplicate, and record the ultimate ancestor of the
    /// split chain. Child amounts need not sum to the parent amount.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionError::NotFound`] when the parent is missing,
    /// or a [`LedgerError::EmptySplit`] wrapped error for an empty child
    /// list.
    pub async fn split_transaction(
        &self,
        id: Uuid,
        children: Vec<SplitChildInput>,
    ) -> Result<Vec<transactions::Model>, TransactionError> {
        let parent = self.find_by_id(id).await?;
        let plan_children: Vec<SplitChild> = children
            .iter()
            .map(|child| SplitChild { amount: child.amount, envelope_id: child.envelope_id })
            .collect();
        let plan = plan_split(
            &SplitParent {
                id: parent.id,
                origin_transaction_id: parent.origin_transaction_id,
                envelope_id: parent.envelope_id,
                amount: parent.amount,
                counts: counts_toward_balance(parent.is_visible, parent.is_duplicate),
            },
            &plan_children,
        )?;

        let txn = self.db.begin().await?;
        transactions::Entity::delete_by_id(parent.id).exec(&txn).await?;
        Self::apply(&txn, plan.parent_delta).await?;

        let mut inserted = Vec::with_capacity(children.len());
        for (child, delta) in children.into_iter().zip(plan.child_deltas) {
            let input = NewTransactionInput {
                user_id: parent.user_id,
                account_id: parent.account_id,
                envelope_id: child.envelope_id,
                amount: child.amount,
                posted_on: parent.posted_on,
                description: child.description,
                reference_number: None,
                is_duplicate: false,
            };
            let row =
                Self::insert_row(&txn, &input, false, true, Some(plan.origin_transaction_id))
                    .await?;
            Self::apply(&txn, delta).await?;
            inserted.push(row);
        }
        txn.commit().await?;

        info!(
            parent_id = %id,
            children = inserted.len(),
            "Split transaction"
        );
        Ok(inserted)
    }

    /// Writes the budget entry for an (envelope, date) pair.
    ///
    /// A fresh pair inserts a budget row and adds the full amount; an
    /// existing row is updated in place and the balance moves by the
    /// difference. Budget rows share the envelope accumulator with actual
    /// spend: budgeted amounts pre-allocate against the same ledger.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub async fn upsert_budget_entry(
        &self,
        user_id: Uuid,
        envelope_id: Uuid,
        entry_date: NaiveDate,
        amount: Decimal,
    ) -> Result<transactions::Model, TransactionError> {
        let existing = transactions::Entity::find()
            .filter(transactions::Column::EnvelopeId.eq(envelope_id))
            .filter(transactions::Column::PostedOn.eq(entry_date))
            .filter(transactions::Column::IsBudgetEntry.eq(true))
            .one(&self.db)
            .await?;

        let delta = budget_upsert_delta(existing.as_ref().map(|row| row.amount), amount);

        let txn = self.db.begin().await?;
        let row = if let Some(row) = existing {
            let mut active: transactions::ActiveModel = row.into();
            active.amount = Set(amount);
            active.update(&txn).await?
        } else {
            let input = NewTransactionInput {
                user_id,
                account_id: None,
                envelope_id: Some(envelope_id),
                amount,
                posted_on: entry_date,
                description: "Budget".to_string(),
                reference_number: None,
                is_duplicate: false,
            };
            Self::insert_row(&txn, &input, true, false, None).await?
        };
        if !delta.is_zero() {
            Self::apply(&txn, Some(BalanceDelta { envelope_id, amount: delta })).await?;
        }
        txn.commit().await?;
        Ok(row)
    }

    /// Runs the duplicate predicate against the account's rows for a date.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub async fn find_duplicate(
        &self,
        account_id: Uuid,
        posted_on: NaiveDate,
        reference_number: Option<&str>,
        amount: Decimal,
        description: &str,
    ) -> Result<bool, TransactionError> {
        let candidates = transactions::Entity::find()
            .filter(transactions::Column::AccountId.eq(account_id))
            .filter(transactions::Column::PostedOn.eq(posted_on))
            .all(&self.db)
            .await?;

        let probe = DuplicateProbe { reference_number, amount, description };
        Ok(is_duplicate(
            probe,
            candidates.iter().map(|row| ExistingRow {
                reference_number: row.reference_number.as_deref(),
                amount: row.amount,
                description: &row.description,
            }),
        ))
    }

    /// Fetches a transaction by id.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionError::NotFound`] when no such row exists.
    pub async fn find_by_id(&self, id: Uuid) -> Result<transactions::Model, TransactionError> {
        transactions::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(TransactionError::NotFound(id))
    }

    /// Looks up a row by account and reference number.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub async fn find_by_reference(
        &self,
        account_id: Uuid,
        reference_number: &str,
    ) -> Result<Option<transactions::Model>, TransactionError> {
        Ok(transactions::Entity::find()
            .filter(transactions::Column::AccountId.eq(account_id))
            .filter(transactions::Column::ReferenceNumber.eq(reference_number))
            .one(&self.db)
            .await?)
    }

    /// Lists an account's transactions, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub async fn list_for_account(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<transactions::Model>, TransactionError> {
        Ok(transactions::Entity::find()
            .filter(transactions::Column::AccountId.eq(account_id))
            .order_by_desc(transactions::Column::PostedOn)
            .order_by_desc(transactions::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }

    /// Lists the rows currently counted toward an envelope's balance.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub async fn list_counted_for_envelope(
        &self,
        envelope_id: Uuid,
    ) -> Result<Vec<transactions::Model>, TransactionError> {
        Ok(transactions::Entity::find()
            .filter(transactions::Column::EnvelopeId.eq(envelope_id))
            .filter(transactions::Column::IsVisible.eq(true))
            .filter(transactions::Column::IsDuplicate.eq(false))
            .order_by_desc(transactions::Column::PostedOn)
            .all(&self.db)
            .await?)
    }

    /// Recomputes an envelope's balance from its counted rows.
    ///
    /// Audit helper: at any quiescent point this must equal the stored
    /// balance.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub async fn recalculated_balance(&self, envelope_id: Uuid) -> Result<Decimal, TransactionError> {
        let rows = self.list_counted_for_envelope(envelope_id).await?;
        Ok(rows.iter().map(|row| row.amount).sum())
    }

    async fn insert_row<C: ConnectionTrait>(
        conn: &C,
        input: &NewTransactionInput,
        is_budget_entry: bool,
        is_split: bool,
        origin_transaction_id: Option<Uuid>,
    ) -> Result<transactions::Model, TransactionError> {
        let now = Utc::now();
        let row = transactions::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(input.user_id),
            account_id: Set(input.account_id),
            envelope_id: Set(input.envelope_id),
            amount: Set(input.amount),
            posted_on: Set(input.posted_on),
            description: Set(input.description.clone()),
            reference_number: Set(input.reference_number.clone()),
            is_budget_entry: Set(is_budget_entry),
            is_duplicate: Set(input.is_duplicate),
            is_visible: Set(true),
            is_split: Set(is_split),
            origin_transaction_id: Set(origin_transaction_id),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(conn)
        .await?;
        Ok(row)
    }

    async fn apply(
        txn: &DatabaseTransaction,
        delta: Option<BalanceDelta>,
    ) -> Result<(), TransactionError> {
        if let Some(delta) = delta {
            EnvelopeRepository::apply_delta(txn, delta.envelope_id, delta.amount).await?;
        }
        Ok(())
    }
}
