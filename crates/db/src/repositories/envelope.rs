//! Envelope repository.
//!
//! Home of the one balance primitive, [`EnvelopeRepository::apply_delta`]:
//! an atomic `balance = balance + delta` arithmetic update. Transaction
//! mutations call it inside their own database transaction; the bulk
//! utilities (transfer, overwrite) are the only callers that write a
//! balance any other way.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::debug;
use uuid::Uuid;

use crate::entities::envelopes;

/// Error types for envelope operations.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    /// Envelope not found.
    #[error("Envelope not found: {0}")]
    NotFound(Uuid),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// Envelope repository for CRUD and balance maintenance.
#[derive(Debug, Clone)]
pub struct EnvelopeRepository {
    db: DatabaseConnection,
}

impl EnvelopeRepository {
    /// Creates a new envelope repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Adds `delta` to an envelope's balance as one atomic read-modify-write.
    ///
    /// Takes any connection so callers can run it inside the same database
    /// transaction as the row mutation it pairs with.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::NotFound`] when the envelope does not exist.
    pub async fn apply_delta<C: ConnectionTrait>(
        conn: &C,
        envelope_id: Uuid,
        delta: Decimal,
    ) -> Result<(), EnvelopeError> {
        let result = envelopes::Entity::update_many()
            .col_expr(
                envelopes::Column::Balance,
                Expr::col(envelopes::Column::Balance).add(delta),
            )
            .filter(envelopes::Column::Id.eq(envelope_id))
            .exec(conn)
            .await?;
        if result.rows_affected == 0 {
            return Err(EnvelopeError::NotFound(envelope_id));
        }
        debug!(envelope_id = %envelope_id, delta = %delta, "Applied balance delta");
        Ok(())
    }

    /// Creates an envelope with a zero balance.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub async fn create(
        &self,
        user_id: Uuid,
        category_id: Uuid,
        name: &str,
    ) -> Result<envelopes::Model, EnvelopeError> {
        let now = Utc::now();
        let envelope = envelopes::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            category_id: Set(category_id),
            name: Set(name.to_string()),
            balance: Set(Decimal::ZERO),
            is_active: Set(true),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(&self.db)
        .await?;
        Ok(envelope)
    }

    /// Fetches an envelope by id.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::NotFound`] when no such envelope exists.
    pub async fn find_by_id(&self, id: Uuid) -> Result<envelopes::Model, EnvelopeError> {
        envelopes::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(EnvelopeError::NotFound(id))
    }

    /// Lists a user's active envelopes with their balances, by name.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<envelopes::Model>, EnvelopeError> {
        Ok(envelopes::Entity::find()
            .filter(envelopes::Column::UserId.eq(user_id))
            .filter(envelopes::Column::IsActive.eq(true))
            .order_by_asc(envelopes::Column::Name)
            .all(&self.db)
            .await?)
    }

    /// Renames an envelope.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::NotFound`] when no such envelope exists.
    pub async fn rename(&self, id: Uuid, name: &str) -> Result<envelopes::Model, EnvelopeError> {
        let envelope = self.find_by_id(id).await?;
        let mut active: envelopes::ActiveModel = envelope.into();
        active.name = Set(name.to_string());
        Ok(active.update(&self.db).await?)
    }

    /// Moves an envelope to another category.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::NotFound`] when no such envelope exists.
    pub async fn move_to_category(
        &self,
        id: Uuid,
        category_id: Uuid,
    ) -> Result<envelopes::Model, EnvelopeError> {
        let envelope = self.find_by_id(id).await?;
        let mut active: envelopes::ActiveModel = envelope.into();
        active.category_id = Set(category_id);
        Ok(active.update(&self.db).await?)
    }

    /// Deactivates an envelope; its rows and balance stay for audit.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::NotFound`] when no such envelope exists.
    pub async fn deactivate(&self, id: Uuid) -> Result<envelopes::Model, EnvelopeError> {
        let envelope = self.find_by_id(id).await?;
        let mut active: envelopes::ActiveModel = envelope.into();
        active.is_active = Set(false);
        Ok(active.update(&self.db).await?)
    }

    /// Moves `amount` from one envelope's balance to another's.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::NotFound`] when either envelope is missing;
    /// the whole transfer rolls back.
    pub async fn transfer_balance(
        &self,
        from: Uuid,
        to: Uuid,
        amount: Decimal,
    ) -> Result<(), EnvelopeError> {
        let txn = self.db.begin().await?;
        Self::apply_delta(&txn, from, -amount).await?;
        Self::apply_delta(&txn, to, amount).await?;
        txn.commit().await?;
        Ok(())
    }

    /// Overwrites an envelope's balance outright. Bulk utility; every
    /// transaction-driven mutation goes through [`Self::apply_delta`].
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::NotFound`] when no such envelope exists.
    pub async fn overwrite_balance(&self, id: Uuid, balance: Decimal) -> Result<(), EnvelopeError> {
        let result = envelopes::Entity::update_many()
            .col_expr(envelopes::Column::Balance, Expr::value(balance))
            .filter(envelopes::Column::Id.eq(id))
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(EnvelopeError::NotFound(id));
        }
        Ok(())
    }
}
