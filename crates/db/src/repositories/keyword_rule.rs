//! Keyword rule repository.
//!
//! Rules are unique per description per user by construction: saving a
//! rule first deletes any prior rule with the same description inside the
//! same database transaction, then inserts the new one. No upsert needed.

use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use tracing::debug;
use uuid::Uuid;

use crate::entities::keyword_rules;

/// Error types for keyword rule operations.
#[derive(Debug, thiserror::Error)]
pub enum KeywordRuleError {
    /// Rule not found.
    #[error("Keyword rule not found: {0}")]
    NotFound(Uuid),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// Input for saving a keyword rule.
#[derive(Debug, Clone)]
pub struct SaveRuleInput {
    /// Owning user.
    pub user_id: Uuid,
    /// Description pattern the rule matches.
    pub description: String,
    /// An account common name, or the wildcard "All".
    pub account_scope: String,
    /// Envelope the rule assigns.
    pub envelope_id: Uuid,
}

/// Keyword rule repository.
#[derive(Debug, Clone)]
pub struct KeywordRuleRepository {
    db: DatabaseConnection,
}

impl KeywordRuleRepository {
    /// Creates a new keyword rule repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Saves a rule, replacing any prior rule with the same description.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure; delete and insert roll back
    /// together.
    pub async fn save_rule(&self, input: SaveRuleInput) -> Result<keyword_rules::Model, KeywordRuleError> {
        let now = Utc::now();
        let txn = self.db.begin().await?;

        let replaced = keyword_rules::Entity::delete_many()
            .filter(keyword_rules::Column::UserId.eq(input.user_id))
            .filter(keyword_rules::Column::Description.eq(&input.description))
            .exec(&txn)
            .await?;

        let rule = keyword_rules::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(input.user_id),
            description: Set(input.description),
            account_scope: Set(input.account_scope),
            envelope_id: Set(input.envelope_id),
            last_used: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        debug!(
            rule_id = %rule.id,
            replaced = replaced.rows_affected,
            "Saved keyword rule"
        );
        Ok(rule)
    }

    /// Lists a user's rules in creation order, the order matching runs in.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<keyword_rules::Model>, KeywordRuleError> {
        Ok(keyword_rules::Entity::find()
            .filter(keyword_rules::Column::UserId.eq(user_id))
            .order_by_asc(keyword_rules::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }

    /// Deletes a rule.
    ///
    /// # Errors
    ///
    /// Returns [`KeywordRuleError::NotFound`] when no such rule exists.
    pub async fn delete_rule(&self, id: Uuid) -> Result<(), KeywordRuleError> {
        let result = keyword_rules::Entity::delete_by_id(id).exec(&self.db).await?;
        if result.rows_affected == 0 {
            return Err(KeywordRuleError::NotFound(id));
        }
        Ok(())
    }

    /// Records when a rule last matched. Bookkeeping only, never affects
    /// matching.
    ///
    /// # Errors
    ///
    /// Returns [`KeywordRuleError::NotFound`] when no such rule exists.
    pub async fn touch_last_used(&self, id: Uuid, date: NaiveDate) -> Result<(), KeywordRuleError> {
        let rule = keyword_rules::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(KeywordRuleError::NotFound(id))?;
        let mut active: keyword_rules::ActiveModel = rule.into();
        active.last_used = Set(Some(date));
        active.update(&self.db).await?;
        Ok(())
    }
}
