//! Category repository.
//!
//! Categories group envelopes. Deleting a category moves its envelopes to
//! the user's Uncategorized category, which itself can never be deleted.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use tracing::info;
use uuid::Uuid;

use crate::entities::{categories, envelopes};

/// Name of the fallback category every user owns.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Error types for category operations.
#[derive(Debug, thiserror::Error)]
pub enum CategoryError {
    /// Category not found.
    #[error("Category not found: {0}")]
    NotFound(Uuid),

    /// The Uncategorized category cannot be deleted.
    #[error("The Uncategorized category cannot be deleted")]
    CannotDeleteUncategorized,

    /// User has no Uncategorized category; provisioning was incomplete.
    #[error("No Uncategorized category for user {0}")]
    UncategorizedMissing(Uuid),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// Category repository for CRUD and envelope re-parenting.
#[derive(Debug, Clone)]
pub struct CategoryRepository {
    db: DatabaseConnection,
}

impl CategoryRepository {
    /// Creates a new category repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates a category for a user.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub async fn create(&self, user_id: Uuid, name: &str) -> Result<categories::Model, CategoryError> {
        let now = Utc::now();
        let category = categories::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            name: Set(name.to_string()),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(&self.db)
        .await?;
        Ok(category)
    }

    /// Renames a category.
    ///
    /// # Errors
    ///
    /// Returns [`CategoryError::NotFound`] when no such category exists.
    pub async fn rename(&self, id: Uuid, name: &str) -> Result<categories::Model, CategoryError> {
        let category = self.find_by_id(id).await?;
        let mut active: categories::ActiveModel = category.into();
        active.name = Set(name.to_string());
        Ok(active.update(&self.db).await?)
    }

    /// Fetches a category by id.
    ///
    /// # Errors
    ///
    /// Returns [`CategoryError::NotFound`] when no such category exists.
    pub async fn find_by_id(&self, id: Uuid) -> Result<categories::Model, CategoryError> {
        categories::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(CategoryError::NotFound(id))
    }

    /// Lists a user's categories by name.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<categories::Model>, CategoryError> {
        Ok(categories::Entity::find()
            .filter(categories::Column::UserId.eq(user_id))
            .order_by_asc(categories::Column::Name)
            .all(&self.db)
            .await?)
    }

    /// Fetches the user's Uncategorized category.
    ///
    /// # Errors
    ///
    /// Returns [`CategoryError::UncategorizedMissing`] when the user was
    /// provisioned without one.
    pub async fn uncategorized_for(&self, user_id: Uuid) -> Result<categories::Model, CategoryError> {
        categories::Entity::find()
            .filter(categories::Column::UserId.eq(user_id))
            .filter(categories::Column::Name.eq(UNCATEGORIZED))
            .one(&self.db)
            .await?
            .ok_or(CategoryError::UncategorizedMissing(user_id))
    }

    /// Deletes a category, moving its envelopes to Uncategorized.
    ///
    /// # Errors
    ///
    /// Returns [`CategoryError::CannotDeleteUncategorized`] for the
    /// fallback category itself.
    pub async fn delete(&self, id: Uuid) -> Result<(), CategoryError> {
        let category = self.find_by_id(id).await?;
        if category.name == UNCATEGORIZED {
            return Err(CategoryError::CannotDeleteUncategorized);
        }
        let fallback = self.uncategorized_for(category.user_id).await?;

        let txn = self.db.begin().await?;
        let moved = envelopes::Entity::update_many()
            .col_expr(
                envelopes::Column::CategoryId,
                sea_orm::sea_query::Expr::value(fallback.id),
            )
            .filter(envelopes::Column::CategoryId.eq(id))
            .exec(&txn)
            .await?;
        categories::Entity::delete_by_id(id).exec(&txn).await?;
        txn.commit().await?;

        info!(
            category_id = %id,
            envelopes_moved = moved.rows_affected,
            "Deleted category"
        );
        Ok(())
    }
}
