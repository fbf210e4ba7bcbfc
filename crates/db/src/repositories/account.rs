//! Account repository.
//!
//! Accounts are local rows; `provider_account_id` links one to the
//! external provider and is null for manual/unlinked accounts. The sync
//! cursor lives here: it is only persisted after a fully successful run,
//! so a failed run retries from the last committed position.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::entities::accounts;

/// Error types for account operations.
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    /// Account not found.
    #[error("Account not found: {0}")]
    NotFound(Uuid),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// Input for creating an account.
#[derive(Debug, Clone)]
pub struct CreateAccountInput {
    /// Owning user.
    pub user_id: Uuid,
    /// Human-readable name, also the target of keyword rule scopes.
    pub common_name: String,
    /// Provider-side identifier; `None` for manual accounts.
    pub provider_account_id: Option<String>,
}

/// Account repository for CRUD and cursor bookkeeping.
#[derive(Debug, Clone)]
pub struct AccountRepository {
    db: DatabaseConnection,
}

impl AccountRepository {
    /// Creates a new account repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates an account.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub async fn create(&self, input: CreateAccountInput) -> Result<accounts::Model, AccountError> {
        let now = Utc::now();
        let account = accounts::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(input.user_id),
            provider_account_id: Set(input.provider_account_id),
            common_name: Set(input.common_name),
            sync_cursor: Set(None),
            is_active: Set(true),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(&self.db)
        .await?;
        info!(account_id = %account.id, name = %account.common_name, "Created account");
        Ok(account)
    }

    /// Fetches an account by id.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::NotFound`] when no such account exists.
    pub async fn find_by_id(&self, id: Uuid) -> Result<accounts::Model, AccountError> {
        accounts::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AccountError::NotFound(id))
    }

    /// Looks up a user's account by its provider-side identifier.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub async fn find_by_provider(
        &self,
        user_id: Uuid,
        provider_account_id: &str,
    ) -> Result<Option<accounts::Model>, AccountError> {
        Ok(accounts::Entity::find()
            .filter(accounts::Column::UserId.eq(user_id))
            .filter(accounts::Column::ProviderAccountId.eq(provider_account_id))
            .one(&self.db)
            .await?)
    }

    /// Looks up a user's account by its common name.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub async fn find_by_common_name(
        &self,
        user_id: Uuid,
        common_name: &str,
    ) -> Result<Option<accounts::Model>, AccountError> {
        Ok(accounts::Entity::find()
            .filter(accounts::Column::UserId.eq(user_id))
            .filter(accounts::Column::CommonName.eq(common_name))
            .one(&self.db)
            .await?)
    }

    /// Lists a user's active accounts by name.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<accounts::Model>, AccountError> {
        Ok(accounts::Entity::find()
            .filter(accounts::Column::UserId.eq(user_id))
            .filter(accounts::Column::IsActive.eq(true))
            .order_by_asc(accounts::Column::CommonName)
            .all(&self.db)
            .await?)
    }

    /// Lists every active provider-linked account across all users; the
    /// daemon's work list.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub async fn list_linked(&self) -> Result<Vec<accounts::Model>, AccountError> {
        Ok(accounts::Entity::find()
            .filter(accounts::Column::ProviderAccountId.is_not_null())
            .filter(accounts::Column::IsActive.eq(true))
            .order_by_asc(accounts::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }

    /// Renames an account.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::NotFound`] when no such account exists.
    pub async fn rename(&self, id: Uuid, common_name: &str) -> Result<accounts::Model, AccountError> {
        let account = self.find_by_id(id).await?;
        let mut active: accounts::ActiveModel = account.into();
        active.common_name = Set(common_name.to_string());
        Ok(active.update(&self.db).await?)
    }

    /// Links an account to a provider-side identifier.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::NotFound`] when no such account exists.
    pub async fn link(
        &self,
        id: Uuid,
        provider_account_id: &str,
    ) -> Result<accounts::Model, AccountError> {
        let account = self.find_by_id(id).await?;
        let mut active: accounts::ActiveModel = account.into();
        active.provider_account_id = Set(Some(provider_account_id.to_string()));
        Ok(active.update(&self.db).await?)
    }

    /// Deactivates an account.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::NotFound`] when no such account exists.
    pub async fn deactivate(&self, id: Uuid) -> Result<accounts::Model, AccountError> {
        let account = self.find_by_id(id).await?;
        let mut active: accounts::ActiveModel = account.into();
        active.is_active = Set(false);
        Ok(active.update(&self.db).await?)
    }

    /// Reads an account's committed sync cursor.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::NotFound`] when no such account exists.
    pub async fn cursor(&self, id: Uuid) -> Result<Option<String>, AccountError> {
        Ok(self.find_by_id(id).await?.sync_cursor)
    }

    /// Commits a sync cursor after a fully successful run.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::NotFound`] when no such account exists.
    pub async fn persist_cursor(&self, id: Uuid, cursor: &str) -> Result<(), AccountError> {
        let account = self.find_by_id(id).await?;
        let mut active: accounts::ActiveModel = account.into();
        active.sync_cursor = Set(Some(cursor.to_string()));
        active.update(&self.db).await?;
        debug!(account_id = %id, "Persisted sync cursor");
        Ok(())
    }
}
