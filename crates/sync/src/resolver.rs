//! Per-run account resolution cache.
//!
//! Maps provider-side account ids (sync) or imported account labels
//! (flat-file import) to local accounts, memoized for the lifetime of one
//! run. Never shared across runs. A miss looks up the store; an unknown
//! identifier provisions a new account row — linked for provider ids,
//! unlinked for labels.

use std::collections::HashMap;

use tracing::info;
use uuid::Uuid;

use tally_db::repositories::{AccountError, AccountRepository, CreateAccountInput};

/// The cached outcome of one resolution.
#[derive(Debug, Clone)]
pub struct ResolvedAccount {
    /// Local account id.
    pub id: Uuid,
    /// Common name, as keyword rule scopes refer to it.
    pub common_name: String,
}

/// One run's account cache.
#[derive(Debug)]
pub struct AccountResolver {
    accounts: AccountRepository,
    user_id: Uuid,
    by_provider: HashMap<String, ResolvedAccount>,
    by_label: HashMap<String, ResolvedAccount>,
}

impl AccountResolver {
    /// Creates an empty cache for one run.
    #[must_use]
    pub fn new(accounts: AccountRepository, user_id: Uuid) -> Self {
        Self {
            accounts,
            user_id,
            by_provider: HashMap::new(),
            by_label: HashMap::new(),
        }
    }

    /// Resolves a provider-side account id, provisioning a linked account
    /// on first sight.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub async fn resolve_provider(
        &mut self,
        provider_account_id: &str,
    ) -> Result<ResolvedAccount, AccountError> {
        if let Some(found) = self.by_provider.get(provider_account_id) {
            return Ok(found.clone());
        }

        let account = match self
            .accounts
            .find_by_provider(self.user_id, provider_account_id)
            .await?
        {
            Some(account) => account,
            None => {
                info!(provider_account_id, "Provisioning account for unseen provider id");
                self.accounts
                    .create(CreateAccountInput {
                        user_id: self.user_id,
                        common_name: provider_account_id.to_string(),
                        provider_account_id: Some(provider_account_id.to_string()),
                    })
                    .await?
            }
        };

        let resolved = ResolvedAccount { id: account.id, common_name: account.common_name };
        self.by_provider
            .insert(provider_account_id.to_string(), resolved.clone());
        Ok(resolved)
    }

    /// Resolves an imported account label, provisioning an unlinked
    /// account on first sight.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub async fn resolve_label(&mut self, label: &str) -> Result<ResolvedAccount, AccountError> {
        if let Some(found) = self.by_label.get(label) {
            return Ok(found.clone());
        }

        let account = match self.accounts.find_by_common_name(self.user_id, label).await? {
            Some(account) => account,
            None => {
                info!(label, "Provisioning unlinked account for unseen import label");
                self.accounts
                    .create(CreateAccountInput {
                        user_id: self.user_id,
                        common_name: label.to_string(),
                        provider_account_id: None,
                    })
                    .await?
            }
        };

        let resolved = ResolvedAccount { id: account.id, common_name: account.common_name };
        self.by_label.insert(label.to_string(), resolved.clone());
        Ok(resolved)
    }
}
