//! Change-set application in contract order.
//!
//! Applies one run's accumulated change-sets record by record: pending
//! pairing first decides which added records rewrite an existing row in
//! place, the duplicate detector flags replays, the keyword resolver
//! assigns envelopes, and every insert or delete carries its balance delta
//! inside the repository's database transaction. Progress is written after
//! every record.

use tracing::{debug, warn};
use uuid::Uuid;

use tally_core::categorize::{self, KeywordRule};
use tally_core::progress::ProgressTracker;
use tally_core::reconcile::{
    ApplyPhase, ChangeSet, ImportRecord, IncomingRecord, RemovedRecord, parse_import,
    pending_pairs,
};
use tally_db::repositories::{
    KeywordRuleRepository, NewTransactionInput, PostedUpdateInput, TransactionRepository,
};
use tally_shared::SessionToken;

use crate::error::SyncError;
use crate::resolver::{AccountResolver, ResolvedAccount};

/// Applies change-sets and import feeds for one user.
#[derive(Debug, Clone)]
pub struct SyncPipeline {
    transactions: TransactionRepository,
    rules: KeywordRuleRepository,
    progress: ProgressTracker,
}

impl SyncPipeline {
    /// Creates a pipeline over the given repositories.
    #[must_use]
    pub const fn new(
        transactions: TransactionRepository,
        rules: KeywordRuleRepository,
        progress: ProgressTracker,
    ) -> Self {
        Self { transactions, rules, progress }
    }

    /// Applies a full change-set in contract order: added, removed,
    /// modified.
    ///
    /// # Errors
    ///
    /// Returns the first repository error; the record being applied rolls
    /// back, previously applied records stay committed, and the caller
    /// must not persist the cursor.
    pub async fn apply_change_set(
        &self,
        user_id: Uuid,
        resolver: &mut AccountResolver,
        set: &ChangeSet,
        token: SessionToken,
    ) -> Result<(), SyncError> {
        let rules = self.load_rules(user_id).await?;
        let pairs = pending_pairs(&set.added, &set.removed);
        if !pairs.is_empty() {
            debug!(pairs = pairs.len(), "Pending-to-posted pairs found");
        }
        let total = set.total_records();
        let mut processed = 0usize;

        for phase in set.in_apply_order() {
            match phase {
                ApplyPhase::Added => {
                    for (index, record) in set.added.iter().enumerate() {
                        let predecessor =
                            pairs.predecessor_of(index).map(|removed| &set.removed[removed]);
                        self.apply_added(user_id, resolver, record, predecessor, &rules)
                            .await?;
                        processed += 1;
                        self.progress.record(token, processed, total);
                    }
                }
                ApplyPhase::Removed => {
                    for (index, record) in set.removed.iter().enumerate() {
                        if pairs.consumed(index) {
                            debug!(
                                provider_id = %record.provider_id,
                                "Removed record consumed by pending match"
                            );
                        } else {
                            self.apply_removed(user_id, record).await?;
                        }
                        processed += 1;
                        self.progress.record(token, processed, total);
                    }
                }
                ApplyPhase::Modified => {
                    for record in &set.modified {
                        self.apply_modified(user_id, resolver, record, &rules).await?;
                        processed += 1;
                        self.progress.record(token, processed, total);
                    }
                }
            }
        }

        Ok(())
    }

    /// Applies an import feed: every record is an added record.
    ///
    /// Rows with malformed dates or amounts are skipped with a warning
    /// but still advance progress.
    ///
    /// # Errors
    ///
    /// Returns the first repository error.
    pub async fn apply_import(
        &self,
        user_id: Uuid,
        resolver: &mut AccountResolver,
        records: &[ImportRecord],
        token: SessionToken,
    ) -> Result<(), SyncError> {
        let rules = self.load_rules(user_id).await?;
        let total = records.len();

        for (processed, record) in records.iter().enumerate() {
            match parse_import(record) {
                Ok(parsed) => {
                    let account = resolver.resolve_label(&parsed.account_label).await?;
                    self.insert_categorized(
                        user_id,
                        &account,
                        &IncomingFields {
                            amount: parsed.amount,
                            posted_on: parsed.posted_on,
                            description: &parsed.description,
                            reference_number: parsed.reference_number.as_deref(),
                            compare_reference: None,
                        },
                        &rules,
                    )
                    .await?;
                }
                Err(skip) => {
                    warn!(description = %record.description, reason = %skip, "Skipped import row");
                }
            }
            self.progress.record(token, processed + 1, total);
        }
        Ok(())
    }

    async fn apply_added(
        &self,
        user_id: Uuid,
        resolver: &mut AccountResolver,
        record: &IncomingRecord,
        predecessor: Option<&RemovedRecord>,
        rules: &[KeywordRule],
    ) -> Result<(), SyncError> {
        let account = resolver.resolve_provider(&record.provider_account_id).await?;

        if let Some(removed) = predecessor {
            let updated = self
                .transactions
                .update_posted(
                    account.id,
                    &removed.provider_id,
                    PostedUpdateInput {
                        reference_number: record.stored_reference().to_string(),
                        amount: record.amount,
                        posted_on: record.posted_on,
                        description: record.description.clone(),
                    },
                )
                .await?;
            if updated.is_some() {
                return Ok(());
            }
            // The pending row was never synced locally; degrade to a
            // fresh insert rather than dropping the record.
            warn!(
                pending_id = %removed.provider_id,
                provider_id = %record.provider_id,
                "Pending predecessor row missing, inserting as new"
            );
        }

        self.insert_categorized(
            user_id,
            &account,
            &IncomingFields {
                amount: record.amount,
                posted_on: record.posted_on,
                description: &record.description,
                reference_number: Some(record.stored_reference()),
                compare_reference: record.reference_number.as_deref(),
            },
            rules,
        )
        .await
    }

    async fn apply_removed(&self, user_id: Uuid, record: &RemovedRecord) -> Result<(), SyncError> {
        let deleted = self
            .transactions
            .delete_by_reference(user_id, &record.provider_id)
            .await?;
        if deleted.is_none() {
            warn!(provider_id = %record.provider_id, "Removed record has no local row");
        }
        Ok(())
    }

    async fn apply_modified(
        &self,
        user_id: Uuid,
        resolver: &mut AccountResolver,
        record: &IncomingRecord,
        rules: &[KeywordRule],
    ) -> Result<(), SyncError> {
        // Delete-old plus insert-new; the insert goes through fresh
        // duplicate detection and categorization.
        self.transactions
            .delete_by_reference(user_id, record.stored_reference())
            .await?;
        let account = resolver.resolve_provider(&record.provider_account_id).await?;
        self.insert_categorized(
            user_id,
            &account,
            &IncomingFields {
                amount: record.amount,
                posted_on: record.posted_on,
                description: &record.description,
                reference_number: Some(record.stored_reference()),
                compare_reference: record.reference_number.as_deref(),
            },
            rules,
        )
        .await
    }

    async fn insert_categorized(
        &self,
        user_id: Uuid,
        account: &ResolvedAccount,
        fields: &IncomingFields<'_>,
        rules: &[KeywordRule],
    ) -> Result<(), SyncError> {
        let mut is_duplicate = self
            .transactions
            .find_duplicate(
                account.id,
                fields.posted_on,
                fields.reference_number,
                fields.amount,
                fields.description,
            )
            .await?;
        // An institution reference can match a row that arrived through an
        // import feed and so was stored under that number instead.
        if !is_duplicate && fields.compare_reference != fields.reference_number {
            if let Some(reference) = fields.compare_reference {
                is_duplicate = self
                    .transactions
                    .find_duplicate(
                        account.id,
                        fields.posted_on,
                        Some(reference),
                        fields.amount,
                        fields.description,
                    )
                    .await?;
            }
        }

        let matched = categorize::resolve(rules, &account.common_name, fields.description);
        if let Some(hit) = matched {
            self.rules.touch_last_used(hit.rule_id, fields.posted_on).await?;
        }

        self.transactions
            .insert_transaction(NewTransactionInput {
                user_id,
                account_id: Some(account.id),
                envelope_id: matched.map(|hit| hit.envelope_id),
                amount: fields.amount,
                posted_on: fields.posted_on,
                description: fields.description.to_string(),
                reference_number: fields.reference_number.map(ToString::to_string),
                is_duplicate,
            })
            .await?;
        Ok(())
    }

    async fn load_rules(&self, user_id: Uuid) -> Result<Vec<KeywordRule>, SyncError> {
        let rows = self.rules.list_for_user(user_id).await?;
        Ok(rows
            .into_iter()
            .map(|row| KeywordRule {
                id: row.id,
                pattern: row.description,
                account_scope: row.account_scope,
                envelope_id: row.envelope_id,
            })
            .collect())
    }
}

/// Values shared by the sync and import insert paths. `reference_number`
/// is the key stored on the row (the provider id for synced records);
/// `compare_reference` only feeds the second duplicate probe.
struct IncomingFields<'a> {
    amount: rust_decimal::Decimal,
    posted_on: chrono::NaiveDate,
    description: &'a str,
    reference_number: Option<&'a str>,
    compare_reference: Option<&'a str>,
}
