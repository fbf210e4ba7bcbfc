//! The sync engine: cursor loop, backfill, import, detached workers.
//!
//! Callers get a session token back synchronously; the run continues as a
//! detached task and reports through the progress tracker. A failed page
//! fetch aborts the whole run, leaves the last committed cursor in place
//! (the next run replays from it; dedup absorbs the replays), and sets the
//! progress sentinel to complete. The cursor is persisted only after every
//! change-set record has been applied.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{error, info};
use uuid::Uuid;

use sea_orm::DatabaseConnection;

use tally_core::progress::ProgressTracker;
use tally_core::reconcile::{ChangeSet, ImportRecord};
use tally_db::repositories::{AccountRepository, KeywordRuleRepository, TransactionRepository};
use tally_shared::SessionToken;

use crate::error::SyncError;
use crate::pipeline::SyncPipeline;
use crate::provider::{ProviderError, SyncProvider};
use crate::resolver::AccountResolver;

/// Orchestrates sync, backfill, and import runs.
#[derive(Clone)]
pub struct SyncEngine {
    accounts: AccountRepository,
    pipeline: SyncPipeline,
    provider: Arc<dyn SyncProvider>,
    progress: ProgressTracker,
}

impl SyncEngine {
    /// Builds an engine over a database connection and a provider.
    #[must_use]
    pub fn new(
        db: DatabaseConnection,
        provider: Arc<dyn SyncProvider>,
        progress: ProgressTracker,
    ) -> Self {
        let pipeline = SyncPipeline::new(
            TransactionRepository::new(db.clone()),
            KeywordRuleRepository::new(db.clone()),
            progress.clone(),
        );
        Self {
            accounts: AccountRepository::new(db),
            pipeline,
            provider,
            progress,
        }
    }

    /// The progress tracker runs report through.
    #[must_use]
    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    /// Starts an incremental sync for one account as a detached worker.
    ///
    /// Returns immediately with the session token to observe it by.
    pub fn start_sync(&self, user_id: Uuid, account_id: Uuid, access_token: String) -> SessionToken {
        let token = SessionToken::new();
        self.progress.start(token);
        let engine = self.clone();

        tokio::spawn(async move {
            if let Err(run_error) = engine
                .run_sync_once(user_id, account_id, &access_token, token)
                .await
            {
                error!(%token, account_id = %account_id, %run_error, "Sync run aborted");
                engine.progress.complete(token);
            }
        });
        token
    }

    /// Starts a date-range backfill as a detached worker.
    ///
    /// Every returned record is treated as added; the account cursor is
    /// never touched.
    pub fn start_backfill(
        &self,
        user_id: Uuid,
        access_token: String,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> SessionToken {
        let token = SessionToken::new();
        self.progress.start(token);
        let engine = self.clone();

        tokio::spawn(async move {
            if let Err(run_error) = engine
                .run_backfill_once(user_id, &access_token, start_date, end_date, token)
                .await
            {
                error!(%token, %run_error, "Backfill run aborted");
                engine.progress.complete(token);
            }
        });
        token
    }

    /// Starts a flat-file import as a detached worker.
    pub fn start_import(&self, user_id: Uuid, records: Vec<ImportRecord>) -> SessionToken {
        let token = SessionToken::new();
        self.progress.start(token);
        let engine = self.clone();

        tokio::spawn(async move {
            if let Err(run_error) = engine.run_import_once(user_id, &records, token).await {
                error!(%token, %run_error, "Import run aborted");
                engine.progress.complete(token);
            }
        });
        token
    }

    /// Runs one incremental sync to completion. The daemon calls this
    /// directly; interactive callers go through [`Self::start_sync`].
    ///
    /// # Errors
    ///
    /// Returns the first provider or repository error; the cursor is not
    /// persisted in that case.
    pub async fn run_sync_once(
        &self,
        user_id: Uuid,
        account_id: Uuid,
        access_token: &str,
        token: SessionToken,
    ) -> Result<(), SyncError> {
        let cursor = self.accounts.cursor(account_id).await?;
        let (set, next_cursor) =
            collect_pages(self.provider.as_ref(), access_token, cursor).await?;
        info!(
            account_id = %account_id,
            added = set.added.len(),
            removed = set.removed.len(),
            modified = set.modified.len(),
            "Collected sync change-sets"
        );

        let mut resolver = AccountResolver::new(self.accounts.clone(), user_id);
        self.pipeline
            .apply_change_set(user_id, &mut resolver, &set, token)
            .await?;

        self.accounts.persist_cursor(account_id, &next_cursor).await?;
        self.progress.complete(token);
        Ok(())
    }

    async fn run_backfill_once(
        &self,
        user_id: Uuid,
        access_token: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        token: SessionToken,
    ) -> Result<(), SyncError> {
        let added = collect_range(
            self.provider.as_ref(),
            access_token,
            start_date,
            end_date,
        )
        .await?;
        info!(records = added.len(), %start_date, %end_date, "Collected backfill records");

        let set = ChangeSet { added, ..ChangeSet::default() };
        let mut resolver = AccountResolver::new(self.accounts.clone(), user_id);
        self.pipeline
            .apply_change_set(user_id, &mut resolver, &set, token)
            .await?;
        self.progress.complete(token);
        Ok(())
    }

    async fn run_import_once(
        &self,
        user_id: Uuid,
        records: &[ImportRecord],
        token: SessionToken,
    ) -> Result<(), SyncError> {
        let mut resolver = AccountResolver::new(self.accounts.clone(), user_id);
        self.pipeline
            .apply_import(user_id, &mut resolver, records, token)
            .await?;
        self.progress.complete(token);
        Ok(())
    }
}

/// Drives the incremental-sync loop until the provider reports no more
/// pages, accumulating change-sets in arrival order.
///
/// # Errors
///
/// Returns the first page-fetch error; nothing collected so far is
/// applied.
pub async fn collect_pages(
    provider: &dyn SyncProvider,
    access_token: &str,
    mut cursor: Option<String>,
) -> Result<(ChangeSet, String), ProviderError> {
    let mut set = ChangeSet::new();
    loop {
        let page = provider.sync_page(access_token, cursor.as_deref()).await?;
        set.extend(
            page.added.into_iter().map(Into::into).collect(),
            page.modified.into_iter().map(Into::into).collect(),
            page.removed.into_iter().map(Into::into).collect(),
        );
        let has_more = page.has_more;
        cursor = Some(page.next_cursor);
        if !has_more {
            break;
        }
    }
    // The loop body always runs at least once.
    Ok((set, cursor.unwrap_or_default()))
}

/// Drives the date-range loop with page-based pagination
/// (`offset += page len`) until the reported total is reached.
///
/// # Errors
///
/// Returns the first range-fetch error.
pub async fn collect_range(
    provider: &dyn SyncProvider,
    access_token: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<Vec<tally_core::reconcile::IncomingRecord>, ProviderError> {
    let mut records = Vec::new();
    let mut offset = 0u64;
    loop {
        let page = provider
            .range_fetch(access_token, start_date, end_date, offset)
            .await?;
        let fetched = page.records.len() as u64;
        records.extend(page.records.into_iter().map(Into::into));
        offset += fetched;
        if fetched == 0 || offset >= page.total_count {
            break;
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::Sequence;
    use rust_decimal_macros::dec;

    use crate::provider::{
        MockSyncProvider, ProviderTransaction, RangePage, RemovedTransaction, SyncPage,
    };

    fn wire(id: &str) -> ProviderTransaction {
        ProviderTransaction {
            transaction_id: id.to_string(),
            account_id: "acct-9".to_string(),
            pending_transaction_id: None,
            amount: dec!(-5.00),
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            description: "FEE".to_string(),
            reference_number: None,
        }
    }

    #[tokio::test]
    async fn cursor_loop_accumulates_all_pages() {
        let mut provider = MockSyncProvider::new();
        let mut sequence = Sequence::new();

        provider
            .expect_sync_page()
            .withf(|token, cursor| token == "tok" && cursor.is_none())
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _| {
                Ok(SyncPage {
                    added: vec![wire("a1")],
                    modified: vec![],
                    removed: vec![RemovedTransaction { transaction_id: "r1".to_string() }],
                    has_more: true,
                    next_cursor: "c1".to_string(),
                })
            });
        provider
            .expect_sync_page()
            .withf(|token, cursor| token == "tok" && *cursor == Some("c1"))
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _| {
                Ok(SyncPage {
                    added: vec![wire("a2")],
                    modified: vec![wire("m1")],
                    removed: vec![],
                    has_more: false,
                    next_cursor: "c2".to_string(),
                })
            });

        let (set, cursor) = collect_pages(&provider, "tok", None).await.unwrap();
        assert_eq!(cursor, "c2");
        assert_eq!(set.added.len(), 2);
        assert_eq!(set.added[0].provider_id, "a1");
        assert_eq!(set.added[1].provider_id, "a2");
        assert_eq!(set.modified[0].provider_id, "m1");
        assert_eq!(set.removed[0].provider_id, "r1");
    }

    #[tokio::test]
    async fn page_failure_aborts_the_whole_collection() {
        let mut provider = MockSyncProvider::new();
        let mut sequence = Sequence::new();

        provider
            .expect_sync_page()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _| {
                Ok(SyncPage {
                    added: vec![wire("a1")],
                    modified: vec![],
                    removed: vec![],
                    has_more: true,
                    next_cursor: "c1".to_string(),
                })
            });
        provider
            .expect_sync_page()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _| Err(ProviderError::Contract("boom".to_string())));

        let result = collect_pages(&provider, "tok", None).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn range_loop_advances_offset_until_total() {
        let mut provider = MockSyncProvider::new();
        let mut sequence = Sequence::new();
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();

        provider
            .expect_range_fetch()
            .withf(|_, _, _, offset| *offset == 0)
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _, _, _| {
                Ok(RangePage { records: vec![wire("b1"), wire("b2")], total_count: 3 })
            });
        provider
            .expect_range_fetch()
            .withf(|_, _, _, offset| *offset == 2)
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _, _, _| Ok(RangePage { records: vec![wire("b3")], total_count: 3 }));

        let records = collect_range(&provider, "tok", start, end).await.unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].provider_id, "b3");
    }

    #[tokio::test]
    async fn empty_range_page_stops_the_loop() {
        let mut provider = MockSyncProvider::new();
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();

        provider
            .expect_range_fetch()
            .times(1)
            .returning(|_, _, _, _| Ok(RangePage { records: vec![], total_count: 10 }));

        let records = collect_range(&provider, "tok", start, end).await.unwrap();
        assert!(records.is_empty());
    }
}
