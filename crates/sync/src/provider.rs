//! External sync provider: trait, wire types, HTTP client.
//!
//! The engine only ever talks to [`SyncProvider`]; production wires in
//! [`HttpSyncProvider`] built from [`tally_shared::config::ProviderConfig`],
//! tests inject a mock. Wire shapes are explicit structs so the pipeline
//! is exhaustively checked at compile time.

use async_trait::async_trait;
use chrono::NaiveDate;
#[cfg(test)]
use mockall::automock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tally_core::reconcile::{IncomingRecord, RemovedRecord};
use tally_shared::config::ProviderConfig;

/// Errors from the external provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The request failed, returned a non-success status, or the body
    /// could not be decoded.
    #[error("Provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The response violated the provider contract.
    #[error("Provider response invalid: {0}")]
    Contract(String),
}

/// One transaction record on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderTransaction {
    /// Provider-assigned id for this record.
    pub transaction_id: String,
    /// Provider-side account the record belongs to.
    pub account_id: String,
    /// Provider id of the pending record this one supersedes.
    #[serde(default)]
    pub pending_transaction_id: Option<String>,
    /// Signed amount, debit negative.
    pub amount: Decimal,
    /// Posting date.
    pub date: NaiveDate,
    /// Free-text description.
    pub description: String,
    /// Reference number, when the institution supplies one.
    #[serde(default)]
    pub reference_number: Option<String>,
}

impl From<ProviderTransaction> for IncomingRecord {
    fn from(wire: ProviderTransaction) -> Self {
        Self {
            provider_id: wire.transaction_id,
            provider_account_id: wire.account_id,
            pending_predecessor_id: wire.pending_transaction_id,
            amount: wire.amount,
            posted_on: wire.date,
            description: wire.description,
            reference_number: wire.reference_number,
        }
    }
}

/// One withdrawn record on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovedTransaction {
    /// Provider-assigned id of the withdrawn record.
    pub transaction_id: String,
}

impl From<RemovedTransaction> for RemovedRecord {
    fn from(wire: RemovedTransaction) -> Self {
        Self { provider_id: wire.transaction_id }
    }
}

/// One page of the incremental sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPage {
    /// Newly added records.
    pub added: Vec<ProviderTransaction>,
    /// Changed records.
    pub modified: Vec<ProviderTransaction>,
    /// Withdrawn records.
    pub removed: Vec<RemovedTransaction>,
    /// Whether another page follows.
    pub has_more: bool,
    /// Cursor to pass on the next call; committed only after the whole
    /// run succeeds.
    pub next_cursor: String,
}

/// One page of a date-range backfill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangePage {
    /// Records in the requested window, from `offset`.
    pub records: Vec<ProviderTransaction>,
    /// Total records in the window.
    pub total_count: u64,
}

/// The external financial-data provider.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SyncProvider: Send + Sync {
    /// Fetches one incremental-sync page.
    async fn sync_page<'a>(
        &self,
        access_token: &str,
        cursor: Option<&'a str>,
    ) -> Result<SyncPage, ProviderError>;

    /// Fetches one page of a date-range backfill.
    async fn range_fetch(
        &self,
        access_token: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        offset: u64,
    ) -> Result<RangePage, ProviderError>;
}

#[derive(Serialize)]
struct SyncRequest<'a> {
    access_token: &'a str,
    cursor: Option<&'a str>,
}

#[derive(Serialize)]
struct RangeRequest<'a> {
    access_token: &'a str,
    start_date: NaiveDate,
    end_date: NaiveDate,
    offset: u64,
}

/// HTTP implementation of [`SyncProvider`].
#[derive(Debug, Clone)]
pub struct HttpSyncProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSyncProvider {
    /// Builds a client from provider configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl SyncProvider for HttpSyncProvider {
    async fn sync_page<'a>(
        &self,
        access_token: &str,
        cursor: Option<&'a str>,
    ) -> Result<SyncPage, ProviderError> {
        let page = self
            .client
            .post(format!("{}/transactions/sync", self.base_url))
            .json(&SyncRequest { access_token, cursor })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(page)
    }

    async fn range_fetch(
        &self,
        access_token: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        offset: u64,
    ) -> Result<RangePage, ProviderError> {
        let page = self
            .client
            .post(format!("{}/transactions/range", self.base_url))
            .json(&RangeRequest { access_token, start_date, end_date, offset })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn sync_page_decodes_from_provider_json() {
        let json = r#"{
            "added": [{
                "transactionId": "txn-1",
                "accountId": "acct-9",
                "pendingTransactionId": "p1",
                "amount": "-42.50",
                "date": "2024-03-01",
                "description": "CITY COFFEE",
                "referenceNumber": "chk-105"
            }],
            "modified": [],
            "removed": [{"transactionId": "p1"}],
            "hasMore": true,
            "nextCursor": "cursor-2"
        }"#;

        let page: SyncPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.added.len(), 1);
        assert_eq!(page.added[0].amount, dec!(-42.50));
        assert_eq!(page.added[0].pending_transaction_id.as_deref(), Some("p1"));
        assert_eq!(page.removed[0].transaction_id, "p1");
        assert!(page.has_more);
        assert_eq!(page.next_cursor, "cursor-2");
    }

    #[test]
    fn optional_wire_fields_default_to_none() {
        let json = r#"{
            "transactionId": "txn-1",
            "accountId": "acct-9",
            "amount": "-1.00",
            "date": "2024-03-01",
            "description": "FEE"
        }"#;

        let wire: ProviderTransaction = serde_json::from_str(json).unwrap();
        assert_eq!(wire.pending_transaction_id, None);
        assert_eq!(wire.reference_number, None);
    }

    #[test]
    fn wire_record_converts_to_incoming_record() {
        let wire = ProviderTransaction {
            transaction_id: "txn-1".to_string(),
            account_id: "acct-9".to_string(),
            pending_transaction_id: Some("p1".to_string()),
            amount: dec!(-42.50),
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            description: "CITY COFFEE".to_string(),
            reference_number: Some("chk-105".to_string()),
        };

        let record = IncomingRecord::from(wire);
        assert_eq!(record.provider_id, "txn-1");
        assert_eq!(record.pending_predecessor_id.as_deref(), Some("p1"));
        assert_eq!(record.reference_number.as_deref(), Some("chk-105"));
        assert_eq!(record.stored_reference(), "txn-1");
    }
}
