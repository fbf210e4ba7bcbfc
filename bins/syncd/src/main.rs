//! Tally sync daemon.
//!
//! Long-running worker: connects to the database, then on a fixed
//! interval runs one incremental sync per linked account. Each pass
//! resumes from the account's last committed cursor; a failed pass leaves
//! the cursor alone and the next pass retries.

use std::sync::Arc;
use std::time::Duration;

use sea_orm::{ConnectOptions, Database};
use tokio::time::interval;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tally_core::progress::ProgressTracker;
use tally_db::repositories::AccountRepository;
use tally_shared::{AppConfig, SessionToken};
use tally_sync::{HttpSyncProvider, SyncEngine};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tally=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = AppConfig::load().expect("Failed to load configuration");

    // Connect to database
    let mut options = ConnectOptions::new(config.database.url.clone());
    options
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections);
    let db = Database::connect(options).await?;
    info!("Connected to database");

    let provider = Arc::new(HttpSyncProvider::new(&config.provider)?);
    let engine = SyncEngine::new(db.clone(), provider, ProgressTracker::new());
    let accounts = AccountRepository::new(db);

    let mut ticks = interval(Duration::from_secs(config.sync.interval_secs));
    info!(interval_secs = config.sync.interval_secs, "Sync daemon started");

    loop {
        tokio::select! {
            _ = ticks.tick() => {
                run_pass(&engine, &accounts, &config.provider.access_token).await;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received, exiting");
                break;
            }
        }
    }

    Ok(())
}

/// Runs one sync per linked account; failures are logged, never fatal.
async fn run_pass(engine: &SyncEngine, accounts: &AccountRepository, access_token: &str) {
    let linked = match accounts.list_linked().await {
        Ok(linked) => linked,
        Err(list_error) => {
            error!(%list_error, "Could not list linked accounts");
            return;
        }
    };
    info!(accounts = linked.len(), "Starting sync pass");

    for account in linked {
        let token = SessionToken::new();
        engine.progress().start(token);
        if let Err(run_error) = engine
            .run_sync_once(account.user_id, account.id, access_token, token)
            .await
        {
            engine.progress().complete(token);
            warn!(
                account_id = %account.id,
                %run_error,
                "Sync failed; cursor unchanged, next pass retries"
            );
        }
    }
}
