//! Mandi Price Sync Job
//!
//! Pulls today's commodity prices from data.gov.in on a fixed interval
//! (12 hours by default) and upserts them into mandi_prices.
//! Supports graceful shutdown via SIGINT.

use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{error, info, warn};

use crate::error::SyncError;
use crate::models::sync::SyncSummary;
use crate::services::mandi_sync::MandiSyncService;
use crate::services::price_cache::PriceCache;
use crate::services::sync_status::{self, jobs};

/// Longest gap between two `sync_status` checks
const CHECK_INTERVAL_SECS: u64 = 3600;

/// Start the mandi price sync job
///
/// Spawns a background task that wakes at most hourly and runs a sync once
/// `sync_status` says `interval_secs` have passed since the last successful
/// run started. A restart shortly after a successful run therefore does not
/// hit the upstream API again. With `run_on_startup` false the first check is
/// skipped and the job waits one check period.
pub async fn start_mandi_price_sync_job(
    db: DatabaseConnection,
    sync: Arc<MandiSyncService>,
    cache: PriceCache,
    interval_secs: u64,
    run_on_startup: bool,
) {
    tokio::spawn(async move {
        let check_secs = interval_secs.clamp(1, CHECK_INTERVAL_SECS);
        let mut interval = interval(Duration::from_secs(check_secs));

        if !run_on_startup {
            // First tick completes immediately
            interval.tick().await;
        }

        info!(
            interval_secs,
            check_secs,
            run_on_startup,
            "Mandi price sync job started"
        );

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received, stopping mandi price sync job");
                    break;
                }
                _ = interval.tick() => {
                    match sync_status::should_sync(&db, jobs::MANDI_PRICE_SYNC, interval_secs as i64).await {
                        Ok(true) => {
                            // Failures are logged and recorded inside; next tick retries
                            let _ = run_scheduled_sync(&db, &sync, &cache, interval_secs).await;
                        }
                        Ok(false) => {
                            tracing::debug!("Skipping mandi price sync (recently synced)");
                        }
                        Err(e) => {
                            warn!(error = %e, "Failed to check sync status, syncing anyway");
                            let _ = run_scheduled_sync(&db, &sync, &cache, interval_secs).await;
                        }
                    }
                }
            }
        }

        info!("Mandi price sync job stopped");
    });
}

/// One scheduled run for today's feed.
///
/// The outcome is written to `sync_status` and logged. A run where every
/// write failed is recorded as a failure, so the next check retries it, and
/// returned as `PersistenceFailure`.
pub async fn run_scheduled_sync(
    db: &DatabaseConnection,
    sync: &MandiSyncService,
    cache: &PriceCache,
    interval_secs: u64,
) -> Result<SyncSummary, SyncError> {
    info!("Starting scheduled mandi price sync");

    let result = sync.run(None).await.and_then(|summary| {
        if summary.all_writes_failed() {
            Err(summary.persistence_failure())
        } else {
            Ok(summary)
        }
    });
    cache.invalidate_all();

    match &result {
        Ok(summary) => {
            info!(
                date = %summary.date,
                fetched = summary.fetched,
                written = summary.written,
                rejected = summary.rejected,
                write_failed = summary.write_failed,
                "Scheduled mandi price sync finished"
            );
            if let Err(e) =
                sync_status::record_success(db, jobs::MANDI_PRICE_SYNC, interval_secs as i64, summary)
                    .await
            {
                warn!(error = %e, "Failed to record sync success");
            }
        }
        Err(e) => {
            error!(error = %e, "Scheduled mandi price sync failed, will retry next interval");
            if let Err(e2) = sync_status::record_failure(
                db,
                jobs::MANDI_PRICE_SYNC,
                &e.to_string(),
                interval_secs as i64,
            )
            .await
            {
                warn!(error = %e2, "Failed to record sync failure");
            }
        }
    }

    result
}

