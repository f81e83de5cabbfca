//! Mandi price sync: fetch the day's feed, validate it, upsert the survivors.
//!
//! A run is a single linear pass with no state kept between runs. Only an
//! upstream failure aborts it; bad rows and failed writes are counted in the
//! returned `SyncSummary`.

use chrono::{Duration, FixedOffset, NaiveDate, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

use crate::config::PriorityStates;
use crate::error::{RecordRejection, SyncError};
use crate::models::sync::SyncSummary;
use crate::services::data_gov::PriceFeed;
use crate::services::normalize::normalize_row;
use crate::services::price_store::PriceStore;

/// India Standard Time, used to decide what "today" means for the feed
const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

pub struct MandiSyncService {
    feed: Arc<dyn PriceFeed>,
    store: Arc<dyn PriceStore>,
    priority_states: PriorityStates,
    retention_days: Option<u32>,
}

impl MandiSyncService {
    pub fn new(
        feed: Arc<dyn PriceFeed>,
        store: Arc<dyn PriceStore>,
        priority_states: PriorityStates,
    ) -> Self {
        Self {
            feed,
            store,
            priority_states,
            retention_days: None,
        }
    }

    /// Delete records older than `days` before the target date after each run.
    pub fn with_retention_days(mut self, days: Option<u32>) -> Self {
        self.retention_days = days;
        self
    }

    pub fn store(&self) -> &Arc<dyn PriceStore> {
        &self.store
    }

    pub fn priority_states(&self) -> &PriorityStates {
        &self.priority_states
    }

    /// Run one sync for `target_date`, defaulting to today in IST.
    pub async fn run(&self, target_date: Option<NaiveDate>) -> Result<SyncSummary, SyncError> {
        let date = target_date.unwrap_or_else(today_ist);
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("mandi_sync", %run_id, %date);

        self.run_for_date(date).instrument(span).await
    }

    async fn run_for_date(&self, date: NaiveDate) -> Result<SyncSummary, SyncError> {
        info!(
            priority_states = self.priority_states.len(),
            "Fetching mandi prices"
        );

        let mut summary = SyncSummary::new(date);
        let fetched_at = summary.started_at;
        let rows = match self.feed.fetch_rows(date).await {
            Ok(rows) => rows,
            Err(e) => {
                error!(error = %e, "Mandi price feed unavailable, nothing written");
                return Err(e);
            }
        };

        summary.fetched = rows.len();

        for (index, raw) in rows.iter().enumerate() {
            let record = match normalize_row(raw, date, fetched_at, &self.priority_states) {
                Ok(record) => record,
                Err(rejection) => {
                    log_rejection(index, &rejection);
                    let kind = rejection.kind();
                    let message = format!("row {}: {}", index, SyncError::from(rejection));
                    summary.record_rejection(kind, message);
                    continue;
                }
            };

            match self.store.upsert(&record).await {
                Ok(()) => summary.written += 1,
                Err(e) => {
                    warn!(
                        row = index,
                        state = %record.state,
                        market = %record.market,
                        commodity = %record.commodity,
                        error = %e,
                        "Failed to store mandi price"
                    );
                    summary.record_write_failure(format!(
                        "row {} ({} / {} / {}): {}",
                        index, record.state, record.market, record.commodity, e
                    ));
                }
            }
        }

        if let Some(days) = self.retention_days {
            let cutoff = date - Duration::days(i64::from(days));
            match self.store.prune_before(cutoff).await {
                Ok(pruned) => {
                    summary.pruned = pruned;
                    debug!(%cutoff, pruned, "Pruned expired mandi prices");
                }
                Err(e) => {
                    warn!(%cutoff, error = %e, "Failed to prune expired mandi prices");
                    summary.push_error(format!("retention prune failed: {}", e));
                }
            }
        }

        summary.finish();

        info!(
            fetched = summary.fetched,
            written = summary.written,
            rejected = summary.rejected,
            malformed = summary.rejections.malformed,
            outside_allow_list = summary.rejections.outside_allow_list,
            price_order = summary.rejections.price_order,
            write_failed = summary.write_failed,
            pruned = summary.pruned,
            "Mandi price sync complete"
        );

        if summary.all_writes_failed() {
            error!(
                write_failed = summary.write_failed,
                "Every mandi price write failed"
            );
        }

        Ok(summary)
    }
}

fn log_rejection(index: usize, rejection: &RecordRejection) {
    match rejection {
        // Expected for every non-priority state, so keep it quiet
        RecordRejection::OutsideAllowList(_) => {
            debug!(row = index, reason = %rejection, "Skipping mandi price row")
        }
        _ => warn!(row = index, reason = %rejection, "Rejected mandi price row"),
    }
}

/// Today's date in India Standard Time
pub fn today_ist() -> NaiveDate {
    match FixedOffset::east_opt(IST_OFFSET_SECS) {
        Some(ist) => Utc::now().with_timezone(&ist).date_naive(),
        None => Utc::now().date_naive(),
    }
}
