//! Sync status tracking for the price sync jobs
//!
//! Remembers when each job last ran and what it reported, so a restart does not
//! immediately repeat a sync that finished a few minutes earlier.

use chrono::{Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::entities::sync_status::{self, Entity as SyncStatus};
use crate::models::sync::SyncSummary;

/// Job names for tracking sync status
pub mod jobs {
    /// Timer-driven run for today's prices
    pub const MANDI_PRICE_SYNC: &str = "mandi_price_sync";
    /// HTTP or CLI triggered run; tracked apart so it never delays the schedule
    pub const MANDI_PRICE_SYNC_MANUAL: &str = "mandi_price_sync_manual";
}

/// Runs finishing this close to the interval still count as due, so a timer
/// period equal to the interval never skips a tick
pub const SCHEDULE_SLACK_SECS: i64 = 300;

/// Check if a sync job should run based on last successful sync time
///
/// Returns true if:
/// - No record exists for this job (first run)
/// - Last successful sync started at least `min_interval_secs` ago, less
///   `SCHEDULE_SLACK_SECS`
pub async fn should_sync(
    db: &DatabaseConnection,
    job_name: &str,
    min_interval_secs: i64,
) -> Result<bool, DbErr> {
    let status = SyncStatus::find()
        .filter(sync_status::Column::JobName.eq(job_name))
        .one(db)
        .await?;

    let Some(last_success) = status.and_then(|s| s.last_success_at) else {
        tracing::info!("[{}] No previous successful sync, will sync", job_name);
        return Ok(true);
    };

    let elapsed = Utc::now().naive_utc().signed_duration_since(last_success);
    let threshold = Duration::seconds((min_interval_secs - SCHEDULE_SLACK_SECS).max(0));

    if elapsed >= threshold {
        tracing::info!(
            "[{}] Last sync was {}s ago (min: {}s), will sync",
            job_name,
            elapsed.num_seconds(),
            min_interval_secs
        );
        Ok(true)
    } else {
        tracing::info!(
            "[{}] Skipping sync - last sync was {}s ago, next sync in {}s",
            job_name,
            elapsed.num_seconds(),
            (threshold - elapsed).num_seconds()
        );
        Ok(false)
    }
}

/// Record a completed run together with its counts.
///
/// `last_success_at` is the run's start time so the next due time does not
/// drift by the run's duration.
pub async fn record_success(
    db: &DatabaseConnection,
    job_name: &str,
    min_interval_secs: i64,
    summary: &SyncSummary,
) -> Result<(), DbErr> {
    let now = Utc::now().naive_utc();
    let interval = clamp_i32(min_interval_secs);

    let existing = SyncStatus::find()
        .filter(sync_status::Column::JobName.eq(job_name))
        .one(db)
        .await?;

    let mut active_model = match existing {
        Some(record) => {
            let success_count = record.success_count;
            let mut active_model: sync_status::ActiveModel = record.into();
            active_model.success_count = Set(success_count + 1);
            active_model
        }
        None => sync_status::ActiveModel {
            job_name: Set(job_name.to_string()),
            success_count: Set(1),
            error_count: Set(0),
            ..Default::default()
        },
    };

    active_model.last_success_at = Set(Some(summary.started_at.naive_utc()));
    active_model.last_attempt_at = Set(Some(now));
    active_model.last_error = Set(None);
    active_model.min_interval_secs = Set(interval);
    active_model.last_fetched = Set(Some(clamp_i32(summary.fetched as i64)));
    active_model.last_written = Set(Some(clamp_i32(summary.written as i64)));
    active_model.last_rejected = Set(Some(clamp_i32(summary.rejected as i64)));
    active_model.save(db).await?;

    tracing::debug!("[{}] Recorded successful sync", job_name);
    Ok(())
}

/// Record a failed sync attempt
pub async fn record_failure(
    db: &DatabaseConnection,
    job_name: &str,
    error: &str,
    min_interval_secs: i64,
) -> Result<(), DbErr> {
    let now = Utc::now().naive_utc();

    let existing = SyncStatus::find()
        .filter(sync_status::Column::JobName.eq(job_name))
        .one(db)
        .await?;

    let mut active_model = match existing {
        Some(record) => {
            let error_count = record.error_count;
            let mut active_model: sync_status::ActiveModel = record.into();
            active_model.error_count = Set(error_count + 1);
            active_model
        }
        None => sync_status::ActiveModel {
            job_name: Set(job_name.to_string()),
            last_success_at: Set(None),
            success_count: Set(0),
            error_count: Set(1),
            ..Default::default()
        },
    };

    active_model.last_attempt_at = Set(Some(now));
    active_model.last_error = Set(Some(error.to_string()));
    active_model.min_interval_secs = Set(clamp_i32(min_interval_secs));
    active_model.save(db).await?;

    tracing::debug!("[{}] Recorded failed sync: {}", job_name, error);
    Ok(())
}

/// All tracked jobs, by name
pub async fn list_all(db: &DatabaseConnection) -> Result<Vec<sync_status::Model>, DbErr> {
    SyncStatus::find()
        .order_by_asc(sync_status::Column::JobName)
        .all(db)
        .await
}

fn clamp_i32(value: i64) -> i32 {
    value.clamp(0, i64::from(i32::MAX)) as i32
}
