use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};

use crate::error::SyncError;
use crate::models::sync::{SyncQuery, SyncResponse};
use crate::services::mandi_sync::today_ist;
use crate::services::normalize::parse_date;
use crate::services::sync_status::{self, jobs};
use crate::AppState;

pub const SYNC_TOKEN_HEADER: &str = "x-sync-token";

/// On-demand sync, e.g. for a manual backfill: `POST /api/sync/mandi-prices?date=2024-01-10`
///
/// The date is resolved (today in IST when absent) before anything else so
/// every response body names the day it concerns.
pub async fn run_http_sync(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SyncQuery>,
) -> (StatusCode, Json<SyncResponse>) {
    let date = match query.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        Some(raw) => match parse_date(raw) {
            Ok(date) => date,
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(SyncResponse::failure(None, e.to_string())),
                );
            }
        },
        None => today_ist(),
    };

    if let Some(expected) = &state.trigger_token {
        let provided = headers
            .get(SYNC_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok());
        if provided != Some(expected.as_str()) {
            return (
                StatusCode::UNAUTHORIZED,
                Json(SyncResponse::failure(
                    Some(date),
                    format!("missing or invalid {} header", SYNC_TOKEN_HEADER),
                )),
            );
        }
    }

    tracing::info!(%date, "Manual mandi price sync requested");

    let result = state.sync.run(Some(date)).await;
    state.cache.invalidate_all();

    let interval = state.sync_interval_secs as i64;
    match result {
        Ok(summary) if summary.all_writes_failed() => {
            let error = summary.persistence_failure();
            tracing::error!(%date, error = %error, "Manual mandi price sync wrote nothing");
            record_failure(&state, &error, interval).await;
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(SyncResponse::from_summary(summary)),
            )
        }
        Ok(summary) => {
            if let Err(e) = sync_status::record_success(
                &state.db,
                jobs::MANDI_PRICE_SYNC_MANUAL,
                interval,
                &summary,
            )
            .await
            {
                tracing::warn!(error = %e, "Failed to record sync success");
            }
            (StatusCode::OK, Json(SyncResponse::from_summary(summary)))
        }
        Err(e) => {
            record_failure(&state, &e, interval).await;

            let status = match e {
                SyncError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, Json(SyncResponse::failure(Some(date), e.to_string())))
        }
    }
}

async fn record_failure(state: &AppState, error: &SyncError, interval: i64) {
    if let Err(e) = sync_status::record_failure(
        &state.db,
        jobs::MANDI_PRICE_SYNC_MANUAL,
        &error.to_string(),
        interval,
    )
    .await
    {
        tracing::warn!(error = %e, "Failed to record sync failure");
    }
}
