#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use mandi_price_sync::config::PriorityStates;
use mandi_price_sync::error::SyncError;
use mandi_price_sync::services::data_gov::PriceFeed;
use mandi_price_sync::services::mandi_sync::MandiSyncService;
use mandi_price_sync::services::price_cache::new_price_cache;
use mandi_price_sync::models::price::{PriceQuery, PriceRecord};
use mandi_price_sync::services::price_store::PriceStore;
use mandi_price_sync::AppState;
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection, DbErr};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

/// Migrated SQLite database in a temp dir. Keep the `TempDir` alive for the
/// duration of the test.
pub async fn setup_test_db() -> Result<(DatabaseConnection, TempDir), DbErr> {
    let dir = TempDir::new().map_err(|e| DbErr::Custom(e.to_string()))?;
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());

    let db = Database::connect(&url).await?;
    migration::Migrator::up(&db, None).await?;

    Ok((db, dir))
}

/// Feed that serves the same rows for any date
pub struct StaticFeed(pub Vec<Value>);

#[async_trait]
impl PriceFeed for StaticFeed {
    async fn fetch_rows(&self, _date: NaiveDate) -> Result<Vec<Value>, SyncError> {
        Ok(self.0.clone())
    }
}

/// Feed that behaves like an upstream returning HTTP 500
pub struct FailingFeed;

#[async_trait]
impl PriceFeed for FailingFeed {
    async fn fetch_rows(&self, _date: NaiveDate) -> Result<Vec<Value>, SyncError> {
        Err(SyncError::UpstreamUnavailable(
            "data.gov.in API error 500 Internal Server Error".to_string(),
        ))
    }
}

/// Store whose every write fails, like a database that is down or full
pub struct FailingStore;

#[async_trait]
impl PriceStore for FailingStore {
    async fn upsert(&self, _record: &PriceRecord) -> Result<(), SyncError> {
        Err(SyncError::PersistenceFailure("disk full".to_string()))
    }

    async fn list(&self, _query: &PriceQuery) -> Result<Vec<PriceRecord>, SyncError> {
        Ok(Vec::new())
    }

    async fn prune_before(&self, _cutoff: NaiveDate) -> Result<u64, SyncError> {
        Ok(0)
    }
}

pub fn punjab_only() -> PriorityStates {
    PriorityStates::from_csv("Punjab").unwrap()
}

pub fn row(state: &str, market: &str, commodity: &str, prices: (u32, u32, u32)) -> Value {
    json!({
        "state": state,
        "market": market,
        "commodity": commodity,
        "min_price": prices.0.to_string(),
        "modal_price": prices.1.to_string(),
        "max_price": prices.2.to_string(),
        "arrival_date": "10/01/2024"
    })
}

/// The two-row feed from the ingestion example: one Punjab wheat quote and one
/// row from an unknown state with inverted prices
pub fn example_feed() -> Vec<Value> {
    vec![
        row("Punjab", "Ludhiana", "Wheat", (1800, 1900, 2000)),
        row("Unknown", "X", "Rice", (100, 50, 90)),
    ]
}

pub fn build_state(
    db: DatabaseConnection,
    feed: Arc<dyn PriceFeed>,
    store: Arc<dyn PriceStore>,
    trigger_token: Option<&str>,
) -> AppState {
    AppState {
        db,
        sync: Arc::new(MandiSyncService::new(feed, store, punjab_only())),
        cache: new_price_cache(),
        trigger_token: trigger_token.map(str::to_string),
        sync_interval_secs: 43200,
    }
}
