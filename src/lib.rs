// src/lib.rs

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use services::mandi_sync::MandiSyncService;
use services::price_cache::PriceCache;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub sync: Arc<MandiSyncService>,
    pub cache: PriceCache,
    /// Required value of the `x-sync-token` header, when set
    pub trigger_token: Option<String>,
    pub sync_interval_secs: u64,
}

pub mod entities {
    pub mod prelude;
    pub mod mandi_prices;
    pub mod sync_status;
}

pub mod services {
    pub mod data_gov;
    pub mod mandi_sync;
    pub mod normalize;
    pub mod price_cache;
    pub mod price_store;
    pub mod sync_status;
}

pub mod config;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod models;
