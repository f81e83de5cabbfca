use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::AppState;

pub mod prices;
pub mod status;
pub mod sync;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(status::health))
        .route("/api/prices", get(prices::get_prices))
        .route("/api/sync/status", get(status::get_sync_status))
        .route("/api/sync/mandi-prices", post(sync::run_http_sync))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
