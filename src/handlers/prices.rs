use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};

use crate::models::price::{PriceQuery, PricesResponse};
use crate::models::sync::ErrorResponse;
use crate::AppState;

/// Stored prices for the landing page, newest first
pub async fn get_prices(
    State(state): State<AppState>,
    Query(mut query): Query<PriceQuery>,
) -> Result<Json<PricesResponse>, (StatusCode, Json<ErrorResponse>)> {
    // Normalise so equivalent requests share a cache entry
    query.limit = Some(query.effective_limit());

    if let Some(cached) = state.cache.get(&query).await {
        tracing::debug!("Cache hit for price query {:?}", query);
        return Ok(Json(PricesResponse {
            count: cached.len(),
            prices: cached,
        }));
    }

    let prices = state.sync.store().list(&query).await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("Database error: {}", e),
            }),
        )
    })?;

    state.cache.insert(query, prices.clone()).await;

    Ok(Json(PricesResponse {
        count: prices.len(),
        prices,
    }))
}
