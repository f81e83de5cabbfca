use axum::{extract::State, http::StatusCode, Json};

use crate::entities::sync_status;
use crate::models::sync::ErrorResponse;
use crate::services::sync_status::list_all;
use crate::AppState;

pub async fn health() -> &'static str {
    "ok"
}

pub async fn get_sync_status(
    State(state): State<AppState>,
) -> Result<Json<Vec<sync_status::Model>>, (StatusCode, Json<ErrorResponse>)> {
    list_all(&state.db).await.map(Json).map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("Database error: {}", e),
            }),
        )
    })
}
