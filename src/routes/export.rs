//! Bulk export and reset of stored readings.

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::info;

use super::{ApiError, AppState};
use crate::store;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/api/export/json", get(export_json))
        .route("/api/export/csv", get(export_csv))
        .route("/api/clear-all", post(clear_all))
}

async fn export_json(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    // ---
    let rows = store::export_readings(&state.pool).await?;
    info!("GET /api/export/json - {} readings", rows.len());
    Ok((
        [(
            header::CONTENT_DISPOSITION,
            "attachment; filename=\"telemetry_export.json\"",
        )],
        Json(rows),
    ))
}

async fn export_csv(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    // ---
    let rows = store::export_readings(&state.pool).await?;
    info!("GET /api/export/csv - {} readings", rows.len());
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"telemetry_export.csv\"",
            ),
        ],
        store::readings_to_csv(&rows),
    ))
}

async fn clear_all(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    // ---
    let removed = store::clear_readings(&state.pool).await?;
    info!("POST /api/clear-all - removed {} readings", removed);
    Ok(Json(json!({
        "success": true,
        "message": "All sensor readings cleared",
        "removed": removed,
    })))
}
