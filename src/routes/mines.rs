use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::info;

use super::{ApiError, AppState};
use crate::models::{BulkMineUpdate, MinePatch, MineRecord};
use crate::store;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/api/mines", get(list).post(save))
        .route("/api/mines/bulk-update", post(bulk_update))
        .route("/api/mines/{id}", get(fetch).patch(patch))
}

async fn list(State(state): State<AppState>) -> Result<Json<Vec<MineRecord>>, ApiError> {
    // ---
    Ok(Json(store::list_mines(&state.pool).await?))
}

async fn fetch(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<MineRecord>, ApiError> {
    // ---
    store::get_mine(&state.pool, id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(id))
}

/// Create or replace a mine. Risk score and colour are derived from the
/// submitted readings, never taken from the body.
async fn save(
    State(state): State<AppState>,
    Json(mut mine): Json<MineRecord>,
) -> Result<Json<Value>, ApiError> {
    // ---
    if !(mine.latitude.is_finite() && mine.longitude.is_finite()) {
        return Err(ApiError::BadRequest("Invalid coordinates".into()));
    }
    mine.reclassify(&state.config.simulation.thresholds);
    store::upsert_mine(&state.pool, &mine).await?;

    info!("POST /api/mines - saved mine {}", mine.id);
    Ok(Json(json!({ "success": true, "message": "Mine saved" })))
}

/// Update some fields of an existing mine and return it.
async fn patch(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(changes): Json<MinePatch>,
) -> Result<Json<MineRecord>, ApiError> {
    // ---
    let finite = [changes.latitude, changes.longitude, changes.ph, changes.lead, changes.pm25]
        .iter()
        .flatten()
        .all(|v| v.is_finite());
    if !finite {
        return Err(ApiError::BadRequest("Values must be finite numbers".into()));
    }

    let mut mine = store::get_mine(&state.pool, id)
        .await?
        .ok_or_else(|| not_found(id))?;
    mine.apply(changes, &state.config.simulation.thresholds);
    store::upsert_mine(&state.pool, &mine).await?;

    info!("PATCH /api/mines/{} - updated", id);
    Ok(Json(mine))
}

/// Replace the latest readings of many mines at once. Unknown ids are
/// skipped and not counted.
async fn bulk_update(
    State(state): State<AppState>,
    Json(body): Json<BulkMineUpdate>,
) -> Result<Json<Value>, ApiError> {
    // ---
    if body
        .updates
        .iter()
        .any(|u| !(u.ph.is_finite() && u.lead.is_finite() && u.pm25.is_finite()))
    {
        return Err(ApiError::BadRequest("Readings must be finite numbers".into()));
    }

    let thresholds = state.config.simulation.thresholds;
    let mut updated = 0;
    for u in &body.updates {
        let found =
            store::update_mine_readings(&state.pool, u.id, u.ph, u.lead, u.pm25, &thresholds)
                .await?;
        if found {
            updated += 1;
        }
    }

    info!(
        "POST /api/mines/bulk-update - {} of {} mines updated",
        updated,
        body.updates.len()
    );
    Ok(Json(json!({ "updated": updated })))
}

fn not_found(id: i64) -> ApiError {
    ApiError::NotFound(format!("Mine {} not found", id))
}
