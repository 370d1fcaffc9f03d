use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use super::{ApiError, AppState};
use crate::models::MineStats;
use crate::store;

// ---

pub fn router() -> Router<AppState> {
    Router::new().route("/api/stats/mine/{mine_id}", get(mine_stats))
}

/// Count, average, minimum and maximum of each metric for one mine.
async fn mine_stats(
    State(state): State<AppState>,
    Path(mine_id): Path<i64>,
) -> Result<Json<MineStats>, ApiError> {
    Ok(Json(store::mine_stats(&state.pool, mine_id).await?))
}
