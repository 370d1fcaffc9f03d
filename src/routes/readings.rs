use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{ApiError, AppState};
use crate::models::{NewSensorReading, StoredReading};
use crate::store::{self, DateBound, ReadingFilter};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/api/sensor-readings", get(list).post(record))
        .route("/api/sensor-readings/{mine_id}", get(for_mine))
}

/// Record a sensor reading.
async fn record(
    State(state): State<AppState>,
    Json(body): Json<NewSensorReading>,
) -> Result<Json<Value>, ApiError> {
    // ---
    let (Some(mine_id), Some(ph), Some(lead), Some(pm25)) =
        (body.mine_id, body.ph, body.lead, body.pm25)
    else {
        return Err(ApiError::BadRequest("Missing required fields".into()));
    };
    if ![ph, lead, pm25].iter().all(|v| v.is_finite()) {
        return Err(ApiError::BadRequest("Readings must be finite numbers".into()));
    }

    let id = store::insert_reading(
        &state.pool,
        mine_id,
        ph,
        lead,
        pm25,
        &state.config.simulation.thresholds,
        Utc::now(),
    )
    .await?;

    debug!("POST /api/sensor-readings - mine {} reading {}", mine_id, id);
    Ok(Json(json!({ "success": true, "id": id })))
}

/// Query string of `GET /api/sensor-readings`. Dates stay raw strings
/// here so bad input is reported as an API error.
#[derive(Debug, Deserialize)]
struct ListQuery {
    mine_id: Option<i64>,
    start_date: Option<String>,
    end_date: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl ListQuery {
    fn into_filter(self) -> Result<ReadingFilter, ApiError> {
        // ---
        let bound = |raw: Option<String>, which: DateBound, name: &str| {
            raw.map(|raw| {
                store::parse_date_bound(&raw, which)
                    .ok_or_else(|| ApiError::BadRequest(format!("Invalid {}: '{}'", name, raw)))
            })
            .transpose()
        };

        Ok(ReadingFilter {
            mine_id: self.mine_id,
            start_date: bound(self.start_date, DateBound::Start, "start_date")?,
            end_date: bound(self.end_date, DateBound::End, "end_date")?,
            limit: self.limit,
            offset: self.offset,
        })
    }
}

/// List readings, newest first, optionally filtered by mine and time range.
async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<StoredReading>>, ApiError> {
    // ---
    let filter = query.into_filter()?;
    info!("GET /api/sensor-readings - {:?}", filter);
    Ok(Json(store::list_readings(&state.pool, &filter).await?))
}

#[derive(Debug, Deserialize)]
struct Page {
    limit: Option<i64>,
    offset: Option<i64>,
}

/// The latest readings for one mine in chronological order.
async fn for_mine(
    State(state): State<AppState>,
    Path(mine_id): Path<i64>,
    Query(page): Query<Page>,
) -> Result<Json<Vec<StoredReading>>, ApiError> {
    // ---
    let rows = store::readings_for_mine(
        &state.pool,
        mine_id,
        page.limit.unwrap_or(100),
        page.offset.unwrap_or(0),
    )
    .await?;
    Ok(Json(rows))
}
