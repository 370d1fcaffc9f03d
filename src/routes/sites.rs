//! Read-only view of the live simulation.
//!
//! Every handler works from a published snapshot or a short lock on the
//! scheduler; none of them mutate site readings.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ApiError, AppState};
use crate::engine::risk::{self, HazardLevel};
use crate::engine::SiteForecast;
use crate::geojson;
use crate::models::{Reading, Site};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/api/sites", get(feature_collection))
        .route("/api/sites/search", get(search))
        .route("/api/sites/{id}", get(site_detail))
        .route("/api/sites/{id}/history", get(history).delete(release))
        .route("/api/sites/{id}/forecast", get(forecast))
        .route("/api/clock", get(clock))
}

async fn feature_collection(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    // ---
    let snap = state.telemetry.snapshot();
    Ok(Json(serde_json::to_value(geojson::feature_collection(&snap.sites))?))
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    q: Option<String>,
}

async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Json<Vec<Site>> {
    // ---
    let needle = query.q.unwrap_or_default();
    Json(state.telemetry.snapshot().search(&needle))
}

#[derive(Serialize)]
struct Hazards {
    ph: HazardLevel,
    lead: HazardLevel,
    pm25: HazardLevel,
}

#[derive(Serialize)]
struct SiteDetail {
    site: Site,
    hazards: Hazards,
    display_date: String,
}

async fn site_detail(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<SiteDetail>, ApiError> {
    // ---
    let snap = state.telemetry.snapshot();
    let site = snap.site(id).cloned().ok_or_else(|| not_found(id))?;

    Ok(Json(SiteDetail {
        hazards: Hazards {
            ph: risk::ph_hazard(site.ph()),
            lead: risk::lead_hazard(site.lead()),
            pm25: risk::pm25_hazard(site.pm25()),
        },
        site,
        display_date: snap.display_date,
    }))
}

#[derive(Serialize)]
struct HistoryResponse {
    site_id: u32,
    readings: Vec<Reading>,
}

async fn history(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<HistoryResponse>, ApiError> {
    // ---
    let readings = state.telemetry.inspect(id).ok_or_else(|| not_found(id))?;
    Ok(Json(HistoryResponse {
        site_id: id,
        readings,
    }))
}

async fn release(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<StatusCode, ApiError> {
    // ---
    if state.telemetry.release(id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(id))
    }
}

async fn forecast(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<SiteForecast>, ApiError> {
    // ---
    state
        .telemetry
        .forecast(id)
        .map(Json)
        .ok_or_else(|| not_found(id))
}

#[derive(Serialize)]
struct ClockResponse {
    elapsed_days: u64,
    display_date: String,
    sensor_ticks: u64,
}

async fn clock(State(state): State<AppState>) -> Json<ClockResponse> {
    // ---
    let snap = state.telemetry.snapshot();
    Json(ClockResponse {
        elapsed_days: snap.elapsed_days,
        display_date: snap.display_date,
        sensor_ticks: snap.sensor_ticks,
    })
}

fn not_found(id: u32) -> ApiError {
    ApiError::NotFound(format!("Site {} not found", id))
}
