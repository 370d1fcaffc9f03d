// src/routes/health.rs
//! API health check endpoint for the telemetry service.
//!
//! This module defines the `/api/health` route used by container
//! orchestrators and CI pipelines to verify that the service is running and
//! able to respond to HTTP requests. It follows the Explicit Module Boundary
//! Pattern (EMBP):
//! - Internal to this file: endpoint handler(s) and related types
//! - Exports to the gateway (`mod.rs`): a subrouter containing the route

use axum::{routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// JSON response body for the `/api/health` endpoint.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: DateTime<Utc>,
}

/// Handle `GET /api/health`.
///
/// Does not touch the database or the simulation.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now(),
    })
}

/// Create a subrouter containing the `/api/health` route.
///
/// Generic over the application state so it merges cleanly with the gateway
/// router regardless of the state type.
pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/api/health", get(health))
}
