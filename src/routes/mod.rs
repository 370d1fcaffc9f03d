//! HTTP gateway: merges every subrouter and attaches shared state.

use axum::Router;
use sqlx::SqlitePool;

use crate::engine::TelemetryHandle;
use crate::Config;

mod error;
mod export;
mod health;
mod mines;
mod readings;
mod sites;
mod stats;

pub use error::ApiError;

// ---

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
    pub telemetry: TelemetryHandle,
}

pub fn router(pool: SqlitePool, config: Config, telemetry: TelemetryHandle) -> Router {
    // ---
    Router::new()
        .merge(mines::router())
        .merge(readings::router())
        .merge(stats::router())
        .merge(export::router())
        .merge(sites::router())
        .merge(health::router())
        .with_state(AppState {
            pool,
            config,
            telemetry,
        })
}
