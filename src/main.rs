//! Application entry point for the `minewatch-telemetry` service.
//!
//! This binary orchestrates the full startup sequence, including:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Opening the SQLite connection pool and creating the schema
//! - Ingesting the site feed and seeding the telemetry scheduler
//! - Starting the simulation timers and the optional persistence mirror
//! - Binding the Axum HTTP server and serving until Ctrl-C
//!
//! # Environment Variables
//! See [`minewatch::config::load_from_env`] for the full list. Logging is
//! controlled by:
//! - `LOG_LEVEL` (optional) – log verbosity (default: `info`)
//! - `LOG_SPAN_EVENTS` (optional) – span event mode for tracing
//! - `FORCE_COLOR` (optional) – force ANSI colours on or off
use std::env;

use axum::Router;
use dotenvy::dotenv;
use is_terminal::IsTerminal;
use sqlx::sqlite::SqlitePoolOptions;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use anyhow::{Context, Result};

use minewatch::config::{self, MirrorMode};
use minewatch::engine::{SystemCalendar, TelemetryRuntime, TelemetryScheduler, TickTiming};
use minewatch::mirror::{self, Mirror, RestMirror};
use minewatch::{ingest, routes, schema};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    init_tracing();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let pool = SqlitePoolOptions::new()
        .max_connections(cfg.db_pool_max)
        .connect(&cfg.db_url)
        .await
        .with_context(|| format!("Failed to open database '{}'", cfg.db_url))?;

    tracing::info!("Successfully connected to database");

    schema::create_schema(&pool).await?;

    let records = ingest::load_sites(&cfg.sites_csv)?;
    let scheduler =
        TelemetryScheduler::new(records, cfg.simulation.clone(), Box::new(SystemCalendar));
    let timing = TickTiming::from_cadence(cfg.clock_tick_ms, cfg.simulation.sensor_every_ticks);

    let mut runtime = TelemetryRuntime::new(scheduler, timing);
    let telemetry = runtime.handle();

    let mirror = match &cfg.mirror {
        MirrorMode::Off => None,
        MirrorMode::Local => Some(Mirror::Local {
            pool: pool.clone(),
            thresholds: cfg.simulation.thresholds,
        }),
        MirrorMode::Rest(url) => Some(Mirror::Rest(RestMirror::new(url))),
    };
    if let Some(mirror) = mirror {
        match mirror.save_sites(&telemetry.snapshot().sites).await {
            Ok(n) => tracing::info!("Registered {} sites with persistence", n),
            Err(e) => tracing::warn!("Site registration failed, continuing: {}", e),
        }
        tokio::spawn(mirror::run(mirror, telemetry.subscribe()));
    }

    runtime.start();

    // Build app from routes gateway (EMBP)
    let app: Router = routes::router(pool.clone(), cfg.clone(), telemetry);

    tracing::info!("Listening on {}", cfg.bind_addr);

    let listener = tokio::net::TcpListener::bind(cfg.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    runtime.stop().await;
    pool.close().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

// ---

async fn shutdown_signal() {
    // ---
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Span event emission mode controlled by the `LOG_SPAN_EVENTS` env var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level controlled by the `LOG_LEVEL` env var
///
/// This should be called once at application startup before any logging
/// or tracing macros are invoked.
fn init_tracing() {
    // ---
    let span_events = match env::var("LOG_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    // Use RUST_LOG if available, otherwise fall back to LOG_LEVEL
    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "info",
        };
        EnvFilter::new(format!("{level},sqlx::query=warn"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
