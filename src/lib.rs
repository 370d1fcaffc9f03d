//! Environmental telemetry simulation and risk scoring for mine sites.
//!
//! The [`engine`] ages each site's water pH, soil lead and airborne PM2.5
//! readings over simulated time, scores them into a 0-100 ecological risk
//! index and forecasts where they are heading. Around it sit the site feed
//! ([`ingest`]), the map-facing [`geojson`] view, SQLite persistence
//! ([`schema`], [`store`], [`mirror`]) and the HTTP [`routes`].
//!
//! This crate follows the Explicit Module Boundary Pattern (EMBP): `main.rs`
//! only talks to the gateways re-exported here.

pub mod config;
pub mod engine;
pub mod geojson;
pub mod ingest;
pub mod mirror;
pub mod models;
pub mod routes;
pub mod schema;
pub mod store;

pub use config::Config;
pub use models::{Reading, Site, SiteRecord};
