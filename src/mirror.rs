//! Best-effort mirroring of live telemetry into persistence.
//!
//! After every new sensor tick the mirror writes one reading per site,
//! either straight into the local database or over HTTP to a remote copy of
//! the persistence API. Each site is written independently: failures are
//! logged per site and summarised, and the simulation never waits on them.

use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;
use thiserror::Error;
use tokio::sync::watch;

use crate::engine::risk::RiskThresholds;
use crate::engine::Snapshot;
use crate::models::{MineRecord, Site};
use crate::store;

// ---

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("mirror request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("mirror endpoint returned HTTP {0}")]
    Status(u16),
    #[error("mirror database write failed: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{failed} of {total} mirror writes failed, last: {last}")]
    Partial {
        failed: usize,
        total: usize,
        #[source]
        last: Box<MirrorError>,
    },
}

/// Where mirrored readings go.
#[derive(Clone)]
pub enum Mirror {
    Local {
        pool: SqlitePool,
        thresholds: RiskThresholds,
    },
    Rest(RestMirror),
}

/// Client for a remote persistence API.
#[derive(Clone)]
pub struct RestMirror {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct ReadingBody {
    mine_id: u32,
    ph: f64,
    lead: f64,
    pm25: f64,
}

impl RestMirror {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<(), MirrorError> {
        // ---
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.post(&url).json(body).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(MirrorError::Status(response.status().as_u16()))
        }
    }
}

impl Mirror {
    /// Register sites with the persistence store.
    ///
    /// Every site is attempted; failures are logged per site and summarised
    /// in the returned error.
    pub async fn save_sites(&self, sites: &[Site]) -> Result<usize, MirrorError> {
        // ---
        let mut batch = Batch::new(sites.len());
        for site in sites {
            let record = MineRecord::from(site);
            let result = match self {
                Mirror::Local { pool, .. } => store::upsert_mine(pool, &record)
                    .await
                    .map_err(MirrorError::from),
                Mirror::Rest(rest) => rest.post("/api/mines", &record).await,
            };
            batch.note(site.id, "site", result);
        }
        batch.finish()
    }

    /// Append the current reading of every site.
    ///
    /// A failing site never stops the rest of the batch.
    pub async fn record_readings(&self, sites: &[Site]) -> Result<usize, MirrorError> {
        // ---
        let now = Utc::now();
        let mut batch = Batch::new(sites.len());
        for site in sites {
            let result = match self {
                Mirror::Local { pool, thresholds } => store::insert_reading(
                    pool,
                    i64::from(site.id),
                    site.ph(),
                    site.lead(),
                    site.pm25(),
                    thresholds,
                    now,
                )
                .await
                .map(|_| ())
                .map_err(MirrorError::from),
                Mirror::Rest(rest) => {
                    let body = ReadingBody {
                        mine_id: site.id,
                        ph: site.ph(),
                        lead: site.lead(),
                        pm25: site.pm25(),
                    };
                    rest.post("/api/sensor-readings", &body).await
                }
            };
            batch.note(site.id, "reading", result);
        }
        batch.finish()
    }
}

/// Per-site outcome tally for one mirror pass.
struct Batch {
    total: usize,
    failed: usize,
    last: Option<MirrorError>,
}

impl Batch {
    fn new(total: usize) -> Self {
        Self {
            total,
            failed: 0,
            last: None,
        }
    }

    fn note(&mut self, site_id: u32, what: &str, result: Result<(), MirrorError>) {
        if let Err(e) = result {
            tracing::warn!(site_id, "Mirroring {} failed: {}", what, e);
            self.failed += 1;
            self.last = Some(e);
        }
    }

    fn finish(self) -> Result<usize, MirrorError> {
        match self.last {
            None => Ok(self.total),
            Some(last) => Err(MirrorError::Partial {
                failed: self.failed,
                total: self.total,
                last: Box::new(last),
            }),
        }
    }
}

/// Mirror every new sensor tick until the snapshot channel closes.
pub async fn run(mirror: Mirror, mut snapshots: watch::Receiver<Snapshot>) {
    // ---
    let mut last_mirrored = snapshots.borrow().sensor_ticks;

    while snapshots.changed().await.is_ok() {
        let (sensor_ticks, sites) = {
            let snap = snapshots.borrow_and_update();
            (snap.sensor_ticks, snap.sites.clone())
        };
        if sensor_ticks == last_mirrored {
            continue;
        }
        last_mirrored = sensor_ticks;

        match mirror.record_readings(&sites).await {
            Ok(n) => tracing::debug!(sensor_ticks, readings = n, "mirrored sensor tick"),
            Err(e) => tracing::warn!(sensor_ticks, "Mirror failed, simulation continues: {}", e),
        }
    }

    tracing::debug!("snapshot channel closed, mirror exiting");
}
