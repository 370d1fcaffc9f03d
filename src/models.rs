//! Shared data models for the telemetry engine and its HTTP surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::aging::Metrics;
use crate::engine::risk::{self, Classification, RiskStatus, RiskThresholds};

// ---

/// One row from the site source feed, already normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteRecord {
    // ---
    pub id: u32,
    pub name: String,
    pub location: String,
    pub county: String,
    /// Operating status as reported by the feed (e.g. "Active", "Abandoned").
    pub status: String,
    /// `[longitude, latitude]`
    pub coordinates: [f64; 2],
}

/// A monitored mine site with its live readings.
///
/// Readings and their classification are private: [`Site::set_metrics`]
/// is the only writer, so `risk_score`, `status` and `color` always follow
/// from `ph`, `lead` and `pm25`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Site {
    // ---
    pub id: u32,
    pub name: String,
    pub location: String,
    pub county: String,
    pub operating_status: String,
    pub coordinates: [f64; 2],
    pub initial_age_days: f64,

    ph: f64,
    lead: f64,
    pm25: f64,

    #[serde(rename = "riskScore")]
    risk_score: u8,
    status: RiskStatus,
    color: &'static str,
}

impl Site {
    pub fn new(
        record: SiteRecord,
        initial_age_days: f64,
        metrics: Metrics,
        thresholds: &RiskThresholds,
    ) -> Self {
        // ---
        let c = risk::classify_with(thresholds, metrics.ph, metrics.lead, metrics.pm25);
        Site {
            id: record.id,
            name: record.name,
            location: record.location,
            county: record.county,
            operating_status: record.status,
            coordinates: record.coordinates,
            initial_age_days,
            ph: metrics.ph,
            lead: metrics.lead,
            pm25: metrics.pm25,
            risk_score: c.risk_score,
            status: c.status,
            color: c.color,
        }
    }

    pub fn ph(&self) -> f64 {
        self.ph
    }

    pub fn lead(&self) -> f64 {
        self.lead
    }

    pub fn pm25(&self) -> f64 {
        self.pm25
    }

    pub fn risk_score(&self) -> u8 {
        self.risk_score
    }

    pub fn status(&self) -> RiskStatus {
        self.status
    }

    pub fn color(&self) -> &'static str {
        self.color
    }

    pub fn metrics(&self) -> Metrics {
        Metrics {
            ph: self.ph,
            lead: self.lead,
            pm25: self.pm25,
        }
    }

    /// Replace live readings and reclassify.
    pub fn set_metrics(&mut self, metrics: Metrics, thresholds: &RiskThresholds) -> Classification {
        // ---
        self.ph = metrics.ph;
        self.lead = metrics.lead;
        self.pm25 = metrics.pm25;

        let c = risk::classify_with(thresholds, metrics.ph, metrics.lead, metrics.pm25);
        self.risk_score = c.risk_score;
        self.status = c.status;
        self.color = c.color;
        c
    }

    /// Case-insensitive match against name, location or county.
    pub fn matches(&self, needle_lower: &str) -> bool {
        [&self.name, &self.location, &self.county]
            .iter()
            .any(|field| field.to_lowercase().contains(needle_lower))
    }

    pub fn longitude(&self) -> f64 {
        self.coordinates[0]
    }

    pub fn latitude(&self) -> f64 {
        self.coordinates[1]
    }
}

/// Immutable history entry captured at a simulated day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub day: u64,
    pub ph: f64,
    pub lead: f64,
    pub pm25: f64,
}

impl Reading {
    pub fn from_metrics(day: u64, m: Metrics) -> Self {
        Reading {
            day,
            ph: m.ph,
            lead: m.lead,
            pm25: m.pm25,
        }
    }
}

// ---
// Persistence shapes
// ---

/// Body of `POST /api/sensor-readings`.
///
/// Fields are optional so missing ones can be reported as a 400.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSensorReading {
    pub mine_id: Option<i64>,
    pub ph: Option<f64>,
    pub lead: Option<f64>,
    pub pm25: Option<f64>,
}

/// A stored sensor reading as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StoredReading {
    // ---
    pub id: i64,
    pub mine_id: i64,
    pub ph: f64,
    pub lead: f64,
    pub pm25: f64,
    #[serde(rename = "riskScore")]
    pub risk_score: i64,
    pub color: String,
    pub timestamp: DateTime<Utc>,
    /// Mine name, populated by queries that join `mines`.
    #[sqlx(default)]
    pub name: Option<String>,
}

/// A mine row in the persistence store.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MineRecord {
    // ---
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub county: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub ph: Option<f64>,
    #[serde(default)]
    pub lead: Option<f64>,
    #[serde(default)]
    pub pm25: Option<f64>,
    #[serde(default, rename = "riskScore")]
    pub risk_score: Option<i64>,
    #[serde(default)]
    pub color: Option<String>,
}

impl MineRecord {
    /// Derive the risk score and colour from the readings when all are
    /// present; clear them otherwise.
    pub fn reclassify(&mut self, thresholds: &RiskThresholds) {
        // ---
        match (self.ph, self.lead, self.pm25) {
            (Some(ph), Some(lead), Some(pm25)) => {
                let c = risk::classify_with(thresholds, ph, lead, pm25);
                self.risk_score = Some(c.risk_score as i64);
                self.color = Some(c.color.to_string());
            }
            _ => {
                self.risk_score = None;
                self.color = None;
            }
        }
    }

    /// Overwrite every field `patch` carries, then reclassify.
    pub fn apply(&mut self, patch: MinePatch, thresholds: &RiskThresholds) {
        // ---
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(lat) = patch.latitude {
            self.latitude = lat;
        }
        if let Some(lng) = patch.longitude {
            self.longitude = lng;
        }
        self.location = patch.location.or(self.location.take());
        self.county = patch.county.or(self.county.take());
        self.status = patch.status.or(self.status.take());
        self.ph = patch.ph.or(self.ph);
        self.lead = patch.lead.or(self.lead);
        self.pm25 = patch.pm25.or(self.pm25);
        self.reclassify(thresholds);
    }
}

/// Body of `PATCH /api/mines/{id}`. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MinePatch {
    pub name: Option<String>,
    pub location: Option<String>,
    pub county: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub status: Option<String>,
    pub ph: Option<f64>,
    pub lead: Option<f64>,
    pub pm25: Option<f64>,
}

/// Latest readings for one mine in a bulk update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MineReadings {
    #[serde(alias = "_id")]
    pub id: i64,
    pub ph: f64,
    pub lead: f64,
    pub pm25: f64,
}

/// Body of `POST /api/mines/bulk-update`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkMineUpdate {
    pub updates: Vec<MineReadings>,
}

impl From<&Site> for MineRecord {
    fn from(site: &Site) -> Self {
        MineRecord {
            id: site.id as i64,
            name: site.name.clone(),
            location: Some(site.location.clone()),
            county: Some(site.county.clone()),
            latitude: site.latitude(),
            longitude: site.longitude(),
            status: Some(site.operating_status.clone()),
            ph: Some(site.ph),
            lead: Some(site.lead),
            pm25: Some(site.pm25),
            risk_score: Some(site.risk_score as i64),
            color: Some(site.color.to_string()),
        }
    }
}

/// Aggregate statistics for one mine.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MineStats {
    // ---
    pub total_readings: i64,
    pub avg_ph: Option<f64>,
    pub min_ph: Option<f64>,
    pub max_ph: Option<f64>,
    pub avg_lead: Option<f64>,
    pub min_lead: Option<f64>,
    pub max_lead: Option<f64>,
    pub avg_pm25: Option<f64>,
    pub min_pm25: Option<f64>,
    pub max_pm25: Option<f64>,
}
