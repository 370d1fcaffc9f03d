//! The simulation's single writer.
//!
//! [`TelemetryScheduler`] owns every live [`Site`], the simulated clock and
//! the reading history. It does no timing of its own: callers drive it with
//! [`TelemetryScheduler::advance_clock`] and
//! [`TelemetryScheduler::sample_sensors`] (or the combined
//! [`TelemetryScheduler::tick`]), which keeps tests free of real timers.

use std::collections::HashMap;

use chrono::{Days, Local, NaiveDate};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use super::aging::{Metrics, NoiseProfile, SensorBounds};
use super::forecast::{self, OneYearPrediction, SensorKind};
use super::history::{BackfillPlan, HistoryMode, HistoryStore};
use super::risk::RiskThresholds;
use super::seed::{self, InitialAgeSampling};
use crate::models::{Reading, Site, SiteRecord};

// ---

/// Source of "today" for the human-readable simulation date.
pub trait Calendar: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// The host's local date.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCalendar;

impl Calendar for SystemCalendar {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// A fixed start date, for tests and replays.
#[derive(Debug, Clone, Copy)]
pub struct FixedCalendar(pub NaiveDate);

impl Calendar for FixedCalendar {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// Tunables for the simulation engine.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    // ---
    pub thresholds: RiskThresholds,
    pub bounds: SensorBounds,
    pub tick_noise: NoiseProfile,
    pub initial_sampling: InitialAgeSampling,
    pub history_mode: HistoryMode,
    pub history_capacity: usize,
    /// Readings synthesized when a site is first inspected in lazy mode.
    pub backfill_readings: usize,
    /// Clock ticks (simulated days) between sensor samples.
    pub sensor_every_ticks: u64,
    /// Fixed RNG seed; entropy when `None`.
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            thresholds: RiskThresholds::default(),
            bounds: SensorBounds::default(),
            tick_noise: NoiseProfile::TICK,
            initial_sampling: InitialAgeSampling::RandomUniform,
            history_mode: HistoryMode::Eager,
            history_capacity: 30,
            backfill_readings: 20,
            sensor_every_ticks: 7,
            seed: None,
        }
    }
}

/// A complete, post-tick view of the simulation.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub elapsed_days: u64,
    pub display_date: String,
    pub sensor_ticks: u64,
    pub sites: Vec<Site>,
}

impl Snapshot {
    pub fn site(&self, id: u32) -> Option<&Site> {
        self.sites.iter().find(|s| s.id == id)
    }

    /// Sites whose name, location or county contains `query`, ignoring case.
    pub fn search(&self, query: &str) -> Vec<Site> {
        // ---
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        self.sites
            .iter()
            .filter(|s| s.matches(&needle))
            .cloned()
            .collect()
    }
}

/// What a combined [`TelemetryScheduler::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    pub elapsed_days: u64,
    pub sampled: bool,
}

/// One-year outlook for a single site.
#[derive(Debug, Clone, Serialize)]
pub struct SiteForecast {
    pub site_id: u32,
    #[serde(rename = "riskScore")]
    pub risk_score: u8,
    pub forecast_risk_score: u8,
    pub history_points: usize,
    pub predictions: Vec<OneYearPrediction>,
}

pub struct TelemetryScheduler {
    config: SimulationConfig,
    sites: Vec<Site>,
    index: HashMap<u32, usize>,
    elapsed_days: u64,
    sensor_ticks: u64,
    history: HistoryStore,
    rng: StdRng,
    calendar: Box<dyn Calendar>,
}

impl TelemetryScheduler {
    /// Seed one site per record and start the clock at day zero.
    pub fn new(
        records: Vec<SiteRecord>,
        config: SimulationConfig,
        calendar: Box<dyn Calendar>,
    ) -> Self {
        // ---
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let sites: Vec<Site> = records
            .into_iter()
            .map(|record| {
                seed::initialize_site(
                    record,
                    config.initial_sampling,
                    &config.bounds,
                    &config.thresholds,
                    &mut rng,
                )
            })
            .collect();

        tracing::info!(
            sites = sites.len(),
            sampling = ?config.initial_sampling,
            history = ?config.history_mode,
            "telemetry scheduler initialized"
        );

        let index = sites.iter().enumerate().map(|(i, s)| (s.id, i)).collect();
        Self {
            history: HistoryStore::new(config.history_capacity),
            config,
            sites,
            index,
            elapsed_days: 0,
            sensor_ticks: 0,
            rng,
            calendar,
        }
    }

    pub fn elapsed_days(&self) -> u64 {
        self.elapsed_days
    }

    pub fn sensor_ticks(&self) -> u64 {
        self.sensor_ticks
    }

    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    pub fn site(&self, id: u32) -> Option<&Site> {
        self.index.get(&id).map(|&i| &self.sites[i])
    }

    /// `today + elapsed_days`, e.g. `Oct 19, 2026`.
    pub fn display_date(&self) -> String {
        self.calendar
            .today()
            .checked_add_days(Days::new(self.elapsed_days))
            .map(|d| d.format("%b %-d, %Y").to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Clock tick: advance simulated time by one day.
    pub fn advance_clock(&mut self) -> u64 {
        self.elapsed_days += 1;
        tracing::trace!(elapsed_days = self.elapsed_days, "clock tick");
        self.elapsed_days
    }

    /// Sensor tick: recompute every site at the current simulated day.
    ///
    /// Non-finite intermediate values keep the site's previous reading.
    pub fn sample_sensors(&mut self) {
        // ---
        let t = self.elapsed_days as f64;
        let trend = Metrics::trend_at(t);
        let track_all = self.config.history_mode == HistoryMode::Eager;

        for site in &mut self.sites {
            let noisy = self.config.tick_noise.apply(trend, &mut self.rng);
            let settled = self.config.bounds.settle(noisy, site.metrics());
            site.set_metrics(settled, &self.config.thresholds);

            if track_all || self.history.is_tracked(site.id) {
                self.history
                    .append(site.id, Reading::from_metrics(self.elapsed_days, settled));
            }
        }

        self.sensor_ticks += 1;
        tracing::debug!(
            elapsed_days = self.elapsed_days,
            sensor_ticks = self.sensor_ticks,
            sites = self.sites.len(),
            "sensor tick"
        );
    }

    /// Advance the clock and sample sensors every `sensor_every_ticks` days.
    pub fn tick(&mut self) -> TickOutcome {
        // ---
        let elapsed_days = self.advance_clock();
        let every = self.config.sensor_every_ticks.max(1);
        let sampled = elapsed_days % every == 0;
        if sampled {
            self.sample_sensors();
        }
        TickOutcome {
            elapsed_days,
            sampled,
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            elapsed_days: self.elapsed_days,
            display_date: self.display_date(),
            sensor_ticks: self.sensor_ticks,
            sites: self.sites.clone(),
        }
    }

    /// History of a site being inspected, oldest first.
    ///
    /// In lazy mode the first inspection backfills from the aging model and
    /// appends the current reading, and the site is tracked from then on.
    /// Returns `None` for unknown sites.
    pub fn inspect(&mut self, id: u32) -> Option<Vec<Reading>> {
        // ---
        let current = self.site(id)?.metrics();

        if self.config.history_mode == HistoryMode::Lazy && !self.history.is_tracked(id) {
            let plan = BackfillPlan {
                interval_days: self.config.sensor_every_ticks,
                count: self.config.backfill_readings,
                noise: self.config.tick_noise,
                bounds: self.config.bounds,
            };
            self.history
                .backfill(id, self.elapsed_days, &plan, current, &mut self.rng);
            self.history
                .append(id, Reading::from_metrics(self.elapsed_days, current));
            tracing::debug!(
                site_id = id,
                elapsed_days = self.elapsed_days,
                "backfilled history"
            );
        }

        Some(self.history.get(id))
    }

    /// Stop tracking history for a site.
    pub fn release(&mut self, id: u32) {
        self.history.clear(id);
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Per-sensor one-year predictions plus the regression risk forecast.
    pub fn forecast(&mut self, id: u32) -> Option<SiteForecast> {
        // ---
        let history = self.inspect(id)?;
        let site = self.site(id)?.clone();

        let predictions = SensorKind::ALL
            .iter()
            .map(|&kind| {
                let value = match kind {
                    SensorKind::Ph => site.ph(),
                    SensorKind::Lead => site.lead(),
                    SensorKind::Pm25 => site.pm25(),
                };
                forecast::predict_one_year(value, kind, site.risk_score(), &mut self.rng)
            })
            .collect();

        Some(SiteForecast {
            site_id: id,
            risk_score: site.risk_score(),
            forecast_risk_score: forecast::forecast_risk_score(&history, site.risk_score()),
            history_points: history.len(),
            predictions,
        })
    }
}
