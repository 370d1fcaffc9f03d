//! Telemetry simulation and risk-scoring engine.
//!
//! Everything in here is synchronous arithmetic except [`runtime`], which
//! drives the scheduler from tokio timers.

pub mod aging;
pub mod forecast;
pub mod history;
pub mod risk;
pub mod runtime;
pub mod scheduler;
pub mod seed;

pub use forecast::{forecast_risk_score, predict_one_year, OneYearPrediction, SensorKind, Trend};
pub use history::{BackfillPlan, HistoryMode, HistoryStore};
pub use risk::{classify, classify_with, Classification, RiskStatus, RiskThresholds};
pub use runtime::{TelemetryHandle, TelemetryRuntime, TickTiming};
pub use scheduler::{
    Calendar, FixedCalendar, SimulationConfig, SiteForecast, Snapshot, SystemCalendar,
    TelemetryScheduler,
};
pub use seed::InitialAgeSampling;
