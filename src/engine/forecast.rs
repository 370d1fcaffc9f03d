//! Forward-looking estimates built on the aging model and risk scoring.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::risk;
use crate::models::Reading;

// ---

/// Minimum history length before a regression is attempted.
pub const MIN_FORECAST_POINTS: usize = 5;

/// Steps the fitted slope is extrapolated forward.
pub const FORECAST_HORIZON_STEPS: f64 = 365.0;

/// Largest change a forecast may apply to the current risk score.
pub const MAX_FORECAST_DELTA: f64 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    Ph,
    Lead,
    Pm25,
}

impl SensorKind {
    pub const ALL: [SensorKind; 3] = [SensorKind::Ph, SensorKind::Lead, SensorKind::Pm25];

    pub fn unit(self) -> &'static str {
        match self {
            SensorKind::Ph => "pH",
            SensorKind::Lead => "ppm",
            SensorKind::Pm25 => "µg/m³",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Falling,
    Rising,
    Steady,
}

impl Trend {
    pub fn arrow(self) -> &'static str {
        match self {
            Trend::Falling => "↘",
            Trend::Rising => "↗",
            Trend::Steady => "→",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OneYearPrediction {
    pub sensor: SensorKind,
    pub predicted_value: f64,
    pub change_amount: f64,
    pub trend: Trend,
    pub text: String,
}

/// Degradation multiplier: 1.0 at risk 0, 3.0 at risk 100.
pub fn instability(risk_score: u8) -> f64 {
    1.0 + f64::from(risk_score.min(100)) / 50.0
}

/// Project one sensor value a year ahead.
///
/// pH falls by `0.2 * instability`, lead rises by `5% * instability` of
/// its current value and PM2.5 by `5 * instability` units, each jittered
/// by ±10%. A non-finite `current` is returned unchanged.
pub fn predict_one_year<R: Rng + ?Sized>(
    current: f64,
    sensor: SensorKind,
    risk_score: u8,
    rng: &mut R,
) -> OneYearPrediction {
    // ---
    if !current.is_finite() {
        return prediction(sensor, current, 0.0, Trend::Steady);
    }

    let scale = instability(risk_score) * rng.gen_range(0.9..=1.1);
    let (delta, trend) = match sensor {
        SensorKind::Ph => (-0.2 * scale, Trend::Falling),
        SensorKind::Lead => (current.abs() * 0.05 * scale, Trend::Rising),
        SensorKind::Pm25 => (5.0 * scale, Trend::Rising),
    };
    let predicted = match sensor {
        SensorKind::Ph => round_to(current + delta, 1).max(0.0),
        SensorKind::Lead | SensorKind::Pm25 => round_to(current + delta, 0),
    };

    // change is reported from the unrounded delta
    prediction(sensor, predicted, round_to(delta.abs(), 1), trend)
}

fn prediction(sensor: SensorKind, predicted: f64, change: f64, trend: Trend) -> OneYearPrediction {
    OneYearPrediction {
        sensor,
        predicted_value: predicted,
        change_amount: change,
        trend,
        text: format!("{} {} {}", trend.arrow(), predicted, sensor.unit()),
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// Extrapolate the risk-score trend of `history` one horizon ahead.
///
/// Returns `current_risk` unchanged with fewer than five readings or when
/// the fit is degenerate. Otherwise the change is capped at ±15 before
/// the result is clamped to `[0, 100]`.
pub fn forecast_risk_score(history: &[Reading], current_risk: u8) -> u8 {
    // ---
    if history.len() < MIN_FORECAST_POINTS {
        return current_risk;
    }

    let scores: Vec<f64> = history
        .iter()
        .map(|r| f64::from(risk::risk_score(r.ph, r.lead, r.pm25)))
        .collect();

    let Some(slope) = least_squares_slope(&scores) else {
        tracing::debug!(
            points = scores.len(),
            "degenerate risk regression, keeping current score"
        );
        return current_risk;
    };

    let delta = (slope * FORECAST_HORIZON_STEPS).clamp(-MAX_FORECAST_DELTA, MAX_FORECAST_DELTA);
    (f64::from(current_risk) + delta).round().clamp(0.0, 100.0) as u8
}

/// Ordinary least-squares slope of `ys` against their index.
fn least_squares_slope(ys: &[f64]) -> Option<f64> {
    // ---
    let n = ys.len() as f64;
    if ys.len() < 2 {
        return None;
    }
    let x_mean = (n - 1.0) / 2.0;
    let y_mean = ys.iter().sum::<f64>() / n;

    let (mut ss_xy, mut ss_xx) = (0.0, 0.0);
    for (i, y) in ys.iter().enumerate() {
        let dx = i as f64 - x_mean;
        ss_xy += dx * (y - y_mean);
        ss_xx += dx * dx;
    }

    let slope = ss_xy / ss_xx;
    (ss_xx.abs() > 1e-12 && slope.is_finite()).then_some(slope)
}
