//! Deterministic degradation trends for a mine site's environment.
//!
//! Trend functions take elapsed simulated days and return pre-noise,
//! pre-clamp values. Callers add noise from a [`NoiseProfile`] and clamp
//! with [`SensorBounds`] before storing anything.

use rand::Rng;
use serde::{Deserialize, Serialize};

// ---

pub const BASE_PH: f64 = 7.0;
pub const BASE_LEAD_PPM: f64 = 20.0;
pub const BASE_PM25_UGM3: f64 = 15.0;

/// Water acidification saturating from 7.0 toward 5.0.
pub fn ph_trend(t: f64) -> f64 {
    BASE_PH - 2.0 * (1.0 - (-t / 50.0).exp())
}

/// Unbounded exponential soil-lead accumulation.
pub fn lead_trend(t: f64) -> f64 {
    BASE_LEAD_PPM * (t / 100.0).exp()
}

/// Slow logarithmic growth of airborne particulates.
pub fn pm25_trend(t: f64) -> f64 {
    BASE_PM25_UGM3 + 8.0 * (1.0 + t / 5.0).ln()
}

/// Raw (pH, lead, PM2.5) triple before or after clamping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub ph: f64,
    pub lead: f64,
    pub pm25: f64,
}

impl Metrics {
    /// All three trend values at day `t`.
    pub fn trend_at(t: f64) -> Self {
        Self {
            ph: ph_trend(t),
            lead: lead_trend(t),
            pm25: pm25_trend(t),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.ph.is_finite() && self.lead.is_finite() && self.pm25.is_finite()
    }
}

/// Half-widths of the uniform jitter added per metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseProfile {
    pub ph: f64,
    pub lead: f64,
    pub pm25: f64,
}

impl NoiseProfile {
    /// Jitter applied on every sensor tick.
    pub const TICK: NoiseProfile = NoiseProfile {
        ph: 0.2,
        lead: 4.0,
        pm25: 3.0,
    };

    /// Doubled jitter used once when a site is first seeded.
    pub const INITIAL: NoiseProfile = NoiseProfile {
        ph: 0.4,
        lead: 8.0,
        pm25: 6.0,
    };

    /// Add independent uniform noise in `[-width, width]` to each metric.
    pub fn apply<R: Rng + ?Sized>(&self, metrics: Metrics, rng: &mut R) -> Metrics {
        // ---
        Metrics {
            ph: metrics.ph + jitter(rng, self.ph),
            lead: metrics.lead + jitter(rng, self.lead),
            pm25: metrics.pm25 + jitter(rng, self.pm25),
        }
    }
}

fn jitter<R: Rng + ?Sized>(rng: &mut R, width: f64) -> f64 {
    if width > 0.0 {
        rng.gen_range(-width..=width)
    } else {
        0.0
    }
}

/// Physical limits a stored reading must respect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorBounds {
    pub ph: (f64, f64),
    pub lead: (f64, f64),
    pub pm25: (f64, f64),
}

impl Default for SensorBounds {
    fn default() -> Self {
        Self {
            ph: (2.0, 10.0),
            lead: (0.0, 300.0),
            pm25: (0.0, 200.0),
        }
    }
}

impl SensorBounds {
    /// Round to display precision then clamp into bounds.
    ///
    /// Any non-finite metric is replaced by the matching value of
    /// `previous`, which must already be in bounds.
    pub fn settle(&self, raw: Metrics, previous: Metrics) -> Metrics {
        // ---
        Metrics {
            ph: settle_one("ph", raw.ph, 100.0, self.ph, previous.ph),
            lead: settle_one("lead", raw.lead, 10.0, self.lead, previous.lead),
            pm25: settle_one("pm25", raw.pm25, 10.0, self.pm25, previous.pm25),
        }
    }

    pub fn contains(&self, m: &Metrics) -> bool {
        within(m.ph, self.ph) && within(m.lead, self.lead) && within(m.pm25, self.pm25)
    }
}

fn settle_one(
    metric: &'static str,
    value: f64,
    scale: f64,
    (lo, hi): (f64, f64),
    fallback: f64,
) -> f64 {
    if value.is_finite() {
        ((value * scale).round() / scale).clamp(lo, hi)
    } else {
        tracing::debug!(
            metric,
            raw = value,
            kept = fallback,
            "non-finite reading, keeping previous"
        );
        fallback
    }
}

fn within(v: f64, (lo, hi): (f64, f64)) -> bool {
    v >= lo && v <= hi
}
