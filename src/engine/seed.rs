//! Initial state for newly ingested sites.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::aging::{Metrics, NoiseProfile, SensorBounds};
use super::risk::RiskThresholds;
use crate::models::{Site, SiteRecord};

// ---

/// Upper bound (exclusive) of the random pseudo-age, in days.
pub const MAX_INITIAL_AGE_DAYS: f64 = 400.0;

/// How a new site's pseudo-age is chosen before applying the aging model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InitialAgeSampling {
    /// Uniform over `[0, 400)` days, so sites start at different stages.
    #[serde(rename = "random-uniform-0-400")]
    RandomUniform,
    /// Every site starts at day zero.
    #[serde(rename = "zero")]
    Zero,
}

impl InitialAgeSampling {
    pub fn sample<R: Rng + ?Sized>(self, rng: &mut R) -> f64 {
        match self {
            InitialAgeSampling::RandomUniform => rng.gen_range(0.0..MAX_INITIAL_AGE_DAYS),
            InitialAgeSampling::Zero => 0.0,
        }
    }
}

impl std::str::FromStr for InitialAgeSampling {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "random-uniform-0-400" | "random" => Ok(InitialAgeSampling::RandomUniform),
            "zero" => Ok(InitialAgeSampling::Zero),
            other => Err(format!("unknown initial age sampling '{}'", other)),
        }
    }
}

/// Build the initial live state for one feed record.
///
/// Readings are always inside `bounds`; an age that would produce a
/// non-finite trend falls back to the day-zero baseline.
pub fn initialize_site<R: Rng + ?Sized>(
    record: SiteRecord,
    sampling: InitialAgeSampling,
    bounds: &SensorBounds,
    thresholds: &RiskThresholds,
    rng: &mut R,
) -> Site {
    // ---
    let age = sampling.sample(rng);
    let baseline = Metrics::trend_at(0.0);
    let noisy = NoiseProfile::INITIAL.apply(Metrics::trend_at(age), rng);
    let metrics = bounds.settle(noisy, baseline);

    tracing::trace!(
        site_id = record.id,
        age_days = age,
        ph = metrics.ph,
        lead = metrics.lead,
        pm25 = metrics.pm25,
        "seeded site"
    );

    Site::new(record, age, metrics, thresholds)
}
