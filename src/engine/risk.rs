//! Composite ecological-risk scoring.
//!
//! Each raw metric is scaled against its own danger reference into a
//! sub-score in `[0, 100]`; the three sub-scores are averaged with equal
//! weight and rounded. Status and colour follow from the score alone.

use serde::{Deserialize, Serialize};

// ---

/// pH considered pristine; any drop below it adds risk.
pub const PH_NEUTRAL: f64 = 7.0;

/// Sub-score points per pH unit below neutral.
pub const PH_POINTS_PER_UNIT: f64 = 15.0;

/// Lead concentration (ppm) that maps to a full 100-point sub-score.
pub const LEAD_REFERENCE_PPM: f64 = 200.0;

/// PM2.5 concentration (µg/m³) that maps to a full 100-point sub-score.
pub const PM25_REFERENCE_UGM3: f64 = 100.0;

/// Discrete risk tier derived from the risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskStatus {
    LowRisk,
    Moderate,
    Critical,
}

impl RiskStatus {
    /// Display colour token for this tier.
    pub fn color(self) -> &'static str {
        match self {
            RiskStatus::LowRisk => "#4caf50",
            RiskStatus::Moderate => "#ff9800",
            RiskStatus::Critical => "#f44336",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RiskStatus::LowRisk => "LOW_RISK",
            RiskStatus::Moderate => "MODERATE",
            RiskStatus::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for RiskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Status band boundaries on the 0-100 risk scale.
///
/// `score < moderate` is low risk, `moderate <= score < critical` is
/// moderate, `score >= critical` is critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskThresholds {
    pub moderate: u8,
    pub critical: u8,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            moderate: 35,
            critical: 75,
        }
    }
}

impl RiskThresholds {
    pub fn status_for(&self, score: u8) -> RiskStatus {
        // ---
        if score >= self.critical {
            RiskStatus::Critical
        } else if score >= self.moderate {
            RiskStatus::Moderate
        } else {
            RiskStatus::LowRisk
        }
    }
}

/// Result of classifying one (pH, lead, PM2.5) triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub risk_score: u8,
    pub status: RiskStatus,
    pub color: &'static str,
}

/// Classify a reading using the default 35/75 thresholds.
pub fn classify(ph: f64, lead: f64, pm25: f64) -> Classification {
    classify_with(&RiskThresholds::default(), ph, lead, pm25)
}

/// Classify a reading against explicit thresholds.
pub fn classify_with(thresholds: &RiskThresholds, ph: f64, lead: f64, pm25: f64) -> Classification {
    // ---
    let risk_score = risk_score(ph, lead, pm25);
    let status = thresholds.status_for(risk_score);

    Classification {
        risk_score,
        status,
        color: status.color(),
    }
}

/// Composite risk score in `[0, 100]`.
///
/// A non-finite metric contributes a zero sub-score.
pub fn risk_score(ph: f64, lead: f64, pm25: f64) -> u8 {
    // ---
    let total = ph_sub_score(ph) + lead_sub_score(lead) + pm25_sub_score(pm25);
    (total / 3.0).round().clamp(0.0, 100.0) as u8
}

pub fn ph_sub_score(ph: f64) -> f64 {
    bounded_score((PH_NEUTRAL - ph) * PH_POINTS_PER_UNIT)
}

pub fn lead_sub_score(lead: f64) -> f64 {
    bounded_score(lead / LEAD_REFERENCE_PPM * 100.0)
}

pub fn pm25_sub_score(pm25: f64) -> f64 {
    bounded_score(pm25 / PM25_REFERENCE_UGM3 * 100.0)
}

fn bounded_score(raw: f64) -> f64 {
    if raw.is_finite() {
        raw.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

// ---

/// Per-metric hazard label shown next to a live reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HazardLevel {
    Safe,
    Warning,
    Hazardous,
}

pub fn ph_hazard(ph: f64) -> HazardLevel {
    if ph < 5.0 {
        HazardLevel::Hazardous
    } else if ph < 6.8 {
        HazardLevel::Warning
    } else {
        HazardLevel::Safe
    }
}

pub fn lead_hazard(lead: f64) -> HazardLevel {
    if lead > 70.0 {
        HazardLevel::Hazardous
    } else if lead > 40.0 {
        HazardLevel::Warning
    } else {
        HazardLevel::Safe
    }
}

pub fn pm25_hazard(pm25: f64) -> HazardLevel {
    if pm25 > 80.0 {
        HazardLevel::Hazardous
    } else if pm25 > 35.0 {
        HazardLevel::Warning
    } else {
        HazardLevel::Safe
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_pristine_baseline_is_low_risk() {
        // ---
        let c = classify(7.0, 20.0, 15.0);

        // pH 0 + lead 10 + pm25 15 averages to 8.33
        assert_eq!(c.risk_score, 8);
        assert_eq!(c.status, RiskStatus::LowRisk);
        assert_eq!(c.color, "#4caf50");
    }

    #[test]
    fn test_heavily_degraded_site_is_critical() {
        // ---
        let c = classify(3.0, 250.0, 200.0);

        assert!(c.risk_score >= 75, "score was {}", c.risk_score);
        assert_eq!(c.status, RiskStatus::Critical);
        assert_eq!(c.color, "#f44336");
    }

    #[test]
    fn test_threshold_edges() {
        // ---
        let t = RiskThresholds::default();
        assert_eq!(t.status_for(0), RiskStatus::LowRisk);
        assert_eq!(t.status_for(34), RiskStatus::LowRisk);
        assert_eq!(t.status_for(35), RiskStatus::Moderate);
        assert_eq!(t.status_for(74), RiskStatus::Moderate);
        assert_eq!(t.status_for(75), RiskStatus::Critical);
        assert_eq!(t.status_for(100), RiskStatus::Critical);
    }

    #[test]
    fn test_custom_thresholds() {
        // ---
        let t = RiskThresholds {
            moderate: 30,
            critical: 60,
        };
        // lead alone at 200 ppm gives 100/3 = 33
        let c = classify_with(&t, 7.0, 200.0, 0.0);
        assert_eq!(c.risk_score, 33);
        assert_eq!(c.status, RiskStatus::Moderate);
    }

    #[test]
    fn test_score_bounded_across_grid() {
        // ---
        for ph in [2.0, 4.5, 7.0, 10.0] {
            for lead in [0.0, 50.0, 150.0, 300.0] {
                for pm25 in [0.0, 60.0, 200.0] {
                    let a = classify(ph, lead, pm25);
                    let b = classify(ph, lead, pm25);
                    assert!(a.risk_score <= 100);
                    assert_eq!(a, b);
                    assert_eq!(a.status, RiskThresholds::default().status_for(a.risk_score));
                }
            }
        }
    }

    #[test]
    fn test_alkaline_ph_adds_no_risk() {
        // ---
        assert_eq!(ph_sub_score(9.5), 0.0);
        assert_eq!(ph_sub_score(2.0), 75.0);
    }

    #[test]
    fn test_non_finite_metric_scores_zero() {
        // ---
        assert_eq!(risk_score(f64::NAN, 0.0, 0.0), 0);
        assert_eq!(lead_sub_score(f64::INFINITY), 0.0);
    }

    #[test]
    fn test_hazard_labels() {
        // ---
        assert_eq!(ph_hazard(7.2), HazardLevel::Safe);
        assert_eq!(ph_hazard(6.0), HazardLevel::Warning);
        assert_eq!(ph_hazard(4.9), HazardLevel::Hazardous);
        assert_eq!(lead_hazard(40.0), HazardLevel::Safe);
        assert_eq!(lead_hazard(55.0), HazardLevel::Warning);
        assert_eq!(lead_hazard(71.0), HazardLevel::Hazardous);
        assert_eq!(pm25_hazard(20.0), HazardLevel::Safe);
        assert_eq!(pm25_hazard(50.0), HazardLevel::Warning);
        assert_eq!(pm25_hazard(81.0), HazardLevel::Hazardous);
    }
}
