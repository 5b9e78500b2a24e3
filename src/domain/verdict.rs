//! Risk verdict and trajectory result types.

use serde::{Deserialize, Serialize};

use super::{ReferenceEntry, Sex};

/// User-facing risk category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskCategory {
    Normal,
    Underweight,
    Stunted,
    Overweight,
}

impl RiskCategory {
    /// Collapse a model label onto the four categories.
    ///
    /// Substring precedence: "stunt", then "under", then "over"/"obese";
    /// anything else is normal. Matching is case-insensitive.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        let label = label.to_ascii_lowercase();
        if label.contains("stunt") {
            Self::Stunted
        } else if label.contains("under") {
            Self::Underweight
        } else if label.contains("over") || label.contains("obese") {
            Self::Overweight
        } else {
            Self::Normal
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Underweight => "underweight",
            Self::Stunted => "stunted",
            Self::Overweight => "overweight",
        }
    }
}

impl std::fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of risk classification for one measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskVerdict {
    pub risk_category: RiskCategory,

    /// Highest class probability (0.0 to 1.0)
    pub confidence: f64,

    /// Low confidence or an extreme score
    pub is_anomaly: bool,
}

impl RiskVerdict {
    /// One-line human-readable description.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Predicted {} with {:.1}% confidence{}",
            self.risk_category,
            self.confidence * 100.0,
            if self.is_anomaly { " (anomaly detected)" } else { "" }
        )
    }
}

/// Status of a projected measurement relative to its reference band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrowthStatus {
    Low,
    Normal,
    High,
    /// No reference data for the projected age
    Unknown,
}

impl GrowthStatus {
    /// `|z| <= limit` is normal, below is low, above is high.
    #[must_use]
    pub fn from_score(z: f64, limit: f64) -> Self {
        if z.abs() <= limit {
            Self::Normal
        } else if z < -limit {
            Self::Low
        } else {
            Self::High
        }
    }
}

impl std::fmt::Display for GrowthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Normal => write!(f, "normal"),
            Self::High => write!(f, "high"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Five fixed curves at median ±1 and ±2 SD.
///
/// Labels follow the normal-distribution percentiles of those offsets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentileCurves {
    #[serde(rename = "p2.3")]
    pub p2_3: f64,
    #[serde(rename = "p15.9")]
    pub p15_9: f64,
    #[serde(rename = "p50")]
    pub median: f64,
    #[serde(rename = "p84.1")]
    pub p84_1: f64,
    #[serde(rename = "p97.7")]
    pub p97_7: f64,
}

impl PercentileCurves {
    /// SD offsets of the five curves, lowest first.
    pub const OFFSETS: [f64; 5] = [-2.0, -1.0, 0.0, 1.0, 2.0];

    /// Curves for one reference band, `median + k * SD`.
    #[must_use]
    pub fn from_entry(entry: &ReferenceEntry) -> Self {
        let [p2_3, p15_9, median, p84_1, p97_7] =
            Self::OFFSETS.map(|k| entry.m + k * entry.sd());
        Self {
            p2_3,
            p15_9,
            median,
            p84_1,
            p97_7,
        }
    }

    #[must_use]
    pub fn to_array(&self) -> [f64; 5] {
        [self.p2_3, self.p15_9, self.median, self.p84_1, self.p97_7]
    }
}

/// Chart row for one age band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentileBand {
    pub age_months: u32,
    pub height: PercentileCurves,
    pub weight: PercentileCurves,
}

/// A plotted (age, height, weight) point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GrowthPoint {
    pub age_months: u32,
    pub height_cm: f64,
    pub weight_kg: f64,
}

/// Next-period projection with its re-standardized classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryProjection {
    pub sex: Sex,
    pub next_age_months: u32,
    pub predicted_height_cm: f64,
    pub predicted_weight_kg: f64,
    pub height_z: Option<f64>,
    pub weight_z: Option<f64>,
    pub height_status: GrowthStatus,
    pub weight_status: GrowthStatus,

    /// Measurement the projection started from
    pub current: GrowthPoint,

    /// Projected point at `next_age_months`
    pub predicted: GrowthPoint,

    /// Empty unless chart data was requested
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub percentile_bands: Vec<PercentileBand>,
}

impl TrajectoryProjection {
    /// True if either axis could not be classified.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.height_status == GrowthStatus::Unknown || self.weight_status == GrowthStatus::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_normalization() {
        assert_eq!(RiskCategory::from_label("severely_underweight"), RiskCategory::Underweight);
        assert_eq!(RiskCategory::from_label("severely_stunted"), RiskCategory::Stunted);
        assert_eq!(RiskCategory::from_label("severely_overweight"), RiskCategory::Overweight);
        assert_eq!(RiskCategory::from_label("Obese"), RiskCategory::Overweight);
        assert_eq!(RiskCategory::from_label("healthy"), RiskCategory::Normal);
    }

    #[test]
    fn test_stunt_has_priority() {
        assert_eq!(RiskCategory::from_label("stunted_underweight"), RiskCategory::Stunted);
        assert_eq!(RiskCategory::from_label("underweight_and_stunted"), RiskCategory::Stunted);
        // "under" outranks "over" when both appear.
        assert_eq!(RiskCategory::from_label("under_over"), RiskCategory::Underweight);
    }

    #[test]
    fn test_normalization_is_idempotent() {
        for category in [
            RiskCategory::Normal,
            RiskCategory::Underweight,
            RiskCategory::Stunted,
            RiskCategory::Overweight,
        ] {
            assert_eq!(RiskCategory::from_label(category.as_str()), category);
        }
    }

    #[test]
    fn test_growth_status() {
        assert_eq!(GrowthStatus::from_score(-2.0, 2.0), GrowthStatus::Normal);
        assert_eq!(GrowthStatus::from_score(2.0, 2.0), GrowthStatus::Normal);
        assert_eq!(GrowthStatus::from_score(-2.01, 2.0), GrowthStatus::Low);
        assert_eq!(GrowthStatus::from_score(2.5, 2.0), GrowthStatus::High);
    }

    #[test]
    fn test_percentile_curves() {
        let entry = ReferenceEntry::new(12, 1.0, 75.0, 0.04);
        let curves = PercentileCurves::from_entry(&entry);
        assert_eq!(curves.median, 75.0);
        assert!((curves.p84_1 - 78.0).abs() < 1e-9);
        assert!((curves.p2_3 - 69.0).abs() < 1e-9);

        let values = curves.to_array();
        assert!(values.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_percentile_labels_serialize() {
        let curves = PercentileCurves::from_entry(&ReferenceEntry::new(0, 1.0, 50.0, 0.04));
        let json = serde_json::to_value(curves).expect("serialize");
        assert!(json.get("p2.3").is_some());
        assert!(json.get("p97.7").is_some());
    }

    #[test]
    fn test_verdict_summary() {
        let verdict = RiskVerdict {
            risk_category: RiskCategory::Underweight,
            confidence: 0.55,
            is_anomaly: true,
        };
        assert_eq!(
            verdict.summary(),
            "Predicted underweight with 55.0% confidence (anomaly detected)"
        );
    }
}
