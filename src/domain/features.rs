//! Model feature schemas.
//!
//! Two fixed schemas exist and must never be reordered:
//!
//! - [`FeatureVector`] (risk classifier): age_months, sex_encoded, height_cm,
//!   weight_kg, bmi, z_weight, z_height
//! - [`TrajectoryFeatures`] (growth regressor): age_months, sex_encoded,
//!   height_cm, weight_kg

use serde::{Deserialize, Serialize};

use super::{Measurement, Metric, Sex, StandardScoreCalculator};
use crate::GrowthError;

/// Feature names of the risk classifier schema, in model column order.
pub const FEATURE_NAMES: [&str; 7] = [
    "age_months",
    "sex_encoded",
    "height_cm",
    "weight_kg",
    "bmi",
    "z_weight",
    "z_height",
];

/// Feature names of the growth regressor schema, in model column order.
pub const TRAJECTORY_FEATURE_NAMES: [&str; 4] = ["age_months", "sex_encoded", "height_cm", "weight_kg"];

/// Body-mass index in kg/m².
#[must_use]
pub fn bmi(height_cm: f64, weight_kg: f64) -> f64 {
    let height_m = height_cm / 100.0;
    weight_kg / (height_m * height_m)
}

/// Input row for the risk classifier.
///
/// Field order is the trained schema; see [`FEATURE_NAMES`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub age_months: f64,
    pub sex_encoded: f64,
    pub height_cm: f64,
    pub weight_kg: f64,
    pub bmi: f64,
    pub z_weight: f64,
    pub z_height: f64,
}

impl FeatureVector {
    /// Convert features to a row in model column order.
    #[must_use]
    pub fn to_array(&self) -> [f64; 7] {
        [
            self.age_months,
            self.sex_encoded,
            self.height_cm,
            self.weight_kg,
            self.bmi,
            self.z_weight,
            self.z_height,
        ]
    }

    /// (name, value) pairs in schema order.
    pub fn named(&self) -> impl Iterator<Item = (&'static str, f64)> {
        FEATURE_NAMES.into_iter().zip(self.to_array())
    }
}

/// Input row for the growth regressor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryFeatures {
    pub age_months: f64,
    pub sex_encoded: f64,
    pub height_cm: f64,
    pub weight_kg: f64,
}

impl TrajectoryFeatures {
    #[must_use]
    pub fn new(age_months: u32, sex: Sex, height_cm: f64, weight_kg: f64) -> Self {
        Self {
            age_months: f64::from(age_months),
            sex_encoded: sex.encoded(),
            height_cm,
            weight_kg,
        }
    }

    #[must_use]
    pub fn to_array(&self) -> [f64; 4] {
        [self.age_months, self.sex_encoded, self.height_cm, self.weight_kg]
    }
}

/// Resolved value and score for one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ResolvedAxis {
    value: f64,
    z: f64,
}

/// Assembles classifier rows from measurements.
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    calculator: StandardScoreCalculator,
}

impl FeatureBuilder {
    #[must_use]
    pub fn new(calculator: StandardScoreCalculator) -> Self {
        Self { calculator }
    }

    #[must_use]
    pub fn calculator(&self) -> &StandardScoreCalculator {
        &self.calculator
    }

    /// Build the classifier row for a measurement.
    ///
    /// Per axis: a raw measurement is standardized; otherwise a supplied
    /// score is used and the raw value recovered from it at the same band.
    /// BMI is always derived from the resolved height and weight.
    ///
    /// # Errors
    /// - `GrowthError::Domain` for out-of-domain values or ages
    /// - `GrowthError::IncompleteInput` when an axis has neither a raw value
    ///   nor a score
    pub fn build(&self, measurement: &Measurement) -> crate::Result<FeatureVector> {
        measurement.validate()?;

        let height = self.resolve(measurement, Metric::Height)?;
        let weight = self.resolve(measurement, Metric::Weight)?;

        let features = FeatureVector {
            age_months: f64::from(measurement.age_months),
            sex_encoded: measurement.sex.encoded(),
            height_cm: height.value,
            weight_kg: weight.value,
            bmi: bmi(height.value, weight.value),
            z_weight: weight.z,
            z_height: height.z,
        };

        tracing::debug!(
            "Built feature vector: z_height={:.3}, z_weight={:.3}, bmi={:.2}",
            features.z_height,
            features.z_weight,
            features.bmi
        );

        Ok(features)
    }

    fn resolve(&self, m: &Measurement, metric: Metric) -> crate::Result<ResolvedAxis> {
        match (m.raw(metric), m.supplied_score(metric)) {
            (Some(value), _) => {
                let z = self
                    .calculator
                    .standardize(value, m.age_months, m.sex, metric)?;
                Ok(ResolvedAxis { value, z })
            }
            (None, Some(z)) => {
                let value = self.calculator.value_at(z, m.age_months, m.sex, metric)?;
                Ok(ResolvedAxis { value, z })
            }
            (None, None) => Err(GrowthError::IncompleteInput { axis: metric }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ReferenceTable;
    use std::sync::Arc;

    fn builder() -> FeatureBuilder {
        FeatureBuilder::new(StandardScoreCalculator::new(Arc::new(ReferenceTable::who())))
    }

    #[test]
    fn test_schema_order() {
        let features = FeatureVector {
            age_months: 1.0,
            sex_encoded: 2.0,
            height_cm: 3.0,
            weight_kg: 4.0,
            bmi: 5.0,
            z_weight: 6.0,
            z_height: 7.0,
        };
        assert_eq!(features.to_array(), [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);

        let names: Vec<_> = features.named().map(|(n, _)| n).collect();
        assert_eq!(names, FEATURE_NAMES);
    }

    #[test]
    fn test_build_from_raw() {
        let features = builder()
            .build(&Measurement::with_raw(12, Sex::Male, 75.5, 9.8))
            .expect("should build");

        assert_eq!(features.age_months, 12.0);
        assert_eq!(features.sex_encoded, 1.0);
        assert!((features.bmi - 9.8 / (0.755 * 0.755)).abs() < 1e-9);
        assert!((features.z_height - (-0.0714)).abs() < 1e-3);
        assert!((features.z_weight - 0.0665).abs() < 1e-3);
    }

    #[test]
    fn test_raw_value_wins_over_supplied_score() {
        let m = Measurement::with_raw(12, Sex::Male, 75.5, 9.8).z_weight(-2.5);
        let features = builder().build(&m).expect("should build");
        assert!(features.z_weight > 0.0);
    }

    #[test]
    fn test_supplied_score_resolves_raw_value() {
        let m = Measurement::new(12, Sex::Female).height(74.0).z_weight(0.0);
        let features = builder().build(&m).expect("should build");

        assert_eq!(features.sex_encoded, 0.0);
        assert_eq!(features.z_weight, 0.0);
        // Score 0 maps back to the band median.
        assert!((features.weight_kg - 8.875).abs() < 1e-9);
        assert!(features.z_height.abs() < 1e-12);
    }

    #[test]
    fn test_missing_axis_is_incomplete() {
        let m = Measurement::new(12, Sex::Male).height(75.0);
        let err = builder().build(&m).unwrap_err();
        assert!(matches!(
            err,
            GrowthError::IncompleteInput { axis: Metric::Weight }
        ));
        assert_eq!(err.kind(), "incomplete_input");
    }

    #[test]
    fn test_out_of_range_age_is_domain_error() {
        let m = Measurement::with_raw(72, Sex::Male, 110.0, 19.0);
        let err = builder().build(&m).unwrap_err();
        assert_eq!(err.kind(), "domain_error");
    }

    #[test]
    fn test_trajectory_schema() {
        let f = TrajectoryFeatures::new(24, Sex::Female, 86.0, 11.5);
        assert_eq!(f.to_array(), [24.0, 0.0, 86.0, 11.5]);
        assert_eq!(TRAJECTORY_FEATURE_NAMES.len(), 4);
    }
}
