//! Trajectory projection: next-month growth and percentile chart data.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::domain::{
    DomainError, GrowthPoint, GrowthStatus, Measurement, Metric, PercentileBand, PercentileCurves,
    ReferenceTable, Sex, StandardScoreCalculator, TrajectoryFeatures, TrajectoryProjection,
};
use crate::ports::GrowthRegressor;
use crate::{GrowthError, Result};

/// Projects the next period's measurements with a trained regressor and
/// re-standardizes them against the next age band.
#[derive(Clone)]
pub struct TrajectoryPredictor {
    calculator: StandardScoreCalculator,
    regressor: Arc<dyn GrowthRegressor>,
    status_z_limit: f64,
}

impl std::fmt::Debug for TrajectoryPredictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrajectoryPredictor")
            .field("regressor", &self.regressor.name())
            .field("status_z_limit", &self.status_z_limit)
            .finish_non_exhaustive()
    }
}

impl TrajectoryPredictor {
    #[must_use]
    pub fn new(
        calculator: StandardScoreCalculator,
        regressor: Arc<dyn GrowthRegressor>,
        status_z_limit: f64,
    ) -> Self {
        Self {
            calculator,
            regressor,
            status_z_limit,
        }
    }

    /// Project one month ahead.
    ///
    /// Classification of each axis degrades to `unknown` independently when
    /// the reference table has no band for the next age; the projected
    /// values are always returned.
    ///
    /// # Errors
    /// - `Domain` for invalid measurements
    /// - `IncompleteInput` if an axis has neither a value nor a score
    /// - `ModelUnavailable` if the regressor fails or yields a non-positive
    ///   or non-finite measurement
    pub fn project(
        &self,
        measurement: &Measurement,
        include_bands: bool,
    ) -> Result<TrajectoryProjection> {
        measurement.validate()?;
        let (age, sex) = (measurement.age_months, measurement.sex);
        let height_cm = self.resolve_raw(measurement, Metric::Height)?;
        let weight_kg = self.resolve_raw(measurement, Metric::Weight)?;

        let prediction = self
            .regressor
            .predict(&TrajectoryFeatures::new(age, sex, height_cm, weight_kg))?;
        for (metric, value) in [
            (Metric::Height, prediction.height_cm),
            (Metric::Weight, prediction.weight_kg),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(GrowthError::ModelUnavailable(format!(
                    "{} predicted an invalid {metric}: {value}",
                    self.regressor.name()
                )));
            }
        }

        let next_age_months = age + 1;
        let (height_z, height_status) =
            self.classify_axis(prediction.height_cm, next_age_months, sex, Metric::Height)?;
        let (weight_z, weight_status) =
            self.classify_axis(prediction.weight_kg, next_age_months, sex, Metric::Weight)?;

        let percentile_bands = if include_bands {
            self.reference_series(sex)?
        } else {
            Vec::new()
        };

        Ok(TrajectoryProjection {
            sex,
            next_age_months,
            predicted_height_cm: prediction.height_cm,
            predicted_weight_kg: prediction.weight_kg,
            height_z,
            weight_z,
            height_status,
            weight_status,
            current: GrowthPoint {
                age_months: age,
                height_cm,
                weight_kg,
            },
            predicted: GrowthPoint {
                age_months: next_age_months,
                height_cm: prediction.height_cm,
                weight_kg: prediction.weight_kg,
            },
            percentile_bands,
        })
    }

    /// Percentile chart series for `sex`.
    ///
    /// # Errors
    /// See [`percentile_series`].
    pub fn reference_series(&self, sex: Sex) -> Result<Vec<PercentileBand>> {
        percentile_series(self.calculator.table(), sex)
    }

    fn resolve_raw(&self, m: &Measurement, metric: Metric) -> Result<f64> {
        match (m.raw(metric), m.supplied_score(metric)) {
            (Some(value), _) => Ok(value),
            (None, Some(z)) => Ok(self.calculator.value_at(z, m.age_months, m.sex, metric)?),
            (None, None) => Err(GrowthError::IncompleteInput { axis: metric }),
        }
    }

    fn classify_axis(
        &self,
        value: f64,
        age_months: u32,
        sex: Sex,
        metric: Metric,
    ) -> Result<(Option<f64>, GrowthStatus)> {
        match self.calculator.standardize(value, age_months, sex, metric) {
            Ok(z) => Ok((Some(z), GrowthStatus::from_score(z, self.status_z_limit))),
            Err(e @ (DomainError::AgeOutOfRange { .. } | DomainError::EmptyTable { .. })) => {
                tracing::warn!(%metric, age_months, "Projection left unclassified: {e}");
                Ok((None, GrowthStatus::Unknown))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Five-curve percentile bands over every band age known for `sex`.
///
/// Rows cover the union of height and weight band ages; each metric uses
/// its nearest band. Ages outside either metric's covered range are skipped.
///
/// # Errors
/// Returns `Domain` if either table for `sex` is empty.
pub fn percentile_series(table: &ReferenceTable, sex: Sex) -> Result<Vec<PercentileBand>> {
    let heights = table.entries(sex, Metric::Height)?;
    let weights = table.entries(sex, Metric::Weight)?;
    let ages: BTreeSet<u32> = heights
        .iter()
        .chain(weights)
        .map(|e| e.age_band)
        .collect();

    let mut bands = Vec::with_capacity(ages.len());
    for age_months in ages {
        let height = table.lookup(sex, Metric::Height, age_months);
        let weight = table.lookup(sex, Metric::Weight, age_months);
        match (height, weight) {
            (Ok(h), Ok(w)) => bands.push(PercentileBand {
                age_months,
                height: PercentileCurves::from_entry(&h),
                weight: PercentileCurves::from_entry(&w),
            }),
            (Err(DomainError::AgeOutOfRange { .. }), _) | (_, Err(DomainError::AgeOutOfRange { .. })) => {
                tracing::debug!(age_months, %sex, "Skipping band outside one metric's range");
            }
            (Err(e), _) | (_, Err(e)) => return Err(e.into()),
        }
    }
    Ok(bands)
}
