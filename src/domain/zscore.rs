//! Standardized scores via the WHO LMS (Box-Cox power) method.
//!
//! For a measurement `X` and band parameters `(L, M, S)`:
//!
//! - `L != 0`: `z = ((X / M)^L - 1) / (L * S)`
//! - `L == 0`: `z = ln(X / M) / S`, the limit of the power transform as `L -> 0`
//!
//! [`StandardScoreCalculator::value_at`] inverts the transform.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{DomainError, Metric, ReferenceEntry, ReferenceTable, Sex};

/// Clinical interpretation of a standardized score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// z < -3
    SeverelyBelow,
    /// -3 <= z < -2
    ModeratelyBelow,
    /// -2 <= z <= 2
    Normal,
    /// 2 < z <= 3
    Above,
    /// z > 3
    SeverelyAbove,
}

impl Severity {
    #[must_use]
    pub fn from_score(z: f64) -> Self {
        if z < -3.0 {
            Self::SeverelyBelow
        } else if z < -2.0 {
            Self::ModeratelyBelow
        } else if z <= 2.0 {
            Self::Normal
        } else if z <= 3.0 {
            Self::Above
        } else {
            Self::SeverelyAbove
        }
    }

    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::SeverelyBelow => "Severely below the expected range",
            Self::ModeratelyBelow => "Moderately below the expected range",
            Self::Normal => "Within the expected range",
            Self::Above => "Above the expected range",
            Self::SeverelyAbove => "Severely above the expected range",
        }
    }
}

/// Computes standardized scores against a shared [`ReferenceTable`].
#[derive(Debug, Clone)]
pub struct StandardScoreCalculator {
    table: Arc<ReferenceTable>,
}

impl StandardScoreCalculator {
    #[must_use]
    pub fn new(table: Arc<ReferenceTable>) -> Self {
        Self { table }
    }

    #[must_use]
    pub fn table(&self) -> &Arc<ReferenceTable> {
        &self.table
    }

    /// Standardized score of `value` for the nearest reference band.
    ///
    /// # Errors
    /// Returns `DomainError` if the value is not a positive finite number,
    /// the lookup fails, or the band parameters are degenerate.
    pub fn standardize(
        &self,
        value: f64,
        age_months: u32,
        sex: Sex,
        metric: Metric,
    ) -> Result<f64, DomainError> {
        if !value.is_finite() || value <= 0.0 {
            return Err(DomainError::NonPositiveMeasurement { metric, value });
        }
        let entry = self.table.lookup(sex, metric, age_months)?;
        lms_score(value, &entry, metric)
    }

    /// Height-for-age score.
    ///
    /// # Errors
    /// See [`Self::standardize`].
    pub fn standardize_height(
        &self,
        height_cm: f64,
        age_months: u32,
        sex: Sex,
    ) -> Result<f64, DomainError> {
        self.standardize(height_cm, age_months, sex, Metric::Height)
    }

    /// Weight-for-age score.
    ///
    /// # Errors
    /// See [`Self::standardize`].
    pub fn standardize_weight(
        &self,
        weight_kg: f64,
        age_months: u32,
        sex: Sex,
    ) -> Result<f64, DomainError> {
        self.standardize(weight_kg, age_months, sex, Metric::Weight)
    }

    /// Measurement that would produce score `z` at the nearest band.
    ///
    /// # Errors
    /// Returns `DomainError` if `z` is not finite, the lookup fails, or `z`
    /// lies outside the support of the power transform (`1 + L*S*z <= 0`).
    pub fn value_at(
        &self,
        z: f64,
        age_months: u32,
        sex: Sex,
        metric: Metric,
    ) -> Result<f64, DomainError> {
        if !z.is_finite() {
            return Err(DomainError::NonFiniteScore { metric, value: z });
        }
        let entry = self.table.lookup(sex, metric, age_months)?;
        lms_value(z, &entry, metric)
    }
}

fn check_parameters(entry: &ReferenceEntry) -> Result<(), DomainError> {
    if !(entry.m.is_finite() && entry.m > 0.0)
        || !entry.s.is_finite()
        || entry.s == 0.0
        || !entry.l.is_finite()
    {
        return Err(DomainError::InvalidParameters {
            age_band: entry.age_band,
            l: entry.l,
            m: entry.m,
            s: entry.s,
        });
    }
    Ok(())
}

/// LMS score for a single band.
///
/// # Errors
/// Returns `DomainError` on degenerate parameters or a non-positive ratio.
pub fn lms_score(value: f64, entry: &ReferenceEntry, metric: Metric) -> Result<f64, DomainError> {
    check_parameters(entry)?;

    let ratio = value / entry.m;
    if !(ratio.is_finite() && ratio > 0.0) {
        return Err(DomainError::NonPositiveTransform {
            metric,
            value: ratio,
        });
    }

    let z = if entry.l == 0.0 {
        ratio.ln() / entry.s
    } else {
        (ratio.powf(entry.l) - 1.0) / (entry.l * entry.s)
    };

    if !z.is_finite() {
        return Err(DomainError::NonFiniteScore { metric, value: z });
    }
    Ok(z)
}

/// Inverse of [`lms_score`] for a single band.
///
/// # Errors
/// Returns `DomainError` on degenerate parameters or when `z` lies outside
/// the transform's support.
pub fn lms_value(z: f64, entry: &ReferenceEntry, metric: Metric) -> Result<f64, DomainError> {
    check_parameters(entry)?;

    let value = if entry.l == 0.0 {
        entry.m * (entry.s * z).exp()
    } else {
        let base = 1.0 + entry.l * entry.s * z;
        if base <= 0.0 {
            return Err(DomainError::NonPositiveTransform { metric, value: base });
        }
        entry.m * base.powf(1.0 / entry.l)
    };

    if !(value.is_finite() && value > 0.0) {
        return Err(DomainError::NonPositiveMeasurement { metric, value });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calculator() -> StandardScoreCalculator {
        StandardScoreCalculator::new(Arc::new(ReferenceTable::who()))
    }

    #[test]
    fn test_twelve_month_boy_scores() {
        let calc = calculator();
        let hz = calc.standardize_height(75.5, 12, Sex::Male).expect("height z");
        let wz = calc.standardize_weight(9.8, 12, Sex::Male).expect("weight z");

        assert!((hz - (-0.0714)).abs() < 1e-3, "height z = {hz}");
        assert!((wz - 0.0666).abs() < 1e-3, "weight z = {wz}");
    }

    #[test]
    fn test_power_branch_formula() {
        let entry = ReferenceEntry::new(12, 0.1268, 9.7289, 0.10958);
        let z = lms_score(11.0, &entry, Metric::Weight).expect("score");
        let expected = ((11.0_f64 / 9.7289).powf(0.1268) - 1.0) / (0.1268 * 0.10958);
        assert!((z - expected).abs() < 1e-12);
    }

    #[test]
    fn test_log_branch_when_l_is_zero() {
        let entry = ReferenceEntry::new(0, 0.0, 10.0, 0.1);
        let z = lms_score(12.0, &entry, Metric::Weight).expect("score");
        let expected = (12.0_f64 / 10.0).ln() / 0.1;
        assert!((z - expected).abs() < 1e-12);

        // The power branch approaches the log branch as L -> 0.
        let near = ReferenceEntry::new(0, 1e-9, 10.0, 0.1);
        let z_near = lms_score(12.0, &near, Metric::Weight).expect("score");
        assert!((z - z_near).abs() < 1e-6);
    }

    #[test]
    fn test_median_scores_zero() {
        let calc = calculator();
        let z = calc.standardize_weight(8.875, 12, Sex::Female).expect("score");
        assert!(z.abs() < 1e-12);
    }

    #[test]
    fn test_severe_underweight() {
        let calc = calculator();
        let z = calc.standardize_weight(5.0, 12, Sex::Male).expect("score");
        assert!(z < -3.0, "z = {z}");
        assert_eq!(Severity::from_score(z), Severity::SeverelyBelow);
    }

    #[test]
    fn test_rejects_non_positive_values() {
        let calc = calculator();
        assert!(matches!(
            calc.standardize_height(0.0, 12, Sex::Male),
            Err(DomainError::NonPositiveMeasurement { .. })
        ));
        assert!(matches!(
            calc.standardize_weight(f64::NAN, 12, Sex::Male),
            Err(DomainError::NonPositiveMeasurement { .. })
        ));
    }

    #[test]
    fn test_rejects_degenerate_parameters() {
        let zero_s = ReferenceEntry::new(0, 1.0, 50.0, 0.0);
        assert!(matches!(
            lms_score(50.0, &zero_s, Metric::Height),
            Err(DomainError::InvalidParameters { .. })
        ));

        let zero_m = ReferenceEntry::new(0, 1.0, 0.0, 0.04);
        assert!(matches!(
            lms_score(50.0, &zero_m, Metric::Height),
            Err(DomainError::InvalidParameters { .. })
        ));
    }

    #[test]
    fn test_value_at_inverts_score() {
        let calc = calculator();
        for (sex, metric, value, age) in [
            (Sex::Male, Metric::Height, 80.0, 18),
            (Sex::Female, Metric::Weight, 7.1, 6),
            (Sex::Female, Metric::Weight, 14.0, 48),
        ] {
            let z = calc.standardize(value, age, sex, metric).expect("score");
            let back = calc.value_at(z, age, sex, metric).expect("inverse");
            assert!((back - value).abs() < 1e-9, "{metric}: {back} != {value}");
        }
    }

    #[test]
    fn test_value_at_outside_support() {
        let calc = calculator();
        // Height has L = 1, so 1 + S*z <= 0 once z <= -1/S.
        let err = calc.value_at(-40.0, 12, Sex::Male, Metric::Height).unwrap_err();
        assert!(matches!(err, DomainError::NonPositiveTransform { .. }));
    }

    #[test]
    fn test_severity_bands() {
        assert_eq!(Severity::from_score(-3.5), Severity::SeverelyBelow);
        assert_eq!(Severity::from_score(-2.5), Severity::ModeratelyBelow);
        assert_eq!(Severity::from_score(-2.0), Severity::Normal);
        assert_eq!(Severity::from_score(2.0), Severity::Normal);
        assert_eq!(Severity::from_score(3.0), Severity::Above);
        assert_eq!(Severity::from_score(3.1), Severity::SeverelyAbove);
    }
}
