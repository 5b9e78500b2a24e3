//! Domain errors raised by reference lookup, standardization and input validation.

use super::{Metric, Sex};

/// Error type for invalid domain values.
///
/// Raised eagerly: reference lookup and standardization never substitute a
/// default when an input is outside the domain.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DomainError {
    #[error("Unknown sex '{0}' (expected 'male' or 'female')")]
    UnknownSex(String),

    #[error("Unknown metric '{0}' (expected 'height' or 'weight')")]
    UnknownMetric(String),

    #[error("{metric} measurement must be a positive finite number, got {value}")]
    NonPositiveMeasurement { metric: Metric, value: f64 },

    #[error("{metric} score must be finite, got {value}")]
    NonFiniteScore { metric: Metric, value: f64 },

    #[error("Age {age_months} months is outside the covered range [{min}, {max}] for {sex} {metric}")]
    AgeOutOfRange {
        age_months: u32,
        sex: Sex,
        metric: Metric,
        min: u32,
        max: u32,
    },

    #[error("Age {age_months} months is outside the supported range [0, {max}]")]
    AgeNotSupported { age_months: u32, max: u32 },

    #[error("No reference entries for {sex} {metric}")]
    EmptyTable { sex: Sex, metric: Metric },

    #[error("Invalid LMS parameters at band {age_band}: L={l}, M={m}, S={s}")]
    InvalidParameters { age_band: u32, l: f64, m: f64, s: f64 },

    #[error("Transform argument must be positive for {metric}, got {value}")]
    NonPositiveTransform { metric: Metric, value: f64 },

    #[error("Reference bands for {sex} {metric} must be strictly increasing (band {age_band} follows {previous})")]
    UnorderedBands {
        sex: Sex,
        metric: Metric,
        previous: u32,
        age_band: u32,
    },
}
