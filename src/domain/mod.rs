//! Domain layer: Core growth-assessment types and computations.
//!
//! Everything here is pure: no I/O beyond optional standards-file loading,
//! no shared mutable state. Models are reached only through `ports`.

mod error;
mod features;
mod measurement;
mod reference;
mod verdict;
mod zscore;

pub use error::DomainError;
pub use features::{
    bmi, FeatureBuilder, FeatureVector, TrajectoryFeatures, FEATURE_NAMES,
    TRAJECTORY_FEATURE_NAMES,
};
pub use measurement::{Measurement, Metric, Sex, MAX_AGE_MONTHS};
pub use reference::{ReferenceEntry, ReferenceTable, WHO_AGE_BANDS};
pub use verdict::{
    GrowthPoint, GrowthStatus, PercentileBand, PercentileCurves, RiskCategory, RiskVerdict,
    TrajectoryProjection,
};
pub use zscore::{lms_score, lms_value, Severity, StandardScoreCalculator};
