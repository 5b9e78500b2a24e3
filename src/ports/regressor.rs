//! Growth regressor port: Trait for a trained multi-output regressor.

use super::InferenceError;
use crate::domain::TrajectoryFeatures;

/// Predicted next-period measurements.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrowthPrediction {
    pub height_cm: f64,
    pub weight_kg: f64,
}

/// Trait for trained growth regressors.
///
/// Input is the four-column [`TrajectoryFeatures`] schema; output is the
/// height and weight expected one month later.
pub trait GrowthRegressor: Send + Sync {
    /// Predict next month's height and weight.
    ///
    /// # Errors
    /// Returns `InferenceError` if the model cannot evaluate the row.
    fn predict(&self, features: &TrajectoryFeatures) -> Result<GrowthPrediction, InferenceError>;

    /// Short identifier for logs.
    fn name(&self) -> &str {
        "growth-regressor"
    }
}
