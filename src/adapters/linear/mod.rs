//! Linear model adapters: JSON-exported classifier and regressor.
//!
//! - [`SoftmaxClassifier`]: multinomial logistic regression over the
//!   seven-column risk schema, with an optional standard scaler
//! - [`LinearRegressor`]: one linear output per predicted measurement over
//!   the four-column trajectory schema
//!
//! Both are plain parameter files produced by the training pipeline; shape
//! checks happen once in `validate`, not on every prediction.

use serde::{Deserialize, Serialize};

use crate::domain::{FeatureVector, TrajectoryFeatures, FEATURE_NAMES, TRAJECTORY_FEATURE_NAMES};
use crate::ports::{argmax, GrowthPrediction, GrowthRegressor, InferenceError, RiskModel};

use super::ArtifactError;

/// Per-feature standardization applied before the linear layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    fn validate(&self, n: usize) -> Result<(), ArtifactError> {
        if self.mean.len() != n || self.scale.len() != n {
            return Err(ArtifactError::Shape(format!(
                "scaler must have {n} means and {n} scales"
            )));
        }
        if self.scale.iter().any(|s| !s.is_finite() || *s == 0.0) {
            return Err(ArtifactError::Shape("scaler scales must be finite and non-zero".into()));
        }
        Ok(())
    }

    fn apply(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.mean.iter().zip(self.scale.iter()))
            .map(|(x, (m, s))| (x - m) / s)
            .collect()
    }
}

fn check_feature_names(got: &[String], expected: &[&str]) -> Result<(), ArtifactError> {
    if got.len() != expected.len() || got.iter().zip(expected).any(|(g, e)| g != e) {
        return Err(ArtifactError::Schema {
            expected: expected.iter().map(|s| (*s).to_string()).collect(),
            got: got.to_vec(),
        });
    }
    Ok(())
}

fn dot(weights: &[f64], row: &[f64]) -> f64 {
    weights.iter().zip(row).map(|(w, x)| w * x).sum()
}

/// Multinomial logistic regression classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftmaxClassifier {
    /// Column names; must equal the risk feature schema exactly
    pub feature_names: Vec<String>,

    /// One weight row per class
    pub coefficients: Vec<Vec<f64>>,

    /// One intercept per class
    pub intercepts: Vec<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaler: Option<StandardScaler>,
}

impl SoftmaxClassifier {
    /// Parse and validate a classifier export.
    ///
    /// # Errors
    /// Returns error on malformed JSON or inconsistent shapes.
    pub fn from_json(json: &str) -> Result<Self, ArtifactError> {
        let model: Self = serde_json::from_str(json)?;
        model.validate()?;
        Ok(model)
    }

    /// Check schema and parameter shapes.
    ///
    /// # Errors
    /// Returns `ArtifactError` describing the first inconsistency.
    pub fn validate(&self) -> Result<(), ArtifactError> {
        check_feature_names(&self.feature_names, &FEATURE_NAMES)?;

        let n = FEATURE_NAMES.len();
        if self.coefficients.is_empty() {
            return Err(ArtifactError::Shape("classifier has no classes".into()));
        }
        if self.intercepts.len() != self.coefficients.len() {
            return Err(ArtifactError::Shape(format!(
                "{} intercepts for {} classes",
                self.intercepts.len(),
                self.coefficients.len()
            )));
        }
        if let Some(row) = self.coefficients.iter().find(|row| row.len() != n) {
            return Err(ArtifactError::Shape(format!(
                "coefficient row has {} columns, expected {n}",
                row.len()
            )));
        }
        let all_finite = self
            .coefficients
            .iter()
            .flatten()
            .chain(self.intercepts.iter())
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(ArtifactError::Shape("classifier parameters must be finite".into()));
        }
        if let Some(scaler) = &self.scaler {
            scaler.validate(n)?;
        }
        Ok(())
    }

    fn logits(&self, features: &FeatureVector) -> Vec<f64> {
        let raw = features.to_array();
        let row = match &self.scaler {
            Some(scaler) => scaler.apply(&raw),
            None => raw.to_vec(),
        };

        self.coefficients
            .iter()
            .zip(&self.intercepts)
            .map(|(w, b)| b + dot(w, &row))
            .collect()
    }
}

impl RiskModel for SoftmaxClassifier {
    fn n_classes(&self) -> usize {
        self.coefficients.len()
    }

    fn predict(&self, features: &FeatureVector) -> Result<usize, InferenceError> {
        let proba = self.predict_proba(features)?;
        argmax(&proba).ok_or_else(|| InferenceError::InvalidOutput("empty distribution".into()))
    }

    fn predict_proba(&self, features: &FeatureVector) -> Result<Vec<f64>, InferenceError> {
        let logits = self.logits(features);
        let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if !max.is_finite() {
            return Err(InferenceError::InvalidOutput(format!(
                "non-finite logits for input {features:?}"
            )));
        }

        let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
        let sum: f64 = exps.iter().sum();
        Ok(exps.into_iter().map(|e| e / sum).collect())
    }

    fn name(&self) -> &str {
        "softmax-classifier"
    }
}

/// Linear multi-output regressor (height, weight).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRegressor {
    /// Column names; must equal the trajectory feature schema exactly
    pub feature_names: Vec<String>,

    /// Weight rows for [height, weight]
    pub coefficients: Vec<Vec<f64>>,

    /// Intercepts for [height, weight]
    pub intercepts: Vec<f64>,
}

impl LinearRegressor {
    /// Parse and validate a regressor export.
    ///
    /// # Errors
    /// Returns error on malformed JSON or inconsistent shapes.
    pub fn from_json(json: &str) -> Result<Self, ArtifactError> {
        let model: Self = serde_json::from_str(json)?;
        model.validate()?;
        Ok(model)
    }

    /// Check schema and parameter shapes.
    ///
    /// # Errors
    /// Returns `ArtifactError` describing the first inconsistency.
    pub fn validate(&self) -> Result<(), ArtifactError> {
        check_feature_names(&self.feature_names, &TRAJECTORY_FEATURE_NAMES)?;

        let n = TRAJECTORY_FEATURE_NAMES.len();
        if self.coefficients.len() != 2 || self.intercepts.len() != 2 {
            return Err(ArtifactError::Shape(
                "regressor must have exactly 2 outputs (height, weight)".into(),
            ));
        }
        if self.coefficients.iter().any(|row| row.len() != n) {
            return Err(ArtifactError::Shape(format!(
                "regressor coefficient rows must have {n} columns"
            )));
        }
        let all_finite = self
            .coefficients
            .iter()
            .flatten()
            .chain(self.intercepts.iter())
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(ArtifactError::Shape("regressor parameters must be finite".into()));
        }
        Ok(())
    }
}

impl GrowthRegressor for LinearRegressor {
    fn predict(&self, features: &TrajectoryFeatures) -> Result<GrowthPrediction, InferenceError> {
        let row = features.to_array();
        let outputs: Vec<f64> = self
            .coefficients
            .iter()
            .zip(&self.intercepts)
            .map(|(w, b)| b + dot(w, &row))
            .collect();
        let [height_cm, weight_kg] = outputs[..] else {
            return Err(InferenceError::InvalidOutput(format!(
                "expected 2 outputs, got {}",
                outputs.len()
            )));
        };

        if !height_cm.is_finite() || !weight_kg.is_finite() {
            return Err(InferenceError::InvalidOutput(format!(
                "non-finite prediction ({height_cm}, {weight_kg})"
            )));
        }
        Ok(GrowthPrediction {
            height_cm,
            weight_kg,
        })
    }

    fn name(&self) -> &str {
        "linear-regressor"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Sex;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    fn z_only_classifier() -> SoftmaxClassifier {
        // classes: normal, underweight; underweight logit rises as z_weight falls
        SoftmaxClassifier {
            feature_names: names(&FEATURE_NAMES),
            coefficients: vec![
                vec![0.0; 7],
                vec![0.0, 0.0, 0.0, 0.0, 0.0, -3.0, 0.0],
            ],
            intercepts: vec![0.0, -6.5],
            scaler: None,
        }
    }

    fn features(z_weight: f64) -> FeatureVector {
        FeatureVector {
            age_months: 12.0,
            sex_encoded: 1.0,
            height_cm: 75.0,
            weight_kg: 9.5,
            bmi: 16.9,
            z_weight,
            z_height: 0.0,
        }
    }

    #[test]
    fn test_softmax_distribution() {
        let model = z_only_classifier();
        let proba = model.predict_proba(&features(0.0)).expect("proba");
        assert_eq!(proba.len(), 2);
        assert!((proba.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert_eq!(model.predict(&features(0.0)).unwrap(), 0);
        assert_eq!(model.predict(&features(-4.0)).unwrap(), 1);
    }

    #[test]
    fn test_scaler_is_applied() {
        let mut model = z_only_classifier();
        model.scaler = Some(StandardScaler {
            mean: vec![0.0; 7],
            scale: vec![1.0, 1.0, 1.0, 1.0, 1.0, 0.5, 1.0],
        });
        // z_weight -1.5 scales to -3.0, which crosses the decision boundary.
        assert_eq!(model.predict(&features(-1.5)).unwrap(), 1);
    }

    #[test]
    fn test_rejects_wrong_schema() {
        let mut model = z_only_classifier();
        model.feature_names.swap(5, 6);
        assert!(matches!(model.validate(), Err(ArtifactError::Schema { .. })));
    }

    #[test]
    fn test_rejects_shape_mismatch() {
        let mut model = z_only_classifier();
        model.intercepts.push(1.0);
        assert!(matches!(model.validate(), Err(ArtifactError::Shape(_))));

        let mut model = z_only_classifier();
        model.coefficients[1].pop();
        assert!(matches!(model.validate(), Err(ArtifactError::Shape(_))));
    }

    #[test]
    fn test_linear_regressor() {
        let json = r#"{
            "feature_names": ["age_months", "sex_encoded", "height_cm", "weight_kg"],
            "coefficients": [[-0.015, 0.0, 1.0, 0.0], [-0.003, 0.0, 0.0, 1.0]],
            "intercepts": [1.2, 0.25]
        }"#;
        let model = LinearRegressor::from_json(json).expect("valid regressor");
        let out = model
            .predict(&TrajectoryFeatures::new(12, Sex::Male, 75.5, 9.8))
            .expect("prediction");
        assert!((out.height_cm - (75.5 + 1.2 - 0.18)).abs() < 1e-9);
        assert!((out.weight_kg - (9.8 + 0.25 - 0.036)).abs() < 1e-9);
    }

    #[test]
    fn test_regressor_requires_two_outputs() {
        let json = r#"{
            "feature_names": ["age_months", "sex_encoded", "height_cm", "weight_kg"],
            "coefficients": [[0.0, 0.0, 1.0, 0.0]],
            "intercepts": [1.0]
        }"#;
        assert!(matches!(
            LinearRegressor::from_json(json),
            Err(ArtifactError::Shape(_))
        ));
    }
}
