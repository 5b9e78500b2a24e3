//! Rule-based classifier reproducing the labelling rule used to build the
//! training set.
//!
//! Useful as a transparent baseline and as a fallback when no trained
//! classifier has been installed. The vocabulary is alphabetical, matching
//! the order a label encoder assigns.

use crate::domain::FeatureVector;
use crate::ports::{InferenceError, LabelVocabulary, RiskModel};

/// Labels in encoder order.
pub const RULE_LABELS: [&str; 7] = [
    "normal",
    "overweight",
    "severely_overweight",
    "severely_stunted",
    "severely_underweight",
    "stunted",
    "underweight",
];

/// Deterministic threshold classifier over the two standardized scores.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedClassifier;

impl RuleBasedClassifier {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Vocabulary matching this classifier's indices.
    #[must_use]
    pub fn vocabulary() -> LabelVocabulary {
        LabelVocabulary::from_static(&RULE_LABELS)
    }

    /// Label the rule assigns to a pair of scores.
    ///
    /// Checks run in order; the first match wins.
    #[must_use]
    pub fn label_for(z_weight: f64, z_height: f64) -> &'static str {
        if z_weight < -3.0 {
            "severely_underweight"
        } else if z_height < -3.0 {
            "severely_stunted"
        } else if z_weight < -2.0 {
            "underweight"
        } else if z_height < -2.0 {
            "stunted"
        } else if z_weight > 3.0 {
            "severely_overweight"
        } else if z_weight > 2.0 {
            "overweight"
        } else {
            "normal"
        }
    }

    fn index_for(features: &FeatureVector) -> Result<usize, InferenceError> {
        if !features.z_weight.is_finite() || !features.z_height.is_finite() {
            return Err(InferenceError::InvalidOutput("non-finite score input".into()));
        }
        let label = Self::label_for(features.z_weight, features.z_height);
        RULE_LABELS
            .iter()
            .position(|l| *l == label)
            .ok_or_else(|| InferenceError::Failed(format!("label {label} not in vocabulary")))
    }
}

impl RiskModel for RuleBasedClassifier {
    fn n_classes(&self) -> usize {
        RULE_LABELS.len()
    }

    fn predict(&self, features: &FeatureVector) -> Result<usize, InferenceError> {
        Self::index_for(features)
    }

    fn predict_proba(&self, features: &FeatureVector) -> Result<Vec<f64>, InferenceError> {
        let idx = Self::index_for(features)?;
        let mut proba = vec![0.0; RULE_LABELS.len()];
        proba[idx] = 1.0;
        Ok(proba)
    }

    fn name(&self) -> &str {
        "rule-based"
    }
}
