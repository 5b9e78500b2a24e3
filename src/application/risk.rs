//! Risk classification: turns a classifier's raw output into a verdict.

use std::sync::Arc;

use serde::Serialize;

use crate::adapters::RuleBasedClassifier;
use crate::config::EngineConfig;
use crate::domain::{FeatureVector, RiskCategory, RiskVerdict};
use crate::ports::{argmax, LabelVocabulary, RiskModel};
use crate::{GrowthError, Result};

/// Verdict plus the evidence it was derived from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAssessment {
    #[serde(flatten)]
    pub verdict: RiskVerdict,

    /// Row the classifier saw
    pub features: FeatureVector,

    /// Label from the model vocabulary before normalization
    pub model_label: String,

    /// Registry version of the model set that produced the verdict
    pub model_version: u64,
}

/// Wraps a trained classifier and its label vocabulary.
///
/// Construction checks that the two agree on the number of classes, so
/// `classify` never has to.
#[derive(Clone)]
pub struct RiskClassifier {
    model: Arc<dyn RiskModel>,
    labels: LabelVocabulary,
}

impl std::fmt::Debug for RiskClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiskClassifier")
            .field("model", &self.model.name())
            .field("labels", &self.labels.labels())
            .finish()
    }
}

impl RiskClassifier {
    /// Pair a model with its vocabulary.
    ///
    /// # Errors
    /// Returns `ModelUnavailable` if the vocabulary is empty or its length
    /// differs from the model's class count.
    pub fn new(model: Arc<dyn RiskModel>, labels: LabelVocabulary) -> Result<Self> {
        if labels.is_empty() {
            return Err(GrowthError::ModelUnavailable("label vocabulary is empty".into()));
        }
        if model.n_classes() != labels.len() {
            return Err(GrowthError::ModelUnavailable(format!(
                "{} has {} classes but the vocabulary has {} labels",
                model.name(),
                model.n_classes(),
                labels.len()
            )));
        }
        Ok(Self { model, labels })
    }

    /// Classifier backed by the training-label rule.
    #[must_use]
    pub fn rule_based() -> Self {
        Self {
            model: Arc::new(RuleBasedClassifier::new()),
            labels: RuleBasedClassifier::vocabulary(),
        }
    }

    #[must_use]
    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    #[must_use]
    pub fn labels(&self) -> &LabelVocabulary {
        &self.labels
    }

    /// Classify one feature row.
    ///
    /// # Errors
    /// Returns `ModelUnavailable` if the model fails or returns an unusable
    /// distribution. Never returns a partial verdict.
    pub fn classify(&self, features: &FeatureVector, config: &EngineConfig) -> Result<RiskVerdict> {
        self.classify_labelled(features, config).map(|(verdict, _)| verdict)
    }

    /// Like [`Self::classify`], also returning the raw vocabulary label.
    ///
    /// # Errors
    /// See [`Self::classify`].
    pub fn classify_labelled(
        &self,
        features: &FeatureVector,
        config: &EngineConfig,
    ) -> Result<(RiskVerdict, String)> {
        let predicted = self.model.predict(features)?;
        let proba = self.model.predict_proba(features)?;
        check_distribution(&proba)?;

        let label = match self.labels.get(predicted) {
            Some(label) => label,
            None => {
                let fallback = argmax(&proba).ok_or_else(|| {
                    GrowthError::ModelUnavailable("empty probability distribution".into())
                })?;
                tracing::warn!(
                    predicted,
                    fallback,
                    classes = self.labels.len(),
                    "Predicted class index out of range; using probability argmax"
                );
                self.labels.get(fallback).ok_or_else(|| {
                    GrowthError::ModelUnavailable(format!(
                        "probability vector has {} entries for {} labels",
                        proba.len(),
                        self.labels.len()
                    ))
                })?
            }
        };

        let risk_category = RiskCategory::from_label(label);
        let confidence = proba.iter().copied().fold(0.0, f64::max);
        let is_anomaly = confidence < config.min_confidence
            || features.z_height.abs() > config.anomaly_z_limit
            || features.z_weight.abs() > config.anomaly_z_limit;

        let verdict = RiskVerdict {
            risk_category,
            confidence,
            is_anomaly,
        };
        tracing::debug!(label, model = self.model.name(), "{}", verdict.summary());

        Ok((verdict, label.to_string()))
    }
}

fn check_distribution(proba: &[f64]) -> Result<()> {
    if proba.is_empty() {
        return Err(GrowthError::ModelUnavailable("empty probability distribution".into()));
    }
    if proba.iter().any(|p| !p.is_finite() || *p < 0.0 || *p > 1.0) {
        return Err(GrowthError::ModelUnavailable(format!(
            "probability distribution out of [0, 1]: {proba:?}"
        )));
    }
    Ok(())
}
