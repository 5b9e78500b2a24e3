//! Growth engine: the caller-facing entry point.
//!
//! Holds the immutable reference table and a handle to the model registry.
//! Every call takes its own model snapshot, so a concurrent reload never
//! mixes two model sets within one call.

use std::sync::Arc;

use crate::application::trajectory::percentile_series;
use crate::application::{ModelRegistry, RiskAssessment, TrajectoryPredictor};
use crate::config::EngineConfig;
use crate::domain::{
    FeatureBuilder, FeatureVector, Measurement, Metric, PercentileBand, ReferenceTable,
    RiskVerdict, Sex, StandardScoreCalculator, TrajectoryProjection,
};
use crate::Result;

/// Standardization, risk classification and trajectory projection.
#[derive(Debug, Clone)]
pub struct GrowthEngine {
    builder: FeatureBuilder,
    registry: Arc<ModelRegistry>,
    config: EngineConfig,
}

impl GrowthEngine {
    #[must_use]
    pub fn new(table: Arc<ReferenceTable>, registry: Arc<ModelRegistry>, config: EngineConfig) -> Self {
        Self {
            builder: FeatureBuilder::new(StandardScoreCalculator::new(table)),
            registry,
            config,
        }
    }

    /// Engine over the built-in WHO tables with default thresholds.
    #[must_use]
    pub fn with_who_tables(registry: Arc<ModelRegistry>) -> Self {
        Self::new(Arc::new(ReferenceTable::who()), registry, EngineConfig::default())
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn table(&self) -> &Arc<ReferenceTable> {
        self.calculator().table()
    }

    fn calculator(&self) -> &StandardScoreCalculator {
        self.builder.calculator()
    }

    /// Standardized score of a raw measurement.
    ///
    /// # Errors
    /// Returns `Domain` for non-positive values, unsupported ages or
    /// degenerate reference parameters.
    pub fn standardize(&self, value: f64, age_months: u32, sex: Sex, metric: Metric) -> Result<f64> {
        Ok(self.calculator().standardize(value, age_months, sex, metric)?)
    }

    /// Feature row the classifier would see for `measurement`.
    ///
    /// # Errors
    /// Returns `Domain` or `IncompleteInput`.
    pub fn features(&self, measurement: &Measurement) -> Result<FeatureVector> {
        self.builder.build(measurement)
    }

    /// Classify a measurement's risk.
    ///
    /// # Errors
    /// Returns `Domain`, `IncompleteInput` or `ModelUnavailable`.
    pub fn classify_risk(&self, measurement: &Measurement) -> Result<RiskVerdict> {
        self.assess_risk(measurement).map(|a| a.verdict)
    }

    /// Classify a measurement and keep the evidence.
    ///
    /// # Errors
    /// See [`Self::classify_risk`].
    pub fn assess_risk(&self, measurement: &Measurement) -> Result<RiskAssessment> {
        let features = self.builder.build(measurement)?;
        let models = self.registry.current()?;
        let (verdict, model_label) = models
            .classifier()
            .classify_labelled(&features, &self.config)?;

        tracing::info!(
            age_months = measurement.age_months,
            sex = %measurement.sex,
            category = %verdict.risk_category,
            anomaly = verdict.is_anomaly,
            model_version = models.version(),
            "Risk classified"
        );

        Ok(RiskAssessment {
            verdict,
            features,
            model_label,
            model_version: models.version(),
        })
    }

    /// Project next month's growth.
    ///
    /// # Errors
    /// Returns `Domain`, `IncompleteInput` or `ModelUnavailable`; never
    /// fails merely because the next age lies beyond the reference table.
    pub fn project_trajectory(
        &self,
        measurement: &Measurement,
        include_bands: bool,
    ) -> Result<TrajectoryProjection> {
        let models = self.registry.current()?;
        let predictor = TrajectoryPredictor::new(
            self.calculator().clone(),
            models.regressor(),
            self.config.status_z_limit,
        );
        let projection = predictor.project(measurement, include_bands)?;

        tracing::info!(
            next_age_months = projection.next_age_months,
            height_status = %projection.height_status,
            weight_status = %projection.weight_status,
            degraded = projection.is_degraded(),
            model_version = models.version(),
            "Trajectory projected"
        );
        Ok(projection)
    }

    /// Percentile chart series for `sex`; needs no models.
    ///
    /// # Errors
    /// Returns `Domain` if the reference table for `sex` is empty.
    pub fn reference_series(&self, sex: Sex) -> Result<Vec<PercentileBand>> {
        percentile_series(self.table(), sex)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{LinearRegressor, RuleBasedClassifier, SoftmaxClassifier};
    use crate::application::ModelSet;
    use crate::domain::{GrowthStatus, RiskCategory};
    use crate::ports::LabelVocabulary;

    const CLASSIFIER_JSON: &str = r#"{
        "feature_names": ["age_months", "sex_encoded", "height_cm", "weight_kg", "bmi", "z_weight", "z_height"],
        "coefficients": [
            [0.0, 0.0, 0.0, 0.0, 0.0,  0.0,  0.0],
            [0.0, 0.0, 0.0, 0.0, 0.0,  3.0,  0.0],
            [0.0, 0.0, 0.0, 0.0, 0.0,  0.0, -3.0],
            [0.0, 0.0, 0.0, 0.0, 0.0, -3.0,  0.0]
        ],
        "intercepts": [0.0, -6.5, -6.5, -6.5]
    }"#;

    const REGRESSOR_JSON: &str = r#"{
        "feature_names": ["age_months", "sex_encoded", "height_cm", "weight_kg"],
        "coefficients": [[-0.015, 0.0, 1.0, 0.0], [-0.003, 0.0, 0.0, 1.0]],
        "intercepts": [1.2, 0.25]
    }"#;

    fn linear_engine() -> GrowthEngine {
        let set = ModelSet::new(
            Arc::new(SoftmaxClassifier::from_json(CLASSIFIER_JSON).expect("classifier")),
            LabelVocabulary::new(["normal", "overweight", "stunted", "underweight"]).expect("labels"),
            Arc::new(LinearRegressor::from_json(REGRESSOR_JSON).expect("regressor")),
            "test",
        )
        .expect("model set");
        GrowthEngine::with_who_tables(Arc::new(ModelRegistry::with_models(set)))
    }

    #[test]
    fn test_who_reference_measurement() {
        let engine = linear_engine();
        let m = Measurement::with_raw(12, Sex::Male, 75.5, 9.8);

        let z_h = engine.standardize(75.5, 12, Sex::Male, Metric::Height).expect("height z");
        let z_w = engine.standardize(9.8, 12, Sex::Male, Metric::Weight).expect("weight z");
        assert!((z_h - (-0.0714)).abs() < 1e-3);
        assert!((z_w - 0.0665).abs() < 1e-3);

        let verdict = engine.classify_risk(&m).expect("verdict");
        assert_eq!(verdict.risk_category, RiskCategory::Normal);
        assert!(verdict.confidence >= 0.6);
        assert!(!verdict.is_anomaly);
    }

    #[test]
    fn test_very_low_weight_is_anomaly() {
        let engine = linear_engine();
        let assessment = engine
            .assess_risk(&Measurement::with_raw(12, Sex::Male, 75.5, 5.0))
            .expect("assessment");

        assert!(assessment.features.z_weight < -3.0);
        assert_eq!(assessment.verdict.risk_category, RiskCategory::Underweight);
        assert_eq!(assessment.model_label, "underweight");
        assert!(assessment.verdict.is_anomaly);
        assert_eq!(assessment.model_version, 1);
    }

    #[test]
    fn test_scores_only_input() {
        let engine = linear_engine();
        let m = Measurement::new(24, Sex::Female).z_height(-2.5).z_weight(0.0);
        let assessment = engine.assess_risk(&m).expect("assessment");

        assert_eq!(assessment.features.z_height, -2.5);
        assert!(assessment.features.height_cm > 0.0);
        assert!(assessment.features.bmi > 0.0);
        assert_eq!(assessment.verdict.risk_category, RiskCategory::Stunted);
    }

    #[test]
    fn test_incomplete_input() {
        let engine = linear_engine();
        let err = engine
            .classify_risk(&Measurement::new(12, Sex::Male).height(75.5))
            .expect_err("no weight axis");
        assert_eq!(err.kind(), "incomplete_input");
    }

    #[test]
    fn test_no_models_installed() {
        let engine = GrowthEngine::with_who_tables(Arc::new(ModelRegistry::empty()));
        let m = Measurement::with_raw(12, Sex::Male, 75.5, 9.8);

        assert_eq!(engine.classify_risk(&m).expect_err("no models").kind(), "model_unavailable");
        assert_eq!(
            engine.project_trajectory(&m, false).expect_err("no models").kind(),
            "model_unavailable"
        );
        assert!(engine.standardize(75.5, 12, Sex::Male, Metric::Height).is_ok());
        assert_eq!(engine.reference_series(Sex::Male).expect("series").len(), 12);
    }

    #[test]
    fn test_projection_at_table_edge() {
        let engine = linear_engine();
        let projection = engine
            .project_trajectory(&Measurement::with_raw(60, Sex::Male, 110.0, 18.5), true)
            .expect("projection");

        assert_eq!(projection.next_age_months, 61);
        assert_eq!(projection.height_status, GrowthStatus::Unknown);
        assert_eq!(projection.weight_status, GrowthStatus::Unknown);
        assert!(projection.predicted_height_cm > 110.0);
        assert_eq!(projection.percentile_bands.len(), 12);
    }

    #[test]
    fn test_reload_switches_models_for_new_calls() {
        let engine = linear_engine();
        let m = Measurement::with_raw(12, Sex::Male, 75.5, 9.8);
        assert_eq!(engine.assess_risk(&m).expect("v1").model_label, "normal");

        let rules = ModelSet::new(
            Arc::new(RuleBasedClassifier::new()),
            RuleBasedClassifier::vocabulary(),
            Arc::new(LinearRegressor::from_json(REGRESSOR_JSON).expect("regressor")),
            "rules",
        )
        .expect("rule set");
        engine.registry().install(rules).expect("install");

        let assessment = engine.assess_risk(&m).expect("v2");
        assert_eq!(assessment.model_version, 2);
        assert_eq!(assessment.verdict.confidence, 1.0);
    }

    #[test]
    fn test_out_of_range_age_is_domain_error() {
        let engine = linear_engine();
        let err = engine
            .classify_risk(&Measurement::with_raw(72, Sex::Male, 115.0, 20.0))
            .expect_err("age 72");
        assert_eq!(err.kind(), "domain_error");
    }
}
