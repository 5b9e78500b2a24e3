//! Model registry: versioned handle to the active classifier and regressor.
//!
//! Readers take an `Arc<ModelSet>` snapshot and keep using it for the whole
//! call; a reload builds and validates the replacement completely before
//! swapping it in, so no call ever observes a partially loaded set.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::adapters::{ModelArtifacts, VerificationPolicy};
use crate::application::RiskClassifier;
use crate::ports::{GrowthRegressor, LabelVocabulary, RiskModel};
use crate::{GrowthError, Result};

/// A classifier, its vocabulary and a regressor that were loaded together.
#[derive(Clone)]
pub struct ModelSet {
    classifier: RiskClassifier,
    regressor: Arc<dyn GrowthRegressor>,
    version: u64,
    source: String,
    loaded_at: DateTime<Utc>,
    manifest_serial: Option<u64>,
}

impl std::fmt::Debug for ModelSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSet")
            .field("classifier", &self.classifier)
            .field("regressor", &self.regressor.name())
            .field("version", &self.version)
            .field("source", &self.source)
            .field("loaded_at", &self.loaded_at)
            .finish()
    }
}

impl ModelSet {
    /// Assemble a set from in-memory models.
    ///
    /// # Errors
    /// Returns `ModelUnavailable` if the classifier and vocabulary disagree.
    pub fn new(
        classifier: Arc<dyn RiskModel>,
        labels: LabelVocabulary,
        regressor: Arc<dyn GrowthRegressor>,
        source: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            classifier: RiskClassifier::new(classifier, labels)?,
            regressor,
            version: 0,
            source: source.into(),
            loaded_at: Utc::now(),
            manifest_serial: None,
        })
    }

    /// Load and verify a model directory.
    ///
    /// # Errors
    /// Returns `ModelUnavailable` if any artifact is missing, malformed,
    /// inconsistent or fails verification.
    pub fn from_dir(dir: &Path, policy: &VerificationPolicy) -> Result<Self> {
        Self::from_artifacts(ModelArtifacts::load(dir, policy)?)
    }

    /// # Errors
    /// Returns `ModelUnavailable` if the classifier and vocabulary disagree.
    pub fn from_artifacts(artifacts: ModelArtifacts) -> Result<Self> {
        let mut set = Self::new(
            Arc::new(artifacts.classifier),
            artifacts.labels,
            Arc::new(artifacts.regressor),
            artifacts.source.display().to_string(),
        )?;
        set.manifest_serial = artifacts.manifest.and_then(|m| m.serial);
        Ok(set)
    }

    #[must_use]
    pub fn classifier(&self) -> &RiskClassifier {
        &self.classifier
    }

    #[must_use]
    pub fn regressor(&self) -> Arc<dyn GrowthRegressor> {
        Arc::clone(&self.regressor)
    }

    /// Registry version; 0 until installed.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Summary for logs and the `inspect-models` command.
    #[must_use]
    pub fn info(&self) -> ModelSetInfo {
        ModelSetInfo {
            version: self.version,
            source: self.source.clone(),
            loaded_at: self.loaded_at,
            classifier: self.classifier.model_name().to_string(),
            labels: self.classifier.labels().labels().to_vec(),
            regressor: self.regressor.name().to_string(),
            manifest_serial: self.manifest_serial,
        }
    }
}

/// Serializable description of an installed [`ModelSet`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSetInfo {
    pub version: u64,
    pub source: String,
    pub loaded_at: DateTime<Utc>,
    pub classifier: String,
    pub labels: Vec<String>,
    pub regressor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest_serial: Option<u64>,
}

/// Holds the active [`ModelSet`] and swaps it atomically.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    active: RwLock<Option<Arc<ModelSet>>>,
    version: AtomicU64,
}

impl ModelRegistry {
    /// Registry with no models; classification fails until one is installed.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with `set` already installed as version 1.
    #[must_use]
    pub fn with_models(set: ModelSet) -> Self {
        tracing::info!(version = 1, source = %set.source, "Model set installed");
        Self {
            active: RwLock::new(Some(Arc::new(ModelSet { version: 1, ..set }))),
            version: AtomicU64::new(1),
        }
    }

    /// Snapshot of the active set.
    ///
    /// # Errors
    /// Returns `ModelUnavailable` if nothing has been installed.
    pub fn current(&self) -> Result<Arc<ModelSet>> {
        let guard = self
            .active
            .read()
            .map_err(|_| GrowthError::ModelUnavailable("model registry lock poisoned".into()))?;
        guard
            .as_ref()
            .map(Arc::clone)
            .ok_or_else(|| GrowthError::ModelUnavailable("no model set installed".into()))
    }

    /// Install `set`, replacing the active one. Returns the new version.
    ///
    /// # Errors
    /// Returns `ModelUnavailable` if the registry lock is poisoned.
    pub fn install(&self, set: ModelSet) -> Result<u64> {
        let mut guard = self
            .active
            .write()
            .map_err(|_| GrowthError::ModelUnavailable("model registry lock poisoned".into()))?;
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        let set = ModelSet { version, ..set };
        tracing::info!(version, source = %set.source, "Model set installed");
        *guard = Some(Arc::new(set));
        Ok(version)
    }

    /// Load `dir` and install it. On failure the active set is untouched.
    ///
    /// # Errors
    /// Returns `ModelUnavailable` if loading or verification fails.
    pub fn reload_from_dir(&self, dir: &Path, policy: &VerificationPolicy) -> Result<u64> {
        match ModelSet::from_dir(dir, policy) {
            Ok(set) => self.install(set),
            Err(e) => {
                tracing::error!(dir = %dir.display(), "Model reload failed, keeping active set: {e}");
                Err(e)
            }
        }
    }

    /// Version of the active set; 0 when empty.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::RuleBasedClassifier;
    use crate::domain::{FeatureVector, TrajectoryFeatures};
    use crate::ports::{GrowthPrediction, InferenceError};

    struct Identity;

    impl GrowthRegressor for Identity {
        fn predict(
            &self,
            f: &TrajectoryFeatures,
        ) -> std::result::Result<GrowthPrediction, InferenceError> {
            Ok(GrowthPrediction {
                height_cm: f.height_cm,
                weight_kg: f.weight_kg,
            })
        }
    }

    fn rule_set(source: &str) -> ModelSet {
        ModelSet::new(
            Arc::new(RuleBasedClassifier::new()),
            RuleBasedClassifier::vocabulary(),
            Arc::new(Identity),
            source,
        )
        .expect("rule set")
    }

    #[test]
    fn test_empty_registry_is_unavailable() {
        let registry = ModelRegistry::empty();
        assert_eq!(registry.version(), 0);
        let err = registry.current().expect_err("nothing installed");
        assert_eq!(err.kind(), "model_unavailable");
    }

    #[test]
    fn test_install_bumps_version() {
        let registry = ModelRegistry::with_models(rule_set("first"));
        assert_eq!(registry.version(), 1);

        let before = registry.current().expect("current");
        let v = registry.install(rule_set("second")).expect("install");
        assert_eq!(v, 2);

        // A snapshot taken before the swap still points at the old set.
        assert_eq!(before.source(), "first");
        assert_eq!(before.version(), 1);

        let after = registry.current().expect("current");
        assert_eq!(after.source(), "second");
        assert_eq!(after.version(), 2);
    }

    #[test]
    fn test_inconsistent_set_rejected() {
        let labels = LabelVocabulary::new(["normal", "stunted"]).expect("labels");
        let err = ModelSet::new(
            Arc::new(RuleBasedClassifier::new()),
            labels,
            Arc::new(Identity),
            "bad",
        )
        .expect_err("7 classes vs 2 labels");
        assert_eq!(err.kind(), "model_unavailable");
    }

    #[test]
    fn test_bundled_models_load() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("models");
        let set = ModelSet::from_dir(&dir, &VerificationPolicy::permissive(None))
            .expect("bundled models");

        let info = set.info();
        assert_eq!(info.classifier, "softmax-classifier");
        assert_eq!(info.labels, ["normal", "overweight", "stunted", "underweight"]);
        assert_eq!(info.regressor, "linear-regressor");
        assert_eq!(info.manifest_serial, None);
    }

    #[test]
    fn test_failed_reload_keeps_active_set() {
        let registry = ModelRegistry::with_models(rule_set("good"));
        let temp = tempfile::tempdir().expect("tempdir");

        let err = registry
            .reload_from_dir(temp.path(), &VerificationPolicy::permissive(None))
            .expect_err("empty dir");
        assert_eq!(err.kind(), "model_unavailable");
        assert_eq!(registry.version(), 1);
        assert_eq!(registry.current().expect("current").source(), "good");
    }

    #[test]
    fn test_concurrent_readers_see_whole_sets() {
        let registry = Arc::new(ModelRegistry::with_models(rule_set("v1")));
        let features = FeatureVector {
            age_months: 12.0,
            sex_encoded: 1.0,
            height_cm: 75.5,
            weight_kg: 9.8,
            bmi: 17.19,
            z_weight: 0.07,
            z_height: -0.07,
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        let set = registry.current().expect("current");
                        assert!(set.version() >= 1);
                        let verdict = set
                            .classifier()
                            .classify(&features, &crate::config::EngineConfig::default())
                            .expect("classify");
                        assert!(!verdict.is_anomaly);
                    }
                })
            })
            .collect();

        for i in 0..20 {
            registry.install(rule_set(&format!("v{}", i + 2))).expect("install");
        }
        for handle in readers {
            handle.join().expect("reader thread");
        }
        assert_eq!(registry.version(), 21);
    }
}
