//! Environment-driven configuration.
//!
//! Overrides are best-effort: a value that fails to parse or falls outside
//! its valid range is ignored and the default kept.

use std::path::PathBuf;

use crate::adapters::artifacts::{verifying_key_from_file, ArtifactError, VerificationPolicy};

/// Decision thresholds for classification and projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Verdicts below this confidence are flagged as anomalies
    pub min_confidence: f64,

    /// Scores beyond ±this on either axis are flagged as anomalies
    pub anomaly_z_limit: f64,

    /// Projected scores within ±this are `normal`
    pub status_z_limit: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.6,
            anomaly_z_limit: 3.0,
            status_z_limit: 2.0,
        }
    }
}

impl EngineConfig {
    /// Load config overrides from environment (best-effort).
    ///
    /// Supported:
    /// - GROWTHCHECK_MIN_CONFIDENCE (in (0, 1])
    /// - GROWTHCHECK_ANOMALY_Z_LIMIT (> 0)
    /// - GROWTHCHECK_STATUS_Z_LIMIT (> 0)
    #[must_use]
    pub fn from_env_or_default() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        if let Some(x) = parse_positive(lookup("GROWTHCHECK_MIN_CONFIDENCE")) {
            if x <= 1.0 {
                cfg.min_confidence = x;
            }
        }
        if let Some(x) = parse_positive(lookup("GROWTHCHECK_ANOMALY_Z_LIMIT")) {
            cfg.anomaly_z_limit = x;
        }
        if let Some(x) = parse_positive(lookup("GROWTHCHECK_STATUS_Z_LIMIT")) {
            cfg.status_z_limit = x;
        }

        cfg
    }
}

fn parse_positive(value: Option<String>) -> Option<f64> {
    value
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|x| x.is_finite() && *x > 0.0)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim() {
        "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
        "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
        _ => None,
    }
}

/// Deployment settings: where models and standards live and how they are
/// verified.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub model_dir: PathBuf,

    /// Replacement standards table; the built-in WHO table when absent
    pub standards_file: Option<PathBuf>,

    pub require_signed_models: bool,

    /// File holding the base64 Ed25519 verifying key for `model.sig`
    pub pubkey_file: Option<PathBuf>,

    pub engine: EngineConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            standards_file: None,
            // Release builds refuse unsigned artifacts unless told otherwise.
            require_signed_models: !cfg!(debug_assertions),
            pubkey_file: None,
            engine: EngineConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load config overrides from environment (best-effort).
    ///
    /// Supported:
    /// - GROWTHCHECK_MODEL_DIR
    /// - GROWTHCHECK_STANDARDS_FILE
    /// - GROWTHCHECK_REQUIRE_SIGNED_MODELS
    /// - GROWTHCHECK_MODEL_PUBKEY_B64_FILE
    /// - the [`EngineConfig`] thresholds
    #[must_use]
    pub fn from_env_or_default() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self {
            engine: EngineConfig::from_lookup(&lookup),
            ..Self::default()
        };

        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(dir) = non_empty("GROWTHCHECK_MODEL_DIR") {
            cfg.model_dir = PathBuf::from(dir.trim());
        }
        if let Some(path) = non_empty("GROWTHCHECK_STANDARDS_FILE") {
            cfg.standards_file = Some(PathBuf::from(path.trim()));
        }
        if let Some(flag) = non_empty("GROWTHCHECK_REQUIRE_SIGNED_MODELS").and_then(|v| parse_bool(&v)) {
            cfg.require_signed_models = flag;
        }
        if let Some(path) = non_empty("GROWTHCHECK_MODEL_PUBKEY_B64_FILE") {
            cfg.pubkey_file = Some(PathBuf::from(path.trim()));
        }

        cfg
    }

    /// Build the artifact verification policy.
    ///
    /// # Errors
    /// Returns error if signatures are required but no key is configured,
    /// or the key file cannot be read.
    pub fn verification_policy(&self) -> Result<VerificationPolicy, ArtifactError> {
        let verifying_key = self
            .pubkey_file
            .as_deref()
            .map(verifying_key_from_file)
            .transpose()?;

        if self.require_signed_models && verifying_key.is_none() {
            return Err(ArtifactError::Signature(
                "signed models required but GROWTHCHECK_MODEL_PUBKEY_B64_FILE is not set".into(),
            ));
        }

        Ok(VerificationPolicy {
            require_signature: self.require_signed_models,
            verifying_key,
        })
    }
}
