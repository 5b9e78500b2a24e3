//! Artifact adapter: loads trained model files from a model directory.
//!
//! A model directory holds:
//! - `classifier.json`: [`SoftmaxClassifier`] export
//! - `labels.json`: JSON array of class labels, index-aligned with the classifier
//! - `regressor.json`: [`LinearRegressor`] export
//! - `manifest.json` + `model.sig`: optional signed manifest binding the above
//!
//! # Security
//!
//! - The manifest carries SHA-256 digests of every bound file
//! - `model.sig` is an Ed25519 signature over the raw manifest bytes
//! - When signatures are required, an unsigned directory is refused
//! - Digest comparison is constant-time

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::adapters::linear::{LinearRegressor, SoftmaxClassifier};
use crate::ports::{LabelVocabulary, RiskModel};

pub const CLASSIFIER_FILE: &str = "classifier.json";
pub const LABELS_FILE: &str = "labels.json";
pub const REGRESSOR_FILE: &str = "regressor.json";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const SIGNATURE_FILE: &str = "model.sig";

/// Files every signed manifest must bind.
pub const REQUIRED_ARTIFACTS: [&str; 3] = [CLASSIFIER_FILE, LABELS_FILE, REGRESSOR_FILE];

const MANIFEST_VERSION: u32 = 1;

/// Errors raised while reading or verifying model artifacts.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed artifact: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Feature schema mismatch: expected {expected:?}, got {got:?}")]
    Schema { expected: Vec<String>, got: Vec<String> },

    #[error("Inconsistent model parameters: {0}")]
    Shape(String),

    #[error("Invalid label vocabulary: {0}")]
    Vocabulary(String),

    #[error("Classifier has {classes} classes but vocabulary has {labels} labels")]
    VocabularyMismatch { classes: usize, labels: usize },

    #[error("Model signature required but {0} is missing")]
    Unsigned(PathBuf),

    #[error("Signature verification failed: {0}")]
    Signature(String),

    #[error("Invalid manifest: {0}")]
    Manifest(String),

    #[error("File hash mismatch for {0}")]
    HashMismatch(String),
}

/// Signed manifest binding artifact files to their SHA-256 digests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedManifest {
    pub version: u32,

    /// Monotonic release counter chosen by the signer
    #[serde(default)]
    pub serial: Option<u64>,

    /// Unix timestamp (seconds) of signing
    #[serde(default)]
    pub created_at: Option<i64>,

    /// Relative file name -> lowercase hex SHA-256
    pub files: BTreeMap<String, String>,
}

/// How strictly a model directory is verified.
#[derive(Debug, Clone, Default)]
pub struct VerificationPolicy {
    /// Refuse directories without `manifest.json` + `model.sig`
    pub require_signature: bool,

    /// Key used to check `model.sig`; required whenever a manifest is present
    pub verifying_key: Option<VerifyingKey>,
}

impl VerificationPolicy {
    /// Policy that accepts unsigned directories but still verifies
    /// manifests that are present (given a key).
    #[must_use]
    pub fn permissive(verifying_key: Option<VerifyingKey>) -> Self {
        Self {
            require_signature: false,
            verifying_key,
        }
    }

    #[must_use]
    pub fn strict(verifying_key: VerifyingKey) -> Self {
        Self {
            require_signature: true,
            verifying_key: Some(verifying_key),
        }
    }
}

/// Parsed, validated contents of a model directory.
#[derive(Debug, Clone)]
pub struct ModelArtifacts {
    pub classifier: SoftmaxClassifier,
    pub labels: LabelVocabulary,
    pub regressor: LinearRegressor,

    /// Manifest that bound the files, when the directory was signed
    pub manifest: Option<SignedManifest>,

    pub source: PathBuf,
}

impl ModelArtifacts {
    /// Load and validate every artifact in `dir`.
    ///
    /// Signature and digests are checked before any model file is parsed.
    ///
    /// # Errors
    /// Returns `ArtifactError` if verification fails, a file is missing or
    /// malformed, or the classifier and vocabulary disagree.
    pub fn load(dir: &Path, policy: &VerificationPolicy) -> Result<Self, ArtifactError> {
        let manifest = verify_directory(dir, policy)?;

        let classifier = SoftmaxClassifier::from_json(&read_string(&dir.join(CLASSIFIER_FILE))?)?;
        let labels = parse_labels(&read_string(&dir.join(LABELS_FILE))?)?;
        let regressor = LinearRegressor::from_json(&read_string(&dir.join(REGRESSOR_FILE))?)?;

        if classifier.n_classes() != labels.len() {
            return Err(ArtifactError::VocabularyMismatch {
                classes: classifier.n_classes(),
                labels: labels.len(),
            });
        }

        tracing::info!(
            dir = %dir.display(),
            classes = labels.len(),
            signed = manifest.is_some(),
            "Model artifacts loaded"
        );

        Ok(Self {
            classifier,
            labels,
            regressor,
            manifest,
            source: dir.to_path_buf(),
        })
    }
}

/// Parse `labels.json` (a JSON array of strings).
///
/// # Errors
/// Returns error on malformed JSON, an empty list or duplicate labels.
pub fn parse_labels(json: &str) -> Result<LabelVocabulary, ArtifactError> {
    let labels: Vec<String> = serde_json::from_str(json)?;
    LabelVocabulary::new(labels).map_err(ArtifactError::Vocabulary)
}

fn read_string(path: &Path) -> Result<String, ArtifactError> {
    fs::read_to_string(path).map_err(|source| ArtifactError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, ArtifactError> {
    fs::read(path).map_err(|source| ArtifactError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Verify the signed manifest in `dir`, if any.
///
/// Returns `Ok(None)` for an unsigned directory when the policy allows it.
///
/// # Errors
/// Returns `ArtifactError` if the signature or any bound digest is invalid,
/// or the directory is unsigned under a strict policy.
pub fn verify_directory(
    dir: &Path,
    policy: &VerificationPolicy,
) -> Result<Option<SignedManifest>, ArtifactError> {
    let sig_path = dir.join(SIGNATURE_FILE);
    let manifest_path = dir.join(MANIFEST_FILE);

    if !sig_path.exists() || !manifest_path.exists() {
        if policy.require_signature {
            let missing = if sig_path.exists() { manifest_path } else { sig_path };
            tracing::error!(path = %missing.display(), "Signed models required but signature material missing");
            return Err(ArtifactError::Unsigned(missing));
        }
        tracing::warn!(dir = %dir.display(), "Loading UNSIGNED model artifacts");
        return Ok(None);
    }

    let verifying_key = policy.verifying_key.as_ref().ok_or_else(|| {
        ArtifactError::Signature("manifest present but no verifying key configured".into())
    })?;

    let sig_bytes = read_bytes(&sig_path)?;
    let sig_array: [u8; 64] = sig_bytes
        .as_slice()
        .try_into()
        .map_err(|_| ArtifactError::Signature("invalid signature length (expected 64 bytes)".into()))?;
    let signature = Signature::from_bytes(&sig_array);

    let manifest_bytes = read_bytes(&manifest_path)?;
    verifying_key
        .verify(&manifest_bytes, &signature)
        .map_err(|_| ArtifactError::Signature("invalid model signature".into()))?;

    let manifest: SignedManifest = serde_json::from_slice(&manifest_bytes)
        .map_err(|e| ArtifactError::Manifest(format!("invalid manifest.json format: {e}")))?;
    if manifest.version != MANIFEST_VERSION {
        return Err(ArtifactError::Manifest(format!(
            "unsupported manifest version: {}",
            manifest.version
        )));
    }

    if let Some(missing) = REQUIRED_ARTIFACTS
        .iter()
        .find(|name| !manifest.files.contains_key(**name))
    {
        return Err(ArtifactError::Manifest(format!("manifest does not bind {missing}")));
    }

    for (rel, expected_hex) in &manifest.files {
        if Path::new(rel).components().count() != 1 {
            return Err(ArtifactError::Manifest(format!(
                "manifest entry {rel:?} must be a plain file name"
            )));
        }
        let actual_hex = sha256_hex(&read_bytes(&dir.join(rel))?);
        if !constant_time_eq_str(&actual_hex, expected_hex) {
            return Err(ArtifactError::HashMismatch(rel.clone()));
        }
    }

    tracing::info!(
        serial = ?manifest.serial,
        files = manifest.files.len(),
        "Model signature and hashes verified"
    );
    Ok(Some(manifest))
}

/// Decode a base64 Ed25519 verifying key (32 bytes).
///
/// # Errors
/// Returns error if the text is not base64 or not a valid key.
pub fn verifying_key_from_b64(b64: &str) -> Result<VerifyingKey, ArtifactError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(b64.trim())
        .map_err(|_| ArtifactError::Signature("invalid public key base64".into()))?;
    let key: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| ArtifactError::Signature("invalid public key length (expected 32 bytes)".into()))?;
    VerifyingKey::from_bytes(&key)
        .map_err(|_| ArtifactError::Signature("invalid verifying key".into()))
}

/// Read a base64 verifying key from a file.
///
/// # Errors
/// Returns error if the file is unreadable or holds an invalid key.
pub fn verifying_key_from_file(path: &Path) -> Result<VerifyingKey, ArtifactError> {
    verifying_key_from_b64(&read_string(path)?)
}

/// Lowercase hex SHA-256 of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn constant_time_eq_str(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes().iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
