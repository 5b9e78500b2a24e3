//! Risk model port: Trait for a trained multi-class classifier.
//!
//! The engine treats the classifier as an opaque capability. Any model that
//! honours the seven-column [`FeatureVector`] schema is substitutable.

use std::collections::HashSet;

use crate::domain::FeatureVector;

/// Errors that can occur while running a trained model.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InferenceError {
    #[error("Model produced an invalid output: {0}")]
    InvalidOutput(String),

    #[error("Model inference failed: {0}")]
    Failed(String),
}

impl From<InferenceError> for crate::GrowthError {
    fn from(e: InferenceError) -> Self {
        Self::ModelUnavailable(e.to_string())
    }
}

/// Trait for trained risk classifiers.
///
/// Class indices are positions in the companion [`LabelVocabulary`].
pub trait RiskModel: Send + Sync {
    /// Number of classes the model distinguishes.
    fn n_classes(&self) -> usize;

    /// Predicted class index.
    ///
    /// # Errors
    /// Returns `InferenceError` if the model cannot evaluate the row.
    fn predict(&self, features: &FeatureVector) -> Result<usize, InferenceError>;

    /// Probability distribution over classes, indexed like the vocabulary.
    ///
    /// # Errors
    /// Returns `InferenceError` if the model cannot evaluate the row.
    fn predict_proba(&self, features: &FeatureVector) -> Result<Vec<f64>, InferenceError>;

    /// Short identifier for logs.
    fn name(&self) -> &str {
        "risk-model"
    }
}

/// Index of the largest value; ties resolve to the first.
#[must_use]
pub fn argmax(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// Class labels ordered consistently with a classifier's indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelVocabulary {
    labels: Vec<String>,
}

impl LabelVocabulary {
    /// Create a vocabulary.
    ///
    /// # Errors
    /// Returns error if the vocabulary is empty or contains duplicates.
    pub fn new<I, S>(labels: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.is_empty() {
            return Err("Label vocabulary is empty".to_string());
        }

        let mut seen = HashSet::new();
        for label in &labels {
            if !seen.insert(label.as_str()) {
                return Err(format!("Duplicate label in vocabulary: {label}"));
            }
        }

        Ok(Self { labels })
    }

    /// Vocabulary from a compile-time list already known to be valid.
    pub(crate) fn from_static(labels: &[&str]) -> Self {
        Self {
            labels: labels.iter().map(|l| (*l).to_string()).collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary_validation() {
        assert!(LabelVocabulary::new(Vec::<String>::new()).is_err());
        assert!(LabelVocabulary::new(["normal", "normal"]).is_err());

        let vocab = LabelVocabulary::new(["normal", "stunted"]).expect("valid");
        assert_eq!(vocab.len(), 2);
        assert_eq!(vocab.get(1), Some("stunted"));
        assert_eq!(vocab.get(2), None);
    }

    #[test]
    fn test_argmax() {
        assert_eq!(argmax(&[]), None);
        assert_eq!(argmax(&[0.2, 0.5, 0.3]), Some(1));
        assert_eq!(argmax(&[0.4, 0.4, 0.2]), Some(0));
        assert_eq!(argmax(&[f64::NEG_INFINITY, -1.0]), Some(1));
    }
}
