//! Adapters layer: Concrete implementations of ports.
//!
//! - `artifacts`: model-directory loading with signed manifest verification
//! - `linear`: JSON-exported softmax classifier and linear regressor
//! - `rules`: threshold classifier reproducing the training-label rule

pub mod artifacts;
pub mod linear;
pub mod rules;

pub use artifacts::{ArtifactError, ModelArtifacts, SignedManifest, VerificationPolicy};
pub use linear::{LinearRegressor, SoftmaxClassifier};
pub use rules::RuleBasedClassifier;
