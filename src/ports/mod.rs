//! Ports layer: Trait definitions for external collaborators.
//!
//! Following Hexagonal Architecture, these traits define the boundaries
//! between the engine and the trained models it consumes.

mod classifier;
mod regressor;

pub use classifier::{argmax, InferenceError, LabelVocabulary, RiskModel};
pub use regressor::{GrowthPrediction, GrowthRegressor};
