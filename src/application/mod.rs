//! Application layer: Use cases and services.
//!
//! This module orchestrates domain logic with ports to implement
//! standardization, risk classification and trajectory projection.

mod engine;
mod registry;
mod risk;
mod trajectory;

pub use engine::GrowthEngine;
pub use registry::{ModelRegistry, ModelSet, ModelSetInfo};
pub use risk::{RiskAssessment, RiskClassifier};
pub use trajectory::{percentile_series, TrajectoryPredictor};
