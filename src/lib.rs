//! # Growthcheck
//!
//! Child growth standardization and risk assessment against WHO-style
//! LMS reference curves.
//!
//! This crate provides:
//! - LMS standardized scores for height-for-age and weight-for-age
//! - Risk classification with confidence and anomaly flagging
//! - Next-period growth projection with percentile-band chart data
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Reference tables, scoring, feature schemas, verdict types
//! - `ports`: Trait definitions for the trained classifier and regressor
//! - `adapters`: Concrete models and signed artifact loading
//! - `application`: Model registry and the classification/projection services
//! - `config`: Environment-driven configuration

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use application::{GrowthEngine, ModelRegistry, ModelSet, RiskAssessment};
pub use domain::{
    GrowthStatus, Measurement, Metric, RiskCategory, RiskVerdict, Sex, TrajectoryProjection,
};

/// Result type for Growthcheck operations
pub type Result<T> = std::result::Result<T, GrowthError>;

/// Main error type for Growthcheck
#[derive(Debug, thiserror::Error)]
pub enum GrowthError {
    #[error("Invalid input: {0}")]
    Domain(#[from] domain::DomainError),

    #[error("Incomplete input: neither a {axis} measurement nor a {axis} score was provided")]
    IncompleteInput { axis: domain::Metric },

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GrowthError {
    /// Stable machine-readable error kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Domain(_) => "domain_error",
            Self::IncompleteInput { .. } => "incomplete_input",
            Self::ModelUnavailable(_) => "model_unavailable",
            Self::Io(_) => "io_error",
            Self::Serialization(_) => "serialization_error",
        }
    }
}

impl From<adapters::ArtifactError> for GrowthError {
    fn from(e: adapters::ArtifactError) -> Self {
        Self::ModelUnavailable(e.to_string())
    }
}
