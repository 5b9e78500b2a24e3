//! Measurement input types.
//!
//! A [`Measurement`] is the per-request value object: age, sex and whichever of
//! the raw measurements or their standardized scores the caller has.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::DomainError;

/// Oldest age (in months) a measurement may carry.
pub const MAX_AGE_MONTHS: u32 = 60;

/// Biological sex, the partition key of every reference table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    /// Encoding used in every model feature schema (1 = male, 0 = female).
    #[must_use]
    pub fn encoded(self) -> f64 {
        match self {
            Self::Male => 1.0,
            Self::Female => 0.0,
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Male => write!(f, "male"),
            Self::Female => write!(f, "female"),
        }
    }
}

impl FromStr for Sex {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" => Ok(Self::Male),
            "female" => Ok(Self::Female),
            _ => Err(DomainError::UnknownSex(s.to_string())),
        }
    }
}

/// Measured quantity a reference table describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Length/height in centimetres
    Height,
    /// Body weight in kilograms
    Weight,
}

impl Metric {
    #[must_use]
    pub fn unit(self) -> &'static str {
        match self {
            Self::Height => "cm",
            Self::Weight => "kg",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Height => write!(f, "height"),
            Self::Weight => write!(f, "weight"),
        }
    }
}

impl FromStr for Metric {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "height" => Ok(Self::Height),
            "weight" => Ok(Self::Weight),
            _ => Err(DomainError::UnknownMetric(s.to_string())),
        }
    }
}

/// A single child measurement as supplied by the caller.
///
/// Per axis, either the raw value or a standardized score (or both) may be
/// present. Which one wins is decided by the feature builder, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Age in whole months (0-60)
    pub age_months: u32,

    pub sex: Sex,

    /// Height in cm, if measured
    pub height_cm: Option<f64>,

    /// Weight in kg, if measured
    pub weight_kg: Option<f64>,

    /// Height-for-age score, if supplied directly
    pub z_height: Option<f64>,

    /// Weight-for-age score, if supplied directly
    pub z_weight: Option<f64>,
}

impl Measurement {
    /// Create a measurement with no axis values yet.
    #[must_use]
    pub fn new(age_months: u32, sex: Sex) -> Self {
        Self {
            age_months,
            sex,
            height_cm: None,
            weight_kg: None,
            z_height: None,
            z_weight: None,
        }
    }

    /// Create a measurement carrying both raw values.
    #[must_use]
    pub fn with_raw(age_months: u32, sex: Sex, height_cm: f64, weight_kg: f64) -> Self {
        Self::new(age_months, sex)
            .height(height_cm)
            .weight(weight_kg)
    }

    #[must_use]
    pub fn height(mut self, height_cm: f64) -> Self {
        self.height_cm = Some(height_cm);
        self
    }

    #[must_use]
    pub fn weight(mut self, weight_kg: f64) -> Self {
        self.weight_kg = Some(weight_kg);
        self
    }

    #[must_use]
    pub fn z_height(mut self, z: f64) -> Self {
        self.z_height = Some(z);
        self
    }

    #[must_use]
    pub fn z_weight(mut self, z: f64) -> Self {
        self.z_weight = Some(z);
        self
    }

    /// Raw value for the given axis.
    #[must_use]
    pub fn raw(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Height => self.height_cm,
            Metric::Weight => self.weight_kg,
        }
    }

    /// Directly supplied score for the given axis.
    #[must_use]
    pub fn supplied_score(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Height => self.z_height,
            Metric::Weight => self.z_weight,
        }
    }

    /// Validate the age and the value domains of whatever is present.
    ///
    /// Does not check that each axis is resolvable; that is the feature
    /// builder's job since it depends on what the caller asks for.
    ///
    /// # Errors
    /// Returns the first offending value as a `DomainError`.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.age_months > MAX_AGE_MONTHS {
            return Err(DomainError::AgeNotSupported {
                age_months: self.age_months,
                max: MAX_AGE_MONTHS,
            });
        }
        for metric in [Metric::Height, Metric::Weight] {
            if let Some(value) = self.raw(metric) {
                if !value.is_finite() || value <= 0.0 {
                    return Err(DomainError::NonPositiveMeasurement { metric, value });
                }
            }
            if let Some(value) = self.supplied_score(metric) {
                if !value.is_finite() {
                    return Err(DomainError::NonFiniteScore { metric, value });
                }
            }
        }
        Ok(())
    }
}
