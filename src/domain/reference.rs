//! LMS reference tables (WHO Child Growth Standards, 0-60 months).
//!
//! The table is sparse: entries exist only at the standard age bands, and
//! lookups resolve to the nearest band rather than interpolating.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{DomainError, Metric, Sex};

/// Distribution parameters for one sex, metric and age band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    /// Age band in months
    pub age_band: u32,

    /// Box-Cox power
    #[serde(rename = "L")]
    pub l: f64,

    /// Median
    #[serde(rename = "M")]
    pub m: f64,

    /// Coefficient of variation
    #[serde(rename = "S")]
    pub s: f64,
}

impl ReferenceEntry {
    #[must_use]
    pub const fn new(age_band: u32, l: f64, m: f64, s: f64) -> Self {
        Self { age_band, l, m, s }
    }

    /// Approximate standard deviation of the band (`M * S`).
    #[must_use]
    pub fn sd(&self) -> f64 {
        self.m * self.s
    }
}

/// Age bands (months) of the built-in WHO tables.
pub const WHO_AGE_BANDS: [u32; 12] = [0, 1, 2, 3, 6, 9, 12, 18, 24, 36, 48, 60];

// (L, M, S) per band, in WHO_AGE_BANDS order.
const HEIGHT_MALE: [(f64, f64, f64); 12] = [
    (1.0, 49.8842, 0.03795),
    (1.0, 54.7244, 0.03557),
    (1.0, 58.4249, 0.03424),
    (1.0, 61.4292, 0.03328),
    (1.0, 67.2516, 0.03257),
    (1.0, 71.4818, 0.0322),
    (1.0, 75.6709, 0.03164),
    (1.0, 82.7761, 0.02922),
    (1.0, 87.094, 0.02796),
    (1.0, 95.2506, 0.02634),
    (1.0, 102.352, 0.02544),
    (1.0, 108.411, 0.02519),
];

const HEIGHT_FEMALE: [(f64, f64, f64); 12] = [
    (1.0, 49.1477, 0.0379),
    (1.0, 53.6872, 0.0364),
    (1.0, 57.0673, 0.03568),
    (1.0, 59.8029, 0.0352),
    (1.0, 65.4606, 0.03424),
    (1.0, 69.8135, 0.0339),
    (1.0, 74.0, 0.03337),
    (1.0, 80.698, 0.03192),
    (1.0, 85.6346, 0.0309),
    (1.0, 94.1076, 0.02917),
    (1.0, 101.054, 0.02818),
    (1.0, 107.418, 0.02777),
];

const WEIGHT_MALE: [(f64, f64, f64); 12] = [
    (0.3487, 3.3464, 0.14602),
    (0.2297, 4.4709, 0.13395),
    (0.197, 5.5675, 0.12385),
    (0.1738, 6.3762, 0.11727),
    (0.1553, 7.9322, 0.11316),
    (0.1395, 8.9626, 0.1108),
    (0.1268, 9.7289, 0.10958),
    (0.1041, 10.7095, 0.11047),
    (0.0876, 11.4805, 0.11228),
    (0.067, 13.346, 0.11023),
    (0.0549, 15.099, 0.10816),
    (0.0448, 16.514, 0.10632),
];

const WEIGHT_FEMALE: [(f64, f64, f64); 12] = [
    (0.3809, 3.2322, 0.14171),
    (0.1714, 4.1873, 0.14478),
    (0.096, 5.1282, 0.1327),
    (0.0402, 5.8458, 0.1236),
    (-0.005, 7.24, 0.11727),
    (-0.043, 8.1466, 0.11364),
    (-0.0756, 8.875, 0.11101),
    (-0.1399, 9.8129, 0.10842),
    (-0.1911, 10.5561, 0.10741),
    (-0.2384, 12.108, 0.10632),
    (-0.2689, 13.761, 0.10408),
    (-0.2708, 15.351, 0.10115),
];

/// On-disk shape of a standards file: `metric -> sex -> entries`.
type StandardsFile = BTreeMap<Metric, BTreeMap<Sex, Vec<ReferenceEntry>>>;

/// Immutable, sex-partitioned LMS reference table.
///
/// Built once at startup and shared read-only (`Arc<ReferenceTable>`).
#[derive(Debug, Clone)]
pub struct ReferenceTable {
    tables: BTreeMap<(Sex, Metric), Vec<ReferenceEntry>>,
}

impl ReferenceTable {
    /// The built-in WHO height-for-age and weight-for-age tables.
    #[must_use]
    pub fn who() -> Self {
        fn entries(rows: &[(f64, f64, f64); 12]) -> Vec<ReferenceEntry> {
            WHO_AGE_BANDS
                .iter()
                .zip(rows.iter())
                .map(|(&band, &(l, m, s))| ReferenceEntry::new(band, l, m, s))
                .collect()
        }

        let mut tables = BTreeMap::new();
        tables.insert((Sex::Male, Metric::Height), entries(&HEIGHT_MALE));
        tables.insert((Sex::Female, Metric::Height), entries(&HEIGHT_FEMALE));
        tables.insert((Sex::Male, Metric::Weight), entries(&WEIGHT_MALE));
        tables.insert((Sex::Female, Metric::Weight), entries(&WEIGHT_FEMALE));
        Self { tables }
    }

    /// Build a table from explicit entries, enforcing table invariants.
    ///
    /// Every (sex, metric) pair must be present and non-empty, and bands
    /// must be strictly increasing.
    ///
    /// # Errors
    /// Returns `DomainError` on an empty table, unordered or duplicate
    /// bands, or invalid LMS parameters.
    pub fn from_entries(
        tables: BTreeMap<(Sex, Metric), Vec<ReferenceEntry>>,
    ) -> Result<Self, DomainError> {
        for sex in [Sex::Male, Sex::Female] {
            for metric in [Metric::Height, Metric::Weight] {
                let entries = tables
                    .get(&(sex, metric))
                    .filter(|e| !e.is_empty())
                    .ok_or(DomainError::EmptyTable { sex, metric })?;

                for pair in entries.windows(2) {
                    if pair[1].age_band <= pair[0].age_band {
                        return Err(DomainError::UnorderedBands {
                            sex,
                            metric,
                            previous: pair[0].age_band,
                            age_band: pair[1].age_band,
                        });
                    }
                }

                for e in entries {
                    let valid = e.l.is_finite()
                        && e.m.is_finite()
                        && e.s.is_finite()
                        && e.m > 0.0
                        && e.s != 0.0;
                    if !valid {
                        return Err(DomainError::InvalidParameters {
                            age_band: e.age_band,
                            l: e.l,
                            m: e.m,
                            s: e.s,
                        });
                    }
                }
            }
        }

        Ok(Self { tables })
    }

    /// Parse a standards JSON document (`{"height": {"male": [...], ...}, ...}`).
    ///
    /// # Errors
    /// Returns `crate::GrowthError::Serialization` on malformed JSON and
    /// `crate::GrowthError::Domain` when the table invariants do not hold.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        let file: StandardsFile = serde_json::from_str(json)?;
        let mut tables = BTreeMap::new();
        for (metric, by_sex) in file {
            for (sex, entries) in by_sex {
                tables.insert((sex, metric), entries);
            }
        }
        Ok(Self::from_entries(tables)?)
    }

    /// Load a standards file from disk.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or fails validation.
    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let table = Self::from_json(&content)?;
        tracing::info!("Loaded reference standards from {:?}", path);
        Ok(table)
    }

    /// Serialize to the standards file shape accepted by [`Self::from_json`].
    ///
    /// # Errors
    /// Returns error if serialization fails.
    pub fn to_json(&self) -> crate::Result<String> {
        let mut file: StandardsFile = BTreeMap::new();
        for (&(sex, metric), entries) in &self.tables {
            file.entry(metric).or_default().insert(sex, entries.clone());
        }
        Ok(serde_json::to_string_pretty(&file)?)
    }

    /// All entries for a (sex, metric) pair, in ascending band order.
    ///
    /// # Errors
    /// Returns `DomainError::EmptyTable` if the pair has no entries.
    pub fn entries(&self, sex: Sex, metric: Metric) -> Result<&[ReferenceEntry], DomainError> {
        self.tables
            .get(&(sex, metric))
            .map(Vec::as_slice)
            .filter(|e| !e.is_empty())
            .ok_or(DomainError::EmptyTable { sex, metric })
    }

    /// First and last band covered for a (sex, metric) pair.
    ///
    /// # Errors
    /// Returns `DomainError::EmptyTable` if the pair has no entries.
    pub fn covered_range(&self, sex: Sex, metric: Metric) -> Result<(u32, u32), DomainError> {
        let entries = self.entries(sex, metric)?;
        match (entries.first(), entries.last()) {
            (Some(first), Some(last)) => Ok((first.age_band, last.age_band)),
            _ => Err(DomainError::EmptyTable { sex, metric }),
        }
    }

    /// Resolve the entry whose band is nearest to `age_months`.
    ///
    /// Ties go to the lower band. Ages outside the covered range are
    /// rejected rather than clamped to the boundary band.
    ///
    /// # Errors
    /// Returns `DomainError::EmptyTable` or `DomainError::AgeOutOfRange`.
    pub fn lookup(
        &self,
        sex: Sex,
        metric: Metric,
        age_months: u32,
    ) -> Result<ReferenceEntry, DomainError> {
        let entries = self.entries(sex, metric)?;
        let (min, max) = self.covered_range(sex, metric)?;
        if age_months < min || age_months > max {
            return Err(DomainError::AgeOutOfRange {
                age_months,
                sex,
                metric,
                min,
                max,
            });
        }

        entries
            .iter()
            .min_by_key(|e| (e.age_band.abs_diff(age_months), e.age_band))
            .copied()
            .ok_or(DomainError::EmptyTable { sex, metric })
    }
}

impl Default for ReferenceTable {
    fn default() -> Self {
        Self::who()
    }
}
