//! Feature vector derivation
//!
//! Every model is trained and evaluated on the same 28 inputs, in this order:
//! eight morphology measurements, sixteen colour indices (adjacent-band
//! differences in each of the four magnitude systems) and the four r-band
//! magnitudes.

use crate::catalog::{CatalogRow, MagSystem, BANDS, MORPHOLOGY_COLUMNS, R_BAND};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of model inputs
pub const N_FEATURES: usize = 28;

/// Input names, in model order
pub const FEATURE_NAMES: [&str; N_FEATURES] = [
    "petror50_r",
    "petror90_r",
    "lnlstar_r",
    "lnlexp_r",
    "lnldev_r",
    "me1_r",
    "me2_r",
    "mrrcc_r",
    "fibermag_u-fibermag_g",
    "fibermag_g-fibermag_r",
    "fibermag_r-fibermag_i",
    "fibermag_i-fibermag_z",
    "psfmag_u-psfmag_g",
    "psfmag_g-psfmag_r",
    "psfmag_r-psfmag_i",
    "psfmag_i-psfmag_z",
    "modelmag_u-modelmag_g",
    "modelmag_g-modelmag_r",
    "modelmag_r-modelmag_i",
    "modelmag_i-modelmag_z",
    "petromag_u-petromag_g",
    "petromag_g-petromag_r",
    "petromag_r-petromag_i",
    "petromag_i-petromag_z",
    "fibermag_r",
    "psfmag_r",
    "modelmag_r",
    "petromag_r",
];

/// Position of the first colour index
pub const COLOUR_OFFSET: usize = 8;
/// Position of the first raw magnitude
pub const MAGNITUDE_OFFSET: usize = 24;

/// Ordered model inputs for one catalog row
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector(pub [f64; N_FEATURES]);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Colour index `system_{band} - system_{band+1}`
    pub fn colour(&self, system: MagSystem, band: usize) -> f64 {
        self.0[COLOUR_OFFSET + system as usize * 4 + band]
    }

    /// Raw r-band magnitude of a system
    pub fn magnitude_r(&self, system: MagSystem) -> f64 {
        self.0[MAGNITUDE_OFFSET + system as usize]
    }
}

/// A row input was absent; names the first missing catalog column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingValue(pub String);

impl fmt::Display for MissingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "missing value for {}", self.0)
    }
}

impl std::error::Error for MissingValue {}

fn require_magnitude(row: &CatalogRow, system: MagSystem, band: usize) -> Result<f64, MissingValue> {
    row.magnitude(system, band)
        .ok_or_else(|| MissingValue(system.column(band)))
}

/// Build the feature vector of a row.
///
/// Colour indices are exact `f64` differences of the two magnitudes.
pub fn derive(row: &CatalogRow) -> Result<FeatureVector, MissingValue> {
    let mut values = [0.0; N_FEATURES];

    for (j, value) in row.morphology.iter().enumerate() {
        values[j] = value.ok_or_else(|| MissingValue(MORPHOLOGY_COLUMNS[j].to_string()))?;
    }

    for (s, system) in MagSystem::ALL.iter().enumerate() {
        for band in 0..BANDS.len() - 1 {
            let blue = require_magnitude(row, *system, band)?;
            let red = require_magnitude(row, *system, band + 1)?;
            values[COLOUR_OFFSET + s * 4 + band] = blue - red;
        }
    }

    for (s, system) in MagSystem::ALL.iter().enumerate() {
        values[MAGNITUDE_OFFSET + s] = require_magnitude(row, *system, R_BAND)?;
    }

    Ok(FeatureVector(values))
}

/// Feature names as owned strings, as stored in model metadata
pub fn feature_names() -> Vec<String> {
    FEATURE_NAMES.iter().map(|s| s.to_string()).collect()
}
