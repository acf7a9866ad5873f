//! Catalog ingestion
//!
//! Reads photometric catalogs with polars and turns them into typed
//! [`CatalogRow`]s. Missing measurements (null cells, non-finite values and
//! the `-9999` placeholder used by the survey) are all represented as `None`.

use crate::error::{Result, StargalError};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

/// Placeholder the survey writes for measurements that could not be made.
pub const MISSING_SENTINEL: f64 = -9999.0;

/// Class label column (1 = star, 2 = galaxy).
pub const LABEL_COLUMN: &str = "specclass";

/// Morphology measurements copied straight into the feature vector.
pub const MORPHOLOGY_COLUMNS: [&str; 8] = [
    "petror50_r",
    "petror90_r",
    "lnlstar_r",
    "lnlexp_r",
    "lnldev_r",
    "me1_r",
    "me2_r",
    "mrrcc_r",
];

/// Photometric bands, blue to red.
pub const BANDS: [&str; 5] = ["u", "g", "r", "i", "z"];

/// Index of the r band in [`BANDS`].
pub const R_BAND: usize = 2;

/// Magnitude measurement systems present in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MagSystem {
    Fiber,
    Psf,
    Model,
    Petro,
}

impl MagSystem {
    /// All systems in feature-vector order
    pub const ALL: [MagSystem; 4] = [MagSystem::Fiber, MagSystem::Psf, MagSystem::Model, MagSystem::Petro];

    pub fn prefix(self) -> &'static str {
        match self {
            MagSystem::Fiber => "fibermag",
            MagSystem::Psf => "psfmag",
            MagSystem::Model => "modelmag",
            MagSystem::Petro => "petromag",
        }
    }

    /// Column name of this system in the given band, e.g. `psfmag_r`
    pub fn column(self, band: usize) -> String {
        format!("{}_{}", self.prefix(), BANDS[band])
    }
}

/// True class of a labeled catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    Star,
    Galaxy,
}

impl Label {
    /// Map a `specclass` code to a label. Other codes are unlabeled.
    pub fn from_specclass(code: i64) -> Option<Self> {
        match code {
            1 => Some(Label::Star),
            2 => Some(Label::Galaxy),
            _ => None,
        }
    }

    /// Galaxies are the signal class
    pub fn is_signal(self) -> bool {
        matches!(self, Label::Galaxy)
    }
}

/// One catalog entry with every measurement the features are built from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogRow {
    /// Values of [`MORPHOLOGY_COLUMNS`], same order
    pub morphology: [Option<f64>; 8],
    /// Magnitudes indexed by `[MagSystem as usize][band]`
    pub magnitudes: [[Option<f64>; 5]; 4],
    /// Raw `specclass` code
    pub specclass: Option<i64>,
}

impl CatalogRow {
    pub fn magnitude(&self, system: MagSystem, band: usize) -> Option<f64> {
        self.magnitudes[system as usize][band]
    }

    pub fn set_magnitude(&mut self, system: MagSystem, band: usize, value: Option<f64>) {
        self.magnitudes[system as usize][band] = clean(value);
    }

    /// Apparent model magnitude in r, used for binning
    pub fn modelmag_r(&self) -> Option<f64> {
        self.magnitude(MagSystem::Model, R_BAND)
    }

    /// PSF minus model magnitude in r, the classic concentration cut
    pub fn psf_minus_model_r(&self) -> Option<f64> {
        Some(self.magnitude(MagSystem::Psf, R_BAND)? - self.modelmag_r()?)
    }

    pub fn label(&self) -> Option<Label> {
        self.specclass.and_then(Label::from_specclass)
    }
}

/// Normalize a raw measurement: sentinels and non-finite values become `None`.
pub fn clean(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v != MISSING_SENTINEL)
}

/// All numeric columns a catalog must provide, in row layout order.
pub fn required_columns() -> Vec<String> {
    let mut cols: Vec<String> = MORPHOLOGY_COLUMNS.iter().map(|c| c.to_string()).collect();
    for system in MagSystem::ALL {
        for band in 0..BANDS.len() {
            cols.push(system.column(band));
        }
    }
    cols
}

/// Load a catalog, picking the reader from the file extension.
pub fn load_frame(path: &Path) -> Result<DataFrame> {
    if !path.exists() {
        return Err(StargalError::Config(format!(
            "input file {} does not exist",
            path.display()
        )));
    }

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let df = match ext {
        "csv" => CsvReadOptions::default()
            .with_infer_schema_length(Some(1000))
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?,
        "json" | "ndjson" | "jsonl" => JsonReader::new(File::open(path)?)
            .with_json_format(JsonFormat::JsonLines)
            .finish()?,
        "parquet" => ParquetReader::new(File::open(path)?).finish()?,
        _ => {
            return Err(StargalError::Config(format!(
                "unsupported file format: {}",
                path.display()
            )))
        }
    };

    Ok(df)
}

/// Write a frame, picking the writer from the file extension.
pub fn write_frame(df: &mut DataFrame, path: &Path) -> Result<()> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let mut file = File::create(path)?;
    match ext {
        "csv" => CsvWriter::new(&mut file).finish(df)?,
        "json" | "ndjson" | "jsonl" => JsonWriter::new(&mut file)
            .with_json_format(JsonFormat::JsonLines)
            .finish(df)?,
        "parquet" => {
            ParquetWriter::new(file).finish(df)?;
        }
        _ => {
            return Err(StargalError::Config(format!(
                "unsupported output format: {}",
                path.display()
            )))
        }
    }
    Ok(())
}

fn float_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = df
        .column(name)
        .map_err(|_| StargalError::FeatureNotFound(name.to_string()))?;
    let values = series
        .cast(&DataType::Float64)?
        .f64()?
        .into_iter()
        .map(clean)
        .collect();
    Ok(values)
}

fn label_column(df: &DataFrame) -> Result<Vec<Option<i64>>> {
    let series = df
        .column(LABEL_COLUMN)
        .map_err(|_| StargalError::FeatureNotFound(LABEL_COLUMN.to_string()))?;
    Ok(series.cast(&DataType::Int64)?.i64()?.into_iter().collect())
}

/// Extract typed rows from a catalog frame.
///
/// Fails if any required column is absent. A missing label column is only
/// an error when `require_labels` is set.
pub fn rows_from_frame(df: &DataFrame, require_labels: bool) -> Result<Vec<CatalogRow>> {
    let n_rows = df.height();

    let morphology = MORPHOLOGY_COLUMNS
        .iter()
        .map(|name| float_column(df, name))
        .collect::<Result<Vec<_>>>()?;

    let mut magnitudes = Vec::with_capacity(MagSystem::ALL.len());
    for system in MagSystem::ALL {
        let bands = (0..BANDS.len())
            .map(|band| float_column(df, &system.column(band)))
            .collect::<Result<Vec<_>>>()?;
        magnitudes.push(bands);
    }

    let labels = match label_column(df) {
        Ok(labels) => labels,
        Err(StargalError::FeatureNotFound(_)) if !require_labels => vec![None; n_rows],
        Err(e) => return Err(e),
    };

    let rows = (0..n_rows)
        .map(|i| {
            let mut row = CatalogRow {
                specclass: labels[i],
                ..Default::default()
            };
            for (j, col) in morphology.iter().enumerate() {
                row.morphology[j] = col[i];
            }
            for (s, system) in magnitudes.iter().enumerate() {
                for (b, col) in system.iter().enumerate() {
                    row.magnitudes[s][b] = col[i];
                }
            }
            row
        })
        .collect();

    Ok(rows)
}
