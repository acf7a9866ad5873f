//! Persisted model artifacts
//!
//! A trained method is stored as one pretty-printed JSON document: metadata
//! describing how it was trained, the optional decorrelation transform and
//! the forest itself.

use chrono::Utc;
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::info;

use crate::error::{Result, StargalError};
use crate::features::{feature_names, FeatureVector, FEATURE_NAMES};
use crate::training::{BdtConfig, Decorrelation, Forest, Method};

/// Artifact layout version
pub const FORMAT_VERSION: u32 = 1;

/// Event counts a model was trained and tested on
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub n_train_signal: usize,
    pub n_train_background: usize,
    pub n_test_signal: usize,
    pub n_test_background: usize,
}

/// Model metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Artifact name, without extension
    pub name: String,
    /// Crate version that wrote the artifact
    pub version: String,
    /// Training timestamp (RFC 3339)
    pub trained_at: String,
    pub method: Method,
    /// Input names, in evaluation order
    pub feature_names: Vec<String>,
    pub hyperparameters: BdtConfig,
    pub summary: TrainingSummary,
}

impl ModelMetadata {
    pub fn new(method: Method, hyperparameters: &BdtConfig) -> Self {
        let name = hyperparameters
            .weights_file_name(method)
            .trim_end_matches(".weights.json")
            .to_string();
        Self {
            name,
            version: env!("CARGO_PKG_VERSION").to_string(),
            trained_at: Utc::now().to_rfc3339(),
            method,
            feature_names: feature_names(),
            hyperparameters: hyperparameters.clone(),
            summary: TrainingSummary::default(),
        }
    }

    pub fn with_summary(mut self, summary: TrainingSummary) -> Self {
        self.summary = summary;
        self
    }
}

/// A trained classifier ready for evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub metadata: ModelMetadata,
    pub decorrelation: Option<Decorrelation>,
    pub forest: Forest,
}

impl ModelArtifact {
    pub fn new(metadata: ModelMetadata, decorrelation: Option<Decorrelation>, forest: Forest) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            metadata,
            decorrelation,
            forest,
        }
    }

    pub fn method(&self) -> Method {
        self.metadata.method
    }

    /// Write the artifact as JSON, replacing any file at `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        info!(path = %path.display(), method = %self.method(), "Model saved");
        Ok(())
    }

    /// Read an artifact and check it expects this crate's inputs.
    pub fn load(path: &Path) -> Result<Self> {
        let load_error = |reason: String| StargalError::ModelLoad {
            path: path.display().to_string(),
            reason,
        };

        let file = File::open(path).map_err(|e| load_error(e.to_string()))?;
        let artifact: ModelArtifact =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| load_error(e.to_string()))?;

        if artifact.format_version != FORMAT_VERSION {
            return Err(load_error(format!(
                "format version {} is not supported (expected {})",
                artifact.format_version, FORMAT_VERSION
            )));
        }
        if artifact.metadata.feature_names != FEATURE_NAMES {
            return Err(StargalError::FeatureMismatch {
                expected: FEATURE_NAMES.join(","),
                actual: artifact.metadata.feature_names.join(","),
            });
        }
        if let Some(d) = &artifact.decorrelation {
            if d.n_features() != FEATURE_NAMES.len() {
                return Err(load_error(format!(
                    "decorrelation expects {} inputs",
                    d.n_features()
                )));
            }
        }

        Ok(artifact)
    }

    /// Score one raw input row, applying the stored transform first.
    pub fn evaluate_row(&self, row: ArrayView1<f64>) -> Result<f64> {
        match &self.decorrelation {
            Some(d) => self.forest.score_row(d.transform_row(row).view()),
            None => self.forest.score_row(row),
        }
    }

    /// Score one feature vector
    pub fn evaluate(&self, features: &FeatureVector) -> Result<f64> {
        self.evaluate_row(ArrayView1::from(features.as_slice()))
    }

    /// Score every row of a raw input matrix
    pub fn evaluate_matrix(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match &self.decorrelation {
            Some(d) => self.forest.score(&d.transform(x)),
            None => self.forest.score(x),
        }
    }
}
