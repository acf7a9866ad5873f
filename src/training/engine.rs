//! Training engine implementation
//!
//! Turns a labelled catalog into one persisted model per requested method,
//! plus an evaluation report covering all of them.

use chrono::Utc;
use ndarray::{Array1, Array2};
use polars::prelude::DataFrame;
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

use super::config::{BdtConfig, Method};
use super::decorrelation::Decorrelation;
use super::evaluation::{rank_variables, sample_metrics, EvaluationReport, MethodEvaluation};
use super::forest::Forest;
use crate::analysis::SkipCounts;
use crate::catalog::{self, CatalogRow, Label};
use crate::error::{Result, StargalError};
use crate::features::{self, FeatureVector, N_FEATURES};
use crate::model::{ModelArtifact, ModelMetadata, TrainingSummary};

/// Range scores are histogrammed over for the separation
const EVALUATION_RANGE: (f64, f64) = (-1.0, 1.0);

/// Feature matrix with 1 (galaxy) / 0 (star) targets
#[derive(Debug, Clone)]
pub struct LabelledSample {
    pub x: Array2<f64>,
    pub y: Array1<f64>,
}

impl LabelledSample {
    fn from_parts(signal: &[FeatureVector], background: &[FeatureVector]) -> Self {
        let rows: Vec<&FeatureVector> = signal.iter().chain(background.iter()).collect();
        let x = Array2::from_shape_fn((rows.len(), N_FEATURES), |(i, j)| rows[i].0[j]);
        let y = Array1::from_shape_fn(rows.len(), |i| if i < signal.len() { 1.0 } else { 0.0 });
        Self { x, y }
    }

    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    pub fn n_signal(&self) -> usize {
        self.y.iter().filter(|&&v| v > 0.5).count()
    }

    pub fn n_background(&self) -> usize {
        self.len() - self.n_signal()
    }

    /// Scores split by class: (signal, background)
    fn split_scores(&self, scores: &Array1<f64>) -> (Vec<f64>, Vec<f64>) {
        let mut signal = Vec::new();
        let mut background = Vec::new();
        for (&s, &y) in scores.iter().zip(self.y.iter()) {
            if y > 0.5 {
                signal.push(s);
            } else {
                background.push(s);
            }
        }
        (signal, background)
    }
}

/// Train and test partitions
#[derive(Debug, Clone)]
pub struct Partitions {
    pub train: LabelledSample,
    pub test: LabelledSample,
    /// Rows that failed the training cut
    pub skipped: SkipCounts,
}

/// Result of a training run
#[derive(Debug)]
pub struct TrainingOutcome {
    pub artifacts: Vec<(Method, PathBuf)>,
    pub report: EvaluationReport,
    pub report_path: PathBuf,
}

/// Training engine
pub struct TrainEngine {
    config: BdtConfig,
    methods: Vec<Method>,
    weights_dir: PathBuf,
}

impl TrainEngine {
    /// Create a new training engine
    pub fn new(config: BdtConfig, methods: Vec<Method>) -> Self {
        Self {
            config,
            methods,
            weights_dir: PathBuf::from("weights"),
        }
    }

    pub fn with_weights_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.weights_dir = dir.into();
        self
    }

    pub fn config(&self) -> &BdtConfig {
        &self.config
    }

    /// Where a method's model is written
    pub fn weights_path(&self, method: Method) -> PathBuf {
        self.weights_dir.join(self.config.weights_file_name(method))
    }

    /// Apply the training cut and split each class into train and test.
    ///
    /// A row passes when it is labelled, has every input, and its
    /// `modelmag_r` is below the configured limit.
    pub fn prepare(&self, rows: &[CatalogRow]) -> Result<Partitions> {
        let mut skipped = SkipCounts::default();
        let mut signal = Vec::new();
        let mut background = Vec::new();

        for row in rows {
            let Some(label) = row.label() else {
                skipped.unlabeled += 1;
                continue;
            };
            let fv = match features::derive(row) {
                Ok(fv) => fv,
                Err(_) => {
                    skipped.missing_values += 1;
                    continue;
                }
            };
            if fv.magnitude_r(catalog::MagSystem::Model) >= self.config.max_magnitude {
                skipped.out_of_range += 1;
                continue;
            }
            match label {
                Label::Galaxy => signal.push(fv),
                Label::Star => background.push(fv),
            }
        }

        if skipped.total() > 0 {
            warn!(
                unlabeled = skipped.unlabeled,
                missing_values = skipped.missing_values,
                too_faint = skipped.out_of_range,
                "Rows removed by the training cut"
            );
        }
        info!(galaxies = signal.len(), stars = background.len(), "Training candidates");

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.seed);
        let (train_sig, test_sig) = split_class(
            signal,
            "galaxy",
            self.config.n_train_signal,
            self.config.n_test_signal,
            &mut rng,
        )?;
        let (train_bkg, test_bkg) = split_class(
            background,
            "star",
            self.config.n_train_background,
            self.config.n_test_background,
            &mut rng,
        )?;

        if test_sig.is_empty() || test_bkg.is_empty() {
            warn!("Test partition lacks one class; evaluation will be uninformative");
        }

        Ok(Partitions {
            train: LabelledSample::from_parts(&train_sig, &train_bkg),
            test: LabelledSample::from_parts(&test_sig, &test_bkg),
            skipped,
        })
    }

    /// Train one method on the training partition.
    pub fn train_method(&self, method: Method, parts: &Partitions) -> Result<ModelArtifact> {
        let start = Instant::now();
        info!(%method, events = parts.train.len(), "Training");

        let (decorrelation, x) = if method.decorrelates() {
            let d = Decorrelation::fit(&parts.train.x)?;
            let x = d.transform(&parts.train.x);
            (Some(d), x)
        } else {
            (None, parts.train.x.clone())
        };

        let forest = Forest::train(method, &self.config, &x, &parts.train.y)?;
        info!(
            %method,
            trees = forest.n_trees(),
            secs = start.elapsed().as_secs_f64(),
            "Training finished"
        );

        let summary = TrainingSummary {
            n_train_signal: parts.train.n_signal(),
            n_train_background: parts.train.n_background(),
            n_test_signal: parts.test.n_signal(),
            n_test_background: parts.test.n_background(),
        };
        let metadata = ModelMetadata::new(method, &self.config).with_summary(summary);
        Ok(ModelArtifact::new(metadata, decorrelation, forest))
    }

    /// Score both partitions with a trained model.
    pub fn evaluate(&self, artifact: &ModelArtifact, parts: &Partitions) -> Result<MethodEvaluation> {
        let (test_sig, test_bkg) = parts.test.split_scores(&artifact.evaluate_matrix(&parts.test.x)?);
        let (train_sig, train_bkg) = parts.train.split_scores(&artifact.evaluate_matrix(&parts.train.x)?);

        let importances = artifact
            .forest
            .feature_importances()
            .map(|a| a.to_vec())
            .unwrap_or_else(|| vec![0.0; N_FEATURES]);

        Ok(MethodEvaluation {
            method: artifact.method().name().to_string(),
            test: sample_metrics(&test_sig, &test_bkg, EVALUATION_RANGE)?,
            train: sample_metrics(&train_sig, &train_bkg, EVALUATION_RANGE)?,
            ranking: rank_variables(&artifact.metadata.feature_names, &importances),
        })
    }

    /// Run the whole training pipeline on a catalog frame.
    pub fn run(&self, df: &DataFrame) -> Result<TrainingOutcome> {
        self.config.validate()?;
        if self.methods.is_empty() {
            return Err(StargalError::Config("no method selected for training".to_string()));
        }

        let rows = catalog::rows_from_frame(df, true)?;
        let parts = self.prepare(&rows)?;

        let mut artifacts = Vec::with_capacity(self.methods.len());
        let mut evaluations = Vec::with_capacity(self.methods.len());
        for &method in &self.methods {
            let artifact = self.train_method(method, &parts)?;
            let path = self.weights_path(method);
            artifact.save(&path)?;
            evaluations.push(self.evaluate(&artifact, &parts)?);
            artifacts.push((method, path));
        }

        let report = EvaluationReport {
            name: self.config.artifact_stem(),
            created_at: Utc::now().to_rfc3339(),
            methods: evaluations,
        };
        let report_path = self.weights_dir.join(self.config.evaluation_file_name());
        write_report(&report, &report_path)?;
        info!(path = %report_path.display(), "Evaluation report written");

        Ok(TrainingOutcome {
            artifacts,
            report,
            report_path,
        })
    }
}

/// Shuffle one class and cut it into (train, test).
///
/// `n_test == 0` keeps every remaining event for testing.
fn split_class(
    mut events: Vec<FeatureVector>,
    class: &'static str,
    n_train: usize,
    n_test: usize,
    rng: &mut Xoshiro256PlusPlus,
) -> Result<(Vec<FeatureVector>, Vec<FeatureVector>)> {
    if n_train > events.len() {
        return Err(StargalError::InsufficientEvents {
            class,
            requested: n_train,
            available: events.len(),
        });
    }
    events.shuffle(rng);
    let mut test = events.split_off(n_train);
    if n_test > 0 && n_test < test.len() {
        test.truncate(n_test);
    }
    Ok((events, test))
}

fn write_report(report: &EvaluationReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, report)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{MagSystem, BANDS};

    fn row(class: i64, i: usize) -> CatalogRow {
        let mut row = CatalogRow {
            specclass: Some(class),
            ..Default::default()
        };
        let extended = if class == 2 { 1.0 } else { 0.0 };
        for j in 0..8 {
            row.morphology[j] = Some(extended * 2.0 + (i % 7) as f64 * 0.1 + j as f64);
        }
        for system in MagSystem::ALL {
            for band in 0..BANDS.len() {
                let base = 16.0 + (i % 5) as f64 + band as f64 * 0.3;
                let offset = if system == MagSystem::Psf { extended * 0.5 } else { 0.0 };
                row.set_magnitude(system, band, Some(base + offset));
            }
        }
        row
    }

    fn rows(n_gal: usize, n_star: usize) -> Vec<CatalogRow> {
        (0..n_gal)
            .map(|i| row(2, i))
            .chain((0..n_star).map(|i| row(1, i)))
            .collect()
    }

    fn small_config() -> BdtConfig {
        BdtConfig::default()
            .with_n_trees(5)
            .with_max_depth(3)
            .with_min_node_events(2)
            .with_n_cuts(10)
            .with_train_sizes(20, 10)
    }

    #[test]
    fn test_prepare_applies_cut_and_split() {
        let mut data = rows(30, 20);
        data[0].specclass = Some(6);
        data[1].morphology[2] = None;
        data[2].set_magnitude(MagSystem::Model, 2, Some(23.5));

        let engine = TrainEngine::new(small_config(), vec![Method::Bdt]);
        let parts = engine.prepare(&data).unwrap();

        assert_eq!(parts.skipped.unlabeled, 1);
        assert_eq!(parts.skipped.missing_values, 1);
        assert_eq!(parts.skipped.out_of_range, 1);
        assert_eq!(parts.train.n_signal(), 20);
        assert_eq!(parts.train.n_background(), 10);
        assert_eq!(parts.test.n_signal(), 7);
        assert_eq!(parts.test.n_background(), 10);
    }

    #[test]
    fn test_prepare_rejects_oversized_request() {
        let engine = TrainEngine::new(small_config().with_train_sizes(100, 10), vec![Method::Bdt]);
        let err = engine.prepare(&rows(30, 20)).unwrap_err();
        assert!(matches!(
            err,
            StargalError::InsufficientEvents { class: "galaxy", requested: 100, available: 30 }
        ));
    }

    #[test]
    fn test_split_is_seeded() {
        let engine = TrainEngine::new(small_config(), vec![Method::Bdt]);
        let a = engine.prepare(&rows(30, 20)).unwrap();
        let b = engine.prepare(&rows(30, 20)).unwrap();
        assert_eq!(a.train.x, b.train.x);
    }

    #[test]
    fn test_train_and_evaluate_separable_sample() {
        let engine = TrainEngine::new(small_config(), vec![Method::Bdtd]);
        let parts = engine.prepare(&rows(30, 20)).unwrap();
        let artifact = engine.train_method(Method::Bdtd, &parts).unwrap();
        assert!(artifact.decorrelation.is_some());

        let eval = engine.evaluate(&artifact, &parts).unwrap();
        assert!(eval.test.roc_integral > 0.9, "roc = {}", eval.test.roc_integral);
        assert_eq!(eval.ranking.len(), N_FEATURES);
    }
}
