//! Application of trained models to a catalog
//!
//! Rows are scored in parallel, then folded into per-worker [`Aggregate`]s
//! and [`HistogramSet`]s that are merged pairwise. Counts and scores do not
//! depend on the number of threads.

mod config;
mod histograms;
mod reader;

pub use config::ApplyConfig;
pub use histograms::{HistogramSet, MethodHistograms, StdCutHistograms};
pub use reader::{Reader, Scorer};

use polars::prelude::*;
use rayon::prelude::*;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::analysis::{Aggregate, BinSummary, MagnitudeBins, Selector, SkipCounts, SkipReason};
use crate::catalog::{self, CatalogRow, Label};
use crate::error::{Result, StargalError};
use crate::features;
use crate::training::Method;

/// A row that made it through the cuts
#[derive(Debug, Clone)]
struct ScoredRow {
    bin: usize,
    mag: f64,
    label: Option<Label>,
    psf_minus_model: f64,
    scores: Vec<f64>,
}

#[derive(Debug, Clone)]
enum RowOutcome {
    Skipped(SkipReason),
    Scored(ScoredRow),
}

fn process_row<S: Scorer>(
    row: &CatalogRow,
    bins: &MagnitudeBins,
    methods: &[Method],
    scorer: &S,
) -> Result<RowOutcome> {
    let Some(mag) = row.modelmag_r() else {
        return Ok(RowOutcome::Skipped(SkipReason::MissingValues));
    };
    let Some(bin) = bins.bin_index(mag) else {
        return Ok(RowOutcome::Skipped(SkipReason::OutOfRange));
    };
    let Ok(fv) = features::derive(row) else {
        return Ok(RowOutcome::Skipped(SkipReason::MissingValues));
    };
    let Some(psf_minus_model) = row.psf_minus_model_r() else {
        return Ok(RowOutcome::Skipped(SkipReason::MissingValues));
    };

    let scores = methods
        .iter()
        .map(|&m| scorer.evaluate(m, &fv))
        .collect::<Result<Vec<f64>>>()?;

    Ok(RowOutcome::Scored(ScoredRow {
        bin,
        mag,
        label: row.label(),
        psf_minus_model,
        scores,
    }))
}

/// Per-worker partial result
struct Partial {
    aggregate: Aggregate,
    histograms: HistogramSet,
}

impl Partial {
    fn new(bins: MagnitudeBins, selectors: &[Selector], methods: &[Method]) -> Self {
        Self {
            aggregate: Aggregate::new(bins, selectors.to_vec()),
            histograms: HistogramSet::new(methods),
        }
    }

    fn add(mut self, outcome: &RowOutcome, config: &ApplyConfig) -> Self {
        let row = match outcome {
            RowOutcome::Skipped(reason) => {
                self.aggregate.skipped.add(*reason);
                return self;
            }
            RowOutcome::Scored(row) => row,
        };

        self.aggregate.scored += 1;
        for (h, &score) in self.histograms.methods.iter_mut().zip(row.scores.iter()) {
            h.fill(row.label, row.mag, score);
        }

        let Some(label) = row.label else {
            self.aggregate.skipped.add(SkipReason::Unlabeled);
            return self;
        };

        self.histograms.std_cut.fill(label, row.mag, row.psf_minus_model);
        // Selector 0 is the standard cut, then one per method
        self.aggregate
            .record(0, row.bin, label, row.psf_minus_model > config.std_cut);
        for (s, &score) in row.scores.iter().enumerate() {
            self.aggregate
                .record(s + 1, row.bin, label, score > config.threshold);
        }
        self
    }

    fn merge(self, other: Partial) -> Result<Partial> {
        Ok(Partial {
            aggregate: self.aggregate.merge(other.aggregate),
            histograms: self.histograms.merge(other.histograms)?,
        })
    }
}

/// Everything an application run produces
#[derive(Debug, Clone)]
pub struct ApplicationResult {
    pub methods: Vec<Method>,
    pub aggregate: Aggregate,
    pub histograms: HistogramSet,
    /// `scores[method][row]`; `None` where the row was not scored
    pub scores: Vec<Vec<Option<f64>>>,
    pub elapsed: Duration,
}

impl ApplicationResult {
    pub fn scores_for(&self, method: Method) -> Option<&[Option<f64>]> {
        let m = self.methods.iter().position(|&x| x == method)?;
        Some(&self.scores[m])
    }

    /// Copy of `df` with one `{method}var` score column per method
    pub fn annotate(&self, df: &DataFrame) -> Result<DataFrame> {
        if let Some(first) = self.scores.first() {
            if first.len() != df.height() {
                return Err(StargalError::Shape {
                    expected: format!("{} rows", df.height()),
                    actual: format!("{} scores", first.len()),
                });
            }
        }
        let mut out = df.clone();
        for (method, scores) in self.methods.iter().zip(self.scores.iter()) {
            out.with_column(Series::new(method.score_column().into(), scores.clone()))?;
        }
        Ok(out)
    }

    pub fn report(&self, name: &str, config: &ApplyConfig) -> ApplicationReport {
        ApplicationReport {
            name: name.to_string(),
            threshold: config.threshold,
            std_cut: config.std_cut,
            bins: self
                .aggregate
                .selectors()
                .iter()
                .map(|&s| SelectorReport {
                    selector: s.to_string(),
                    bins: self.aggregate.summaries(s),
                })
                .collect(),
            skipped: self.aggregate.skipped,
            scored: self.aggregate.scored,
            histograms: self.histograms.clone(),
            elapsed_secs: self.elapsed.as_secs_f64(),
        }
    }
}

/// Per-bin table of one selector
#[derive(Debug, Clone, Serialize)]
pub struct SelectorReport {
    pub selector: String,
    pub bins: Vec<BinSummary>,
}

/// JSON document written next to the annotated dataset
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationReport {
    pub name: String,
    pub threshold: f64,
    pub std_cut: f64,
    pub bins: Vec<SelectorReport>,
    pub skipped: SkipCounts,
    pub scored: u64,
    pub histograms: HistogramSet,
    pub elapsed_secs: f64,
}

/// Score every row and aggregate per magnitude bin.
pub fn apply_rows<S: Scorer>(rows: &[CatalogRow], scorer: &S, config: &ApplyConfig) -> Result<ApplicationResult> {
    config.validate()?;
    let start = Instant::now();
    let bins = config.bins()?;
    let methods = config.methods.clone();
    let mut selectors = vec![Selector::StandardCut];
    selectors.extend(methods.iter().map(|&m| Selector::Method(m)));

    let parallel = config.parallel();
    let chunk = parallel.chunk_size;

    let (outcomes, partial) = parallel.install(|| -> Result<(Vec<RowOutcome>, Partial)> {
        let done = AtomicUsize::new(0);
        let outcomes: Vec<RowOutcome> = rows
            .par_chunks(chunk)
            .map(|block| -> Result<Vec<RowOutcome>> {
                let block_outcomes = block
                    .iter()
                    .map(|row| process_row(row, &bins, &methods, scorer))
                    .collect::<Result<Vec<RowOutcome>>>()?;
                let n = done.fetch_add(block.len(), Ordering::Relaxed) + block.len();
                debug!(rows = n, total = rows.len(), "Scoring progress");
                Ok(block_outcomes)
            })
            .collect::<Result<Vec<Vec<RowOutcome>>>>()?
            .into_iter()
            .flatten()
            .collect();

        let partial = outcomes
            .par_iter()
            .with_min_len(chunk)
            .fold(
                || Partial::new(bins, &selectors, &methods),
                |acc, outcome| acc.add(outcome, config),
            )
            .map(Ok::<Partial, StargalError>)
            .try_reduce(|| Partial::new(bins, &selectors, &methods), Partial::merge)?;
        Ok((outcomes, partial))
    })??;

    let mut scores = vec![Vec::with_capacity(rows.len()); methods.len()];
    for outcome in &outcomes {
        for (m, column) in scores.iter_mut().enumerate() {
            column.push(match outcome {
                RowOutcome::Scored(row) => Some(row.scores[m]),
                RowOutcome::Skipped(_) => None,
            });
        }
    }

    let skipped = partial.aggregate.skipped;
    if skipped.missing_values > 0 {
        warn!(rows = skipped.missing_values, "Rows with missing inputs were not scored");
    }
    info!(
        scored = partial.aggregate.scored,
        out_of_range = skipped.out_of_range,
        unlabeled = skipped.unlabeled,
        "Application finished"
    );

    Ok(ApplicationResult {
        methods,
        aggregate: partial.aggregate,
        histograms: partial.histograms,
        scores,
        elapsed: start.elapsed(),
    })
}

/// Score every row of a catalog frame.
pub fn apply<S: Scorer>(df: &DataFrame, scorer: &S, config: &ApplyConfig) -> Result<ApplicationResult> {
    let rows = catalog::rows_from_frame(df, false)?;
    apply_rows(&rows, scorer, config)
}

/// Files written by [`write_outputs`]
#[derive(Debug, Clone)]
pub struct OutputPaths {
    pub annotated: PathBuf,
    pub report: PathBuf,
}

/// Output names for a run: `newtree_{stem}.{ext}` and `StarGalaxyApp_{stem}.json`
pub fn output_paths(input: &Path, output_dir: &Path, stem: &str) -> OutputPaths {
    let ext = input.extension().and_then(|e| e.to_str()).unwrap_or("parquet");
    OutputPaths {
        annotated: output_dir.join(format!("newtree_{}.{}", stem, ext)),
        report: output_dir.join(format!("StarGalaxyApp_{}.json", stem)),
    }
}

/// Write the annotated dataset and the JSON report.
pub fn write_outputs(
    result: &ApplicationResult,
    df: &DataFrame,
    config: &ApplyConfig,
    input: &Path,
    output_dir: &Path,
    stem: &str,
) -> Result<OutputPaths> {
    std::fs::create_dir_all(output_dir)?;
    let paths = output_paths(input, output_dir, stem);

    let mut annotated = result.annotate(df)?;
    catalog::write_frame(&mut annotated, &paths.annotated)?;

    let writer = BufWriter::new(File::create(&paths.report)?);
    serde_json::to_writer_pretty(writer, &result.report(stem, config))?;

    info!(
        annotated = %paths.annotated.display(),
        report = %paths.report.display(),
        "Outputs written"
    );
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{MagSystem, BANDS, R_BAND};
    use crate::features::FeatureVector;

    /// Scores every row with its `petror50_r`
    struct FirstInput;

    impl Scorer for FirstInput {
        fn evaluate(&self, _method: Method, features: &FeatureVector) -> Result<f64> {
            Ok(features.0[0])
        }
    }

    fn row(label: i64, mag: f64, score: f64) -> CatalogRow {
        let mut row = CatalogRow {
            specclass: Some(label),
            ..Default::default()
        };
        row.morphology = [Some(score); 8];
        for system in MagSystem::ALL {
            for band in 0..BANDS.len() {
                row.set_magnitude(system, band, Some(mag));
            }
        }
        row
    }

    #[test]
    fn test_three_row_scenario() {
        let rows = vec![row(2, 15.2, 0.6), row(1, 15.7, 0.6), row(2, 20.9, -0.6)];
        let result = apply_rows(&rows, &FirstInput, &ApplyConfig::default()).unwrap();

        let sel = Selector::Method(Method::Bdtd);
        let bin15 = result.aggregate.tally(sel, 1).unwrap();
        assert_eq!(bin15.true_galaxies, 1);
        assert_eq!(bin15.selected_galaxies, 1);
        assert_eq!(bin15.selected_stars, 1);
        assert_eq!(bin15.efficiency(), Some(100.0));
        assert_eq!(bin15.impurity(), Some(50.0));

        let bin20 = result.aggregate.tally(sel, 6).unwrap();
        assert_eq!(bin20.true_galaxies, 1);
        assert_eq!(bin20.selected(), 0);
        assert_eq!(bin20.efficiency(), Some(0.0));
        assert_eq!(bin20.impurity(), None);
    }

    #[test]
    fn test_skip_policy() {
        let mut missing = row(2, 16.5, 0.6);
        missing.morphology[4] = None;
        let rows = vec![
            row(2, 13.5, 0.6),
            row(2, 23.0, 0.6),
            missing,
            row(5, 16.5, 0.6),
            row(1, 16.5, 0.6),
        ];
        let result = apply_rows(&rows, &FirstInput, &ApplyConfig::default()).unwrap();

        let skipped = result.aggregate.skipped;
        assert_eq!(skipped.out_of_range, 2);
        assert_eq!(skipped.missing_values, 1);
        assert_eq!(skipped.unlabeled, 1);
        assert_eq!(result.aggregate.scored, 2);

        let scores = result.scores_for(Method::Bdtd).unwrap();
        assert_eq!(scores, &[None, None, None, Some(0.6), Some(0.6)]);

        let tally = result.aggregate.tally(Selector::Method(Method::Bdtd), 2).unwrap();
        assert_eq!(tally.true_stars, 1);
        assert_eq!(tally.true_galaxies, 0);
    }

    #[test]
    fn test_standard_cut() {
        let mut galaxy = row(2, 17.5, 0.0);
        galaxy.set_magnitude(MagSystem::Psf, R_BAND, Some(17.8));
        let star = row(1, 17.5, 0.0);
        let result = apply_rows(&[galaxy, star], &FirstInput, &ApplyConfig::default()).unwrap();

        let t = result.aggregate.tally(Selector::StandardCut, 3).unwrap();
        assert_eq!(t.selected_galaxies, 1);
        assert_eq!(t.selected_stars, 0);
        assert_eq!(t.impurity(), Some(0.0));
    }

    #[test]
    fn test_unbooked_method_aborts() {
        let rows = vec![row(2, 15.2, 0.6)];
        let err = apply_rows(&rows, &Reader::new(), &ApplyConfig::default()).unwrap_err();
        assert!(matches!(err, StargalError::MethodNotBooked(_)));
    }

    #[test]
    fn test_tiny_bin_width_is_a_config_error() {
        let config = ApplyConfig::default().with_bins(14.0, 23.0, 1e-18);
        assert!(config.validate().is_err());
        let err = apply_rows(&[row(2, 15.2, 0.6)], &FirstInput, &config).unwrap_err();
        assert!(matches!(err, StargalError::InvalidParameter { ref name, .. } if name == "mag_width"));
    }

    #[test]
    fn test_chunking_keeps_row_order() {
        let rows: Vec<CatalogRow> = (0..25)
            .map(|i| row(if i % 3 == 0 { 1 } else { 2 }, 14.5 + 0.3 * i as f64, i as f64 / 25.0))
            .collect();
        let whole = apply_rows(&rows, &FirstInput, &ApplyConfig::default()).unwrap();
        let config = ApplyConfig {
            chunk_size: 1,
            threads: Some(3),
            ..ApplyConfig::default()
        };
        let split = apply_rows(&rows, &FirstInput, &config).unwrap();

        assert_eq!(whole.scores, split.scores);
        assert_eq!(split.scores[0][4], Some(4.0 / 25.0));
        assert_eq!(whole.aggregate.scored, split.aggregate.scored);
        assert_eq!(whole.aggregate.skipped, split.aggregate.skipped);
    }

    #[test]
    fn test_output_names() {
        let paths = output_paths(Path::new("data/eval.csv"), Path::new("out"), "StarGalaxy_BDT_1_2_3_4_5_6");
        assert_eq!(paths.annotated, Path::new("out/newtree_StarGalaxy_BDT_1_2_3_4_5_6.csv"));
        assert_eq!(paths.report, Path::new("out/StarGalaxyApp_StarGalaxy_BDT_1_2_3_4_5_6.json"));
    }
}
