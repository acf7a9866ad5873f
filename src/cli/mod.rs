//! stargal CLI Module
//!
//! Command-line interface for training and applying star/galaxy classifiers.

use clap::{Args, Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::analysis::{format_table, Selector};
use crate::apply::{self, Reader};
use crate::catalog;
use crate::config::RunConfig;
use crate::training::{Method, MethodEvaluation, TrainEngine};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn kv(key: &str, val: &str) {
    println!("  {:<20} {}", muted(key), val.white());
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "stargal")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Star/galaxy separation with boosted decision trees")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Hyperparameters that name a model; shared by both subcommands
#[derive(Args, Debug, Clone, Default)]
pub struct ModelArgs {
    /// Number of trees
    #[arg(long)]
    pub ntrees: Option<usize>,

    /// Minimum events per leaf
    #[arg(long)]
    pub nevmin: Option<usize>,

    /// Maximum tree depth
    #[arg(long)]
    pub maxdepth: Option<usize>,

    /// Cut values scanned per variable
    #[arg(long)]
    pub ncuts: Option<usize>,

    /// Galaxy events used for training
    #[arg(long)]
    pub ntrain: Option<usize>,

    /// Star events used for training
    #[arg(long)]
    pub nbckg: Option<usize>,

    /// Seed for the train/test split and resampling
    #[arg(long)]
    pub seed: Option<u64>,

    /// Directory holding model artifacts
    #[arg(long)]
    pub weights_dir: Option<PathBuf>,

    /// TOML run configuration
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl ModelArgs {
    /// Load the run configuration and lay the flags over it
    fn resolve(&self) -> anyhow::Result<RunConfig> {
        let mut run = RunConfig::load_or_default(self.config.as_deref())?;
        let t = &mut run.training;
        if let Some(v) = self.ntrees { t.n_trees = v; }
        if let Some(v) = self.nevmin { t.min_node_events = v; }
        if let Some(v) = self.maxdepth { t.max_depth = v; }
        if let Some(v) = self.ncuts { t.n_cuts = v; }
        if let Some(v) = self.ntrain { t.n_train_signal = v; }
        if let Some(v) = self.nbckg { t.n_train_background = v; }
        if let Some(v) = self.seed { t.seed = v; }
        if let Some(dir) = &self.weights_dir {
            run.weights_dir = dir.clone();
        }
        Ok(run)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train classifiers on a labelled catalog
    Train {
        /// Input catalog (CSV, NDJSON, or Parquet)
        #[arg(short, long)]
        data: PathBuf,

        /// Comma-separated methods (BDT, BDTG, BDTB, BDTD)
        #[arg(short, long, default_value = "BDTD")]
        methods: String,

        #[command(flatten)]
        model: ModelArgs,
    },

    /// Apply trained classifiers to a catalog
    Apply {
        /// Input catalog (CSV, NDJSON, or Parquet)
        #[arg(short, long)]
        data: PathBuf,

        /// Comma-separated methods to evaluate
        #[arg(short, long)]
        methods: Option<String>,

        /// Score above which a row is selected as a galaxy
        #[arg(long)]
        threshold: Option<f64>,

        /// psfmag_r - modelmag_r above which the standard cut selects a galaxy
        #[arg(long)]
        std_cut: Option<f64>,

        /// Lower edge of the first magnitude bin
        #[arg(long)]
        mag_min: Option<f64>,

        /// Upper edge of the last magnitude bin
        #[arg(long)]
        mag_max: Option<f64>,

        /// Magnitude bin width
        #[arg(long)]
        mag_width: Option<f64>,

        /// Directory receiving the annotated catalog and report
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Worker threads (default: all cores)
        #[arg(long)]
        threads: Option<usize>,

        #[command(flatten)]
        model: ModelArgs,
    },
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(data_path: &Path, methods: &str, model: &ModelArgs) -> anyhow::Result<()> {
    section("Train");

    let run = model.resolve()?;
    let methods = Method::parse_list(methods)?;
    run.training.validate()?;

    step_run("Loading catalog");
    let start = Instant::now();
    let df = catalog::load_frame(data_path)?;
    step_done(&format!("{} rows × {} cols in {:.2?}", df.height(), df.width(), start.elapsed()));

    let names: Vec<&str> = methods.iter().map(|m| m.name()).collect();
    step_run(&format!("Training {}", names.join(", ").cyan()));
    let start = Instant::now();
    let engine = TrainEngine::new(run.training.clone(), methods).with_weights_dir(&run.weights_dir);
    let outcome = engine.run(&df)?;
    step_done(&format!("{:.2?}", start.elapsed()));

    for (method, path) in &outcome.artifacts {
        step_ok(&format!("{} → {}", method, path.display()));
    }
    step_ok(&format!("report → {}", outcome.report_path.display()));

    print_evaluation(&outcome.report.methods);
    Ok(())
}

fn print_evaluation(evaluations: &[MethodEvaluation]) {
    section("Evaluation (test sample)");
    println!(
        "  {:<6} {:>8} {:>9} {:>9} {:>9} {:>10} {:>11}",
        muted("Method"), muted("ROC"), muted("eS@1%"), muted("eS@10%"), muted("eS@30%"),
        muted("<S²>"), muted("overtrain")
    );
    println!("  {}", dim(&"─".repeat(68)));
    for eval in evaluations {
        let eff: Vec<f64> = eval.test.working_points.iter().map(|w| w.signal_efficiency).collect();
        let over = eval.overtraining().get(1).copied().unwrap_or(0.0);
        println!(
            "  {:<6} {:>8.4} {:>9.3} {:>9.3} {:>9.3} {:>10.4} {:>+11.3}",
            eval.method,
            eval.test.roc_integral,
            eff.first().copied().unwrap_or(0.0),
            eff.get(1).copied().unwrap_or(0.0),
            eff.get(2).copied().unwrap_or(0.0),
            eval.test.separation,
            over,
        );
    }

    for eval in evaluations {
        section(&format!("{} variable ranking", eval.method));
        for (rank, (name, importance)) in eval.ranking.iter().take(10).enumerate() {
            println!("  {:>3}  {:<24} {:.4}", rank + 1, name, importance);
        }
    }
    println!();
}

/// Flags of the apply subcommand
pub struct ApplyArgs<'a> {
    pub data: &'a Path,
    pub methods: Option<&'a str>,
    pub threshold: Option<f64>,
    pub std_cut: Option<f64>,
    pub mag_min: Option<f64>,
    pub mag_max: Option<f64>,
    pub mag_width: Option<f64>,
    pub output_dir: Option<&'a Path>,
    pub threads: Option<usize>,
    pub model: &'a ModelArgs,
}

pub fn cmd_apply(args: ApplyArgs<'_>) -> anyhow::Result<()> {
    section("Apply");
    let wall = Instant::now();

    let mut run = args.model.resolve()?;
    let a = &mut run.application;
    if let Some(list) = args.methods {
        a.methods = Method::parse_list(list)?;
    }
    if let Some(v) = args.threshold { a.threshold = v; }
    if let Some(v) = args.std_cut { a.std_cut = v; }
    if let Some(v) = args.mag_min { a.mag_min = v; }
    if let Some(v) = args.mag_max { a.mag_max = v; }
    if let Some(v) = args.mag_width { a.mag_width = v; }
    if let Some(v) = args.threads { a.threads = Some(v); }
    if let Some(dir) = args.output_dir {
        run.output_dir = dir.to_path_buf();
    }
    run.application.validate()?;

    let mut reader = Reader::new();
    for &method in &run.application.methods {
        let path = run.weights_dir.join(run.training.weights_file_name(method));
        reader.book(method, &path)?;
        step_ok(&format!("booked {} ← {}", method, path.display()));
    }

    step_run("Loading catalog");
    let start = Instant::now();
    let df = catalog::load_frame(args.data)?;
    step_done(&format!("{} rows × {} cols in {:.2?}", df.height(), df.width(), start.elapsed()));

    step_run("Scoring");
    let result = apply::apply(&df, &reader, &run.application)?;
    step_done(&format!("{} rows scored in {:.2?}", result.aggregate.scored, result.elapsed));

    let stem = run.training.artifact_stem();
    let paths = apply::write_outputs(&result, &df, &run.application, args.data, &run.output_dir, &stem)?;
    step_ok(&format!("annotated → {}", paths.annotated.display()));
    step_ok(&format!("report → {}", paths.report.display()));

    for &selector in result.aggregate.selectors() {
        let title = match selector {
            Selector::StandardCut => format!("Standard cut (psfmag_r - modelmag_r > {})", run.application.std_cut),
            Selector::Method(m) => format!("{} (score > {})", m, run.application.threshold),
        };
        section(&title);
        for line in format_table(&result.aggregate.summaries(selector)).lines() {
            println!("  {}", line);
        }
    }

    section("Summary");
    let skipped = result.aggregate.skipped;
    kv("rows scored", &result.aggregate.scored.to_string());
    kv("out of range", &skipped.out_of_range.to_string());
    kv("missing values", &skipped.missing_values.to_string());
    kv("unlabeled", &skipped.unlabeled.to_string());
    kv("elapsed", &format!("{:.2?}", wall.elapsed()));
    println!();
    Ok(())
}
