//! Classifier performance on labelled samples
//!
//! Everything here works on plain score lists: one for signal (galaxy)
//! events, one for background (star) events.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::histogram::{separation, Histogram1D};

/// Background efficiencies at which the signal efficiency is quoted
pub const BACKGROUND_WORKING_POINTS: [f64; 3] = [0.01, 0.10, 0.30];

const SEPARATION_BINS: usize = 100;

/// Signal efficiency at a fixed background efficiency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkingPoint {
    pub background_efficiency: f64,
    pub signal_efficiency: f64,
    /// Score cut that realises it
    pub cut: f64,
}

/// Performance of one method on one sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleMetrics {
    pub n_signal: usize,
    pub n_background: usize,
    /// Area under the background-rejection vs signal-efficiency curve
    pub roc_integral: f64,
    pub separation: f64,
    pub working_points: Vec<WorkingPoint>,
}

/// Evaluation of one trained method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodEvaluation {
    pub method: String,
    pub test: SampleMetrics,
    pub train: SampleMetrics,
    /// Input names ordered by decreasing importance, with their share
    pub ranking: Vec<(String, f64)>,
}

impl MethodEvaluation {
    /// Train minus test signal efficiency at each working point; large
    /// positive values indicate overtraining.
    pub fn overtraining(&self) -> Vec<f64> {
        self.train
            .working_points
            .iter()
            .zip(self.test.working_points.iter())
            .map(|(tr, te)| tr.signal_efficiency - te.signal_efficiency)
            .collect()
    }
}

/// Report written next to the weights after a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub name: String,
    pub created_at: String,
    pub methods: Vec<MethodEvaluation>,
}

/// Probability that a random signal event scores above a random background
/// event, ties counting one half. Equals the ROC integral.
pub fn roc_integral(signal: &[f64], background: &[f64]) -> f64 {
    if signal.is_empty() || background.is_empty() {
        return 0.5;
    }
    let mut bkg = background.to_vec();
    bkg.sort_by(f64::total_cmp);

    let mut wins = 0.0;
    for &s in signal {
        let below = bkg.partition_point(|&b| b < s);
        let not_above = bkg.partition_point(|&b| b <= s);
        wins += below as f64 + 0.5 * (not_above - below) as f64;
    }
    wins / (signal.len() as f64 * bkg.len() as f64)
}

/// Signal efficiency when the cut keeps at most `target` of the background.
pub fn signal_efficiency_at(signal: &[f64], background: &[f64], target: f64) -> WorkingPoint {
    let mut bkg = background.to_vec();
    bkg.sort_by(|a, b| b.total_cmp(a));

    // Events strictly above the cut pass; keep floor(target * n) background events
    let allowed = ((target * bkg.len() as f64).floor() as usize).min(bkg.len());
    let cut = match bkg.get(allowed) {
        Some(&c) => c,
        None => f64::NEG_INFINITY,
    };
    let passed = signal.iter().filter(|&&s| s > cut).count();
    let signal_efficiency = if signal.is_empty() {
        0.0
    } else {
        passed as f64 / signal.len() as f64
    };
    let kept = bkg.iter().filter(|&&b| b > cut).count();
    let background_efficiency = if bkg.is_empty() {
        0.0
    } else {
        kept as f64 / bkg.len() as f64
    };

    WorkingPoint {
        background_efficiency,
        signal_efficiency,
        cut,
    }
}

/// All metrics for one sample, with scores histogrammed over `range`.
pub fn sample_metrics(signal: &[f64], background: &[f64], range: (f64, f64)) -> Result<SampleMetrics> {
    let mut hs = Histogram1D::new("signal", SEPARATION_BINS, range.0, range.1);
    let mut hb = Histogram1D::new("background", SEPARATION_BINS, range.0, range.1);
    signal.iter().for_each(|&s| hs.fill(s));
    background.iter().for_each(|&b| hb.fill(b));

    Ok(SampleMetrics {
        n_signal: signal.len(),
        n_background: background.len(),
        roc_integral: roc_integral(signal, background),
        separation: separation(&hs, &hb)?,
        working_points: BACKGROUND_WORKING_POINTS
            .iter()
            .map(|&t| signal_efficiency_at(signal, background, t))
            .collect(),
    })
}

/// Pair names with importances, most important first.
pub fn rank_variables(names: &[String], importances: &[f64]) -> Vec<(String, f64)> {
    let mut ranking: Vec<(String, f64)> = names.iter().cloned().zip(importances.iter().copied()).collect();
    ranking.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranking
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roc_perfect_and_random() {
        assert_eq!(roc_integral(&[0.9, 0.8], &[0.1, 0.2, 0.3]), 1.0);
        assert_eq!(roc_integral(&[0.1], &[0.9]), 0.0);
        assert_eq!(roc_integral(&[0.5, 0.5], &[0.5]), 0.5);
    }

    #[test]
    fn test_signal_efficiency_at_working_point() {
        let signal: Vec<f64> = (0..10).map(|i| 0.52 + i as f64 * 0.05).collect();
        let background: Vec<f64> = (0..10).map(|i| i as f64 * 0.1).collect();

        // 10% of 10 background events: only 0.9 passes, cut at 0.8
        let wp = signal_efficiency_at(&signal, &background, 0.10);
        assert_eq!(wp.cut, 0.8);
        assert!((wp.background_efficiency - 0.1).abs() < 1e-12);
        // signal above 0.8: 0.82, 0.87, 0.92, 0.97
        assert!((wp.signal_efficiency - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_sample_metrics() {
        let m = sample_metrics(&[0.7, 0.8], &[-0.7, -0.6], (-1.0, 1.0)).unwrap();
        assert_eq!(m.n_signal, 2);
        assert_eq!(m.roc_integral, 1.0);
        assert!((m.separation - 1.0).abs() < 1e-12);
        assert_eq!(m.working_points.len(), 3);
    }

    #[test]
    fn test_ranking_orders_by_importance() {
        let names = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let ranking = rank_variables(&names, &[0.2, 0.5, 0.3]);
        let order: Vec<&str> = ranking.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(order, vec!["b", "c", "a"]);
    }
}
