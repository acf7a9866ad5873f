//! Bagged decision trees
//!
//! Every tree is grown on a bootstrap resample of the training events; an
//! event drawn `k` times enters its tree with weight `k`. The score is the
//! mean leaf type (+1 signal, -1 background) over the forest.

use crate::error::{Result, StargalError};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::adaboost::leaf_type;
use super::config::BdtConfig;
use super::decision_tree::DecisionTree;

/// Bagging classifier over Gini trees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaggingClassifier {
    /// Individual trees
    trees: Vec<DecisionTree>,
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: usize,
    /// Minimum events in leaf
    pub min_samples_leaf: usize,
    /// Cut values scanned per variable
    pub n_cuts: usize,
    /// Resample size as a fraction of the training sample
    pub sample_fraction: f64,
    /// Random state
    pub random_state: u64,
    /// Number of features
    n_features: usize,
}

impl BaggingClassifier {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: 3,
            min_samples_leaf: 1,
            n_cuts: 20,
            sample_fraction: 1.0,
            random_state: 42,
            n_features: 0,
        }
    }

    pub fn from_config(config: &BdtConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            min_samples_leaf: config.min_node_events,
            n_cuts: config.n_cuts,
            sample_fraction: config.bagging_fraction,
            random_state: config.seed,
            ..Self::new(config.n_trees)
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Fit the forest to labels 1 (signal) and 0 (background)
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(StargalError::Shape {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(StargalError::Training("no training events".to_string()));
        }

        self.n_features = x.ncols();
        let draws = ((n_samples as f64) * self.sample_fraction).ceil().max(1.0) as usize;

        // Trees are independent; each one owns a seed derived from its index
        let trees: Vec<Result<DecisionTree>> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let seed = self.random_state.wrapping_add(tree_idx as u64);
                let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);

                let mut counts = vec![0u32; n_samples];
                for _ in 0..draws {
                    counts[rng.gen_range(0..n_samples)] += 1;
                }
                let sample_indices: Vec<usize> = (0..n_samples).filter(|&i| counts[i] > 0).collect();

                let x_boot = x.select(Axis(0), &sample_indices);
                let y_boot: Array1<f64> = sample_indices.iter().map(|&i| y[i]).collect();
                let w_boot: Array1<f64> = sample_indices.iter().map(|&i| counts[i] as f64).collect();

                let mut tree = DecisionTree::new_classifier()
                    .with_max_depth(self.max_depth)
                    .with_min_samples_leaf(self.min_samples_leaf)
                    .with_n_cuts(self.n_cuts);
                tree.fit_weighted(&x_boot, &y_boot, &w_boot)?;
                Ok(tree)
            })
            .collect();

        self.trees = trees.into_iter().collect::<Result<Vec<_>>>()?;
        Ok(self)
    }

    /// Score one event
    pub fn score_row(&self, sample: ArrayView1<f64>) -> Result<f64> {
        if self.trees.is_empty() {
            return Err(StargalError::ModelNotFitted);
        }
        let mut sum = 0.0;
        for tree in &self.trees {
            sum += leaf_type(tree.predict_row(sample)?);
        }
        Ok(sum / self.trees.len() as f64)
    }

    /// Score every row
    pub fn score(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let scores = (0..x.nrows())
            .into_par_iter()
            .map(|i| self.score_row(x.row(i)))
            .collect::<Result<Vec<f64>>>()?;
        Ok(Array1::from_vec(scores))
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Mean of the per-tree split importances
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        if self.trees.is_empty() {
            return None;
        }
        let mut importances = Array1::zeros(self.n_features);
        for tree in &self.trees {
            if let Some(imp) = tree.feature_importances() {
                importances += imp;
            }
        }
        let total = importances.sum();
        if total > 0.0 {
            importances /= total;
        }
        Some(importances)
    }
}
