//! Gradient Boosting implementation
//!
//! Two-class gradient boosting with the binomial log-likelihood loss
//! `ln(1 + exp(-2 y F))`, `y` in {-1, +1}. Each tree is fitted to the loss
//! gradient and its leaves take a single Newton step. The classifier output
//! `2 / (1 + exp(-2F)) - 1` lies in `[-1, 1]`.

use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::config::BdtConfig;
use super::decision_tree::DecisionTree;
use crate::error::{Result, StargalError};

/// Gradient Boosting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Cut values scanned per variable
    pub n_cuts: usize,
    /// Subsample ratio for each tree
    pub subsample: f64,
    /// Random seed
    pub random_state: u64,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 1,
            n_cuts: 20,
            subsample: 1.0,
            random_state: 42,
        }
    }
}

impl From<&BdtConfig> for GradientBoostingConfig {
    fn from(config: &BdtConfig) -> Self {
        Self {
            n_estimators: config.n_trees,
            learning_rate: config.shrinkage,
            max_depth: config.max_depth,
            min_samples_leaf: config.min_node_events,
            n_cuts: config.n_cuts,
            subsample: config.bagging_fraction,
            random_state: config.seed,
        }
    }
}

/// Gradient Boosting Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    config: GradientBoostingConfig,
    trees: Vec<DecisionTree>,
    initial_score: f64,
    feature_importances: Vec<f64>,
    is_fitted: bool,
}

impl GradientBoostingClassifier {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            initial_score: 0.0,
            feature_importances: Vec::new(),
            is_fitted: false,
        }
    }

    /// Fit to labels 1 (signal) and 0 (background)
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        let n_features = x.ncols();
        if n_samples != y.len() {
            return Err(StargalError::Shape {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(StargalError::Training("no training events".to_string()));
        }

        let signs: Vec<f64> = y.iter().map(|&v| if v > 0.5 { 1.0 } else { -1.0 }).collect();
        let mean = signs.iter().sum::<f64>() / n_samples as f64;
        let mean = mean.clamp(-1.0 + 1e-10, 1.0 - 1e-10);
        self.initial_score = 0.5 * ((1.0 + mean) / (1.0 - mean)).ln();

        let mut scores = Array1::from_elem(n_samples, self.initial_score);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);

        self.trees.clear();
        self.feature_importances = vec![0.0; n_features];

        for round in 0..self.config.n_estimators {
            let sample_indices = self.subsample_indices(n_samples, &mut rng);

            let mut gradients = Vec::with_capacity(sample_indices.len());
            let mut hessians = Vec::with_capacity(sample_indices.len());
            for &i in &sample_indices {
                let residual = 2.0 * signs[i] / (1.0 + (2.0 * signs[i] * scores[i]).exp());
                gradients.push(residual);
                hessians.push(residual.abs() * (2.0 - residual.abs()));
            }

            let x_sub = x.select(ndarray::Axis(0), &sample_indices);
            let mut tree = DecisionTree::new_regressor()
                .with_max_depth(self.config.max_depth)
                .with_min_samples_leaf(self.config.min_samples_leaf)
                .with_n_cuts(self.config.n_cuts);
            tree.fit_newton(&x_sub, &Array1::from_vec(gradients), &Array1::from_vec(hessians))?;

            // Every event moves, including the ones left out of the subsample
            let step = tree.predict(x)?;
            scores.scaled_add(self.config.learning_rate, &step);

            if let Some(tree_importance) = tree.feature_importances() {
                for (total, imp) in self.feature_importances.iter_mut().zip(tree_importance.iter()) {
                    *total += imp;
                }
            }

            if round % 100 == 0 {
                let deviance = signs
                    .iter()
                    .zip(scores.iter())
                    .map(|(s, f)| (1.0 + (-2.0 * s * f).exp()).ln())
                    .sum::<f64>()
                    / n_samples as f64;
                debug!(round, deviance, "Gradient boosting round");
            }

            self.trees.push(tree);
        }

        // Normalize feature importances
        let total: f64 = self.feature_importances.iter().sum();
        if total > 0.0 {
            for imp in &mut self.feature_importances {
                *imp /= total;
            }
        }

        self.is_fitted = true;
        Ok(())
    }

    /// Raw additive score `F` of one event
    fn raw_score(&self, sample: ArrayView1<f64>) -> Result<f64> {
        let mut f = self.initial_score;
        for tree in &self.trees {
            f += self.config.learning_rate * tree.predict_row(sample)?;
        }
        Ok(f)
    }

    /// Classifier output in `[-1, 1]`
    pub fn score_row(&self, sample: ArrayView1<f64>) -> Result<f64> {
        if !self.is_fitted {
            return Err(StargalError::ModelNotFitted);
        }
        let f = self.raw_score(sample)?;
        Ok(2.0 / (1.0 + (-2.0 * f).exp()) - 1.0)
    }

    /// Score every row
    pub fn score(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let scores = (0..x.nrows())
            .into_par_iter()
            .map(|i| self.score_row(x.row(i)))
            .collect::<Result<Vec<f64>>>()?;
        Ok(Array1::from_vec(scores))
    }

    /// Signal probability of every row
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.score(x)?.mapv(|s| 0.5 * (s + 1.0)))
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    fn subsample_indices(&self, n: usize, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..n).collect();
        if self.config.subsample >= 1.0 {
            return indices;
        }
        let sample_size = ((n as f64) * self.config.subsample).ceil() as usize;
        indices.shuffle(rng);
        indices.truncate(sample_size.max(1));
        indices.sort_unstable();
        indices
    }
}
