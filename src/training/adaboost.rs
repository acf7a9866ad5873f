//! AdaBoost (Adaptive Boosting) implementation
//!
//! Each round grows a full Gini tree on reweighted events; events the tree
//! misclassifies get their weight multiplied by `((1 - err) / err)^beta`.
//! The score of an event is the boost-weighted mean of the leaf types
//! (+1 signal, -1 background) it lands in, so it lies in `[-1, 1]`.

use crate::error::{Result, StargalError};
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::config::BdtConfig;
use super::decision_tree::DecisionTree;

/// Leaf type of a classification tree leaf
pub(crate) fn leaf_type(purity: f64) -> f64 {
    if purity > 0.5 {
        1.0
    } else {
        -1.0
    }
}

/// AdaBoost classifier over decision trees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaBoostClassifier {
    pub n_estimators: usize,
    pub beta: f64,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub n_cuts: usize,
    trees: Vec<DecisionTree>,
    alphas: Vec<f64>,
    n_features: usize,
    pub is_fitted: bool,
}

impl Default for AdaBoostClassifier {
    fn default() -> Self {
        Self::new(50, 1.0)
    }
}

impl AdaBoostClassifier {
    pub fn new(n_estimators: usize, beta: f64) -> Self {
        Self {
            n_estimators,
            beta,
            max_depth: 3,
            min_samples_leaf: 1,
            n_cuts: 20,
            trees: Vec::new(),
            alphas: Vec::new(),
            n_features: 0,
            is_fitted: false,
        }
    }

    pub fn from_config(config: &BdtConfig) -> Self {
        Self::new(config.n_trees, config.ada_beta)
            .with_tree_shape(config.max_depth, config.min_node_events, config.n_cuts)
    }

    pub fn with_tree_shape(mut self, max_depth: usize, min_samples_leaf: usize, n_cuts: usize) -> Self {
        self.max_depth = max_depth;
        self.min_samples_leaf = min_samples_leaf;
        self.n_cuts = n_cuts;
        self
    }

    /// Fit to labels 1 (signal) and 0 (background)
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(StargalError::Shape {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }

        self.trees.clear();
        self.alphas.clear();
        self.n_features = x.ncols();

        // Weights are kept normalized to the event count
        let mut weights = Array1::from_elem(n_samples, 1.0);

        for round in 0..self.n_estimators {
            let mut tree = DecisionTree::new_classifier()
                .with_max_depth(self.max_depth)
                .with_min_samples_leaf(self.min_samples_leaf)
                .with_n_cuts(self.n_cuts);
            tree.fit_weighted(x, y, &weights)?;

            let misclassified = (0..n_samples)
                .into_par_iter()
                .map(|i| {
                    let purity = tree.predict_row(x.row(i))?;
                    let is_signal = y[i] > 0.5;
                    Ok((leaf_type(purity) > 0.0) != is_signal)
                })
                .collect::<Result<Vec<bool>>>()?;

            let total = weights.sum();
            let wrong: f64 = misclassified
                .iter()
                .zip(weights.iter())
                .filter(|(m, _)| **m)
                .map(|(_, w)| w)
                .sum();
            let err = wrong / total;

            if err >= 0.5 {
                if self.trees.is_empty() {
                    return Err(StargalError::Training(format!(
                        "first tree has error {:.3}, no better than chance",
                        err
                    )));
                }
                warn!(round, err, "Boosting stopped: tree no better than chance");
                break;
            }

            let err = err.max(1e-10);
            let boost = ((1.0 - err) / err).powf(self.beta);
            for (w, &m) in weights.iter_mut().zip(misclassified.iter()) {
                if m {
                    *w *= boost;
                }
            }
            let norm = n_samples as f64 / weights.sum();
            weights.mapv_inplace(|w| w * norm);

            self.trees.push(tree);
            self.alphas.push(boost.ln());

            if round % 100 == 0 {
                debug!(round, err, "AdaBoost round");
            }
            if wrong == 0.0 {
                debug!(round, "Training sample separated perfectly");
                break;
            }
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Score one event
    pub fn score_row(&self, sample: ArrayView1<f64>) -> Result<f64> {
        if !self.is_fitted {
            return Err(StargalError::ModelNotFitted);
        }
        let mut num = 0.0;
        let mut den = 0.0;
        for (tree, &alpha) in self.trees.iter().zip(self.alphas.iter()) {
            num += alpha * leaf_type(tree.predict_row(sample)?);
            den += alpha;
        }
        Ok(if den > 0.0 { num / den } else { 0.0 })
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

    /// Boost-weighted mean of the per-tree split importances
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        if !self.is_fitted || self.n_features == 0 {
            return None;
        }
        let mut importances = Array1::zeros(self.n_features);
        for (tree, &alpha) in self.trees.iter().zip(self.alphas.iter()) {
            if let Some(imp) = tree.feature_importances() {
                importances.scaled_add(alpha, imp);
            }
        }
        let total = importances.sum();
        if total > 0.0 {
            importances /= total;
        }
        Some(importances)
    }
}
