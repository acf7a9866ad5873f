//! Decision tree implementation
//!
//! Split search scans a fixed grid of `n_cuts` equally spaced cut values per
//! input variable, so the cost of a node is linear in its event count.

use crate::error::{Result, StargalError};
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf {
        value: f64,
        n_samples: usize,
    },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        gain: f64,
    },
}

/// Split criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum Criterion {
    /// Gini index `p(1-p)` on 0/1 labels; leaves hold the signal purity
    Gini,
    /// Squared error; leaves hold `sum(target) / sum(hessian)`
    SquaredError,
}

/// Weighted sums over the events of a node or bucket.
///
/// For 0/1 labels `sum_wyy - sum_wy^2 / sum_w` is `W p (1 - p)`, the Gini
/// index, so both criteria share one impurity formula.
#[derive(Debug, Clone, Copy, Default)]
struct Moments {
    count: usize,
    sum_w: f64,
    sum_wy: f64,
    sum_wyy: f64,
    sum_h: f64,
}

impl Moments {
    fn push(&mut self, y: f64, w: f64, h: f64) {
        self.count += 1;
        self.sum_w += w;
        self.sum_wy += w * y;
        self.sum_wyy += w * y * y;
        self.sum_h += h;
    }

    fn merge(&mut self, other: &Moments) {
        self.count += other.count;
        self.sum_w += other.sum_w;
        self.sum_wy += other.sum_wy;
        self.sum_wyy += other.sum_wyy;
        self.sum_h += other.sum_h;
    }

    fn minus(&self, other: &Moments) -> Moments {
        Moments {
            count: self.count - other.count,
            sum_w: self.sum_w - other.sum_w,
            sum_wy: self.sum_wy - other.sum_wy,
            sum_wyy: self.sum_wyy - other.sum_wyy,
            sum_h: self.sum_h - other.sum_h,
        }
    }

    fn impurity(&self) -> f64 {
        if self.sum_w <= 0.0 {
            return 0.0;
        }
        (self.sum_wyy - self.sum_wy * self.sum_wy / self.sum_w).max(0.0)
    }
}

/// Per-event training inputs: target, weight, hessian
struct Targets<'a> {
    y: &'a [f64],
    w: &'a [f64],
    h: &'a [f64],
}

impl Targets<'_> {
    fn moments(&self, indices: &[usize]) -> Moments {
        let mut m = Moments::default();
        for &i in indices {
            m.push(self.y[i], self.w[i], self.h[i]);
        }
        m
    }
}

/// Decision tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Tree root
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: usize,
    /// Minimum events in a leaf
    pub min_samples_leaf: usize,
    /// Grid points scanned per variable
    pub n_cuts: usize,
    /// Split criterion
    pub criterion: Criterion,
    /// Number of features
    n_features: usize,
    /// Feature importances
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new_classifier()
    }
}

impl DecisionTree {
    /// Create a new classifier tree
    pub fn new_classifier() -> Self {
        Self {
            root: None,
            max_depth: 3,
            min_samples_leaf: 1,
            n_cuts: 20,
            criterion: Criterion::Gini,
            n_features: 0,
            feature_importances: None,
        }
    }

    /// Create a new regressor tree
    pub fn new_regressor() -> Self {
        Self {
            criterion: Criterion::SquaredError,
            ..Self::new_classifier()
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Set minimum events in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    /// Set number of cut values scanned per variable
    pub fn with_n_cuts(mut self, n_cuts: usize) -> Self {
        self.n_cuts = n_cuts.max(1);
        self
    }

    /// Fit to unweighted data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let weights = Array1::ones(y.len());
        self.fit_weighted(x, y, &weights)
    }

    /// Fit to weighted events.
    ///
    /// Classifier targets are 1 for signal and 0 for background.
    pub fn fit_weighted(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        weights: &Array1<f64>,
    ) -> Result<&mut Self> {
        self.check_shapes(x, y.len(), weights.len())?;
        let y = y.to_vec();
        let w = weights.to_vec();
        let targets = Targets { y: &y, w: &w, h: &w };
        self.grow(x, &targets)
    }

    /// Fit a regressor to gradients with Newton leaf values `sum(g) / sum(h)`.
    pub fn fit_newton(
        &mut self,
        x: &Array2<f64>,
        gradients: &Array1<f64>,
        hessians: &Array1<f64>,
    ) -> Result<&mut Self> {
        self.check_shapes(x, gradients.len(), hessians.len())?;
        self.criterion = Criterion::SquaredError;
        let y = gradients.to_vec();
        let w = vec![1.0; y.len()];
        let h = hessians.to_vec();
        let targets = Targets { y: &y, w: &w, h: &h };
        self.grow(x, &targets)
    }

    fn check_shapes(&self, x: &Array2<f64>, n_targets: usize, n_weights: usize) -> Result<()> {
        let n_samples = x.nrows();
        if n_samples != n_targets || n_samples != n_weights {
            return Err(StargalError::Shape {
                expected: format!("{} targets and weights", n_samples),
                actual: format!("{} targets, {} weights", n_targets, n_weights),
            });
        }
        if n_samples == 0 {
            return Err(StargalError::Training("cannot grow a tree on zero events".to_string()));
        }
        Ok(())
    }

    fn grow(&mut self, x: &Array2<f64>, targets: &Targets<'_>) -> Result<&mut Self> {
        let n_features = x.ncols();
        self.n_features = n_features;

        let mut importances = vec![0.0; n_features];
        let indices: Vec<usize> = (0..x.nrows()).collect();
        self.root = Some(self.build_tree(x, targets, &indices, 0, &mut importances));

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(self)
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        targets: &Targets<'_>,
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
    ) -> TreeNode {
        let n_samples = indices.len();
        let node = targets.moments(indices);

        let should_stop = depth >= self.max_depth
            || n_samples < 2 * self.min_samples_leaf
            || node.impurity() <= 1e-12;

        if should_stop {
            return self.leaf(&node);
        }

        let Some((feature, threshold, gain)) = self.find_best_split(x, targets, indices, &node) else {
            return self.leaf(&node);
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, feature]] <= threshold);

        if left_indices.len() < self.min_samples_leaf || right_indices.len() < self.min_samples_leaf {
            return self.leaf(&node);
        }

        importances[feature] += gain;

        let left = Box::new(self.build_tree(x, targets, &left_indices, depth + 1, importances));
        let right = Box::new(self.build_tree(x, targets, &right_indices, depth + 1, importances));

        TreeNode::Split {
            feature_idx: feature,
            threshold,
            left,
            right,
            n_samples,
            gain,
        }
    }

    fn leaf(&self, node: &Moments) -> TreeNode {
        let value = match self.criterion {
            Criterion::Gini if node.sum_w > 0.0 => node.sum_wy / node.sum_w,
            Criterion::SquaredError if node.sum_h.abs() > 1e-12 => node.sum_wy / node.sum_h,
            _ => 0.0,
        };
        TreeNode::Leaf {
            value,
            n_samples: node.count,
        }
    }

    /// Best `(feature, threshold, gain)` over the cut grid of every feature.
    ///
    /// Features are scanned in parallel; ties go to the lowest feature index
    /// so the result does not depend on scheduling.
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        targets: &Targets<'_>,
        indices: &[usize],
        node: &Moments,
    ) -> Option<(usize, f64, f64)> {
        let parent_impurity = node.impurity();
        let n_buckets = self.n_cuts + 1;

        let feature_results: Vec<Option<(usize, f64, f64)>> = (0..x.ncols())
            .into_par_iter()
            .map(|feature| {
                let (lo, hi) = indices.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
                    let v = x[[i, feature]];
                    (lo.min(v), hi.max(v))
                });
                if !(hi > lo) {
                    return None;
                }

                // Bucket b holds values in (lo + b*step, lo + (b+1)*step]
                let step = (hi - lo) / n_buckets as f64;
                let mut buckets = vec![Moments::default(); n_buckets];
                for &i in indices {
                    let v = x[[i, feature]];
                    let b = (((v - lo) / step).ceil() as isize - 1).clamp(0, self.n_cuts as isize) as usize;
                    buckets[b].push(targets.y[i], targets.w[i], targets.h[i]);
                }

                let mut left = Moments::default();
                let mut best: Option<(usize, f64, f64)> = None;
                for (k, bucket) in buckets.iter().take(self.n_cuts).enumerate() {
                    left.merge(bucket);
                    if left.count < self.min_samples_leaf {
                        continue;
                    }
                    let right = node.minus(&left);
                    if right.count < self.min_samples_leaf {
                        break;
                    }
                    let gain = parent_impurity - left.impurity() - right.impurity();
                    if gain > best.map_or(1e-12, |b| b.2) {
                        best = Some((feature, lo + step * (k + 1) as f64, gain));
                    }
                }
                best
            })
            .collect();

        feature_results
            .into_iter()
            .flatten()
            .fold(None, |best: Option<(usize, f64, f64)>, cand| match best {
                Some(b) if b.2 >= cand.2 => Some(b),
                _ => Some(cand),
            })
    }

    /// Make predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(StargalError::ModelNotFitted)?;
        Ok(x.rows()
            .into_iter()
            .map(|row| Self::predict_node(root, row))
            .collect())
    }

    /// Leaf value reached by one event
    pub fn predict_row(&self, sample: ArrayView1<f64>) -> Result<f64> {
        let root = self.root.as_ref().ok_or(StargalError::ModelNotFitted)?;
        Ok(Self::predict_node(root, sample))
    }

    fn predict_node(mut node: &TreeNode, sample: ArrayView1<f64>) -> f64 {
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                    node = if sample[*feature_idx] <= *threshold { left } else { right };
                }
            }
        }
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Number of split levels on the longest path
    pub fn get_depth(&self) -> usize {
        match &self.root {
            None => 0,
            Some(node) => Self::node_depth(node),
        }
    }

    fn node_depth(node: &TreeNode) -> usize {
        match node {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + Self::node_depth(left).max(Self::node_depth(right)),
        }
    }

    /// Get number of leaves
    pub fn get_n_leaves(&self) -> usize {
        match &self.root {
            None => 0,
            Some(node) => Self::count_leaves(node),
        }
    }

    fn count_leaves(node: &TreeNode) -> usize {
        match node {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => Self::count_leaves(left) + Self::count_leaves(right),
        }
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }
}
