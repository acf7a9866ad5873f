//! Trained tree ensembles, one variant per boosting scheme

use crate::error::Result;
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use super::adaboost::AdaBoostClassifier;
use super::bagging::BaggingClassifier;
use super::config::{BdtConfig, Method};
use super::gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};

/// A fitted forest. Every variant scores events in `[-1, 1]`, signal-like high.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "model")]
pub enum Forest {
    AdaBoost(AdaBoostClassifier),
    Gradient(GradientBoostingClassifier),
    Bagged(BaggingClassifier),
}

impl Forest {
    /// Train the forest a method calls for on already-transformed inputs.
    pub fn train(method: Method, config: &BdtConfig, x: &Array2<f64>, y: &Array1<f64>) -> Result<Self> {
        match method {
            Method::Bdt | Method::Bdtd => {
                let mut model = AdaBoostClassifier::from_config(config);
                model.fit(x, y)?;
                Ok(Forest::AdaBoost(model))
            }
            Method::Bdtg => {
                let mut model = GradientBoostingClassifier::new(GradientBoostingConfig::from(config));
                model.fit(x, y)?;
                Ok(Forest::Gradient(model))
            }
            Method::Bdtb => {
                let mut model = BaggingClassifier::from_config(config);
                model.fit(x, y)?;
                Ok(Forest::Bagged(model))
            }
        }
    }

    pub fn score_row(&self, sample: ArrayView1<f64>) -> Result<f64> {
        match self {
            Forest::AdaBoost(m) => m.score_row(sample),
            Forest::Gradient(m) => m.score_row(sample),
            Forest::Bagged(m) => m.score_row(sample),
        }
    }

    pub fn score(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            Forest::AdaBoost(m) => m.score(x),
            Forest::Gradient(m) => m.score(x),
            Forest::Bagged(m) => m.score(x),
        }
    }

    pub fn n_trees(&self) -> usize {
        match self {
            Forest::AdaBoost(m) => m.n_trees(),
            Forest::Gradient(m) => m.n_trees(),
            Forest::Bagged(m) => m.n_trees(),
        }
    }

    /// Normalized split importance per input
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        match self {
            Forest::AdaBoost(m) => m.feature_importances(),
            Forest::Gradient(m) => {
                let imp = m.feature_importances();
                (!imp.is_empty()).then(|| Array1::from_vec(imp.to_vec()))
            }
            Forest::Bagged(m) => m.feature_importances(),
        }
    }
}
