//! Training configuration

use crate::error::{Result, StargalError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Boosted-tree variants this crate can train and apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Method {
    /// AdaBoost on Gini trees
    #[serde(rename = "BDT")]
    Bdt,
    /// Gradient boosting with binomial log-likelihood loss
    #[serde(rename = "BDTG")]
    Bdtg,
    /// Bagged Gini trees
    #[serde(rename = "BDTB")]
    Bdtb,
    /// Decorrelated inputs followed by AdaBoost
    #[serde(rename = "BDTD")]
    Bdtd,
}

impl Method {
    pub const ALL: [Method; 4] = [Method::Bdt, Method::Bdtb, Method::Bdtd, Method::Bdtg];

    pub fn name(self) -> &'static str {
        match self {
            Method::Bdt => "BDT",
            Method::Bdtg => "BDTG",
            Method::Bdtb => "BDTB",
            Method::Bdtd => "BDTD",
        }
    }

    /// Whether the inputs are decorrelated before training
    pub fn decorrelates(self) -> bool {
        matches!(self, Method::Bdtd)
    }

    /// Score histogram range booked for this method
    pub fn score_range(self) -> (f64, f64) {
        match self {
            Method::Bdtg => (-1.0, 1.0),
            _ => (-0.8, 0.8),
        }
    }

    /// Column name of the score appended to annotated datasets, e.g. `bdtdvar`
    pub fn score_column(self) -> String {
        format!("{}var", self.name().to_lowercase())
    }

    /// Parse a comma-separated list such as `"BDT,BDTD"`.
    ///
    /// Empty entries are ignored; duplicates collapse. Unknown names are
    /// rejected with the list of valid ones.
    pub fn parse_list(list: &str) -> Result<Vec<Method>> {
        let mut methods: Vec<Method> = Vec::new();
        for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let method: Method = name.parse()?;
            if !methods.contains(&method) {
                methods.push(method);
            }
        }
        Ok(methods)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Method {
    type Err = StargalError;

    fn from_str(s: &str) -> Result<Self> {
        Method::ALL
            .iter()
            .copied()
            .find(|m| m.name() == s)
            .ok_or_else(|| StargalError::UnknownMethod {
                name: s.to_string(),
                valid: Method::ALL.iter().map(|m| m.name()).collect::<Vec<_>>().join(" "),
            })
    }
}

/// Hyperparameters of a boosted-tree training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BdtConfig {
    /// Number of trees in the forest
    pub n_trees: usize,
    /// Minimum number of training events in a leaf
    pub min_node_events: usize,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Number of grid points scanned per variable when searching a split
    pub n_cuts: usize,
    /// Galaxy (signal) events used for training
    pub n_train_signal: usize,
    /// Star (background) events used for training
    pub n_train_background: usize,
    /// Galaxy events kept for testing (0 = all remaining)
    pub n_test_signal: usize,
    /// Star events kept for testing (0 = all remaining)
    pub n_test_background: usize,
    /// Learning rate for gradient boosting
    pub shrinkage: f64,
    /// Exponent applied to the AdaBoost boost weight
    pub ada_beta: f64,
    /// Fraction of the training sample drawn for each bagged tree
    pub bagging_fraction: f64,
    /// Training rows need `modelmag_r` below this
    pub max_magnitude: f64,
    /// Random seed for the split and for resampling
    pub seed: u64,
}

impl Default for BdtConfig {
    fn default() -> Self {
        Self {
            n_trees: 2000,
            min_node_events: 50,
            max_depth: 15,
            n_cuts: 200,
            n_train_signal: 30000,
            n_train_background: 6000,
            n_test_signal: 0,
            n_test_background: 0,
            shrinkage: 0.1,
            ada_beta: 1.0,
            bagging_fraction: 1.0,
            max_magnitude: 23.0,
            seed: 42,
        }
    }
}

impl BdtConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_n_trees(mut self, n: usize) -> Self {
        self.n_trees = n;
        self
    }

    pub fn with_min_node_events(mut self, n: usize) -> Self {
        self.min_node_events = n;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_n_cuts(mut self, n: usize) -> Self {
        self.n_cuts = n;
        self
    }

    /// Set training sample sizes (signal, background)
    pub fn with_train_sizes(mut self, signal: usize, background: usize) -> Self {
        self.n_train_signal = signal;
        self.n_train_background = background;
        self
    }

    /// Set test sample sizes (signal, background); 0 keeps all remaining
    pub fn with_test_sizes(mut self, signal: usize, background: usize) -> Self {
        self.n_test_signal = signal;
        self.n_test_background = background;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Reject values the trainer cannot work with.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("n_trees", self.n_trees),
            ("min_node_events", self.min_node_events),
            ("max_depth", self.max_depth),
            ("n_cuts", self.n_cuts),
            ("n_train_signal", self.n_train_signal),
            ("n_train_background", self.n_train_background),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(StargalError::InvalidParameter {
                    name: name.to_string(),
                    value: value.to_string(),
                    reason: "must be positive".to_string(),
                });
            }
        }
        if !(self.shrinkage > 0.0 && self.shrinkage <= 1.0) {
            return Err(StargalError::InvalidParameter {
                name: "shrinkage".to_string(),
                value: self.shrinkage.to_string(),
                reason: "must lie in (0, 1]".to_string(),
            });
        }
        if !(self.bagging_fraction > 0.0 && self.bagging_fraction <= 1.0) {
            return Err(StargalError::InvalidParameter {
                name: "bagging_fraction".to_string(),
                value: self.bagging_fraction.to_string(),
                reason: "must lie in (0, 1]".to_string(),
            });
        }
        if !self.max_magnitude.is_finite() {
            return Err(StargalError::InvalidParameter {
                name: "max_magnitude".to_string(),
                value: self.max_magnitude.to_string(),
                reason: "must be finite".to_string(),
            });
        }
        if !(self.ada_beta > 0.0) {
            return Err(StargalError::InvalidParameter {
                name: "ada_beta".to_string(),
                value: self.ada_beta.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Base name shared by every artifact of this hyperparameter set.
    ///
    /// The six tree and sample sizes are always spelled out. Every other
    /// setting that changes the forest or its evaluation sample is appended
    /// as a tagged value when it differs from the default, so two different
    /// configurations never share a name.
    pub fn artifact_stem(&self) -> String {
        let mut stem = format!(
            "StarGalaxy_BDT_{}_{}_{}_{}_{}_{}",
            self.n_trees,
            self.min_node_events,
            self.max_depth,
            self.n_cuts,
            self.n_train_signal,
            self.n_train_background
        );

        let defaults = BdtConfig::default();
        if (self.n_test_signal, self.n_test_background) != (defaults.n_test_signal, defaults.n_test_background) {
            stem.push_str(&format!("_ntest{}-{}", self.n_test_signal, self.n_test_background));
        }
        let tagged = [
            ("lr", self.shrinkage, defaults.shrinkage),
            ("beta", self.ada_beta, defaults.ada_beta),
            ("bag", self.bagging_fraction, defaults.bagging_fraction),
            ("maxmag", self.max_magnitude, defaults.max_magnitude),
        ];
        for (tag, value, default) in tagged {
            if value.to_bits() != default.to_bits() {
                stem.push_str(&format!("_{}{}", tag, value));
            }
        }
        if self.seed != defaults.seed {
            stem.push_str(&format!("_seed{}", self.seed));
        }
        stem
    }

    /// File name of a method's persisted model
    pub fn weights_file_name(&self, method: Method) -> String {
        format!("{}_{}.weights.json", self.artifact_stem(), method.name())
    }

    /// File name of the training evaluation report
    pub fn evaluation_file_name(&self) -> String {
        format!("{}.evaluation.json", self.artifact_stem())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BdtConfig::default();
        assert_eq!(config.n_trees, 2000);
        assert_eq!(config.min_node_events, 50);
        assert_eq!(config.max_depth, 15);
        assert_eq!(config.n_cuts, 200);
        assert_eq!(config.n_train_signal, 30000);
        assert_eq!(config.n_train_background, 6000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = BdtConfig::new()
            .with_n_trees(10)
            .with_max_depth(3)
            .with_train_sizes(100, 50);
        assert_eq!(config.n_trees, 10);
        assert_eq!(config.max_depth, 3);
        assert_eq!(config.n_train_signal, 100);
        assert_eq!(config.n_train_background, 50);
    }

    #[test]
    fn test_artifact_names_are_distinct() {
        let a = BdtConfig::default();
        let b = BdtConfig::default().with_n_trees(400);
        let c = BdtConfig::default().with_train_sizes(30000, 3000);
        assert_ne!(a.weights_file_name(Method::Bdtd), b.weights_file_name(Method::Bdtd));
        assert_ne!(a.weights_file_name(Method::Bdtd), c.weights_file_name(Method::Bdtd));
        assert_ne!(a.weights_file_name(Method::Bdt), a.weights_file_name(Method::Bdtd));
        assert_eq!(
            a.weights_file_name(Method::Bdtd),
            "StarGalaxy_BDT_2000_50_15_200_30000_6000_BDTD.weights.json"
        );
    }

    #[test]
    fn test_every_model_setting_changes_the_name() {
        let base = BdtConfig::default();
        let mut variants = vec![
            base.clone().with_seed(7),
            base.clone().with_test_sizes(500, 0),
            base.clone().with_test_sizes(0, 500),
        ];
        let mut shrinkage = base.clone();
        shrinkage.shrinkage = 0.5;
        let mut beta = base.clone();
        beta.ada_beta = 0.5;
        let mut bagging = base.clone();
        bagging.bagging_fraction = 0.6;
        let mut faint = base.clone();
        faint.max_magnitude = 21.0;
        variants.extend([shrinkage, beta, bagging, faint]);

        let mut names: Vec<String> = variants.iter().map(|c| c.weights_file_name(Method::Bdtg)).collect();
        names.push(base.weights_file_name(Method::Bdtg));
        let total = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), total);

        let mut combined = base.clone().with_seed(7);
        combined.shrinkage = 0.5;
        combined.ada_beta = 0.5;
        combined.max_magnitude = 21.0;
        assert_eq!(
            combined.weights_file_name(Method::Bdtg),
            "StarGalaxy_BDT_2000_50_15_200_30000_6000_lr0.5_beta0.5_maxmag21_seed7_BDTG.weights.json"
        );
        assert_ne!(combined.evaluation_file_name(), base.evaluation_file_name());
    }

    #[test]
    fn test_validate_rejects_non_finite_magnitude_limit() {
        let mut config = BdtConfig::default();
        config.max_magnitude = f64::INFINITY;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_method_list() {
        let methods = Method::parse_list("BDTD, BDT,BDTD,").unwrap();
        assert_eq!(methods, vec![Method::Bdtd, Method::Bdt]);
        assert!(Method::parse_list("").unwrap().is_empty());
    }

    #[test]
    fn test_unknown_method_rejected() {
        let err = Method::parse_list("BDT,Likelihood").unwrap_err();
        assert!(matches!(err, StargalError::UnknownMethod { ref name, .. } if name == "Likelihood"));
    }

    #[test]
    fn test_validate_rejects_zero_trees() {
        let config = BdtConfig::default().with_n_trees(0);
        assert!(matches!(
            config.validate(),
            Err(StargalError::InvalidParameter { ref name, .. }) if name == "n_trees"
        ));
    }

    #[test]
    fn test_score_column() {
        assert_eq!(Method::Bdtd.score_column(), "bdtdvar");
    }
}
