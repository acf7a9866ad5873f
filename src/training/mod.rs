//! Model training module
//!
//! Boosted decision tree classifiers for star/galaxy separation:
//! - AdaBoost (`BDT`) and AdaBoost on decorrelated inputs (`BDTD`)
//! - Gradient boosting (`BDTG`)
//! - Bagging (`BDTB`)
//!
//! plus the engine that selects, splits, trains, and evaluates them.

mod config;
mod engine;
pub mod decision_tree;
pub mod decorrelation;
pub mod adaboost;
pub mod gradient_boosting;
pub mod bagging;
pub mod forest;
pub mod evaluation;

pub use config::{BdtConfig, Method};
pub use engine::{LabelledSample, Partitions, TrainEngine, TrainingOutcome};
pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use decorrelation::Decorrelation;
pub use adaboost::AdaBoostClassifier;
pub use gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
pub use bagging::BaggingClassifier;
pub use forest::Forest;
pub use evaluation::{
    rank_variables, roc_integral, sample_metrics, signal_efficiency_at, EvaluationReport,
    MethodEvaluation, SampleMetrics, WorkingPoint, BACKGROUND_WORKING_POINTS,
};
