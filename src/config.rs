//! Run configuration files
//!
//! ```toml
//! weights_dir = "weights"
//!
//! [training]
//! n_trees = 400
//! n_train_background = 3000
//!
//! [application]
//! methods = ["BDT", "BDTD"]
//! threshold = 0.1
//! ```
//!
//! Every key is optional; absent keys keep their defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::apply::ApplyConfig;
use crate::error::{Result, StargalError};
use crate::training::BdtConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Directory holding model artifacts and evaluation reports
    pub weights_dir: PathBuf,
    /// Directory receiving application outputs
    pub output_dir: PathBuf,
    pub training: BdtConfig,
    pub application: ApplyConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            weights_dir: PathBuf::from("weights"),
            output_dir: PathBuf::from("."),
            training: BdtConfig::default(),
            application: ApplyConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            StargalError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    /// The file at `path` if given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::Method;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = RunConfig::from_toml(
            r#"
            weights_dir = "models"

            [training]
            n_trees = 400

            [application]
            methods = ["BDT", "BDTD"]
            threshold = 0.1
            "#,
        )
        .unwrap();

        assert_eq!(config.weights_dir, PathBuf::from("models"));
        assert_eq!(config.training.n_trees, 400);
        assert_eq!(config.training.max_depth, 15);
        assert_eq!(config.application.methods, vec![Method::Bdt, Method::Bdtd]);
        assert_eq!(config.application.threshold, 0.1);
        assert_eq!(config.application.std_cut, 0.145);
    }

    #[test]
    fn test_unknown_method_in_file_rejected() {
        let err = RunConfig::from_toml("[application]\nmethods = [\"Fisher\"]\n").unwrap_err();
        assert!(matches!(err, StargalError::Config(_)));
    }

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(RunConfig::from_toml("").unwrap(), RunConfig::default());
    }

    #[test]
    fn test_missing_file() {
        let err = RunConfig::load(Path::new("/nonexistent/run.toml")).unwrap_err();
        assert!(matches!(err, StargalError::Config(_)));
    }
}
