//! Model booking and evaluation

use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

use crate::error::{Result, StargalError};
use crate::features::FeatureVector;
use crate::model::ModelArtifact;
use crate::training::Method;

/// Anything that can score a feature vector with a given method
pub trait Scorer: Sync {
    fn evaluate(&self, method: Method, features: &FeatureVector) -> Result<f64>;
}

/// Holds the models booked for an application run
#[derive(Debug, Default)]
pub struct Reader {
    models: BTreeMap<Method, ModelArtifact>,
}

impl Reader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the model at `path` and register it under `method`.
    pub fn book(&mut self, method: Method, path: &Path) -> Result<()> {
        let artifact = ModelArtifact::load(path)?;
        self.book_artifact(method, artifact)?;
        info!(%method, path = %path.display(), "Booked model");
        Ok(())
    }

    /// Register an already loaded model
    pub fn book_artifact(&mut self, method: Method, artifact: ModelArtifact) -> Result<()> {
        if artifact.method() != method {
            return Err(StargalError::Config(format!(
                "model {} was trained as {}, not {}",
                artifact.metadata.name,
                artifact.method(),
                method
            )));
        }
        self.models.insert(method, artifact);
        Ok(())
    }

    pub fn is_booked(&self, method: Method) -> bool {
        self.models.contains_key(&method)
    }

    pub fn booked(&self) -> Vec<Method> {
        self.models.keys().copied().collect()
    }

    pub fn model(&self, method: Method) -> Option<&ModelArtifact> {
        self.models.get(&method)
    }
}

impl Scorer for Reader {
    fn evaluate(&self, method: Method, features: &FeatureVector) -> Result<f64> {
        self.models
            .get(&method)
            .ok_or_else(|| StargalError::MethodNotBooked(method.name().to_string()))?
            .evaluate(features)
    }
}
