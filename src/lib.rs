//! stargal - star/galaxy separation with boosted decision trees
//!
//! Two pipelines over photometric catalogs:
//! - training: select labelled objects, derive features, train and
//!   evaluate BDT classifiers, and persist them as model artifacts
//! - application: score a catalog with booked models and report galaxy
//!   selection efficiency and impurity per magnitude bin
//!
//! # Modules
//!
//! ## Data
//! - [`catalog`] - Catalog columns, missing-value policy, file I/O
//! - [`features`] - The 28 derived input variables
//!
//! ## Training
//! - [`training`] - Tree ensembles, decorrelation, train/test engine
//! - [`model`] - Serialized model artifacts
//!
//! ## Application
//! - [`apply`] - Parallel scoring and output writing
//! - [`analysis`] - Per-bin tallies and summary tables
//! - [`histogram`] - Fixed-binning histograms
//!
//! ## Services
//! - [`config`] - TOML run configuration
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Data
pub mod catalog;
pub mod features;

// Training
pub mod training;
pub mod model;

// Application
pub mod histogram;
pub mod analysis;
pub mod apply;

// Utilities
pub mod config;
pub mod utils;

// Services
pub mod cli;

pub use error::{Result, StargalError};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{Result, StargalError};

    // Catalog
    pub use crate::catalog::{CatalogRow, Label, MagSystem};
    pub use crate::features::{FeatureVector, N_FEATURES};

    // Training
    pub use crate::training::{BdtConfig, Method, TrainEngine};
    pub use crate::model::ModelArtifact;

    // Application
    pub use crate::apply::{ApplyConfig, ApplicationResult, Reader, Scorer};
    pub use crate::analysis::{Aggregate, MagnitudeBins, Selector};

    // Configuration
    pub use crate::config::RunConfig;
}
