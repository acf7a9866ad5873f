//! Error types for star/galaxy separation runs

use thiserror::Error;

/// Result type alias for stargal operations
pub type Result<T> = std::result::Result<T, StargalError>;

/// Main error type.
///
/// Everything here aborts a run. Per-row data problems are not errors; they
/// are counted as [`crate::analysis::SkipReason`]s and the row is dropped.
#[derive(Error, Debug)]
pub enum StargalError {
    #[error("Data error: {0}")]
    Data(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Unknown method \"{name}\"; choose among: {valid}")]
    UnknownMethod { name: String, valid: String },

    #[error("Method {0} was not booked on this reader")]
    MethodNotBooked(String),

    #[error("Could not load model from {path}: {reason}")]
    ModelLoad { path: String, reason: String },

    #[error("Model feature list does not match: expected {expected}, got {actual}")]
    FeatureMismatch { expected: String, actual: String },

    #[error("Column not found: {0}")]
    FeatureNotFound(String),

    #[error("Not enough {class} events: requested {requested}, available {available}")]
    InsufficientEvents {
        class: &'static str,
        requested: usize,
        available: usize,
    },

    #[error("Invalid shape: expected {expected}, got {actual}")]
    Shape { expected: String, actual: String },

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<polars::error::PolarsError> for StargalError {
    fn from(err: polars::error::PolarsError) -> Self {
        StargalError::Data(err.to_string())
    }
}

impl From<serde_json::Error> for StargalError {
    fn from(err: serde_json::Error) -> Self {
        StargalError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for StargalError {
    fn from(err: toml::de::Error) -> Self {
        StargalError::Config(err.to_string())
    }
}

impl From<ndarray::ShapeError> for StargalError {
    fn from(err: ndarray::ShapeError) -> Self {
        StargalError::Shape {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
