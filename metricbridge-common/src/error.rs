use thiserror::Error;

use crate::metric::MetricKind;

/// Common error type for metricbridge components.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Metric '{name}' is already registered as a {existing}, not a {requested}")]
    KindMismatch {
        name: String,
        existing: MetricKind,
        requested: MetricKind,
    },

    #[error("Metric '{0}' is already registered")]
    AlreadyRegistered(String),
}

/// Result type alias using metricbridge's Error.
pub type Result<T> = std::result::Result<T, Error>;
