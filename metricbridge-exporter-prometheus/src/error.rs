use thiserror::Error;

/// Errors raised while exporting a registry.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to write exposition output: {0}")]
    Io(#[from] std::io::Error),

    #[error("Couldn't find a metric registry named '{0}'")]
    RegistryNotFound(String),

    #[error("Invalid metric filter pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}
