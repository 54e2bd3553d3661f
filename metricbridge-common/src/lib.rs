//! metricbridge Common Library
//!
//! This crate provides the in-process metric registry that metricbridge
//! exporters read from, plus shared utilities:
//!
//! - [`metric`] - Metric read contracts (`Gauge`, `Counting`, `Sampling`, `Metered`) and the `Metric` enum
//! - [`snapshot`] - Statistical snapshots of value distributions
//! - [`counter`], [`gauge`], [`histogram`], [`meter`], [`timer`] - Metric implementations
//! - [`registry`] - Named registries, filters and the process-wide registry table
//! - [`config`] - Configuration loading (JSON5 format)
//! - [`error`] - Error types

pub mod clock;
pub mod config;
pub mod counter;
pub mod error;
pub mod gauge;
pub mod histogram;
pub mod meter;
pub mod metric;
pub mod registry;
pub mod snapshot;
pub mod timer;

// Re-export commonly used types at the crate root
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{LogFormat, LoggingConfig, load_config, parse_config};
pub use counter::Counter;
pub use error::{Error, Result};
pub use gauge::FnGauge;
pub use histogram::Histogram;
pub use meter::Meter;
pub use metric::{
    Counting, Gauge, GaugeValue, Instrument, Metered, Metric, MetricKind, Sampling, Timed,
};
pub use registry::{AllMetrics, MetricFilter, MetricRegistry, SharedRegistries, SharedRegistry};
pub use snapshot::Snapshot;
pub use timer::{Timer, TimerContext};

/// Initialize tracing with the given configuration.
///
/// Supports two output formats:
/// - `LogFormat::Text` (default): Human-readable text format
/// - `LogFormat::Json`: Structured JSON format for log aggregation systems
///
/// `RUST_LOG` takes precedence over the configured level.
///
/// # Example
///
/// ```ignore
/// use metricbridge_common::{LoggingConfig, LogFormat, init_tracing};
///
/// let config = LoggingConfig {
///     level: "info".to_string(),
///     format: LogFormat::Json,
/// };
/// init_tracing(&config)?;
/// ```
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
    }

    Ok(())
}
