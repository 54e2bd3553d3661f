//! Prometheus exporter for metricbridge registries.
//!
//! This crate renders an in-process metric registry in the Prometheus text
//! exposition format and serves it over an HTTP endpoint.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │ MetricRegistry  │────>│    Collector    │────>│   HTTP Server   │
//! │ (metricbridge)  │     │ (text exporter) │     │   (/metrics)    │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! Registered identifiers may embed labels as `{key:value}` tokens, e.g.
//! `http.{org:acme}.requests` is exported as `http_requests{org="acme"}`.
//!
//! # Usage
//!
//! Run the exporter binary with a configuration file:
//!
//! ```bash
//! metricbridge-exporter-prometheus --config config.json5
//! ```
//!
//! # Configuration
//!
//! See [`config::ExporterConfig`] for configuration options.

pub mod collector;
pub mod config;
pub mod error;
pub mod exporter;
pub mod http;
pub mod labels;
pub mod mapping;
pub mod writer;

pub use collector::{CollectorStats, ExportSummary, GlobFilter, MetricCollector, SharedCollector};
pub use config::{ConfigError, ExporterConfig};
pub use error::ExportError;
pub use exporter::MetricsExporter;
pub use http::HttpServer;
pub use labels::{LabelParsedMetric, Labels, extract_labels};
pub use mapping::sanitize_metric_name;
pub use writer::PrometheusTextWriter;
