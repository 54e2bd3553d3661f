//! Mapping from registry metrics to Prometheus names and types.

use metricbridge_common::Metric;

/// Sanitize a metric name to be Prometheus-compatible.
///
/// Every character outside `[a-zA-Z0-9:_]` is replaced by exactly one
/// underscore, so the result has the same number of characters as the input.
/// Applying it twice yields the same result as applying it once.
pub fn sanitize_metric_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == ':' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Sanitize a label name to be Prometheus-compatible.
///
/// Label names must match `[a-zA-Z_][a-zA-Z0-9_]*`. Runs of invalid
/// characters become a single underscore, a leading digit gets an underscore
/// prefix, and names starting with the reserved `__` are prefixed with `z`.
pub fn sanitize_label_name(name: &str) -> String {
    let mut result = String::with_capacity(name.len() + 1);

    for c in name.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            result.push(c);
        } else if !result.ends_with('_') {
            result.push('_');
        }
    }

    let trimmed_len = result.trim_end_matches('_').len();
    result.truncate(trimmed_len);

    if result.is_empty() {
        return "label".to_string();
    }
    if result.starts_with(|c: char| c.is_ascii_digit()) {
        result.insert(0, '_');
    }
    if result.starts_with("__") {
        result.insert(0, 'z');
    }

    result
}

/// The Prometheus metric type declared on a TYPE line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrometheusType {
    Counter,
    Gauge,
    Summary,
}

impl PrometheusType {
    /// Determine the declared type for a registry metric.
    ///
    /// Counters can decrement, so they are declared as gauges. Meters are
    /// declared as counters on their `_total` series.
    pub fn for_metric(metric: &Metric) -> Self {
        match metric {
            Metric::Gauge(_) | Metric::Counter(_) => PrometheusType::Gauge,
            Metric::Meter(_) => PrometheusType::Counter,
            Metric::Histogram(_) | Metric::Timer(_) => PrometheusType::Summary,
        }
    }

    /// Get the TYPE comment string for Prometheus exposition format.
    pub fn as_str(&self) -> &'static str {
        match self {
            PrometheusType::Counter => "counter",
            PrometheusType::Gauge => "gauge",
            PrometheusType::Summary => "summary",
        }
    }
}

/// Build the HELP text for an exported metric.
pub fn help_message(source: &str, original_name: &str, type_name: &str) -> String {
    format!(
        "Generated from {} metric import (metric={}, type={})",
        source, original_name, type_name
    )
}
