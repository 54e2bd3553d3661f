//! Export of a whole registry, one scrape at a time.

use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;

use metricbridge_common::{
    AllMetrics, Metric, MetricFilter, SharedRegistries, SharedRegistry, Timer,
};
use parking_lot::RwLock;
use tracing::{debug, error, trace};

use crate::config::{FilterConfig, PrometheusConfig};
use crate::error::ExportError;
use crate::exporter::MetricsExporter;
use crate::labels::extract_labels;
use crate::mapping::sanitize_metric_name;
use crate::writer::PrometheusTextWriter;

/// Glob-based filter over registered metric identifiers.
#[derive(Debug, Default)]
pub struct GlobFilter {
    include_metrics: Vec<glob::Pattern>,
    exclude_metrics: Vec<glob::Pattern>,
}

impl GlobFilter {
    /// Create a new filter from configuration.
    pub fn new(config: &FilterConfig) -> Result<Self, ExportError> {
        Ok(Self {
            include_metrics: compile(&config.include_metrics)?,
            exclude_metrics: compile(&config.exclude_metrics)?,
        })
    }
}

fn compile(patterns: &[String]) -> Result<Vec<glob::Pattern>, ExportError> {
    patterns
        .iter()
        .map(|p| {
            glob::Pattern::new(p).map_err(|source| ExportError::Pattern {
                pattern: p.clone(),
                source,
            })
        })
        .collect()
}

impl MetricFilter for GlobFilter {
    fn matches(&self, name: &str, _metric: &Metric) -> bool {
        if !self.include_metrics.is_empty()
            && !self.include_metrics.iter().any(|p| p.matches(name))
        {
            return false;
        }

        !self.exclude_metrics.iter().any(|p| p.matches(name))
    }
}

/// Outcome of one export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    /// Metrics written to the output.
    pub exported: usize,
    /// Metrics left out because of the wanted-name set.
    pub unwanted: usize,
    /// Metrics skipped because their value could not be exported.
    pub skipped: usize,
}

/// Collector statistics.
#[derive(Debug, Clone, Default)]
pub struct CollectorStats {
    /// Exports that completed.
    pub scrapes: u64,
    /// Exports aborted by an output error.
    pub failed_scrapes: u64,
    /// Metrics written across all exports.
    pub metrics_exported: u64,
    /// Metrics skipped across all exports.
    pub metrics_skipped: u64,
}

/// Renders a metric registry in the Prometheus text exposition format.
pub struct MetricCollector {
    registry: SharedRegistry,
    filter: Box<dyn MetricFilter>,
    source: String,
    scrape_timer: Option<Arc<Timer>>,
    stats: RwLock<CollectorStats>,
}

impl MetricCollector {
    /// Create a collector exporting every metric of `registry`.
    pub fn new(registry: SharedRegistry, source: impl Into<String>) -> Self {
        Self {
            registry,
            filter: Box::new(AllMetrics),
            source: source.into(),
            scrape_timer: None,
            stats: RwLock::new(CollectorStats::default()),
        }
    }

    /// Create a collector for the registry named in the configuration.
    ///
    /// Fails if no registry with that name has been created.
    pub fn from_config(
        prometheus: &PrometheusConfig,
        filters: &FilterConfig,
    ) -> Result<Self, ExportError> {
        let registry = SharedRegistries::get(&prometheus.registry)
            .ok_or_else(|| ExportError::RegistryNotFound(prometheus.registry.clone()))?;

        Ok(Self::new(registry, prometheus.help_source.clone())
            .with_filter(GlobFilter::new(filters)?))
    }

    /// Restrict which registered metrics are visited.
    pub fn with_filter(mut self, filter: impl MetricFilter + 'static) -> Self {
        self.filter = Box::new(filter);
        self
    }

    /// Record the duration of every export in `timer`.
    pub fn with_scrape_timer(mut self, timer: Arc<Timer>) -> Self {
        self.scrape_timer = Some(timer);
        self
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    /// Whether the registry holds any metric besides the scrape timer.
    pub fn has_metrics(&self) -> bool {
        let own = self
            .scrape_timer
            .as_ref()
            .map(|timer| Arc::as_ptr(timer) as *const ());

        self.registry
            .entries(&AllMetrics)
            .iter()
            .any(|(_, metric)| match (metric, own) {
                (Metric::Timer(timer), Some(own)) => Arc::as_ptr(timer) as *const () != own,
                _ => true,
            })
    }

    /// Get collector statistics.
    pub fn stats(&self) -> CollectorStats {
        self.stats.read().clone()
    }

    /// Render the registry as exposition text.
    ///
    /// `wanted` holds sanitized, label-free names; when it is non-empty only
    /// metrics whose name is in the set are written.
    pub fn render(&self, wanted: &HashSet<String>) -> Result<String, ExportError> {
        let mut output = Vec::with_capacity(self.registry.len() * 256);
        self.write_to(&mut output, wanted)?;
        Ok(String::from_utf8_lossy(&output).into_owned())
    }

    /// Stream the registry as exposition text into `sink`.
    ///
    /// Output already written is left in place if the sink fails.
    pub fn write_to<W: Write>(
        &self,
        sink: W,
        wanted: &HashSet<String>,
    ) -> Result<ExportSummary, ExportError> {
        let _timing = self.scrape_timer.as_ref().map(|timer| timer.start());

        let result = self.export(sink, wanted);

        let mut stats = self.stats.write();
        match &result {
            Ok(summary) => {
                stats.scrapes += 1;
                stats.metrics_exported += summary.exported as u64;
                stats.metrics_skipped += summary.skipped as u64;
                debug!(
                    exported = summary.exported,
                    skipped = summary.skipped,
                    unwanted = summary.unwanted,
                    "Exported registry"
                );
            }
            Err(e) => {
                stats.failed_scrapes += 1;
                error!(error = %e, "Registry export failed");
            }
        }

        result
    }

    fn export<W: Write>(
        &self,
        sink: W,
        wanted: &HashSet<String>,
    ) -> Result<ExportSummary, ExportError> {
        let mut writer = PrometheusTextWriter::new(sink);
        let mut summary = ExportSummary::default();

        {
            let mut exporter = MetricsExporter::new(&mut writer, &self.source);

            for (identifier, metric) in self.registry.entries(self.filter.as_ref()) {
                let parsed = extract_labels(&identifier);
                let name = sanitize_metric_name(&parsed.name);

                if !wanted.is_empty() && !wanted.contains(&name) {
                    trace!(metric = %identifier, name = %name, "Metric not requested");
                    summary.unwanted += 1;
                    continue;
                }

                if exporter.write_metric(&identifier, &name, &metric, &parsed.labels)? {
                    summary.exported += 1;
                } else {
                    summary.skipped += 1;
                }
            }
        }

        writer.close()?;
        Ok(summary)
    }
}

/// Create a shareable collector handle.
pub type SharedCollector = Arc<MetricCollector>;

#[cfg(test)]
mod tests {
    use super::*;
    use metricbridge_common::{FnGauge, MetricRegistry};
    use std::io;

    fn registry() -> SharedRegistry {
        let registry = Arc::new(MetricRegistry::new());
        registry.counter("requests").unwrap().inc_by(3);
        registry.timer("latency").unwrap();
        registry
            .gauge("pool.{pool:main}.size", FnGauge::new(|| 8))
            .unwrap();
        registry
    }

    fn wanted(names: &[&str]) -> HashSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_glob_filter() {
        let config = FilterConfig {
            include_metrics: vec!["http.*".to_string()],
            exclude_metrics: vec!["*.debug".to_string()],
        };
        let filter = GlobFilter::new(&config).unwrap();
        let metric = Metric::Counter(Arc::new(metricbridge_common::Counter::new()));

        assert!(filter.matches("http.requests", &metric));
        assert!(!filter.matches("http.debug", &metric));
        assert!(!filter.matches("db.queries", &metric));
    }

    #[test]
    fn test_glob_filter_invalid_pattern() {
        let config = FilterConfig {
            include_metrics: vec!["[".to_string()],
            ..Default::default()
        };

        assert!(matches!(
            GlobFilter::new(&config),
            Err(ExportError::Pattern { .. })
        ));
    }

    #[test]
    fn test_render_all() {
        let collector = MetricCollector::new(registry(), "Dropwizard");
        let output = collector.render(&HashSet::new()).unwrap();

        assert!(output.contains("# TYPE pool_size gauge\n"));
        assert!(output.contains("pool_size{pool=\"main\"} 8\n"));
        assert!(output.contains("requests 3\n"));
        assert!(output.contains("# TYPE latency summary\n"));
        assert!(output.contains("latency_rate{rate=\"m1\"} 0\n"));

        // Gauges come first, then counters, histograms, meters and timers.
        let gauge = output.find("pool_size").unwrap();
        let counter = output.find("# HELP requests").unwrap();
        let timer = output.find("# HELP latency").unwrap();
        assert!(gauge < counter && counter < timer);
    }

    #[test]
    fn test_wanted_names_restrict_output() {
        let collector = MetricCollector::new(registry(), "Dropwizard");
        let output = collector.render(&wanted(&["requests"])).unwrap();

        assert!(output.contains("requests 3\n"));
        assert!(!output.contains("latency"));
        assert!(!output.contains("pool_size"));
    }

    #[test]
    fn test_wanted_names_match_label_free_name() {
        let collector = MetricCollector::new(registry(), "Dropwizard");
        let output = collector.render(&wanted(&["pool_size"])).unwrap();

        assert!(output.contains("pool_size{pool=\"main\"} 8\n"));
        assert!(!output.contains("requests"));
    }

    #[test]
    fn test_unsupported_gauge_does_not_abort_export() {
        let registry = registry();
        registry
            .gauge("build.version", FnGauge::new(|| "1.2.3"))
            .unwrap();

        let collector = MetricCollector::new(registry, "Dropwizard");
        let mut output = Vec::new();
        let summary = collector.write_to(&mut output, &HashSet::new()).unwrap();
        let output = String::from_utf8(output).unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.exported, 3);
        assert!(!output.contains("build_version"));
        assert!(output.contains("requests 3\n"));
    }

    #[test]
    fn test_shared_name_declared_once() {
        let registry = Arc::new(MetricRegistry::new());
        registry.counter("hits.{org:a}").unwrap().inc();
        registry.counter("hits.{org:b}").unwrap().inc_by(2);

        let collector = MetricCollector::new(registry, "Dropwizard");
        let output = collector.render(&HashSet::new()).unwrap();

        assert_eq!(output.matches("# TYPE hits gauge").count(), 1);
        assert_eq!(output.matches("# HELP hits ").count(), 1);
        assert!(output.contains("hits{org=\"a\"} 1\n"));
        assert!(output.contains("hits{org=\"b\"} 2\n"));
    }

    #[test]
    fn test_labels_do_not_leak_between_metrics() {
        let registry = Arc::new(MetricRegistry::new());
        registry.histogram("a.{org:x}.size").unwrap().update(1);
        registry.counter("b.count").unwrap();

        let collector = MetricCollector::new(registry, "Dropwizard");
        let output = collector.render(&HashSet::new()).unwrap();

        assert!(output.contains("b_count 0\n"));
        assert!(output.contains("a_size_min{org=\"x\"} 1\n"));
    }

    #[test]
    fn test_filter_applies_to_raw_identifier() {
        let collector = MetricCollector::new(registry(), "Dropwizard")
            .with_filter(|name: &str, _: &Metric| name.starts_with("pool."));
        let output = collector.render(&HashSet::new()).unwrap();

        assert!(output.contains("pool_size"));
        assert!(!output.contains("requests"));
    }

    #[test]
    fn test_stats_and_scrape_timer() {
        let timer = Arc::new(Timer::new());
        let collector =
            MetricCollector::new(registry(), "Dropwizard").with_scrape_timer(timer.clone());

        collector.render(&HashSet::new()).unwrap();
        collector.render(&wanted(&["requests"])).unwrap();

        let stats = collector.stats();
        assert_eq!(stats.scrapes, 2);
        assert_eq!(stats.metrics_exported, 4);
        assert_eq!(stats.failed_scrapes, 0);
        assert_eq!(metricbridge_common::Counting::count(timer.as_ref()), 2);
    }

    #[test]
    fn test_scrape_timer_does_not_count_as_metric() {
        let registry = Arc::new(MetricRegistry::new());
        let timer = registry.timer("metricbridge.scrape").unwrap();
        let collector = MetricCollector::new(registry.clone(), "Dropwizard").with_scrape_timer(timer);

        assert!(!collector.has_metrics());

        registry.timer("db.latency").unwrap();
        assert!(collector.has_metrics());
    }

    #[test]
    fn test_has_metrics_without_scrape_timer() {
        let registry = Arc::new(MetricRegistry::new());
        let collector = MetricCollector::new(registry.clone(), "Dropwizard");
        assert!(!collector.has_metrics());

        registry.timer("metricbridge.scrape").unwrap();
        assert!(collector.has_metrics());
    }

    #[test]
    fn test_sink_failure_surfaces_as_error() {
        struct Broken;

        impl Write for Broken {
            fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "peer gone"))
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let collector = MetricCollector::new(registry(), "Dropwizard");
        let result = collector.write_to(Broken, &HashSet::new());

        assert!(matches!(result, Err(ExportError::Io(_))));
        assert_eq!(collector.stats().failed_scrapes, 1);
    }

    #[test]
    fn test_from_config_missing_registry() {
        let prometheus = PrometheusConfig {
            registry: "collector-tests-missing".to_string(),
            ..Default::default()
        };

        let result = MetricCollector::from_config(&prometheus, &FilterConfig::default());
        assert!(matches!(
            result,
            Err(ExportError::RegistryNotFound(name)) if name == "collector-tests-missing"
        ));
    }

    #[test]
    fn test_from_config_resolves_shared_registry() {
        let registry = SharedRegistries::get_or_create("collector-tests-present");
        registry.counter("jobs").unwrap();
        let prometheus = PrometheusConfig {
            registry: "collector-tests-present".to_string(),
            help_source: "metricbridge".to_string(),
            ..Default::default()
        };

        let collector = MetricCollector::from_config(&prometheus, &FilterConfig::default()).unwrap();
        let output = collector.render(&HashSet::new()).unwrap();
        assert!(output.contains("Generated from metricbridge metric import (metric=jobs"));
    }
}
