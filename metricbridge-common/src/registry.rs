//! Named metric registry and the process-wide registry table.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, OnceLock};

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::counter::Counter;
use crate::error::{Error, Result};
use crate::histogram::Histogram;
use crate::meter::Meter;
use crate::metric::{Gauge, Metric, MetricKind};
use crate::timer::Timer;

/// Decides which registered metrics are visited.
pub trait MetricFilter: Send + Sync {
    fn matches(&self, name: &str, metric: &Metric) -> bool;
}

/// Filter accepting every metric.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllMetrics;

impl MetricFilter for AllMetrics {
    fn matches(&self, _name: &str, _metric: &Metric) -> bool {
        true
    }
}

impl<F> MetricFilter for F
where
    F: Fn(&str, &Metric) -> bool + Send + Sync,
{
    fn matches(&self, name: &str, metric: &Metric) -> bool {
        self(name, metric)
    }
}

struct Entry {
    metric: Metric,
    /// Concrete handle for metrics created by the registry itself.
    handle: Option<Arc<dyn Any + Send + Sync>>,
}

/// A set of named metrics.
#[derive(Default)]
pub struct MetricRegistry {
    metrics: RwLock<BTreeMap<String, Entry>>,
}

/// Create a shareable registry handle.
pub type SharedRegistry = Arc<MetricRegistry>;

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a metric under `name`.
    pub fn register(&self, name: impl Into<String>, metric: Metric) -> Result<()> {
        let name = name.into();
        let mut metrics = self.metrics.write();
        if metrics.contains_key(&name) {
            return Err(Error::AlreadyRegistered(name));
        }

        debug!(name = %name, kind = %metric.kind(), "Registered metric");
        metrics.insert(
            name,
            Entry {
                metric,
                handle: None,
            },
        );
        Ok(())
    }

    /// Register a gauge under `name`.
    pub fn gauge<G: Gauge + 'static>(&self, name: impl Into<String>, gauge: G) -> Result<()> {
        self.register(name, Metric::Gauge(Arc::new(gauge)))
    }

    /// Get or create the counter registered under `name`.
    pub fn counter(&self, name: &str) -> Result<Arc<Counter>> {
        self.get_or_create(name, MetricKind::Counter, |c: Arc<Counter>| {
            Metric::Counter(c)
        })
    }

    /// Get or create the histogram registered under `name`.
    pub fn histogram(&self, name: &str) -> Result<Arc<Histogram>> {
        self.get_or_create(name, MetricKind::Histogram, |h: Arc<Histogram>| {
            Metric::Histogram(h)
        })
    }

    /// Get or create the meter registered under `name`.
    pub fn meter(&self, name: &str) -> Result<Arc<Meter>> {
        self.get_or_create(name, MetricKind::Meter, |m: Arc<Meter>| Metric::Meter(m))
    }

    /// Get or create the timer registered under `name`.
    pub fn timer(&self, name: &str) -> Result<Arc<Timer>> {
        self.get_or_create(name, MetricKind::Timer, |t: Arc<Timer>| Metric::Timer(t))
    }

    fn get_or_create<T>(
        &self,
        name: &str,
        kind: MetricKind,
        wrap: impl FnOnce(Arc<T>) -> Metric,
    ) -> Result<Arc<T>>
    where
        T: Default + Send + Sync + 'static,
    {
        let mut metrics = self.metrics.write();

        if let Some(entry) = metrics.get(name) {
            let existing = entry
                .handle
                .clone()
                .and_then(|handle| handle.downcast::<T>().ok());
            return existing.ok_or_else(|| {
                if entry.metric.kind() == kind {
                    // Registered from outside with a custom implementation.
                    Error::AlreadyRegistered(name.to_string())
                } else {
                    Error::KindMismatch {
                        name: name.to_string(),
                        existing: entry.metric.kind(),
                        requested: kind,
                    }
                }
            });
        }

        let created = Arc::new(T::default());
        metrics.insert(
            name.to_string(),
            Entry {
                metric: wrap(created.clone()),
                handle: Some(created.clone() as Arc<dyn Any + Send + Sync>),
            },
        );
        debug!(name, kind = %kind, "Registered metric");
        Ok(created)
    }

    /// Remove the metric registered under `name`.
    pub fn remove(&self, name: &str) -> Option<Metric> {
        self.metrics.write().remove(name).map(|entry| entry.metric)
    }

    pub fn get(&self, name: &str) -> Option<Metric> {
        self.metrics.read().get(name).map(|entry| entry.metric.clone())
    }

    pub fn len(&self) -> usize {
        self.metrics.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.read().is_empty()
    }

    /// Point-in-time list of metrics accepted by `filter`.
    ///
    /// Entries are grouped by kind (gauges, counters, histograms, meters,
    /// timers) and ordered by name within each group.
    pub fn entries(&self, filter: &dyn MetricFilter) -> Vec<(String, Metric)> {
        let mut entries: Vec<(String, Metric)> = self
            .metrics
            .read()
            .iter()
            .filter(|(name, entry)| filter.matches(name, &entry.metric))
            .map(|(name, entry)| (name.clone(), entry.metric.clone()))
            .collect();

        // Stable sort keeps the name order inside each kind.
        entries.sort_by_key(|(_, metric)| metric.kind());
        entries
    }
}

impl std::fmt::Debug for MetricRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricRegistry")
            .field("metrics", &self.len())
            .finish()
    }
}

/// Process-wide table of named registries.
pub struct SharedRegistries;

fn registries() -> &'static Mutex<HashMap<String, SharedRegistry>> {
    static REGISTRIES: OnceLock<Mutex<HashMap<String, SharedRegistry>>> = OnceLock::new();
    REGISTRIES.get_or_init(|| Mutex::new(HashMap::new()))
}

impl SharedRegistries {
    /// Name of the registry used when none is configured.
    pub const DEFAULT: &'static str = "default";

    /// Get the registry called `name`, creating it if absent.
    pub fn get_or_create(name: &str) -> SharedRegistry {
        registries()
            .lock()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MetricRegistry::new()))
            .clone()
    }

    /// Get the registry called `name`, if one was created.
    pub fn get(name: &str) -> Option<SharedRegistry> {
        registries().lock().get(name).cloned()
    }

    /// Register an existing registry under `name`, replacing any previous one.
    pub fn add(name: &str, registry: SharedRegistry) -> Option<SharedRegistry> {
        registries().lock().insert(name.to_string(), registry)
    }

    /// Drop the registry called `name` from the table.
    pub fn remove(name: &str) -> Option<SharedRegistry> {
        registries().lock().remove(name)
    }

    /// Names of all registries, sorted.
    pub fn names() -> Vec<String> {
        let mut names: Vec<String> = registries().lock().keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gauge::FnGauge;
    use crate::metric::Counting;

    #[test]
    fn test_get_or_create_returns_same_instance() {
        let registry = MetricRegistry::new();
        let a = registry.counter("requests").unwrap();
        let b = registry.counter("requests").unwrap();

        a.inc();
        assert_eq!(b.count(), 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_kind_mismatch() {
        let registry = MetricRegistry::new();
        registry.counter("jobs").unwrap();

        let err = registry.timer("jobs").unwrap_err();
        assert!(matches!(
            err,
            Error::KindMismatch {
                existing: MetricKind::Counter,
                requested: MetricKind::Timer,
                ..
            }
        ));
    }

    #[test]
    fn test_register_duplicate_rejected() {
        let registry = MetricRegistry::new();
        registry.gauge("up", FnGauge::new(|| true)).unwrap();

        let err = registry.gauge("up", FnGauge::new(|| false)).unwrap_err();
        assert!(matches!(err, Error::AlreadyRegistered(name) if name == "up"));
    }

    #[test]
    fn test_registered_gauge_cannot_be_fetched_as_counter() {
        let registry = MetricRegistry::new();
        registry.gauge("up", FnGauge::new(|| 1)).unwrap();

        assert!(registry.counter("up").is_err());
    }

    #[test]
    fn test_entries_grouped_by_kind_then_name() {
        let registry = MetricRegistry::new();
        registry.timer("a.timer").unwrap();
        registry.counter("z.counter").unwrap();
        registry.counter("b.counter").unwrap();
        registry.gauge("y.gauge", FnGauge::new(|| 1)).unwrap();
        registry.meter("c.meter").unwrap();
        registry.histogram("d.histogram").unwrap();

        let names: Vec<String> = registry
            .entries(&AllMetrics)
            .into_iter()
            .map(|(name, _)| name)
            .collect();

        assert_eq!(
            names,
            vec![
                "y.gauge",
                "b.counter",
                "z.counter",
                "d.histogram",
                "c.meter",
                "a.timer"
            ]
        );
    }

    #[test]
    fn test_entries_with_closure_filter() {
        let registry = MetricRegistry::new();
        registry.counter("http.requests").unwrap();
        registry.counter("db.queries").unwrap();

        let filter = |name: &str, _: &Metric| name.starts_with("http.");
        let entries = registry.entries(&filter);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, "http.requests");
    }

    #[test]
    fn test_remove() {
        let registry = MetricRegistry::new();
        registry.meter("events").unwrap();

        assert!(registry.remove("events").is_some());
        assert!(registry.is_empty());
        assert!(registry.get("events").is_none());
    }

    #[test]
    fn test_shared_registries() {
        let name = "registry-tests-shared";
        assert!(SharedRegistries::get(name).is_none());

        let created = SharedRegistries::get_or_create(name);
        let fetched = SharedRegistries::get(name).unwrap();
        assert!(Arc::ptr_eq(&created, &fetched));
        assert!(SharedRegistries::names().contains(&name.to_string()));

        SharedRegistries::remove(name);
        assert!(SharedRegistries::get(name).is_none());
    }
}
