//! Metric read contracts and the closed set of metric kinds.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::snapshot::Snapshot;

/// The value currently reported by a gauge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GaugeValue {
    /// Signed integer.
    Int(i64),
    /// Unsigned integer.
    UInt(u64),
    /// Floating point.
    Float(f64),
    /// Boolean, exported as 1 or 0.
    Bool(bool),
    /// Text; not representable as a sample.
    Text(String),
    /// Any other value, carrying a description of its type.
    Other(String),
}

impl GaugeValue {
    /// Numeric view of this value, if it has one.
    ///
    /// Booleans map to 1.0 and 0.0. Text and other values yield `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            GaugeValue::Int(v) => Some(*v as f64),
            GaugeValue::UInt(v) => Some(*v as f64),
            GaugeValue::Float(v) => Some(*v),
            GaugeValue::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            GaugeValue::Text(_) | GaugeValue::Other(_) => None,
        }
    }

    /// Short name of the value's type, used in diagnostics.
    pub fn type_label(&self) -> &str {
        match self {
            GaugeValue::Int(_) => "int",
            GaugeValue::UInt(_) => "uint",
            GaugeValue::Float(_) => "float",
            GaugeValue::Bool(_) => "bool",
            GaugeValue::Text(_) => "text",
            GaugeValue::Other(kind) => kind,
        }
    }
}

macro_rules! gauge_value_from {
    ($variant:ident, $cast:ty, $($t:ty),+) => {
        $(
            impl From<$t> for GaugeValue {
                fn from(v: $t) -> Self {
                    GaugeValue::$variant(v as $cast)
                }
            }
        )+
    };
}

gauge_value_from!(Int, i64, i8, i16, i32, i64, isize);
gauge_value_from!(UInt, u64, u8, u16, u32, u64, usize);
gauge_value_from!(Float, f64, f32, f64);

impl From<bool> for GaugeValue {
    fn from(v: bool) -> Self {
        GaugeValue::Bool(v)
    }
}

impl From<String> for GaugeValue {
    fn from(v: String) -> Self {
        GaugeValue::Text(v)
    }
}

impl From<&str> for GaugeValue {
    fn from(v: &str) -> Self {
        GaugeValue::Text(v.to_string())
    }
}

impl From<serde_json::Value> for GaugeValue {
    fn from(v: serde_json::Value) -> Self {
        use serde_json::Value;

        match v {
            Value::Bool(b) => GaugeValue::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    GaugeValue::Int(i)
                } else if let Some(u) = n.as_u64() {
                    GaugeValue::UInt(u)
                } else {
                    GaugeValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => GaugeValue::Text(s),
            Value::Null => GaugeValue::Other("null".to_string()),
            Value::Array(_) => GaugeValue::Other("array".to_string()),
            Value::Object(_) => GaugeValue::Other("object".to_string()),
        }
    }
}

/// Common behaviour of every metric implementation.
pub trait Instrument: Send + Sync {
    /// Name of the implementing type, reported in HELP lines.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// A metric reporting an instantaneous value.
pub trait Gauge: Instrument {
    fn value(&self) -> GaugeValue;
}

/// A metric with a running count.
pub trait Counting: Instrument {
    fn count(&self) -> i64;
}

/// A metric that can summarize its observed distribution.
pub trait Sampling: Counting {
    fn snapshot(&self) -> Snapshot;
}

/// A metric tracking event rates, in events per second.
pub trait Metered: Counting {
    fn one_minute_rate(&self) -> f64;
    fn five_minute_rate(&self) -> f64;
    fn fifteen_minute_rate(&self) -> f64;
    fn mean_rate(&self) -> f64;
}

/// A metric that is both sampled and metered.
pub trait Timed: Sampling + Metered {}

impl<T: Sampling + Metered + ?Sized> Timed for T {}

/// The kind of a registered metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Gauge,
    Counter,
    Histogram,
    Meter,
    Timer,
}

impl MetricKind {
    /// All kinds, in export order.
    pub const ALL: [MetricKind; 5] = [
        MetricKind::Gauge,
        MetricKind::Counter,
        MetricKind::Histogram,
        MetricKind::Meter,
        MetricKind::Timer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Gauge => "gauge",
            MetricKind::Counter => "counter",
            MetricKind::Histogram => "histogram",
            MetricKind::Meter => "meter",
            MetricKind::Timer => "timer",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered metric, tagged by kind.
#[derive(Clone)]
pub enum Metric {
    Gauge(Arc<dyn Gauge>),
    Counter(Arc<dyn Counting>),
    Histogram(Arc<dyn Sampling>),
    Meter(Arc<dyn Metered>),
    Timer(Arc<dyn Timed>),
}

impl Metric {
    pub fn kind(&self) -> MetricKind {
        match self {
            Metric::Gauge(_) => MetricKind::Gauge,
            Metric::Counter(_) => MetricKind::Counter,
            Metric::Histogram(_) => MetricKind::Histogram,
            Metric::Meter(_) => MetricKind::Meter,
            Metric::Timer(_) => MetricKind::Timer,
        }
    }

    /// Name of the underlying implementation type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Metric::Gauge(m) => m.type_name(),
            Metric::Counter(m) => m.type_name(),
            Metric::Histogram(m) => m.type_name(),
            Metric::Meter(m) => m.type_name(),
            Metric::Timer(m) => m.type_name(),
        }
    }
}

impl fmt::Debug for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metric")
            .field("kind", &self.kind())
            .field("type", &self.type_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Fixed;

    impl Instrument for Fixed {}

    impl Gauge for Fixed {
        fn value(&self) -> GaugeValue {
            GaugeValue::Int(7)
        }
    }

    #[test]
    fn test_gauge_value_as_f64() {
        assert_eq!(GaugeValue::from(42).as_f64(), Some(42.0));
        assert_eq!(GaugeValue::from(42u64).as_f64(), Some(42.0));
        assert_eq!(GaugeValue::from(2.5).as_f64(), Some(2.5));
        assert_eq!(GaugeValue::from(true).as_f64(), Some(1.0));
        assert_eq!(GaugeValue::from(false).as_f64(), Some(0.0));
        assert_eq!(GaugeValue::from("up").as_f64(), None);
        assert_eq!(GaugeValue::Other("vec".into()).as_f64(), None);
    }

    #[test]
    fn test_gauge_value_from_json() {
        assert_eq!(GaugeValue::from(json!(3)), GaugeValue::Int(3));
        assert_eq!(GaugeValue::from(json!(u64::MAX)), GaugeValue::UInt(u64::MAX));
        assert_eq!(GaugeValue::from(json!(0.25)), GaugeValue::Float(0.25));
        assert_eq!(GaugeValue::from(json!(true)), GaugeValue::Bool(true));
        assert_eq!(GaugeValue::from(json!("x")), GaugeValue::Text("x".into()));
        assert_eq!(
            GaugeValue::from(json!([1, 2])),
            GaugeValue::Other("array".into())
        );
        assert_eq!(GaugeValue::from(json!(null)).type_label(), "null");
    }

    #[test]
    fn test_metric_kind_and_type_name() {
        let metric = Metric::Gauge(Arc::new(Fixed));

        assert_eq!(metric.kind(), MetricKind::Gauge);
        assert!(metric.type_name().ends_with("Fixed"));
        assert_eq!(MetricKind::Timer.to_string(), "timer");
    }

    #[test]
    fn test_kinds_are_ordered_for_export() {
        let mut kinds = MetricKind::ALL;
        kinds.sort();
        assert_eq!(kinds, MetricKind::ALL);
    }
}
