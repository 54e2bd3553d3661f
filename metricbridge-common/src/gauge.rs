use std::fmt;

use crate::metric::{Gauge, GaugeValue, Instrument};

/// A gauge whose value is computed by a closure on every read.
pub struct FnGauge<F> {
    read: F,
}

impl<F, V> FnGauge<F>
where
    F: Fn() -> V + Send + Sync,
    V: Into<GaugeValue>,
{
    pub fn new(read: F) -> Self {
        Self { read }
    }
}

impl<F> fmt::Debug for FnGauge<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnGauge").finish_non_exhaustive()
    }
}

impl<F: Send + Sync> Instrument for FnGauge<F> {
    // The closure type would otherwise leak into HELP text.
    fn type_name(&self) -> &'static str {
        concat!(module_path!(), "::FnGauge")
    }
}

impl<F, V> Gauge for FnGauge<F>
where
    F: Fn() -> V + Send + Sync,
    V: Into<GaugeValue>,
{
    fn value(&self) -> GaugeValue {
        (self.read)().into()
    }
}
