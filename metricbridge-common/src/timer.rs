use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::clock::{Clock, SystemClock};
use crate::histogram::Histogram;
use crate::meter::Meter;
use crate::metric::{Counting, Instrument, Metered, Sampling};
use crate::snapshot::Snapshot;

/// Measures how long an operation takes (in nanoseconds) and how often it
/// happens.
#[derive(Debug, Default)]
pub struct Timer {
    histogram: Histogram,
    meter: Meter,
}

impl Timer {
    pub fn new() -> Self {
        Self::with_clock(SystemClock::shared())
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            histogram: Histogram::new(),
            meter: Meter::with_clock(clock),
        }
    }

    /// Record one duration.
    pub fn update(&self, duration: Duration) {
        let nanos = i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX);
        self.histogram.update(nanos);
        self.meter.mark();
    }

    /// Run `f` and record how long it took.
    pub fn time<T>(&self, f: impl FnOnce() -> T) -> T {
        let started = Instant::now();
        let result = f();
        self.update(started.elapsed());
        result
    }

    /// Start timing; the duration is recorded when the context is dropped.
    pub fn start(&self) -> TimerContext<'_> {
        TimerContext {
            timer: self,
            started: Instant::now(),
        }
    }
}

impl Instrument for Timer {}

impl Counting for Timer {
    fn count(&self) -> i64 {
        self.histogram.count()
    }
}

impl Sampling for Timer {
    fn snapshot(&self) -> Snapshot {
        self.histogram.snapshot()
    }
}

impl Metered for Timer {
    fn one_minute_rate(&self) -> f64 {
        self.meter.one_minute_rate()
    }

    fn five_minute_rate(&self) -> f64 {
        self.meter.five_minute_rate()
    }

    fn fifteen_minute_rate(&self) -> f64 {
        self.meter.fifteen_minute_rate()
    }

    fn mean_rate(&self) -> f64 {
        self.meter.mean_rate()
    }
}

/// Guard returned by [`Timer::start`].
#[must_use = "the duration is recorded when the context is dropped"]
pub struct TimerContext<'a> {
    timer: &'a Timer,
    started: Instant,
}

impl TimerContext<'_> {
    /// Stop timing now and return the recorded duration.
    pub fn stop(self) -> Duration {
        self.started.elapsed()
    }
}

impl Drop for TimerContext<'_> {
    fn drop(&mut self) {
        self.timer.update(self.started.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_update_records_nanos() {
        let timer = Timer::new();
        timer.update(Duration::from_millis(2));
        timer.update(Duration::from_millis(4));

        let snapshot = timer.snapshot();
        assert_eq!(timer.count(), 2);
        assert_eq!(snapshot.min, 2_000_000.0);
        assert_eq!(snapshot.max, 4_000_000.0);
        assert_eq!(snapshot.mean, 3_000_000.0);
    }

    #[test]
    fn test_timer_time_returns_result() {
        let timer = Timer::new();
        let value = timer.time(|| 21 * 2);

        assert_eq!(value, 42);
        assert_eq!(timer.count(), 1);
    }

    #[test]
    fn test_timer_context_records_on_drop() {
        let timer = Timer::new();
        {
            let _ctx = timer.start();
        }
        let ctx = timer.start();
        ctx.stop();

        assert_eq!(timer.count(), 2);
    }
}
