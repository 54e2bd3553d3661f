//! Event rate tracking with exponentially weighted moving averages.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use parking_lot::Mutex;

use crate::clock::{Clock, SystemClock};
use crate::metric::{Counting, Instrument, Metered};

const TICK_INTERVAL_NANOS: u64 = 5_000_000_000;
const TICK_INTERVAL_SECS: f64 = 5.0;
const NANOS_PER_SEC: f64 = 1_000_000_000.0;

/// Moving average over a window of `minutes`, fed once per tick.
#[derive(Debug)]
struct Ewma {
    alpha: f64,
    /// Events per nanosecond.
    rate: f64,
    initialized: bool,
    uncounted: i64,
}

impl Ewma {
    fn minutes(minutes: f64) -> Self {
        Self {
            alpha: 1.0 - (-TICK_INTERVAL_SECS / 60.0 / minutes).exp(),
            rate: 0.0,
            initialized: false,
            uncounted: 0,
        }
    }

    fn update(&mut self, n: i64) {
        self.uncounted += n;
    }

    fn tick(&mut self) {
        let count = std::mem::take(&mut self.uncounted);
        let instant_rate = count as f64 / TICK_INTERVAL_NANOS as f64;

        if self.initialized {
            self.rate += self.alpha * (instant_rate - self.rate);
        } else {
            self.rate = instant_rate;
            self.initialized = true;
        }
    }

    fn per_second(&self) -> f64 {
        self.rate * NANOS_PER_SEC
    }
}

#[derive(Debug)]
struct Rates {
    m1: Ewma,
    m5: Ewma,
    m15: Ewma,
    last_tick: u64,
}

/// Measures the rate at which events occur: 1, 5 and 15 minute moving
/// averages plus the mean rate since creation.
pub struct Meter {
    count: AtomicI64,
    start: u64,
    rates: Mutex<Rates>,
    clock: Arc<dyn Clock>,
}

impl Meter {
    pub fn new() -> Self {
        Self::with_clock(SystemClock::shared())
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let start = clock.tick();
        Self {
            count: AtomicI64::new(0),
            start,
            rates: Mutex::new(Rates {
                m1: Ewma::minutes(1.0),
                m5: Ewma::minutes(5.0),
                m15: Ewma::minutes(15.0),
                last_tick: start,
            }),
            clock,
        }
    }

    /// Record one event.
    pub fn mark(&self) {
        self.mark_n(1);
    }

    /// Record `n` events.
    pub fn mark_n(&self, n: i64) {
        let mut rates = self.rates.lock();
        self.tick_if_necessary(&mut rates);

        self.count.fetch_add(n, Ordering::Relaxed);
        rates.m1.update(n);
        rates.m5.update(n);
        rates.m15.update(n);
    }

    fn tick_if_necessary(&self, rates: &mut Rates) {
        let now = self.clock.tick();
        let age = now.saturating_sub(rates.last_tick);

        if age > TICK_INTERVAL_NANOS {
            rates.last_tick = now - age % TICK_INTERVAL_NANOS;
            for _ in 0..age / TICK_INTERVAL_NANOS {
                rates.m1.tick();
                rates.m5.tick();
                rates.m15.tick();
            }
        }
    }

    fn read_rate(&self, pick: impl Fn(&Rates) -> &Ewma) -> f64 {
        let mut rates = self.rates.lock();
        self.tick_if_necessary(&mut rates);
        pick(&rates).per_second()
    }
}

impl Default for Meter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Meter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Meter")
            .field("count", &self.count())
            .finish_non_exhaustive()
    }
}

impl Instrument for Meter {}

impl Counting for Meter {
    fn count(&self) -> i64 {
        self.count.load(Ordering::Relaxed)
    }
}

impl Metered for Meter {
    fn one_minute_rate(&self) -> f64 {
        self.read_rate(|r| &r.m1)
    }

    fn five_minute_rate(&self) -> f64 {
        self.read_rate(|r| &r.m5)
    }

    fn fifteen_minute_rate(&self) -> f64 {
        self.read_rate(|r| &r.m15)
    }

    fn mean_rate(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            return 0.0;
        }

        let elapsed = self.clock.tick().saturating_sub(self.start);
        if elapsed == 0 {
            return 0.0;
        }
        count as f64 / elapsed as f64 * NANOS_PER_SEC
    }
}
