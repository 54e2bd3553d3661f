use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};

use parking_lot::Mutex;

use crate::metric::{Counting, Instrument, Sampling};
use crate::snapshot::Snapshot;

/// Default number of recent values a histogram keeps.
pub const DEFAULT_WINDOW_SIZE: usize = 1028;

/// Tracks the distribution of a stream of values over a sliding window of
/// the most recent measurements.
#[derive(Debug)]
pub struct Histogram {
    window: Mutex<VecDeque<i64>>,
    capacity: usize,
    count: AtomicI64,
}

impl Histogram {
    pub fn new() -> Self {
        Self::with_window(DEFAULT_WINDOW_SIZE)
    }

    /// Histogram keeping the last `capacity` values (at least one).
    pub fn with_window(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            count: AtomicI64::new(0),
        }
    }

    pub fn update(&self, value: i64) {
        self.count.fetch_add(1, Ordering::Relaxed);

        let mut window = self.window.lock();
        if window.len() == self.capacity {
            window.pop_front();
        }
        window.push_back(value);
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Instrument for Histogram {}

impl Counting for Histogram {
    fn count(&self) -> i64 {
        self.count.load(Ordering::Relaxed)
    }
}

impl Sampling for Histogram {
    fn snapshot(&self) -> Snapshot {
        let values: Vec<i64> = self.window.lock().iter().copied().collect();
        Snapshot::from_values(&values)
    }
}
