use std::sync::atomic::{AtomicI64, Ordering};

use crate::metric::{Counting, Instrument};

/// A count that can be incremented and decremented.
#[derive(Debug, Default)]
pub struct Counter {
    count: AtomicI64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self) {
        self.inc_by(1);
    }

    pub fn inc_by(&self, n: i64) {
        self.count.fetch_add(n, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        self.dec_by(1);
    }

    pub fn dec_by(&self, n: i64) {
        self.count.fetch_sub(n, Ordering::Relaxed);
    }
}

impl Instrument for Counter {}

impl Counting for Counter {
    fn count(&self) -> i64 {
        self.count.load(Ordering::Relaxed)
    }
}
