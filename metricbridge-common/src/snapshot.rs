use serde::{Deserialize, Serialize};

/// A point-in-time statistical summary of a value distribution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub median: f64,
    pub p75: f64,
    pub p95: f64,
    pub p98: f64,
    pub p99: f64,
    pub p999: f64,
    /// Number of values the summary was computed from.
    pub size: usize,
}

impl Snapshot {
    /// Summarize a set of raw values.
    ///
    /// Quantiles use the `q * (n + 1)` position with linear interpolation
    /// between neighbours, clamped to the smallest and largest value. The
    /// standard deviation is the sample standard deviation, zero for fewer
    /// than two values. An empty input yields an all-zero snapshot.
    pub fn from_values(values: &[i64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }

        let mut sorted = values.to_vec();
        sorted.sort_unstable();

        let n = sorted.len();
        let sum: f64 = sorted.iter().map(|v| *v as f64).sum();
        let mean = sum / n as f64;

        let std_dev = if n > 1 {
            let variance = sorted
                .iter()
                .map(|v| {
                    let diff = *v as f64 - mean;
                    diff * diff
                })
                .sum::<f64>()
                / (n - 1) as f64;
            variance.sqrt()
        } else {
            0.0
        };

        Self {
            min: sorted[0] as f64,
            max: sorted[n - 1] as f64,
            mean,
            std_dev,
            median: quantile(&sorted, 0.5),
            p75: quantile(&sorted, 0.75),
            p95: quantile(&sorted, 0.95),
            p98: quantile(&sorted, 0.98),
            p99: quantile(&sorted, 0.99),
            p999: quantile(&sorted, 0.999),
            size: n,
        }
    }
}

fn quantile(sorted: &[i64], q: f64) -> f64 {
    let n = sorted.len();
    let pos = q * (n + 1) as f64;

    if pos < 1.0 {
        return sorted[0] as f64;
    }
    if pos >= n as f64 {
        return sorted[n - 1] as f64;
    }

    let index = pos as usize;
    let lower = sorted[index - 1] as f64;
    let upper = sorted[index] as f64;
    lower + (pos - pos.floor()) * (upper - lower)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_snapshot() {
        assert_eq!(Snapshot::from_values(&[]), Snapshot::default());
    }

    #[test]
    fn test_single_value() {
        let snapshot = Snapshot::from_values(&[5]);

        assert_eq!(snapshot.min, 5.0);
        assert_eq!(snapshot.max, 5.0);
        assert_eq!(snapshot.median, 5.0);
        assert_eq!(snapshot.p999, 5.0);
        assert_eq!(snapshot.std_dev, 0.0);
        assert_eq!(snapshot.size, 1);
    }

    #[test]
    fn test_one_to_hundred() {
        let values: Vec<i64> = (1..=100).rev().collect();
        let snapshot = Snapshot::from_values(&values);

        assert_eq!(snapshot.min, 1.0);
        assert_eq!(snapshot.max, 100.0);
        assert_eq!(snapshot.mean, 50.5);
        assert_eq!(snapshot.median, 50.5);
        assert_eq!(snapshot.p75, 75.75);
        assert_eq!(snapshot.p999, 100.0);
        assert_eq!(snapshot.size, 100);
    }

    #[test]
    fn test_sample_std_dev() {
        let snapshot = Snapshot::from_values(&[2, 4, 4, 4, 5, 5, 7, 9]);

        // Sum of squared deviations is 32 over 7 degrees of freedom.
        assert!((snapshot.std_dev - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
        assert_eq!(snapshot.mean, 5.0);
    }
}
