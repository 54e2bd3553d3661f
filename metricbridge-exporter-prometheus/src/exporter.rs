//! Per-kind translation of registry metrics into exposition lines.

use std::io::{self, Write};

use metricbridge_common::{
    Counting, Gauge, Instrument, Metered, Metric, Sampling, Snapshot, Timed,
};
use tracing::trace;

use crate::labels::Labels;
use crate::mapping::{PrometheusType, help_message};
use crate::writer::PrometheusTextWriter;

/// Scale applied to timer quantiles, which are recorded in nanoseconds.
pub const NANOS_TO_SECONDS: f64 = 1.0 / 1_000_000_000.0;

/// Writes registry metrics through a [`PrometheusTextWriter`].
///
/// Every method takes the metric's registered identifier (reported in the
/// HELP text), its sanitized, label-free name, and the labels extracted from
/// the identifier. Derived samples get their own copy of the labels.
pub struct MetricsExporter<'a, W: Write> {
    writer: &'a mut PrometheusTextWriter<W>,
    source: &'a str,
}

impl<'a, W: Write> MetricsExporter<'a, W> {
    /// Create an exporter whose HELP lines name `source` as the metric origin.
    pub fn new(writer: &'a mut PrometheusTextWriter<W>, source: &'a str) -> Self {
        Self { writer, source }
    }

    /// Write any registry metric, dispatching on its kind.
    ///
    /// Returns `Ok(false)` when the metric was skipped.
    pub fn write_metric(
        &mut self,
        original: &str,
        name: &str,
        metric: &Metric,
        labels: &Labels,
    ) -> io::Result<bool> {
        match metric {
            Metric::Gauge(gauge) => self.write_gauge(original, name, gauge.as_ref(), labels),
            Metric::Counter(counter) => {
                self.write_counter(original, name, counter.as_ref(), labels)?;
                Ok(true)
            }
            Metric::Histogram(histogram) => {
                self.write_histogram(original, name, histogram.as_ref(), labels)?;
                Ok(true)
            }
            Metric::Meter(meter) => {
                self.write_meter(original, name, meter.as_ref(), labels)?;
                Ok(true)
            }
            Metric::Timer(timer) => {
                self.write_timer(original, name, timer.as_ref(), labels)?;
                Ok(true)
            }
        }
    }

    /// Export a gauge as a Prometheus gauge.
    ///
    /// Gauges whose value is neither numeric nor boolean are skipped without
    /// writing anything.
    pub fn write_gauge(
        &mut self,
        original: &str,
        name: &str,
        gauge: &dyn Gauge,
        labels: &Labels,
    ) -> io::Result<bool> {
        let value = gauge.value();
        let Some(number) = value.as_f64() else {
            trace!(
                metric = original,
                value_type = value.type_label(),
                "Invalid type for gauge"
            );
            return Ok(false);
        };

        let help = help_message(self.source, original, gauge.type_name());
        self.writer.declare(name, &help, PrometheusType::Gauge)?;
        self.writer.write_sample(name, labels, number)?;
        Ok(true)
    }

    /// Export a counter as a Prometheus gauge, since counters can decrement.
    pub fn write_counter(
        &mut self,
        original: &str,
        name: &str,
        counter: &dyn Counting,
        labels: &Labels,
    ) -> io::Result<()> {
        let help = help_message(self.source, original, counter.type_name());
        self.writer.declare(name, &help, PrometheusType::Gauge)?;
        self.writer.write_sample(name, labels, counter.count() as f64)
    }

    /// Export a histogram snapshot as a Prometheus summary.
    pub fn write_histogram(
        &mut self,
        original: &str,
        name: &str,
        histogram: &dyn Sampling,
        labels: &Labels,
    ) -> io::Result<()> {
        let help = help_message(self.source, original, histogram.type_name());
        self.write_snapshot_and_count(
            name,
            &histogram.snapshot(),
            histogram.count(),
            1.0,
            &help,
            labels,
        )
    }

    /// Export a meter as a `_total` counter followed by its rates.
    pub fn write_meter(
        &mut self,
        original: &str,
        name: &str,
        meter: &dyn Metered,
        labels: &Labels,
    ) -> io::Result<()> {
        let total = format!("{}_total", name);
        let help = help_message(self.source, original, meter.type_name());

        self.writer.declare(&total, &help, PrometheusType::Counter)?;
        self.writer
            .write_sample(&total, labels, meter.count() as f64)?;
        self.write_metered(name, meter, labels)
    }

    /// Export a timer as a summary in seconds followed by its rates.
    pub fn write_timer(
        &mut self,
        original: &str,
        name: &str,
        timer: &dyn Timed,
        labels: &Labels,
    ) -> io::Result<()> {
        let help = help_message(self.source, original, timer.type_name());
        self.write_snapshot_and_count(
            name,
            &timer.snapshot(),
            timer.count(),
            NANOS_TO_SECONDS,
            &help,
            labels,
        )?;
        self.write_metered(name, timer, labels)
    }

    /// Quantiles are multiplied by `factor`; the remaining statistics are
    /// written in the snapshot's native unit.
    fn write_snapshot_and_count(
        &mut self,
        name: &str,
        snapshot: &Snapshot,
        count: i64,
        factor: f64,
        help: &str,
        labels: &Labels,
    ) -> io::Result<()> {
        self.writer.declare(name, help, PrometheusType::Summary)?;

        let quantile_name = format!("{}_quantile", name);
        for (quantile, value) in quantiles(snapshot) {
            let sample_labels = with_label(labels, "quantile", quantile);
            self.writer
                .write_sample(&quantile_name, &sample_labels, value * factor)?;
        }

        let statistics = [
            ("min", snapshot.min),
            ("max", snapshot.max),
            ("median", snapshot.median),
            ("mean", snapshot.mean),
            ("stddev", snapshot.std_dev),
            ("count", count as f64),
        ];
        for (suffix, value) in statistics {
            self.writer
                .write_sample(&format!("{}_{}", name, suffix), labels, value)?;
        }

        Ok(())
    }

    fn write_metered<M: Metered + ?Sized>(
        &mut self,
        name: &str,
        metered: &M,
        labels: &Labels,
    ) -> io::Result<()> {
        let rate_name = format!("{}_rate", name);
        let rates = [
            ("m1", metered.one_minute_rate()),
            ("m5", metered.five_minute_rate()),
            ("m15", metered.fifteen_minute_rate()),
            ("mean", metered.mean_rate()),
        ];

        for (rate, value) in rates {
            let sample_labels = with_label(labels, "rate", rate);
            self.writer.write_sample(&rate_name, &sample_labels, value)?;
        }
        Ok(())
    }
}

fn quantiles(snapshot: &Snapshot) -> [(&'static str, f64); 6] {
    [
        ("0.5", snapshot.median),
        ("0.75", snapshot.p75),
        ("0.95", snapshot.p95),
        ("0.98", snapshot.p98),
        ("0.99", snapshot.p99),
        ("0.999", snapshot.p999),
    ]
}

/// Copy of `labels` with one extra entry.
fn with_label(labels: &Labels, key: &str, value: &str) -> Labels {
    let mut copy = labels.clone();
    copy.insert(key.to_string(), value.to_string());
    copy
}
