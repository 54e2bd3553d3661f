//! Line emitter for the Prometheus text exposition format.

use std::collections::HashSet;
use std::io::{self, Write};

use crate::labels::Labels;
use crate::mapping::PrometheusType;

/// Writes HELP, TYPE and sample lines to an underlying sink.
///
/// HELP/TYPE pairs written through [`declare`](Self::declare) are emitted at
/// most once per series name for the lifetime of the writer.
pub struct PrometheusTextWriter<W: Write> {
    sink: W,
    declared: HashSet<String>,
}

impl<W: Write> PrometheusTextWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            declared: HashSet::new(),
        }
    }

    /// Write `# HELP <name> <text>`.
    pub fn write_help(&mut self, name: &str, help: &str) -> io::Result<()> {
        writeln!(self.sink, "# HELP {} {}", name, escape_help(help))
    }

    /// Write `# TYPE <name> <type>`.
    pub fn write_type(&mut self, name: &str, metric_type: PrometheusType) -> io::Result<()> {
        writeln!(self.sink, "# TYPE {} {}", name, metric_type.as_str())
    }

    /// Write the HELP and TYPE lines for `name` unless already written.
    ///
    /// Returns whether the lines were written.
    pub fn declare(
        &mut self,
        name: &str,
        help: &str,
        metric_type: PrometheusType,
    ) -> io::Result<bool> {
        if self.declared.contains(name) {
            return Ok(false);
        }

        self.write_help(name, help)?;
        self.write_type(name, metric_type)?;
        self.declared.insert(name.to_string());
        Ok(true)
    }

    /// Write `<name>{<labels>} <value>`, omitting braces for empty labels.
    pub fn write_sample(&mut self, name: &str, labels: &Labels, value: f64) -> io::Result<()> {
        writeln!(
            self.sink,
            "{}{} {}",
            name,
            format_labels(labels),
            format_value(value)
        )
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }

    /// Flush and hand back the underlying sink.
    pub fn close(mut self) -> io::Result<W> {
        self.sink.flush()?;
        Ok(self.sink)
    }
}

/// Escape special characters in label values.
fn escape_label_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            _ => result.push(c),
        }
    }
    result
}

/// Escape backslashes and line feeds in HELP text.
fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}

/// Format a floating point value for Prometheus.
fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            "+Inf".to_string()
        } else {
            "-Inf".to_string()
        }
    } else {
        format!("{}", value)
    }
}

/// Format labels for Prometheus exposition format.
fn format_labels(labels: &Labels) -> String {
    if labels.is_empty() {
        return String::new();
    }

    let parts: Vec<String> = labels
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label_value(v)))
        .collect();

    format!("{{{}}}", parts.join(","))
}
