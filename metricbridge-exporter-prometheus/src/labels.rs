//! Extraction of `{key:value}` labels embedded in dotted metric names.
//!
//! A registry identifier such as `aa.{organisation:org-1}.bb` carries the
//! label `organisation="org-1"` inside its name. Extraction removes every
//! token, collapses the dots left behind, and returns the clean name with the
//! collected labels.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::mapping::sanitize_label_name;

/// Label set attached to an exported metric.
pub type Labels = BTreeMap<String, String>;

/// A metric identifier split into its label-free name and embedded labels.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LabelParsedMetric {
    /// The identifier with all label tokens removed.
    pub name: String,
    /// Labels collected from well-formed tokens.
    pub labels: Labels,
}

/// Split a metric identifier into its clean name and embedded labels.
///
/// Tokens are the shortest `{...}` spans; braces do not nest. Each token's
/// content is split on its first `:` and both sides are trimmed; the key is
/// then sanitized into a valid label name. Tokens without a colon, or with an
/// empty key or value, are removed from the name but contribute no label.
pub fn extract_labels(identifier: &str) -> LabelParsedMetric {
    let mut stripped = String::with_capacity(identifier.len());
    let mut labels = Labels::new();
    let mut rest = identifier;

    while let Some(open) = rest.find('{') {
        let after_open = &rest[open + 1..];
        // A token needs a closing brace and at least one character inside.
        let close = match after_open.find('}') {
            Some(close) if close > 0 => close,
            Some(close) => {
                stripped.push_str(&rest[..open + close + 2]);
                rest = &after_open[close + 1..];
                continue;
            }
            None => break,
        };

        stripped.push_str(&rest[..open]);
        let token = after_open[..close].trim();

        match parse_label(token) {
            Some((key, value)) => {
                debug!(key = %key, value, "Detected metric label");
                labels.insert(key, value.to_string());
            }
            None => {
                warn!(
                    metric = identifier,
                    token, "Metric label does not match the expected key:value pattern"
                );
            }
        }

        rest = &after_open[close + 1..];
    }
    stripped.push_str(rest);

    let name = trim_single_dot(&collapse_dots(&stripped)).to_string();
    debug!(metric = identifier, name = %name, "Final metric after label extraction");

    LabelParsedMetric { name, labels }
}

fn parse_label(token: &str) -> Option<(String, &str)> {
    let (key, value) = token.split_once(':')?;
    let (key, value) = (key.trim(), value.trim());
    if key.is_empty() || value.is_empty() {
        return None;
    }
    Some((sanitize_label_name(key), value))
}

/// Replace every run of two or more `.` with a single `.`.
fn collapse_dots(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut last_was_dot = false;

    for c in name.chars() {
        if c == '.' {
            if !last_was_dot {
                result.push(c);
            }
            last_was_dot = true;
        } else {
            result.push(c);
            last_was_dot = false;
        }
    }

    result
}

/// Strip one leading and then one trailing `.`.
fn trim_single_dot(name: &str) -> &str {
    let name = name.strip_prefix('.').unwrap_or(name);
    name.strip_suffix('.').unwrap_or(name)
}
