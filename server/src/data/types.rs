//! Canonical ingestion entities
//!
//! What the extractor hands to the dispatch queues and consumers. Unlike the
//! wire types these are validated: label names are non-empty and unique,
//! histogram buckets carry absolute counts.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Reserved label holding the metric name
pub const METRIC_NAME_LABEL: &str = "__name__";

/// Exemplar label conventionally carrying the trace id
pub const TRACE_ID_LABEL: &str = "trace_id";

/// Exemplar label conventionally carrying the span id
pub const SPAN_ID_LABEL: &str = "span_id";

// =============================================================================
// Labels
// =============================================================================

/// Canonical label mapping (name -> value), sorted by name
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct LabelSet(BTreeMap<String, String>);

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from wire-order pairs. A repeated name keeps its last value.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Value of `__name__`, if any
    pub fn metric_name(&self) -> Option<&str> {
        self.get(METRIC_NAME_LABEL)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Prometheus text form: `name{a="1", b="2"}`
impl fmt::Display for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = self.metric_name() {
            f.write_str(name)?;
        }
        let mut rest = self.iter().filter(|(k, _)| *k != METRIC_NAME_LABEL).peekable();
        if rest.peek().is_none() {
            return if self.metric_name().is_some() {
                Ok(())
            } else {
                f.write_str("{}")
            };
        }
        f.write_str("{")?;
        for (i, (k, v)) in rest.enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={:?}", k, v)?;
        }
        f.write_str("}")
    }
}

// =============================================================================
// Points
// =============================================================================

/// Identity of one time series within a request
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub labels: Arc<LabelSet>,
}

/// Scalar sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplePoint {
    pub value: f64,
    pub timestamp_ms: i64,
}

/// Exemplar with its own labels (never merged with the series labels)
#[derive(Debug, Clone, PartialEq)]
pub struct ExemplarPoint {
    pub labels: LabelSet,
    pub value: f64,
    pub timestamp_ms: i64,
}

impl ExemplarPoint {
    /// Trace id label, when the exemplar links to a trace
    pub fn trace_id(&self) -> Option<&str> {
        self.labels.get(TRACE_ID_LABEL).filter(|v| !v.is_empty())
    }
}

// =============================================================================
// Histograms
// =============================================================================

/// Count representation of a native histogram
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HistogramCount {
    Int(u64),
    Float(f64),
}

impl fmt::Display for HistogramCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistogramCount::Int(v) => write!(f, "{}", v),
            HistogramCount::Float(v) => write!(f, "{}", v),
        }
    }
}

/// Counter-reset information attached by the sender
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResetHint {
    #[default]
    Unknown,
    Yes,
    No,
    Gauge,
}

/// One populated bucket with resolved boundaries
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramBucket {
    pub lower: f64,
    pub upper: f64,
    pub lower_inclusive: bool,
    pub upper_inclusive: bool,
    pub count: f64,
}

impl fmt::Display for HistogramBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let open = if self.lower_inclusive { '[' } else { '(' };
        let close = if self.upper_inclusive { ']' } else { ')' };
        write!(
            f,
            "{}{},{}{}:{}",
            open, self.lower, self.upper, close, self.count
        )
    }
}

/// Decoded native histogram
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSnapshot {
    pub count: HistogramCount,
    pub sum: f64,
    pub schema: i32,
    pub zero_threshold: f64,
    pub zero_count: f64,
    /// Ascending by upper bound
    pub negative_buckets: Vec<HistogramBucket>,
    /// Ascending by upper bound
    pub positive_buckets: Vec<HistogramBucket>,
    pub reset_hint: ResetHint,
    pub timestamp_ms: i64,
}

/// `{count:N, sum:S, [-4,-2):1, [-0.001,0.001]:2, (1,2]:3}`
impl fmt::Display for HistogramSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{count:{}, sum:{}", self.count, self.sum)?;
        for b in &self.negative_buckets {
            write!(f, ", {}", b)?;
        }
        if self.zero_count > 0.0 {
            write!(
                f,
                ", [{},{}]:{}",
                -self.zero_threshold, self.zero_threshold, self.zero_count
            )?;
        }
        for b in &self.positive_buckets {
            write!(f, ", {}", b)?;
        }
        f.write_str("}")
    }
}

// =============================================================================
// Metadata
// =============================================================================

/// Per-family metadata sent alongside series
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRecord {
    pub metric_family_name: String,
    pub metric_type: &'static str,
    pub help: String,
    pub unit: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_set_last_duplicate_wins() {
        let labels = LabelSet::from_pairs([("job", "a"), ("job", "b")]);
        assert_eq!(labels.len(), 1);
        assert_eq!(labels.get("job"), Some("b"));
    }

    #[test]
    fn test_label_set_display_prometheus_form() {
        let labels =
            LabelSet::from_pairs([("job", "api"), ("__name__", "http_requests_total"), ("code", "200")]);
        assert_eq!(
            labels.to_string(),
            r#"http_requests_total{code="200", job="api"}"#
        );
    }

    #[test]
    fn test_label_set_display_without_name() {
        assert_eq!(LabelSet::new().to_string(), "{}");
        let labels = LabelSet::from_pairs([("a", "1")]);
        assert_eq!(labels.to_string(), r#"{a="1"}"#);
        let named = LabelSet::from_pairs([("__name__", "up")]);
        assert_eq!(named.to_string(), "up");
    }

    #[test]
    fn test_exemplar_trace_id_ignores_empty() {
        let with = ExemplarPoint {
            labels: LabelSet::from_pairs([(TRACE_ID_LABEL, "abc")]),
            value: 1.0,
            timestamp_ms: 0,
        };
        let empty = ExemplarPoint {
            labels: LabelSet::from_pairs([(TRACE_ID_LABEL, "")]),
            value: 1.0,
            timestamp_ms: 0,
        };
        assert_eq!(with.trace_id(), Some("abc"));
        assert_eq!(empty.trace_id(), None);
    }
}
